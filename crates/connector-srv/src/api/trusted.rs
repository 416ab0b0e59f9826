//! Trusted issuance surface.

use connector_core::Audience;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, ErrorResponse};
use crate::context::RequestHeaders;
use crate::Registrar;

/// A freshly minted token and the URL to redeem it at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Redemption URL with the token embedded
    pub url: String,
    /// One-time token
    pub token: String,
}

/// Token issuance for callers already authenticated upstream.
pub struct TrustedApi<'a> {
    registrar: &'a Registrar,
}

impl<'a> TrustedApi<'a> {
    pub(crate) const fn new(registrar: &'a Registrar) -> Self {
        Self { registrar }
    }

    /// Mint a token bound to the identity named by `headers`.
    pub fn issue_token(&self, audience: Audience, headers: &RequestHeaders) -> ApiResult<TokenResponse> {
        let issued = self
            .registrar
            .pipeline()
            .issue_token(audience, headers)
            .map_err(ErrorResponse::from)?;

        info!(identity = %issued.identity, ttl_secs = issued.ttl.as_secs(), "token issued");
        let url = self.registrar.audience(audience).render_url(&issued.token);
        Ok(TokenResponse {
            url,
            token: issued.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ConnectorConfig;
    use crate::context::{
        RequestHeaders, APPLICATION_HEADER, GROUP_HEADER, RUNTIME_HEADER, TENANT_HEADER,
    };
    use crate::Registrar;
    use connector_ca::MemorySecretRepository;
    use connector_core::{Audience, DeploymentMode};
    use std::sync::Arc;

    fn registrar(mode: DeploymentMode) -> Registrar {
        let config = ConnectorConfig {
            mode,
            ..ConnectorConfig::default()
        };
        Registrar::from_config(&config, Arc::new(MemorySecretRepository::new())).unwrap()
    }

    #[test]
    fn test_url_embeds_token() {
        let registrar = registrar(DeploymentMode::Solo);
        let headers = RequestHeaders::new().with(APPLICATION_HEADER, "orders");

        let response = registrar
            .trusted()
            .issue_token(Audience::Application, &headers)
            .unwrap();

        assert_eq!(response.token.len(), 64);
        assert!(response.url.ends_with(&format!("token={}", response.token)));
        assert!(response.url.contains("/applications/"));
    }

    #[test]
    fn test_runtime_url_template() {
        let registrar = registrar(DeploymentMode::Central);
        let headers = RequestHeaders::new()
            .with(TENANT_HEADER, "acme")
            .with(GROUP_HEADER, "prod")
            .with(RUNTIME_HEADER, "cluster-1");

        let response = registrar
            .trusted()
            .issue_token(Audience::Runtime, &headers)
            .unwrap();
        assert!(response.url.contains("/runtimes/"));
    }

    #[test]
    fn test_solo_runtime_token_is_404() {
        let registrar = registrar(DeploymentMode::Solo);
        let headers = RequestHeaders::new().with(RUNTIME_HEADER, "cluster-1");

        let err = registrar
            .trusted()
            .issue_token(Audience::Runtime, &headers)
            .unwrap_err();
        assert_eq!(err.code, 404);
        assert!(registrar.pipeline().tokens().cache().is_empty());
    }

    #[test]
    fn test_central_missing_group_is_400() {
        let registrar = registrar(DeploymentMode::Central);
        let headers = RequestHeaders::new()
            .with(TENANT_HEADER, "acme")
            .with(APPLICATION_HEADER, "orders");

        let err = registrar
            .trusted()
            .issue_token(Audience::Application, &headers)
            .unwrap_err();
        assert_eq!(err.code, 400);
        assert!(registrar.pipeline().tokens().cache().is_empty());
    }
}
