//! Registration authority handle.

use connector_ca::{CertificateService, SecretRepository};
use connector_core::{Audience, Result};
use std::sync::Arc;
use tracing::info;

use crate::api::{PublicApi, TrustedApi};
use crate::config::{AudienceConfig, AudienceSettings, ConnectorConfig};
use crate::context::ContextResolver;
use crate::pipeline::IssuancePipeline;
use crate::tokens::{TokenCache, TokenGenerator, TokenManager};

/// Cheap to clone; every clone shares one token cache and one
/// certificate service.
#[derive(Clone)]
pub struct Registrar {
    inner: Arc<RegistrarInner>,
}

struct RegistrarInner {
    pipeline: IssuancePipeline,
    audiences: AudienceConfig,
    key_algorithm: String,
}

impl Registrar {
    /// Wire up all components from a validated configuration.
    pub fn from_config(config: &ConnectorConfig, repository: Arc<dyn SecretRepository>) -> Result<Self> {
        config.validate()?;

        let generator = TokenGenerator::new(config.tokens.length, &config.tokens.alphabet)?;
        let tokens = TokenManager::new(Arc::new(TokenCache::new()), generator, config.token_ttls());
        let certificates = CertificateService::new(
            repository,
            config.namespace.clone(),
            config.certificate.ca_secret.clone(),
            config.certificate.subject.clone(),
            config.signing_settings(),
        );
        let pipeline = IssuancePipeline::new(
            ContextResolver::new(config.mode),
            Arc::new(tokens),
            Arc::new(certificates),
        );

        info!(
            mode = %config.mode,
            namespace = %config.namespace,
            ca_secret = %config.certificate.ca_secret,
            "registration authority ready"
        );
        Ok(Self {
            inner: Arc::new(RegistrarInner {
                pipeline,
                audiences: config.audiences.clone(),
                key_algorithm: format!("rsa{}", config.certificate.min_rsa_key_bits),
            }),
        })
    }

    /// Token issuance surface
    #[must_use]
    pub fn trusted(&self) -> TrustedApi<'_> {
        TrustedApi::new(self)
    }

    /// Token redemption surface
    #[must_use]
    pub fn public(&self) -> PublicApi<'_> {
        PublicApi::new(self)
    }

    /// Underlying pipeline
    pub fn pipeline(&self) -> &IssuancePipeline {
        &self.inner.pipeline
    }

    /// Drop expired tokens; returns how many went.
    pub fn purge_expired_tokens(&self) -> usize {
        let purged = self.inner.pipeline.tokens().cache().purge_expired();
        if purged > 0 {
            info!(purged, "purged expired tokens");
        }
        purged
    }

    pub(crate) fn audience(&self, audience: Audience) -> &AudienceSettings {
        self.inner.audiences.get(audience)
    }

    pub(crate) fn key_algorithm(&self) -> &str {
        &self.inner.key_algorithm
    }
}
