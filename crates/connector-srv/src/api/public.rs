//! Public redemption surface.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use connector_core::Audience;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, ErrorResponse};
use crate::config::AudienceSettings;
use crate::context::RequestHeaders;
use crate::Registrar;

/// CSR submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrPayload {
    /// Base64 encoded PEM certificate request
    pub csr: String,
}

/// What the caller's CSR has to look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedCertificate {
    /// Subject the signed certificate will carry
    pub subject: String,
    /// Expected key algorithm, e.g. `rsa4096`
    pub key_algorithm: String,
}

/// Endpoints the caller uses once it holds a certificate.
///
/// Unset entries are left out of the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates_url: Option<String>,
}

impl ApiUrls {
    fn for_identity(settings: &AudienceSettings, name: &str) -> Self {
        let gateway = settings.render_gateway_url(name);
        Self {
            metadata_url: gateway.as_ref().map(|base| format!("{base}/metadata/services")),
            events_url: gateway.map(|base| format!("{base}/events")),
            info_url: settings.info_url.clone(),
            certificates_url: settings.certificates_url.clone(),
        }
    }
}

/// Answer to the info call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    /// Where to submit the CSR; embeds a fresh token
    pub csr_url: String,
    /// Certificate requirements
    pub certificate: RequestedCertificate,
    /// Follow-up endpoints for the certified caller
    pub api: ApiUrls,
}

/// Signed certificates, each base64 encoded PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateResponse {
    /// Client certificate followed by the CA certificate
    pub crt: String,
    /// Client certificate alone
    pub client_crt: String,
    /// CA certificate alone
    pub ca_crt: String,
}

/// Token redemption for unauthenticated callers.
pub struct PublicApi<'a> {
    registrar: &'a Registrar,
}

impl<'a> PublicApi<'a> {
    pub(crate) const fn new(registrar: &'a Registrar) -> Self {
        Self { registrar }
    }

    /// Trade `token` for the CSR requirements and a CSR submission URL.
    ///
    /// The presented token is consumed; the returned URL carries a new one
    /// bound to the same identity.
    pub fn signing_request_info(
        &self,
        audience: Audience,
        headers: &RequestHeaders,
        token: &str,
    ) -> ApiResult<InfoResponse> {
        let pipeline = self.registrar.pipeline();
        let issued = pipeline
            .exchange_token(audience, headers, token)
            .map_err(ErrorResponse::from)?;

        let subject = pipeline
            .certificates()
            .subject_template()
            .subject_for(issued.identity.common_name());
        let settings = self.registrar.audience(audience);

        Ok(InfoResponse {
            csr_url: settings.render_csr_url(&issued.token),
            certificate: RequestedCertificate {
                subject,
                key_algorithm: self.registrar.key_algorithm().to_string(),
            },
            api: ApiUrls::for_identity(settings, issued.identity.common_name()),
        })
    }

    /// Redeem `token` and sign the submitted CSR.
    pub async fn sign_certificate(
        &self,
        audience: Audience,
        headers: &RequestHeaders,
        token: &str,
        payload: &CsrPayload,
    ) -> ApiResult<CertificateResponse> {
        let chain = self
            .registrar
            .pipeline()
            .sign_certificate(audience, headers, token, payload.csr.as_bytes())
            .await
            .map_err(ErrorResponse::from)?;

        info!(
            subject = %chain.subject,
            serial = %chain.serial,
            not_after = %chain.not_after,
            "certificate issued"
        );
        Ok(CertificateResponse {
            crt: STANDARD.encode(chain.chain_pem),
            client_crt: STANDARD.encode(chain.client_pem),
            ca_crt: STANDARD.encode(chain.ca_pem),
        })
    }
}
