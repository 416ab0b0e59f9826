//! Process-wide configuration, fixed at startup.

use connector_ca::{CaCachePolicy, SigningSettings, ValidityPeriod};
use connector_core::{Audience, ConnectorError, DeploymentMode, Result, SubjectTemplate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tokens::{TokenTtls, DEFAULT_ALPHABET, DEFAULT_TOKEN_LENGTH};

/// Placeholder substituted with the token in URL templates.
pub const TOKEN_PLACEHOLDER: &str = "{token}";

/// Placeholder substituted with the identity name in gateway URL templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Longest token lifetime accepted (one day).
pub const MAX_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration for a connector registration authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Solo (single tenant) or central (multi tenant).
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Secret store namespace for CA material and issued certificates.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Token shape.
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Per-audience TTLs and URLs.
    #[serde(default)]
    pub audiences: AudienceConfig,

    /// Certificate issuance.
    #[serde(default)]
    pub certificate: CertificateConfig,
}

/// Token length and alphabet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Number of characters per token.
    #[serde(default = "default_token_length")]
    pub length: usize,

    /// Characters tokens are drawn from.
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

/// One settings record per audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceConfig {
    /// Applications.
    #[serde(default = "default_application")]
    pub application: AudienceSettings,

    /// Cluster runtimes.
    #[serde(default = "default_runtime")]
    pub runtime: AudienceSettings,
}

/// Token lifetime and URL templates for one audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceSettings {
    /// Token time-to-live (seconds).
    pub ttl_secs: u64,

    /// Redemption URL returned with a fresh token; `{token}` is substituted.
    pub url_format: String,

    /// CSR submission URL returned by the info call; `{token}` is substituted.
    pub csr_url_format: String,

    /// Management info endpoint on the certificate-protected surface.
    #[serde(default)]
    pub info_url: Option<String>,

    /// Certificate renewal endpoint on the certificate-protected surface.
    #[serde(default)]
    pub certificates_url: Option<String>,

    /// Per-identity gateway base; `{name}` is substituted. Metadata and event
    /// URLs hang off it.
    #[serde(default)]
    pub gateway_url_format: Option<String>,
}

/// CA location and issued certificate shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Secret holding the CA PEM bundle.
    #[serde(default = "default_ca_secret")]
    pub ca_secret: String,

    /// Client certificate validity (days).
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,

    /// Fixed subject fields.
    #[serde(default)]
    pub subject: SubjectTemplate,

    /// When to read CA material from the store.
    #[serde(default)]
    pub ca_cache: CaCachePolicy,

    /// Smallest RSA key accepted in a CSR.
    #[serde(default = "default_min_rsa_key_bits")]
    pub min_rsa_key_bits: usize,

    /// Write issued chains back to the secret store.
    #[serde(default = "default_persist_issued")]
    pub persist_issued: bool,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::default(),
            namespace: default_namespace(),
            tokens: TokenConfig::default(),
            audiences: AudienceConfig::default(),
            certificate: CertificateConfig::default(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            length: default_token_length(),
            alphabet: default_alphabet(),
        }
    }
}

impl Default for AudienceConfig {
    fn default() -> Self {
        Self {
            application: default_application(),
            runtime: default_runtime(),
        }
    }
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            ca_secret: default_ca_secret(),
            validity_days: default_validity_days(),
            subject: SubjectTemplate::default(),
            ca_cache: CaCachePolicy::default(),
            min_rsa_key_bits: default_min_rsa_key_bits(),
            persist_issued: default_persist_issued(),
        }
    }
}

impl ConnectorConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self =
                toml::from_str(&content).map_err(|e| ConnectorError::Config(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform default config location (`<config dir>/connector/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("connector").join("config.toml"))
    }

    /// Reject configurations that could not serve a single request.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(ConnectorError::Config("namespace must not be empty".into()));
        }
        if self.certificate.ca_secret.trim().is_empty() {
            return Err(ConnectorError::Config("certificate.ca_secret must not be empty".into()));
        }
        let max_validity = ValidityPeriod::BootstrapCa.days();
        if self.certificate.validity_days == 0 || self.certificate.validity_days > max_validity {
            return Err(ConnectorError::Config(format!(
                "certificate.validity_days must be between 1 and {max_validity}"
            )));
        }
        if self.tokens.length == 0 || self.tokens.alphabet.is_empty() {
            return Err(ConnectorError::Config("tokens need a length and an alphabet".into()));
        }
        for audience in Audience::ALL {
            let settings = self.audiences.get(audience);
            if settings.ttl_secs == 0 || settings.ttl_secs > MAX_TOKEN_TTL_SECS {
                return Err(ConnectorError::Config(format!(
                    "{audience} ttl_secs must be between 1 and {MAX_TOKEN_TTL_SECS}"
                )));
            }
            if let Some(template) = &settings.gateway_url_format {
                if !template.contains(NAME_PLACEHOLDER) {
                    return Err(ConnectorError::Config(format!(
                        "{audience} gateway template {template:?} lacks {NAME_PLACEHOLDER}"
                    )));
                }
            }
            for template in [&settings.url_format, &settings.csr_url_format] {
                if !template.contains(TOKEN_PLACEHOLDER) {
                    return Err(ConnectorError::Config(format!(
                        "{audience} url template {template:?} lacks {TOKEN_PLACEHOLDER}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Token TTLs indexed by audience.
    pub fn token_ttls(&self) -> TokenTtls {
        TokenTtls {
            application: self.audiences.application.ttl(),
            runtime: self.audiences.runtime.ttl(),
        }
    }

    /// Signing settings for the certificate service.
    pub fn signing_settings(&self) -> SigningSettings {
        SigningSettings {
            validity: ValidityPeriod::Custom(self.certificate.validity_days).as_duration(),
            min_rsa_key_bits: self.certificate.min_rsa_key_bits,
            ca_cache: self.certificate.ca_cache,
            persist_issued: self.certificate.persist_issued,
        }
    }
}

impl AudienceConfig {
    /// Settings for `audience`.
    pub const fn get(&self, audience: Audience) -> &AudienceSettings {
        match audience {
            Audience::Application => &self.application,
            Audience::Runtime => &self.runtime,
        }
    }
}

impl AudienceSettings {
    /// Token TTL.
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Redemption URL for `token`.
    pub fn render_url(&self, token: &str) -> String {
        self.url_format.replace(TOKEN_PLACEHOLDER, token)
    }

    /// CSR submission URL for `token`.
    pub fn render_csr_url(&self, token: &str) -> String {
        self.csr_url_format.replace(TOKEN_PLACEHOLDER, token)
    }

    /// Gateway base for the identity called `name`, if a gateway is configured.
    pub fn render_gateway_url(&self, name: &str) -> Option<String> {
        self.gateway_url_format
            .as_ref()
            .map(|template| template.replace(NAME_PLACEHOLDER, name))
    }
}

// Default value functions for serde.
fn default_namespace() -> String {
    String::from("connector")
}

const fn default_token_length() -> usize {
    DEFAULT_TOKEN_LENGTH
}

fn default_alphabet() -> String {
    String::from(DEFAULT_ALPHABET)
}

fn default_application() -> AudienceSettings {
    AudienceSettings {
        ttl_secs: 5 * 60,
        url_format: String::from(
            "https://connector.local/v1/applications/signingRequests/info?token={token}",
        ),
        csr_url_format: String::from(
            "https://connector.local/v1/applications/certificates?token={token}",
        ),
        info_url: Some(String::from(
            "https://gateway.connector.local/v1/applications/management/info",
        )),
        certificates_url: Some(String::from(
            "https://gateway.connector.local/v1/applications/certificates",
        )),
        gateway_url_format: Some(String::from("https://gateway.connector.local/{name}/v1")),
    }
}

fn default_runtime() -> AudienceSettings {
    AudienceSettings {
        ttl_secs: 10 * 60,
        url_format: String::from(
            "https://connector.local/v1/runtimes/signingRequests/info?token={token}",
        ),
        csr_url_format: String::from(
            "https://connector.local/v1/runtimes/certificates?token={token}",
        ),
        info_url: Some(String::from(
            "https://gateway.connector.local/v1/runtimes/management/info",
        )),
        certificates_url: Some(String::from(
            "https://gateway.connector.local/v1/runtimes/certificates",
        )),
        gateway_url_format: None,
    }
}

fn default_ca_secret() -> String {
    String::from("connector-ca")
}

fn default_validity_days() -> u32 {
    ValidityPeriod::Client.days()
}

const fn default_min_rsa_key_bits() -> usize {
    4096
}

const fn default_persist_issued() -> bool {
    true
}
