//! CA material loaded from the secret store.
//!
//! The CA secret is a single PEM bundle holding one `CERTIFICATE` block and
//! one PKCS#8 `PRIVATE KEY` block.

use connector_core::{ConnectorError, Result};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::ValidityPeriod;

/// When CA material is read from the secret store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaCachePolicy {
    /// Fetch on every signing request
    #[default]
    PerRequest,
    /// Fetch once, reuse for the process lifetime
    Cached,
}

/// Signing certificate and key of the CA.
pub struct CaMaterial {
    key_pair: KeyPair,
    /// Issuer handle rebuilt from the stored certificate
    certificate: Certificate,
    /// Stored certificate, returned verbatim in issued chains
    cert_pem: String,
    /// CA common name
    pub subject: String,
}

impl std::fmt::Debug for CaMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaMaterial")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl CaMaterial {
    /// Generate a self-signed CA for bootstrapping a fresh deployment.
    pub fn generate(name: &str) -> Result<Self> {
        let key_pair = KeyPair::generate().map_err(signing_failure)?;

        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, name);
        params.distinguished_name = dn;

        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        params.not_before = time::OffsetDateTime::now_utc();
        params.not_after = time::OffsetDateTime::now_utc()
            + time::Duration::days(i64::from(ValidityPeriod::BootstrapCa.days()));

        let serial = Uuid::new_v4();
        params.serial_number = Some((serial.as_u128() as u64).into());

        let certificate = params.self_signed(&key_pair).map_err(signing_failure)?;
        let cert_pem = certificate.pem();

        Ok(Self {
            key_pair,
            certificate,
            cert_pem,
            subject: name.to_string(),
        })
    }

    /// Parse a PEM bundle read from the secret store.
    ///
    /// Any problem with the bundle is a [`ConnectorError::SigningFailure`].
    pub fn from_pem_bundle(bundle: &[u8]) -> Result<Self> {
        let blocks = pem::parse_many(bundle)
            .map_err(|e| ConnectorError::SigningFailure(format!("CA bundle is not PEM: {e}")))?;

        let cert_block = blocks
            .iter()
            .find(|b| b.tag() == "CERTIFICATE")
            .ok_or_else(|| {
                ConnectorError::SigningFailure("CA bundle has no certificate".to_string())
            })?;
        let key_block = blocks
            .iter()
            .find(|b| b.tag().ends_with("PRIVATE KEY"))
            .ok_or_else(|| {
                ConnectorError::SigningFailure("CA bundle has no private key".to_string())
            })?;

        let (_, parsed) = X509Certificate::from_der(cert_block.contents()).map_err(|e| {
            ConnectorError::SigningFailure(format!("CA certificate is not valid DER: {e}"))
        })?;
        let subject = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let key_pair = KeyPair::from_pem(&pem::encode(key_block)).map_err(signing_failure)?;
        if key_pair.public_key_der() != parsed.public_key().raw {
            return Err(ConnectorError::SigningFailure(
                "CA private key does not match certificate".to_string(),
            ));
        }

        let cert_pem = pem::encode(cert_block);
        let params = CertificateParams::from_ca_cert_pem(&cert_pem).map_err(signing_failure)?;
        let certificate = params.self_signed(&key_pair).map_err(signing_failure)?;

        Ok(Self {
            key_pair,
            certificate,
            cert_pem,
            subject,
        })
    }

    /// Serialize to the bundle format [`CaMaterial::from_pem_bundle`] reads.
    pub fn to_pem_bundle(&self) -> Vec<u8> {
        format!("{}{}", self.cert_pem, self.key_pair.serialize_pem()).into_bytes()
    }

    /// CA certificate PEM as stored.
    pub fn certificate_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Issuer handle used for signing.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// CA key pair.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }
}

fn signing_failure(err: rcgen::Error) -> ConnectorError {
    ConnectorError::SigningFailure(err.to_string())
}
