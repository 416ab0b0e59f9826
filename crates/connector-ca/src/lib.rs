//! # connector-ca
//!
//! Certificate issuance for the connector registration authority.
//!
//! ## Architecture
//!
//! ```text
//! CSR bytes ──► SigningRequest::decode ──► CN == bound identity?
//!                                              │
//!                    SecretRepository ──► CaMaterial (per request or cached)
//!                                              │
//!                                   sign client-auth leaf
//!                                              │
//!                          persist chain under identity.secret_name()
//! ```
//!
//! ## Security Model
//!
//! - The common name is taken from the redeemed identity, never from the CSR
//! - Every other subject field comes from the configured template
//! - CA material is only ever read; rotating it is somebody else's job
//! - Nothing is persisted unless signing succeeded
//!
//! ## Example
//!
//! ```rust,ignore
//! use connector_ca::{CertificateService, MemorySecretRepository, SigningSettings};
//!
//! let service = CertificateService::new(repo, "connector", "ca-secret", subject, SigningSettings::default());
//! let chain = service.validate_and_sign(csr_pem.as_bytes(), &identity).await?;
//! println!("{}", chain.chain_pem);
//! ```

mod authority;
mod csr;
mod service;
mod store;
#[cfg(test)]
mod testdata;

pub use authority::{CaCachePolicy, CaMaterial};
pub use csr::SigningRequest;
pub use service::{CertificateChain, CertificateService, SigningSettings};
pub use store::{MemorySecretRepository, SecretRepository};

/// Validity period presets for issued client certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityPeriod {
    /// Self-signed bootstrap CA: 5 years
    BootstrapCa,
    /// Client certificate default: 90 days
    Client,
    /// Custom duration in days
    Custom(u32),
}

impl ValidityPeriod {
    /// Get the number of days for this validity period.
    pub fn days(&self) -> u32 {
        match self {
            ValidityPeriod::BootstrapCa => 5 * 365,
            ValidityPeriod::Client => 90,
            ValidityPeriod::Custom(d) => *d,
        }
    }

    /// Validity as a standard duration
    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.days()) * 24 * 60 * 60)
    }
}
