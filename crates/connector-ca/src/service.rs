//! Client certificate issuance.

use chrono::{DateTime, Utc};
use connector_core::{ConnectorError, Identity, Result, SubjectTemplate};
use rcgen::{DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa, KeyUsagePurpose};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::authority::{CaCachePolicy, CaMaterial};
use crate::csr::SigningRequest;
use crate::store::SecretRepository;
use crate::ValidityPeriod;

/// Backdating applied to `not_before` to tolerate clock skew.
const CLOCK_SKEW: time::Duration = time::Duration::minutes(5);

/// Tunables for certificate issuance.
#[derive(Debug, Clone)]
pub struct SigningSettings {
    /// Lifetime of issued client certificates
    pub validity: Duration,

    /// Smallest RSA key accepted in a CSR
    pub min_rsa_key_bits: usize,

    /// When CA material is read from the store
    pub ca_cache: CaCachePolicy,

    /// Whether issued chains are written back to the store
    pub persist_issued: bool,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            validity: ValidityPeriod::Client.as_duration(),
            min_rsa_key_bits: 4096,
            ca_cache: CaCachePolicy::default(),
            persist_issued: true,
        }
    }
}

/// A freshly signed client certificate and its issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateChain {
    /// Client certificate followed by the CA certificate
    pub chain_pem: String,
    /// Client certificate alone
    pub client_pem: String,
    /// CA certificate alone
    pub ca_pem: String,
    /// Serial number (hex)
    pub serial: String,
    /// Common name written into the certificate
    pub subject: String,
    /// Not valid after
    pub not_after: DateTime<Utc>,
}

/// Validates CSRs against a redeemed identity and signs them with the CA.
pub struct CertificateService {
    repository: Arc<dyn SecretRepository>,
    namespace: String,
    ca_secret: String,
    subject: SubjectTemplate,
    settings: SigningSettings,
    cached_ca: RwLock<Option<Arc<CaMaterial>>>,
}

impl CertificateService {
    /// Create a service reading the CA from `namespace/ca_secret`.
    pub fn new(
        repository: Arc<dyn SecretRepository>,
        namespace: impl Into<String>,
        ca_secret: impl Into<String>,
        subject: SubjectTemplate,
        settings: SigningSettings,
    ) -> Self {
        Self {
            repository,
            namespace: namespace.into(),
            ca_secret: ca_secret.into(),
            subject,
            settings,
            cached_ca: RwLock::new(None),
        }
    }

    /// Subject template stamped on every certificate.
    pub fn subject_template(&self) -> &SubjectTemplate {
        &self.subject
    }

    /// Namespace certificates are persisted under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Validate `csr` against `identity`, sign it, and persist the chain.
    ///
    /// The CN check runs before the CA is touched, so a spoofed CSR never
    /// costs a secret-store round trip and never produces a certificate.
    #[instrument(skip(self, csr), fields(identity = %identity))]
    pub async fn validate_and_sign(&self, csr: &[u8], identity: &Identity) -> Result<CertificateChain> {
        let request = SigningRequest::decode(csr)?;
        request.ensure_common_name(identity.common_name())?;
        request.ensure_key_strength(self.settings.min_rsa_key_bits)?;

        let ca = self.ca_material().await?;
        let chain = self.sign(request, identity, &ca)?;

        if self.settings.persist_issued {
            self.repository
                .put(
                    &identity.secret_name(),
                    &self.namespace,
                    chain.chain_pem.clone().into_bytes(),
                )
                .await?;
        }

        info!(
            serial = %chain.serial,
            not_after = %chain.not_after,
            "issued client certificate"
        );
        Ok(chain)
    }

    fn sign(
        &self,
        request: SigningRequest,
        identity: &Identity,
        ca: &CaMaterial,
    ) -> Result<CertificateChain> {
        let mut csr = request.into_params();
        let common_name = identity.common_name();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, self.subject.country.as_str());
        dn.push(DnType::OrganizationName, self.subject.organization.as_str());
        dn.push(
            DnType::OrganizationalUnitName,
            self.subject.organizational_unit.as_str(),
        );
        dn.push(DnType::LocalityName, self.subject.locality.as_str());
        dn.push(DnType::StateOrProvinceName, self.subject.province.as_str());
        dn.push(DnType::CommonName, common_name);

        let params = &mut csr.params;
        params.distinguished_name = dn;
        // Caller-requested extensions and SANs are never copied over.
        params.subject_alt_names = Vec::new();
        params.custom_extensions = Vec::new();
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        params.use_authority_key_identifier_extension = true;

        let validity = time::Duration::try_from(self.settings.validity)
            .map_err(|e| ConnectorError::Config(format!("certificate validity: {e}")))?;
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now - CLOCK_SKEW;
        params.not_after = now.checked_add(validity).ok_or_else(|| {
            ConnectorError::Config(format!(
                "certificate validity of {}s is out of range",
                self.settings.validity.as_secs()
            ))
        })?;

        let serial = Uuid::new_v4().as_u128() as u64;
        params.serial_number = Some(serial.into());

        let not_after = DateTime::<Utc>::from_timestamp(params.not_after.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now);

        let certificate = csr
            .signed_by(ca.certificate(), ca.key_pair())
            .map_err(|e| ConnectorError::SigningFailure(e.to_string()))?;

        let client_pem = certificate.pem();
        let ca_pem = ca.certificate_pem().to_string();

        Ok(CertificateChain {
            chain_pem: format!("{client_pem}{ca_pem}"),
            client_pem,
            ca_pem,
            serial: format!("{serial:016x}"),
            subject: common_name.to_string(),
            not_after,
        })
    }

    /// Read CA material according to the cache policy.
    ///
    /// Store or parse failures surface as [`ConnectorError::SigningFailure`].
    async fn ca_material(&self) -> Result<Arc<CaMaterial>> {
        if self.settings.ca_cache == CaCachePolicy::Cached {
            if let Some(ca) = self.cached_ca.read().await.as_ref() {
                return Ok(Arc::clone(ca));
            }
        }

        let bundle = self
            .repository
            .get(&self.ca_secret, &self.namespace)
            .await
            .map_err(|e| {
                ConnectorError::SigningFailure(format!(
                    "CA secret {}/{} unavailable: {e}",
                    self.namespace, self.ca_secret
                ))
            })?;
        let ca = Arc::new(CaMaterial::from_pem_bundle(&bundle)?);
        debug!(ca = %ca.subject, "loaded CA material");

        if self.settings.ca_cache == CaCachePolicy::Cached {
            *self.cached_ca.write().await = Some(Arc::clone(&ca));
        }
        Ok(ca)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretRepository;
    use crate::testdata::{with_corrupted_signature, RSA_2048_ORDERS_CSR};
    use async_trait::async_trait;
    use connector_core::TenantScope;
    use rcgen::{CertificateParams, KeyPair};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use x509_parser::prelude::{FromDer, X509Certificate};

    const NS: &str = "connector";
    const CA_SECRET: &str = "connector-ca";

    fn csr_pem(common_name: &str) -> String {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["evil.example.com".to_string()]).unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        dn.push(DnType::OrganizationName, "Caller Supplied Org");
        params.distinguished_name = dn;
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    async fn seeded_repo() -> Arc<MemorySecretRepository> {
        let repo = Arc::new(MemorySecretRepository::new());
        let ca = CaMaterial::generate("Connector Test CA").unwrap();
        repo.put(CA_SECRET, NS, ca.to_pem_bundle()).await.unwrap();
        repo
    }

    fn service(repo: Arc<dyn SecretRepository>, settings: SigningSettings) -> CertificateService {
        CertificateService::new(repo, NS, CA_SECRET, SubjectTemplate::default(), settings)
    }

    fn identity(name: &str) -> Identity {
        Identity::application(name, TenantScope::new("acme", "prod"))
    }

    fn subject_values(client_pem: &str) -> Vec<String> {
        let der = pem::parse(client_pem).unwrap();
        let (_, cert) = X509Certificate::from_der(der.contents()).unwrap();
        cert.subject()
            .iter_attributes()
            .map(|attr| attr.as_str().unwrap().to_string())
            .collect()
    }

    fn common_name(client_pem: &str) -> String {
        let der = pem::parse(client_pem).unwrap();
        let (_, cert) = X509Certificate::from_der(der.contents()).unwrap();
        let cn = cert.subject().iter_common_name().next().unwrap();
        cn.as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_sign_matching_identity() {
        let repo = seeded_repo().await;
        let svc = service(repo.clone(), SigningSettings::default());
        let id = identity("orders");

        let chain = svc
            .validate_and_sign(csr_pem("orders").as_bytes(), &id)
            .await
            .unwrap();

        assert_eq!(common_name(&chain.client_pem), "orders");
        assert_eq!(chain.subject, "orders");
        assert!(chain.chain_pem.starts_with(&chain.client_pem));
        assert!(chain.chain_pem.ends_with(&chain.ca_pem));
        assert_eq!(
            repo.get(&id.secret_name(), NS).await.unwrap(),
            chain.chain_pem.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_subject_comes_from_template() {
        let repo = seeded_repo().await;
        let svc = service(repo, SigningSettings::default());

        let chain = svc
            .validate_and_sign(csr_pem("orders").as_bytes(), &identity("orders"))
            .await
            .unwrap();

        let values = subject_values(&chain.client_pem);
        assert!(values.contains(&"Organization".to_string()));
        assert!(values.contains(&"OrgUnit".to_string()));
        assert!(values.contains(&"DE".to_string()));
        assert!(!values.contains(&"Caller Supplied Org".to_string()));
    }

    #[tokio::test]
    async fn test_mismatched_identity_is_rejected_and_nothing_persisted() {
        let repo = seeded_repo().await;
        let svc = service(repo.clone(), SigningSettings::default());
        let id = identity("orders");

        let err = svc
            .validate_and_sign(csr_pem("billing").as_bytes(), &id)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::CsrInvalid(_)));
        assert!(!repo.contains(&id.secret_name(), NS).await);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_ca_is_signing_failure() {
        let repo = Arc::new(MemorySecretRepository::new());
        let svc = service(repo.clone(), SigningSettings::default());

        let err = svc
            .validate_and_sign(csr_pem("orders").as_bytes(), &identity("orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::SigningFailure(_)));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistence_can_be_disabled() {
        let repo = seeded_repo().await;
        let settings = SigningSettings {
            persist_issued: false,
            ..SigningSettings::default()
        };
        let svc = service(repo.clone(), settings);

        svc.validate_and_sign(csr_pem("orders").as_bytes(), &identity("orders"))
            .await
            .unwrap();
        assert_eq!(repo.len().await, 1);
    }

    /// Repository wrapper counting CA reads and refusing writes.
    struct CountingRepository {
        inner: MemorySecretRepository,
        reads: AtomicUsize,
        fail_puts: bool,
    }

    #[async_trait]
    impl SecretRepository for CountingRepository {
        async fn get(&self, name: &str, namespace: &str) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(name, namespace).await
        }

        async fn put(&self, name: &str, namespace: &str, data: Vec<u8>) -> Result<()> {
            if self.fail_puts {
                return Err(ConnectorError::RepositoryFailure("store offline".into()));
            }
            self.inner.put(name, namespace, data).await
        }

        async fn delete(&self, name: &str, namespace: &str) -> Result<()> {
            self.inner.delete(name, namespace).await
        }
    }

    async fn counting_repo(fail_puts: bool) -> Arc<CountingRepository> {
        let inner = MemorySecretRepository::new();
        let ca = CaMaterial::generate("Counting CA").unwrap();
        inner.put(CA_SECRET, NS, ca.to_pem_bundle()).await.unwrap();
        Arc::new(CountingRepository {
            inner,
            reads: AtomicUsize::new(0),
            fail_puts,
        })
    }

    #[tokio::test]
    async fn test_cached_policy_reads_ca_once() {
        let repo = counting_repo(false).await;
        let settings = SigningSettings {
            ca_cache: CaCachePolicy::Cached,
            ..SigningSettings::default()
        };
        let svc = service(repo.clone(), settings);

        for name in ["a", "b", "c"] {
            svc.validate_and_sign(csr_pem(name).as_bytes(), &identity(name))
                .await
                .unwrap();
        }
        assert_eq!(repo.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_per_request_policy_reads_every_time() {
        let repo = counting_repo(false).await;
        let svc = service(repo.clone(), SigningSettings::default());

        for name in ["a", "b"] {
            svc.validate_and_sign(csr_pem(name).as_bytes(), &identity(name))
                .await
                .unwrap();
        }
        assert_eq!(repo.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_spoofed_csr_never_reads_ca() {
        let repo = counting_repo(false).await;
        let svc = service(repo.clone(), SigningSettings::default());

        let _ = svc
            .validate_and_sign(csr_pem("someone-else").as_bytes(), &identity("orders"))
            .await;
        assert_eq!(repo.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_repository_failure() {
        let repo = counting_repo(true).await;
        let svc = service(repo, SigningSettings::default());

        let err = svc
            .validate_and_sign(csr_pem("orders").as_bytes(), &identity("orders"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::RepositoryFailure(_)));
    }

    #[tokio::test]
    async fn test_weak_rsa_key_is_rejected_and_nothing_persisted() {
        let repo = seeded_repo().await;
        let svc = service(repo.clone(), SigningSettings::default());

        let err = svc
            .validate_and_sign(RSA_2048_ORDERS_CSR.as_bytes(), &identity("orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::CsrInvalid(_)));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_rsa_key_at_minimum_is_signed() {
        let repo = seeded_repo().await;
        let settings = SigningSettings {
            min_rsa_key_bits: 2048,
            ..SigningSettings::default()
        };
        let svc = service(repo.clone(), settings);

        let chain = svc
            .validate_and_sign(RSA_2048_ORDERS_CSR.as_bytes(), &identity("orders"))
            .await
            .unwrap();
        assert_eq!(common_name(&chain.client_pem), "orders");
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_corrupted_signature_is_rejected_and_nothing_persisted() {
        let repo = counting_repo(false).await;
        let svc = service(repo.clone(), SigningSettings::default());
        let tampered = with_corrupted_signature(&csr_pem("orders"));

        let err = svc
            .validate_and_sign(tampered.as_bytes(), &identity("orders"))
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::CsrInvalid(_)));
        assert_eq!(repo.reads.load(Ordering::SeqCst), 0);
        assert_eq!(repo.inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_validity_is_config_error() {
        let repo = seeded_repo().await;
        let settings = SigningSettings {
            validity: Duration::from_secs(i64::MAX as u64),
            ..SigningSettings::default()
        };
        let svc = service(repo.clone(), settings);
        let id = identity("orders");

        let err = svc
            .validate_and_sign(csr_pem("orders").as_bytes(), &id)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectorError::Config(_)));
        assert!(!repo.contains(&id.secret_name(), NS).await);
    }
}
