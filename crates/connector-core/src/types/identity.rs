use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant used when the deployment has a single implicit scope
pub const DEFAULT_TENANT: &str = "default";

/// Group used when the deployment has a single implicit scope
pub const DEFAULT_GROUP: &str = "default";

/// Name characters kept verbatim in a secret name
const SECRET_NAME_READABLE_CHARS: usize = 40;

/// Digest bytes appended to a secret name (hex encoded)
const SECRET_NAME_DIGEST_BYTES: usize = 16;

/// Class of caller a token is issued to.
///
/// Both audiences share one issuance flow and differ only in TTL and URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// An application connecting to the control plane
    Application,
    /// A cluster runtime connecting to the control plane
    Runtime,
}

impl Audience {
    /// All audiences, in configuration order
    pub const ALL: [Self; 2] = [Self::Application, Self::Runtime];

    /// Lowercase name used in URLs, logs and secret names
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Runtime => "runtime",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant and group the caller is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    /// Tenant identifier
    pub tenant: String,

    /// Group within the tenant
    pub group: String,
}

impl TenantScope {
    /// Create a scope from explicit tenant and group values
    pub fn new(tenant: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            group: group.into(),
        }
    }

    /// The single scope of a solo deployment
    #[must_use]
    pub fn default_scope() -> Self {
        Self::new(DEFAULT_TENANT, DEFAULT_GROUP)
    }

    /// Returns true if this is the implicit solo scope
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.tenant == DEFAULT_TENANT && self.group == DEFAULT_GROUP
    }
}

impl Default for TenantScope {
    fn default() -> Self {
        Self::default_scope()
    }
}

/// Principal a token is bound to at issuance time.
///
/// Built fresh for every trusted request and then carried only inside a
/// token record; it is never re-derived when the token is redeemed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    /// Application principal
    Application {
        /// Application name, used as certificate common name
        name: String,
        /// Owning tenant scope
        scope: TenantScope,
    },
    /// Cluster runtime principal
    Runtime {
        /// Cluster identifier, used as certificate common name
        cluster_id: String,
        /// Owning tenant scope
        scope: TenantScope,
    },
}

impl Identity {
    /// Create an application identity
    pub fn application(name: impl Into<String>, scope: TenantScope) -> Self {
        Self::Application {
            name: name.into(),
            scope,
        }
    }

    /// Create a runtime identity
    pub fn runtime(cluster_id: impl Into<String>, scope: TenantScope) -> Self {
        Self::Runtime {
            cluster_id: cluster_id.into(),
            scope,
        }
    }

    /// Audience this identity belongs to
    #[must_use]
    pub const fn audience(&self) -> Audience {
        match self {
            Self::Application { .. } => Audience::Application,
            Self::Runtime { .. } => Audience::Runtime,
        }
    }

    /// Canonical name; the only value ever written to a certificate's CN
    #[must_use]
    pub fn common_name(&self) -> &str {
        match self {
            Self::Application { name, .. } => name,
            Self::Runtime { cluster_id, .. } => cluster_id,
        }
    }

    /// Tenant scope the identity was bound under
    #[must_use]
    pub const fn scope(&self) -> &TenantScope {
        match self {
            Self::Application { scope, .. } | Self::Runtime { scope, .. } => scope,
        }
    }

    /// Secret store key for certificates issued to this identity.
    ///
    /// `<audience>-<readable name>-<digest>`, where the digest covers the
    /// length-prefixed audience, tenant, group and name. Distinct identities
    /// never share a key, whatever characters their segments contain.
    #[must_use]
    pub fn secret_name(&self) -> String {
        let scope = self.scope();
        let mut context = Context::new(&SHA256);
        for segment in [
            self.audience().as_str(),
            scope.tenant.as_str(),
            scope.group.as_str(),
            self.common_name(),
        ] {
            let len = u64::try_from(segment.len()).unwrap_or(u64::MAX);
            context.update(&len.to_be_bytes());
            context.update(segment.as_bytes());
        }
        let digest = context.finish();

        let readable: String = self
            .common_name()
            .chars()
            .take(SECRET_NAME_READABLE_CHARS)
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();

        format!(
            "{}-{}-{}",
            self.audience(),
            readable,
            hex::encode(&digest.as_ref()[..SECRET_NAME_DIGEST_BYTES])
        )
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.scope();
        write!(
            f,
            "{}:{}/{}/{}",
            self.audience(),
            scope.tenant,
            scope.group,
            self.common_name()
        )
    }
}
