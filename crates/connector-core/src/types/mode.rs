use serde::{Deserialize, Serialize};

use super::Audience;

/// Deployment mode, fixed for the lifetime of the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Single-tenant: one implicit scope, tenant headers ignored
    #[default]
    Solo,
    /// Multi-tenant: tenant scope must come from request headers
    Central,
}

impl DeploymentMode {
    /// Returns true if tenant-scoping headers are mandatory
    #[must_use]
    pub const fn requires_tenant_headers(&self) -> bool {
        matches!(self, Self::Central)
    }

    /// Returns true if `audience` is served in this mode.
    ///
    /// Runtimes only register with a central deployment.
    #[must_use]
    pub const fn serves(&self, audience: Audience) -> bool {
        match audience {
            Audience::Application => true,
            Audience::Runtime => matches!(self, Self::Central),
        }
    }
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solo => write!(f, "solo"),
            Self::Central => write!(f, "central"),
        }
    }
}
