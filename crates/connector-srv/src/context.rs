//! Caller context extraction at the trust boundary.
//!
//! Solo deployments have one implicit scope, so tenant headers are ignored,
//! and serve applications only. Central deployments must name the tenant and
//! group on every request; a missing header is rejected before any token is
//! touched.

use connector_core::{Audience, ConnectorError, DeploymentMode, Identity, Result, TenantScope};
use std::collections::BTreeMap;

/// Tenant header (central mode).
pub const TENANT_HEADER: &str = "Tenant";

/// Group header (central mode).
pub const GROUP_HEADER: &str = "Group";

/// Application name header on the trusted surface.
pub const APPLICATION_HEADER: &str = "Application";

/// Runtime identifier header on the trusted surface.
pub const RUNTIME_HEADER: &str = "Runtime-Id";

/// Request headers with case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    values: BTreeMap<String, String>,
}

impl RequestHeaders {
    /// Empty header set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a header
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Header value, trimmed; blank values count as absent
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| ConnectorError::context_missing(name))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

/// Header carrying the identity name for `audience`.
pub const fn name_header(audience: Audience) -> &'static str {
    match audience {
        Audience::Application => APPLICATION_HEADER,
        Audience::Runtime => RUNTIME_HEADER,
    }
}

/// Derives caller scope and identity from request headers.
#[derive(Debug, Clone, Copy)]
pub struct ContextResolver {
    mode: DeploymentMode,
}

impl ContextResolver {
    /// Create a resolver for the deployment mode.
    pub const fn new(mode: DeploymentMode) -> Self {
        Self { mode }
    }

    /// Deployment mode in force.
    pub const fn mode(&self) -> DeploymentMode {
        self.mode
    }

    /// Reject audiences the deployment mode has no surface for.
    pub fn check_audience(&self, audience: Audience) -> Result<()> {
        if self.mode.serves(audience) {
            Ok(())
        } else {
            Err(ConnectorError::audience_disabled(audience, self.mode))
        }
    }

    /// Tenant scope of the request.
    pub fn resolve_scope(&self, headers: &RequestHeaders) -> Result<TenantScope> {
        match self.mode {
            DeploymentMode::Solo => Ok(TenantScope::default_scope()),
            DeploymentMode::Central => {
                let tenant = headers.require(TENANT_HEADER)?;
                let group = headers.require(GROUP_HEADER)?;
                Ok(TenantScope::new(tenant, group))
            }
        }
    }

    /// Full identity for a trusted issuance request.
    ///
    /// The audience is checked first, then scope, so in central mode a
    /// missing tenant header is reported even when the name header is
    /// missing too.
    pub fn resolve(&self, headers: &RequestHeaders, audience: Audience) -> Result<Identity> {
        self.check_audience(audience)?;
        let scope = self.resolve_scope(headers)?;
        let name = headers.require(name_header(audience))?;
        Ok(match audience {
            Audience::Application => Identity::application(name, scope),
            Audience::Runtime => Identity::runtime(name, scope),
        })
    }
}
