//! Token issuance and redemption.

use chrono::{DateTime, Utc};
use connector_core::{Audience, ConnectorError, Identity, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::cache::{TokenCache, TokenRecord};
use super::generator::TokenGenerator;

/// Token time-to-live per audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtls {
    /// TTL for application tokens
    pub application: Duration,
    /// TTL for runtime tokens
    pub runtime: Duration,
}

impl TokenTtls {
    /// TTL for `audience`
    pub const fn for_audience(&self, audience: Audience) -> Duration {
        match audience {
            Audience::Application => self.application,
            Audience::Runtime => self.runtime,
        }
    }
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            application: Duration::from_secs(5 * 60),
            runtime: Duration::from_secs(10 * 60),
        }
    }
}

/// A token handed back to the trusted caller.
#[derive(Clone)]
pub struct IssuedToken {
    /// The one-time token value
    pub token: String,
    /// Identity bound to the token
    pub identity: Identity,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Lifetime granted
    pub ttl: Duration,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("issued_at", &self.issued_at)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Issues tokens and redeems them exactly once.
#[derive(Debug)]
pub struct TokenManager {
    cache: Arc<TokenCache>,
    generator: TokenGenerator,
    ttls: TokenTtls,
}

impl TokenManager {
    /// Create a manager over a shared cache.
    pub fn new(cache: Arc<TokenCache>, generator: TokenGenerator, ttls: TokenTtls) -> Self {
        Self {
            cache,
            generator,
            ttls,
        }
    }

    /// Shared token cache.
    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// Configured TTLs.
    pub const fn ttls(&self) -> TokenTtls {
        self.ttls
    }

    /// Issue a token for `identity` that expires after `ttl`.
    ///
    /// A `ttl` the monotonic clock cannot represent is a
    /// [`ConnectorError::Config`].
    pub fn issue(&self, identity: Identity, ttl: Duration) -> Result<IssuedToken> {
        let expires_at = Instant::now().checked_add(ttl).ok_or_else(|| {
            ConnectorError::Config(format!("token ttl of {}s is out of range", ttl.as_secs()))
        })?;
        let token = self.generator.new_token()?;
        let issued_at = Utc::now();

        let record = TokenRecord {
            identity: identity.clone(),
            issued_at,
            expires_at,
        };
        self.cache.put(&token, record)?;

        debug!(identity = %identity, ttl_secs = ttl.as_secs(), "issued token");
        Ok(IssuedToken {
            token,
            identity,
            issued_at,
            ttl,
        })
    }

    /// Issue a token using the TTL configured for the identity's audience.
    pub fn issue_for_audience(&self, identity: Identity) -> Result<IssuedToken> {
        let ttl = self.ttls.for_audience(identity.audience());
        self.issue(identity, ttl)
    }

    /// Consume `token` and return the identity it was issued for.
    ///
    /// Unknown, already redeemed and expired tokens all fail with
    /// [`ConnectorError::TokenNotFound`]; the token is gone afterwards either
    /// way. Expiry is only visible in the debug log.
    pub fn redeem(&self, token: &str) -> Result<Identity> {
        match self.cache.take_checked(token) {
            Ok(record) => {
                debug!(identity = %record.identity, "redeemed token");
                Ok(record.identity)
            }
            Err(ConnectorError::TokenExpired) => {
                debug!("rejected expired token");
                Err(ConnectorError::TokenNotFound)
            }
            Err(err) => Err(err),
        }
    }
}
