//! Active token store.
//!
//! One mutex guards the map; `take` checks presence and expiry and removes
//! the entry inside a single critical section, so concurrent redemptions of
//! the same token cannot both succeed. Expired entries are dropped lazily
//! when a redemption finds them.

use chrono::{DateTime, Utc};
use connector_core::{Audience, ConnectorError, Identity, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Identity and lifetime bound to one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Identity the token was issued for
    pub identity: Identity,
    /// Wall-clock issuance time
    pub issued_at: DateTime<Utc>,
    /// Monotonic expiry
    pub expires_at: Instant,
}

impl TokenRecord {
    /// Audience of the bound identity
    pub const fn audience(&self) -> Audience {
        self.identity.audience()
    }

    /// Returns true once `now` has reached the expiry
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Concurrency-safe token store.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, TokenRecord>>,
}

impl TokenCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new token. An existing key is a [`ConnectorError::TokenCollision`].
    pub fn put(&self, token: &str, record: TokenRecord) -> Result<()> {
        let mut entries = self.lock();
        if entries.contains_key(token) {
            return Err(ConnectorError::TokenCollision);
        }
        entries.insert(token.to_string(), record);
        Ok(())
    }

    /// Atomically redeem `token`.
    ///
    /// Returns the record only if it was present and unexpired. Absent and
    /// expired tokens look the same to the caller.
    pub fn take(&self, token: &str) -> Option<TokenRecord> {
        self.take_checked(token).ok()
    }

    /// Like [`TokenCache::take`], but reports why nothing was returned.
    ///
    /// Both errors share one external outcome; the distinction is only for
    /// operator diagnostics.
    pub fn take_checked(&self, token: &str) -> Result<TokenRecord> {
        let record = self
            .lock()
            .remove(token)
            .ok_or(ConnectorError::TokenNotFound)?;
        if record.is_expired_at(Instant::now()) {
            return Err(ConnectorError::TokenExpired);
        }
        Ok(record)
    }

    /// Drop every expired entry. Returns how many were removed.
    ///
    /// Never needed for correctness; `take` enforces expiry on its own.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired_at(now));
        before - entries.len()
    }

    /// Number of stored tokens, expired ones included until purged or taken
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no tokens are stored
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
