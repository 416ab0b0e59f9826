//! One-time token lifecycle.
//!
//! - **Generator**: unpredictable token strings from the system CSPRNG.
//! - **Cache**: active tokens with atomic take-on-redeem and lazy expiry.
//! - **Manager**: issuance with per-audience TTLs, exactly-once redemption.

pub mod cache;
pub mod generator;
pub mod manager;

pub use cache::{TokenCache, TokenRecord};
pub use generator::{TokenGenerator, DEFAULT_ALPHABET, DEFAULT_TOKEN_LENGTH};
pub use manager::{IssuedToken, TokenManager, TokenTtls};
