//! connector-srv: registration authority surfaces.
//!
//! A trusted caller asks for a one-time token bound to an application or
//! runtime identity. The holder of that token later redeems it on the public
//! surface and gets a client certificate signed for exactly that identity.
//!
//! # Architecture
//!
//! - [`tokens`] - CSPRNG token generation and the shared, exactly-once cache
//! - [`context`] - tenant scope and identity from request headers
//! - [`pipeline`] - typed stages: resolve, redeem, sign
//! - [`api`] - trusted and public surfaces with generic error bodies
//! - [`config`] - TOML configuration, one record per audience
//!
//! Signing itself lives in `connector-ca`.

pub mod api;
pub mod config;
pub mod context;
pub mod pipeline;
mod registrar;
pub mod tokens;

// Re-exports for convenience.
pub use config::ConnectorConfig;
pub use context::{ContextResolver, RequestHeaders};
pub use pipeline::{FlowState, IssuancePipeline};
pub use registrar::Registrar;
