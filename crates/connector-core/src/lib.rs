//! Core types for the connector registration authority.
//!
//! This crate provides the foundational types shared by the signing and
//! serving crates:
//!
//! - **Types**: caller [`Identity`], [`Audience`], [`DeploymentMode`] and the
//!   certificate [`SubjectTemplate`]
//! - **Errors**: the full failure taxonomy in [`ConnectorError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use connector_core::{Identity, TenantScope};
//!
//! let identity = Identity::application("orders", TenantScope::default_scope());
//! assert_eq!(identity.common_name(), "orders");
//! ```

mod error;
pub mod types;

pub use error::{ConnectorError, Result};
pub use types::*;
