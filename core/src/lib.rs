//! # TenantVault Core
//!
//! Core domain layer for the TenantVault storage layer.
//! This crate contains the hierarchical identifiers that scope every row,
//! the domain entities exchanged with the host, the storage error taxonomy,
//! and the repository traits that form the storage contract consumed by the host.

pub mod domain;
pub mod errors;
pub mod repositories;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
