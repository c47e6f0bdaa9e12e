//! Shared utilities and common types for the TenantVault storage layer
//!
//! This crate provides common functionality used across the storage crates:
//! - Configuration types (database connection, table naming)
//! - SQL helpers (placeholder lists)
//! - Time helpers (epoch milliseconds)

pub mod config;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{DatabaseConfig, StorageConfig, TableNames};
pub use utils::{sql, time};
