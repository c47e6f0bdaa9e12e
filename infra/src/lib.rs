//! # Infrastructure Layer
//!
//! MySQL storage for the TenantVault identity platform. It implements the
//! repository traits of `tv_core` on top of SQLx.
//!
//! ## Architecture
//!
//! - **Pool lifecycle**: [`PoolManager`] keeps one connection pool per storage
//!   scope, brings it online with bounded retries and shuts it down
//! - **Query harness**: [`QueryExecutor`] runs prepared statements with binder
//!   and mapper closures, on pooled connections or inside explicit
//!   transactions
//! - **Schema**: idempotent creation of every table with named foreign keys
//!   that cascade app and tenant deletion
//! - **Repositories**: multitenancy, email verification, TOTP, user roles and
//!   active users
//!
//! ## Features
//!
//! - `mysql`: Enable MySQL database support (default)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tv_infra::{MySqlStorage, PoolManager, WaitPolicy};
//! use tv_shared::DatabaseConfig;
//!
//! async fn bootstrap() -> Result<(), tv_core::StorageError> {
//!     let manager = Arc::new(PoolManager::new());
//!     let config = DatabaseConfig::from_env();
//!     let storage = MySqlStorage::with_config(manager.clone(), "main", config);
//!     storage.init(WaitPolicy::Wait).await?;
//!     // ...
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

// Re-export core types for convenience
pub use tv_core::errors::*;

/// Database module - MySQL implementations using SQLx
#[cfg(feature = "mysql")]
pub mod database;

/// Storage façade bundling one scope's repositories
#[cfg(feature = "mysql")]
pub mod storage;

#[cfg(feature = "mysql")]
pub use database::{
    PoolManager, QueryExecutor, RetryPolicy, ShutdownSignal, StorageScope, TransactionConnection,
    WaitPolicy,
};
#[cfg(feature = "mysql")]
pub use storage::MySqlStorage;
