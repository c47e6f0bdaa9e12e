//! Database module - MySQL implementations using SQLx
//!
//! This module provides the database access layer:
//! - Connection pool lifecycle per storage scope
//! - Query harness and explicit transactions
//! - Schema bootstrap
//! - Repository implementations

pub mod connection;
pub mod executor;
pub mod mysql;
pub mod pool;
pub mod schema;
pub mod shutdown;
pub mod transaction;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use connection::PoolStatistics;
pub use executor::{execute_on, update_on, MySqlQuery, QueryExecutor};
pub use mysql::{
    MySqlActiveUsersRepository, MySqlEmailVerificationRepository, MySqlMultitenancyRepository,
    MySqlTotpRepository, MySqlUserRolesRepository,
};
pub use pool::{PoolManager, RetryPolicy, StorageScope, WaitPolicy};
pub use shutdown::ShutdownSignal;
pub use transaction::TransactionConnection;
