//! Connection establishment for a storage scope
//!
//! Translates a [`DatabaseConfig`] into sqlx connect and pool options, probes
//! the server once so that an unreachable engine can be told apart from a
//! misconfiguration, and exposes pool statistics and health checks.

use log::LevelFilter;
use sqlx::{
    mysql::{MySqlConnectOptions, MySqlPoolOptions},
    ConnectOptions, Connection, MySqlPool, Row,
};
use std::io;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use tv_core::errors::StorageError;
use tv_shared::DatabaseConfig;

use super::executor::map_query_error;

/// Message reported when the engine stays unreachable
pub(crate) const UNREACHABLE_MESSAGE: &str = "Error connecting to MySQL instance. Please make sure \
     that MySQL is running and that you have specified the correct values for ('mysql_host' and \
     'mysql_port') or for 'mysql_connection_uri'";

/// Outcome of a failed connection attempt
#[derive(Debug, Error)]
pub(crate) enum ConnectFailure {
    /// The server actively refused the connection; it may come up later
    #[error("{}: {}", UNREACHABLE_MESSAGE, .0)]
    Retryable(#[source] sqlx::Error),

    /// Anything else: bad credentials, unknown database, invalid URI
    #[error("{0}")]
    Fatal(#[source] sqlx::Error),

    /// The scope was closed while the attempt was in flight
    #[error("Storage scope was closed")]
    Closed,
}

impl ConnectFailure {
    /// Classify from the structured driver error rather than its message.
    pub(crate) fn classify(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Io(io_error) if io_error.kind() == io::ErrorKind::ConnectionRefused => {
                Self::Retryable(error)
            }
            _ => Self::Fatal(error),
        }
    }

    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub(crate) fn into_storage_error(self) -> StorageError {
        StorageError::initialization(self.to_string())
    }
}

/// Build the connect options for a configuration.
///
/// Precedence: an explicit `connection_uri`, then the managed socket, then the
/// URL derived from host, port, database and attributes.
pub fn connect_options(config: &DatabaseConfig) -> Result<MySqlConnectOptions, sqlx::Error> {
    let options = if let Some(uri) = config.connection_uri.as_deref() {
        MySqlConnectOptions::from_str(uri)?
    } else {
        let base = if config.managed_socket {
            let socket = config.managed_socket_path().ok_or_else(|| {
                sqlx::Error::Configuration(
                    "managed socket connections require 'instance_connection_name' or \
                     'instance_unix_socket'"
                        .into(),
                )
            })?;
            MySqlConnectOptions::new()
                .socket(socket)
                .database(&config.database_name)
        } else {
            MySqlConnectOptions::from_str(&config.host_url())?
        };

        let base = base.username(&config.user);
        match config.effective_password() {
            Some(password) => base.password(password),
            None => base,
        }
    };

    let options = options.statement_cache_capacity(config.statement_cache_capacity);

    Ok(if config.enable_logging {
        options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(
                LevelFilter::Warn,
                Duration::from_millis(config.slow_query_threshold),
            )
    } else {
        options.disable_statement_logging()
    })
}

/// Pool sizing and connection lifecycle for a configuration
pub fn pool_options(config: &DatabaseConfig) -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(config.connection_pool_size.max(1))
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .max_lifetime(Duration::from_secs(config.max_lifetime))
        .test_before_acquire(true)
}

/// Make one connection attempt and, on success, build the pool.
///
/// The pool itself retries refused connections until its acquire timeout and
/// then reports a generic timeout, so reachability is decided by a single
/// probe connection before the pool is handed out.
pub(crate) async fn establish(config: &DatabaseConfig) -> Result<MySqlPool, ConnectFailure> {
    let options = connect_options(config).map_err(ConnectFailure::Fatal)?;
    let timeout = Duration::from_secs(config.connect_timeout);

    let probe = match tokio::time::timeout(timeout, options.connect()).await {
        Ok(result) => result.map_err(ConnectFailure::classify)?,
        Err(_) => {
            return Err(ConnectFailure::Fatal(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {}s connecting to MySQL", config.connect_timeout),
            ))))
        }
    };

    if let Err(e) = probe.close().await {
        tracing::debug!(error = %e, "Failed to close probe connection");
    }

    Ok(pool_options(config).connect_lazy_with(options))
}

/// Run `SELECT 1` against the pool.
pub async fn health_check(pool: &MySqlPool) -> Result<bool, StorageError> {
    tracing::debug!("Performing database health check");

    let row = sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            map_query_error(e)
        })?;

    let value: i32 = row.try_get(0).unwrap_or(0);
    if value == 1 {
        Ok(true)
    } else {
        tracing::warn!(value, "Database health check returned unexpected value");
        Ok(false)
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Total number of open connections
    pub connections: u32,
    /// Number of idle connections
    pub idle_connections: usize,
    /// Configured upper bound
    pub max_connections: u32,
}

impl PoolStatistics {
    pub fn of(pool: &MySqlPool) -> Self {
        Self {
            connections: pool.size(),
            idle_connections: pool.num_idle(),
            max_connections: pool.options().get_max_connections(),
        }
    }

    /// Connections currently checked out
    pub fn in_use(&self) -> u32 {
        self.connections
            .saturating_sub(u32::try_from(self.idle_connections).unwrap_or(u32::MAX))
    }
}

impl std::fmt::Display for PoolStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool: {}/{} connections ({} idle)",
            self.connections, self.max_connections, self.idle_connections
        )
    }
}
