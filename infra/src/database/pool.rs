//! Connection pool lifecycle per storage scope
//!
//! A [`PoolManager`] is an explicit registry of pools keyed by scope id. It is
//! created once by the host process and shared behind an `Arc`; every
//! repository reaches its pool through it. For each scope it provides:
//! - idempotent initialization, retrying with a bounded deadline while the
//!   engine refuses connections
//! - cancellation of a pending retry through a [`ShutdownSignal`]
//! - best-effort, idempotent close

use sqlx::{pool::PoolConnection, MySql, MySqlPool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use tv_core::errors::StorageError;
use tv_shared::{DatabaseConfig, TableNames};

use super::connection::{self, ConnectFailure, PoolStatistics};
use super::executor::map_query_error;
use super::shutdown::ShutdownSignal;

/// Default ceiling on how long initialization keeps retrying
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60 * 60);

/// Default pause between initialization attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Whether initialization waits for an unreachable engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Retry refused connections until the deadline or shutdown
    Wait,
    /// Fail on the first error
    NoWait,
}

/// Timing of the initialization retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_wait: Duration,
    pub retry_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

/// A logical storage instance: its id, configuration and table names
#[derive(Debug, Clone)]
pub struct StorageScope {
    id: Arc<str>,
    config: Arc<DatabaseConfig>,
    tables: Arc<TableNames>,
}

impl StorageScope {
    pub fn new(id: impl Into<String>, config: DatabaseConfig) -> Self {
        let tables = TableNames::with_prefix(&config.table_names_prefix);
        Self {
            id: Arc::from(id.into()),
            config: Arc::new(config),
            tables: Arc::new(tables),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }
}

/// Registry entry: the pool of one scope, absent until a connect succeeds.
///
/// Once `closed` fires the slot never holds a pool again; a later initialize
/// registers a fresh slot.
struct ScopeSlot {
    scope: StorageScope,
    pool: tokio::sync::Mutex<Option<MySqlPool>>,
    closed: ShutdownSignal,
}

impl ScopeSlot {
    fn new(scope: StorageScope) -> Self {
        Self {
            scope,
            pool: tokio::sync::Mutex::new(None),
            closed: ShutdownSignal::new(),
        }
    }

    async fn current(&self) -> Option<MySqlPool> {
        self.pool.lock().await.clone()
    }

    /// Single attempt. The slot lock is held only for this attempt, and a pool
    /// built by a concurrent caller is reused.
    async fn connect(&self) -> Result<MySqlPool, ConnectFailure> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        if self.closed.is_triggered() {
            return Err(ConnectFailure::Closed);
        }

        let pool = connection::establish(self.scope.config()).await?;
        if self.closed.is_triggered() {
            pool.close().await;
            return Err(ConnectFailure::Closed);
        }
        info!(scope = %self.scope.id(), "MySQL connection pool created");
        *guard = Some(pool.clone());
        Ok(pool)
    }

    async fn close(&self) {
        self.closed.trigger();
        if let Some(pool) = self.pool.lock().await.take() {
            pool.close().await;
        }
    }
}

/// Registry of connection pools, one per storage scope
pub struct PoolManager {
    scopes: Mutex<HashMap<String, Arc<ScopeSlot>>>,
    retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
            retry,
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Handle that cancels pending initialization retries when triggered
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    fn slot(&self, scope_id: &str) -> Option<Arc<ScopeSlot>> {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope_id)
            .cloned()
    }

    fn register(&self, scope: &StorageScope) -> Arc<ScopeSlot> {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(scope.id().to_string())
            .or_insert_with(|| Arc::new(ScopeSlot::new(scope.clone())))
            .clone()
    }

    /// Make the scope's pool available.
    ///
    /// Idempotent: once a pool exists this returns at once. With
    /// [`WaitPolicy::Wait`] a refused connection is retried every
    /// `retry_interval` until `max_wait` has elapsed, shutdown is signalled or
    /// the scope is closed; any other error fails immediately. The deadline is
    /// checked only after a refusal, so a full interval always passes before
    /// giving up. On failure the scope stays registered without a pool, and
    /// later use makes one inline attempt.
    pub async fn initialize(
        &self,
        scope: &StorageScope,
        wait: WaitPolicy,
    ) -> Result<(), StorageError> {
        let slot = self.register(scope);
        let deadline = Instant::now() + self.retry.max_wait;
        let mut warned = false;

        loop {
            let failure = match slot.connect().await {
                Ok(_) => return Ok(()),
                Err(failure) => failure,
            };

            if wait == WaitPolicy::NoWait || !failure.is_retryable() {
                warn!(scope = %scope.id(), error = %failure, "MySQL connection failed");
                return Err(failure.into_storage_error());
            }
            if self.shutdown.is_triggered() {
                return Err(StorageError::initialization(
                    "Shutdown requested while waiting for MySQL",
                ));
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(scope = %scope.id(), error = %failure, "Gave up waiting for MySQL");
                return Err(failure.into_storage_error());
            }

            if !warned {
                warn!(
                    scope = %scope.id(),
                    error = %failure,
                    "MySQL refused the connection, retrying until it is reachable"
                );
                warned = true;
            }
            let remaining = deadline - now;
            info!(
                scope = %scope.id(),
                "Waiting for MySQL to start. Will retry for {:.1} more minutes",
                remaining.as_secs_f64() / 60.0
            );

            tokio::select! {
                _ = tokio::time::sleep(self.retry.retry_interval) => {}
                _ = self.shutdown.triggered() => {
                    return Err(StorageError::initialization(
                        "Shutdown requested while waiting for MySQL",
                    ));
                }
                _ = slot.closed.triggered() => {
                    return Err(StorageError::initialization(format!(
                        "Storage scope '{}' closed while waiting for MySQL",
                        scope.id()
                    )));
                }
            }
        }
    }

    /// Whether the scope currently has a pool
    pub async fn is_initialized(&self, scope_id: &str) -> bool {
        match self.slot(scope_id) {
            Some(slot) => slot.current().await.is_some(),
            None => false,
        }
    }

    /// The scope's pool, making one inline connect attempt if it has none.
    ///
    /// Fails with [`StorageError::IllegalUsage`] when the scope was never
    /// initialized or has been closed.
    pub async fn pool(&self, scope: &StorageScope) -> Result<MySqlPool, StorageError> {
        let slot = self.slot(scope.id()).ok_or_else(|| {
            StorageError::illegal_usage(format!(
                "Storage scope '{}' used before initialize",
                scope.id()
            ))
        })?;

        if let Some(pool) = slot.current().await {
            return Ok(pool);
        }

        debug!(scope = %scope.id(), "Scope has no pool, attempting to connect");
        slot.connect()
            .await
            .map_err(ConnectFailure::into_storage_error)
    }

    /// Check out a pooled connection for the scope.
    pub async fn acquire_connection(
        &self,
        scope: &StorageScope,
    ) -> Result<PoolConnection<MySql>, StorageError> {
        let pool = self.pool(scope).await?;
        pool.acquire().await.map_err(map_query_error)
    }

    /// Run a health check against the scope's pool.
    pub async fn health_check(&self, scope: &StorageScope) -> Result<bool, StorageError> {
        let pool = self.pool(scope).await?;
        connection::health_check(&pool).await
    }

    pub async fn statistics(&self, scope_id: &str) -> Option<PoolStatistics> {
        let slot = self.slot(scope_id)?;
        let pool = slot.current().await?;
        Some(PoolStatistics::of(&pool))
    }

    /// Release the scope's pool and forget the scope. Idempotent.
    pub async fn close(&self, scope_id: &str) {
        let removed = self
            .scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(scope_id);

        if let Some(slot) = removed {
            info!(scope = %scope_id, "Closing MySQL connection pool");
            slot.close().await;
        }
    }

    /// Signal shutdown and close every scope.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();

        let ids: Vec<String> = self
            .scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for id in ids {
            self.close(&id).await;
        }
    }
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}
