//! Query harness
//!
//! Every statement runs as a prepared statement with positional `?`
//! parameters. A *binder* attaches the parameters and a *mapper* turns the
//! fetched rows into a value. Statements either borrow a caller-supplied
//! connection ([`execute_on`], [`update_on`]) or check one out of the scope's
//! pool for the duration of the call ([`QueryExecutor`]).

use sqlx::{
    error::ErrorKind,
    mysql::{MySqlArguments, MySqlConnection, MySqlRow},
    query::Query,
    Decode, MySql, Row, Type,
};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use tv_core::errors::{QueryErrorKind, StorageError};
use tv_shared::TableNames;

use super::pool::{PoolManager, StorageScope};
use super::transaction::TransactionConnection;

/// A prepared MySQL statement awaiting its parameters
pub type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Translate a driver error into a storage query error.
///
/// Constraint violations are recognised from the structured error kind, so
/// callers can turn them into domain outcomes without parsing messages.
pub fn map_query_error(error: sqlx::Error) -> StorageError {
    match &error {
        sqlx::Error::Database(db_error) => {
            let kind = match db_error.kind() {
                ErrorKind::UniqueViolation => QueryErrorKind::UniqueViolation,
                ErrorKind::ForeignKeyViolation => QueryErrorKind::ForeignKeyViolation,
                _ => QueryErrorKind::Other,
            };
            StorageError::query(kind, db_error.message())
        }
        _ => StorageError::query(QueryErrorKind::Other, error.to_string()),
    }
}

/// Read a column, reporting the column name on failure.
pub fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, StorageError>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get(name).map_err(|e| {
        StorageError::query(
            QueryErrorKind::Other,
            format!("Failed to get {}: {}", name, e),
        )
    })
}

/// Read a `BIGINT UNSIGNED` column holding epoch milliseconds.
pub fn millis_column(row: &MySqlRow, name: &str) -> Result<i64, StorageError> {
    let value: u64 = column(row, name)?;
    i64::try_from(value).map_err(|_| {
        StorageError::query(
            QueryErrorKind::Other,
            format!("Value of {} out of range: {}", name, value),
        )
    })
}

/// Read a `COUNT(*)` result.
pub fn count_column(row: &MySqlRow, name: &str) -> Result<u64, StorageError> {
    let value: i64 = column(row, name)?;
    Ok(u64::try_from(value).unwrap_or(0))
}

/// Run a row-returning statement on the given connection.
pub async fn execute_on<'q, T, B, M>(
    conn: &mut MySqlConnection,
    sql: &'q str,
    binder: B,
    mapper: M,
) -> Result<T, StorageError>
where
    B: FnOnce(MySqlQuery<'q>) -> MySqlQuery<'q>,
    M: FnOnce(Vec<MySqlRow>) -> Result<T, StorageError>,
{
    let rows = binder(sqlx::query(sql))
        .fetch_all(conn)
        .await
        .map_err(map_query_error)?;
    mapper(rows)
}

/// Run a mutating statement on the given connection and return the number of
/// affected rows.
pub async fn update_on<'q, B>(
    conn: &mut MySqlConnection,
    sql: &'q str,
    binder: B,
) -> Result<u64, StorageError>
where
    B: FnOnce(MySqlQuery<'q>) -> MySqlQuery<'q>,
{
    let result = binder(sqlx::query(sql))
        .execute(conn)
        .await
        .map_err(map_query_error)?;
    Ok(result.rows_affected())
}

/// Statement runner bound to one storage scope
#[derive(Clone)]
pub struct QueryExecutor {
    manager: Arc<PoolManager>,
    scope: StorageScope,
}

impl QueryExecutor {
    pub fn new(manager: Arc<PoolManager>, scope: StorageScope) -> Self {
        Self { manager, scope }
    }

    pub fn manager(&self) -> &Arc<PoolManager> {
        &self.manager
    }

    pub fn scope(&self) -> &StorageScope {
        &self.scope
    }

    pub fn tables(&self) -> &TableNames {
        self.scope.tables()
    }

    /// Run a row-returning statement on a freshly acquired connection, which
    /// is returned to the pool on every path.
    pub async fn execute<'q, T, B, M>(
        &self,
        sql: &'q str,
        binder: B,
        mapper: M,
    ) -> Result<T, StorageError>
    where
        B: FnOnce(MySqlQuery<'q>) -> MySqlQuery<'q>,
        M: FnOnce(Vec<MySqlRow>) -> Result<T, StorageError>,
    {
        let mut conn = self.manager.acquire_connection(&self.scope).await?;
        execute_on(&mut conn, sql, binder, mapper).await
    }

    /// Run a mutating statement on a freshly acquired connection.
    pub async fn update<'q, B>(&self, sql: &'q str, binder: B) -> Result<u64, StorageError>
    where
        B: FnOnce(MySqlQuery<'q>) -> MySqlQuery<'q>,
    {
        let mut conn = self.manager.acquire_connection(&self.scope).await?;
        update_on(&mut conn, sql, binder).await
    }

    /// Open a transaction on a dedicated connection.
    pub async fn begin(&self) -> Result<TransactionConnection, StorageError> {
        let pool = self.manager.pool(&self.scope).await?;
        let tx = pool.begin().await.map_err(map_query_error)?;
        Ok(TransactionConnection::new(tx))
    }

    /// Run `body` inside a transaction.
    ///
    /// The body must call [`TransactionConnection::commit`] for its writes to
    /// persist; a body that returns without committing, or fails, is rolled
    /// back. Query failures escaping the body are wrapped as
    /// [`StorageError::TransactionLogic`]; domain outcomes pass through.
    pub async fn start_transaction<T, F, Fut>(&self, body: F) -> Result<T, StorageError>
    where
        F: FnOnce(TransactionConnection) -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let tx = self.begin().await?;
        body(tx).await.map_err(|error| {
            debug!(scope = %self.scope.id(), error = %error, "Transaction rolled back");
            StorageError::transaction_logic(error)
        })
    }
}
