//! MySQL implementation of the ActiveUsersRepository trait.

use async_trait::async_trait;

use tv_core::domain::value_objects::AppIdentifier;
use tv_core::errors::{QueryErrorKind, StorageError};
use tv_core::repositories::ActiveUsersRepository;
use tv_shared::time::current_time_millis;

use crate::database::executor::{column, count_column, update_on, QueryExecutor};
use crate::database::transaction::TransactionConnection;

/// MySQL implementation of ActiveUsersRepository
#[derive(Clone)]
pub struct MySqlActiveUsersRepository {
    executor: QueryExecutor,
}

impl MySqlActiveUsersRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    async fn count(
        &self,
        sql: &str,
        app: &AppIdentifier,
        since_ms: Option<i64>,
    ) -> Result<u64, StorageError> {
        self.executor
            .execute(
                sql,
                |q| {
                    let q = q.bind(app.app_id());
                    match since_ms {
                        Some(since) => q.bind(since),
                        None => q,
                    }
                },
                |rows| match rows.first() {
                    Some(row) => count_column(row, "total"),
                    None => Ok(0),
                },
            )
            .await
    }

    pub async fn delete_user_active_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().user_last_active
        );

        let deleted =
            update_on(tx.connection()?, &sql, |q| q.bind(app.app_id()).bind(user_id)).await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl ActiveUsersRepository for MySqlActiveUsersRepository {
    async fn update_last_active(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (app_id, user_id, last_active_time) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE last_active_time = ?",
            self.executor.tables().user_last_active
        );
        let now = current_time_millis();

        self.executor
            .update(&sql, |q| q.bind(app.app_id()).bind(user_id).bind(now).bind(now))
            .await
            .map_err(|e| {
                if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })?;
        Ok(())
    }

    async fn count_users_active_since(
        &self,
        app: &AppIdentifier,
        since_ms: i64,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE app_id = ? AND last_active_time >= ?",
            self.executor.tables().user_last_active
        );

        self.count(&sql, app, Some(since_ms)).await
    }

    async fn count_users_enabled_totp(&self, app: &AppIdentifier) -> Result<u64, StorageError> {
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} WHERE app_id = ?",
            self.executor.tables().totp_users
        );

        self.count(&sql, app, None).await
    }

    async fn count_users_enabled_totp_and_active_since(
        &self,
        app: &AppIdentifier,
        since_ms: i64,
    ) -> Result<u64, StorageError> {
        let tables = self.executor.tables();
        let sql = format!(
            "SELECT COUNT(*) AS total FROM {} AS totp_users \
             INNER JOIN {} AS user_last_active \
             ON totp_users.app_id = user_last_active.app_id \
             AND totp_users.user_id = user_last_active.user_id \
             WHERE totp_users.app_id = ? AND user_last_active.last_active_time >= ?",
            tables.totp_users, tables.user_last_active
        );

        self.count(&sql, app, Some(since_ms)).await
    }

    async fn get_last_active_by_user_id(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Option<i64>, StorageError> {
        let sql = format!(
            "SELECT last_active_time FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().user_last_active
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id),
                |rows| {
                    let Some(row) = rows.first() else {
                        return Ok(None);
                    };
                    let value: Option<u64> = column(row, "last_active_time")?;
                    value
                        .map(|millis| {
                            i64::try_from(millis).map_err(|_| {
                                StorageError::query(
                                    QueryErrorKind::Other,
                                    format!("Value of last_active_time out of range: {}", millis),
                                )
                            })
                        })
                        .transpose()
                },
            )
            .await
    }
}
