//! MySQL implementation of the TotpRepository trait.
//!
//! A TOTP user row owns the user's devices and used codes; the schema cascades
//! its removal to both. Device creation and deletion keep the user row in step
//! with the device set inside one transaction.

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;

use tv_core::domain::entities::{TotpDevice, TotpUsedCode};
use tv_core::domain::value_objects::{AppIdentifier, TenantIdentifier};
use tv_core::errors::{StorageError, TotpError};
use tv_core::repositories::TotpRepository;
use tv_shared::TableNames;

use crate::database::executor::{column, execute_on, millis_column, update_on, QueryExecutor};
use crate::database::transaction::TransactionConnection;

/// MySQL implementation of TotpRepository
#[derive(Clone)]
pub struct MySqlTotpRepository {
    executor: QueryExecutor,
}

impl MySqlTotpRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    fn row_to_device(row: &MySqlRow) -> Result<TotpDevice, StorageError> {
        Ok(TotpDevice {
            user_id: column(row, "user_id")?,
            device_name: column(row, "device_name")?,
            secret_key: column(row, "secret_key")?,
            period: column(row, "period")?,
            skew: column(row, "skew")?,
            verified: column(row, "verified")?,
        })
    }

    fn row_to_used_code(row: &MySqlRow) -> Result<TotpUsedCode, StorageError> {
        Ok(TotpUsedCode {
            user_id: column(row, "user_id")?,
            code: column(row, "code")?,
            is_valid: column(row, "is_valid")?,
            expiry_time_ms: millis_column(row, "expiry_time_ms")?,
            created_time_ms: millis_column(row, "created_time_ms")?,
        })
    }

    fn devices_sql(&self, for_update: bool) -> String {
        format!(
            "SELECT user_id, device_name, secret_key, period, skew, verified FROM {} \
             WHERE app_id = ? AND user_id = ?{}",
            self.executor.tables().totp_user_devices,
            if for_update { " FOR UPDATE" } else { "" }
        )
    }

    fn used_codes_sql(&self, for_update: bool) -> String {
        format!(
            "SELECT user_id, code, is_valid, expiry_time_ms, created_time_ms FROM {} \
             WHERE app_id = ? AND tenant_id = ? AND user_id = ? ORDER BY created_time_ms DESC{}",
            self.executor.tables().totp_used_codes,
            if for_update { " FOR UPDATE" } else { "" }
        )
    }

    async fn does_device_exist(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT device_name FROM {} WHERE app_id = ? AND user_id = ? AND device_name = ?",
            self.executor.tables().totp_user_devices
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id).bind(device_name),
                |rows| Ok(!rows.is_empty()),
            )
            .await
    }

    /// Create the TOTP user row unless it exists. Returns the rows inserted.
    pub async fn insert_user_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let users = &self.executor.tables().totp_users;
        let sql = format!(
            "INSERT INTO {users} (app_id, user_id) SELECT ?, ? FROM DUAL \
             WHERE NOT EXISTS (SELECT user_id FROM {users} WHERE app_id = ? AND user_id = ?)"
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id())
                .bind(user_id)
                .bind(app.app_id())
                .bind(user_id)
        })
        .await
    }

    pub async fn insert_device_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        device: &TotpDevice,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (app_id, user_id, device_name, secret_key, period, skew, verified) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.executor.tables().totp_user_devices
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id())
                .bind(device.user_id.as_str())
                .bind(device.device_name.as_str())
                .bind(device.secret_key.as_str())
                .bind(device.period)
                .bind(device.skew)
                .bind(device.verified)
        })
        .await?;
        Ok(())
    }

    /// Lock and return the user's devices.
    pub async fn get_devices_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpDevice>, StorageError> {
        let sql = self.devices_sql(true);

        execute_on(
            tx.connection()?,
            &sql,
            |q| q.bind(app.app_id()).bind(user_id),
            |rows| rows.iter().map(Self::row_to_device).collect(),
        )
        .await
    }

    pub async fn delete_device_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND user_id = ? AND device_name = ?",
            self.executor.tables().totp_user_devices
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id()).bind(user_id).bind(device_name)
        })
        .await
    }

    /// Remove the TOTP user row; devices and used codes go with it.
    pub async fn remove_user_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().totp_users
        );

        update_on(tx.connection()?, &sql, |q| q.bind(app.app_id()).bind(user_id)).await
    }

    /// Lock and return the user's used codes in the tenant, newest first.
    pub async fn get_all_used_codes_desc_order_transaction(
        &self,
        tx: &mut TransactionConnection,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpUsedCode>, StorageError> {
        let sql = self.used_codes_sql(true);

        execute_on(
            tx.connection()?,
            &sql,
            |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
            },
            |rows| rows.iter().map(Self::row_to_used_code).collect(),
        )
        .await
    }

    pub async fn insert_used_code_transaction(
        &self,
        tx: &mut TransactionConnection,
        tenant: &TenantIdentifier,
        code: &TotpUsedCode,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} \
             (app_id, tenant_id, user_id, code, is_valid, expiry_time_ms, created_time_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            self.executor.tables().totp_used_codes
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(tenant.app_id())
                .bind(tenant.tenant_id())
                .bind(code.user_id.as_str())
                .bind(code.code.as_str())
                .bind(code.is_valid)
                .bind(code.expiry_time_ms)
                .bind(code.created_time_ms)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TotpRepository for MySqlTotpRepository {
    async fn create_device(
        &self,
        app: &AppIdentifier,
        device: &TotpDevice,
    ) -> Result<(), StorageError> {
        self.executor
            .start_transaction(|mut tx| async move {
                self.insert_user_transaction(&mut tx, app, &device.user_id)
                    .await?;
                self.insert_device_transaction(&mut tx, app, device).await?;
                tx.commit().await
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    TotpError::DeviceAlreadyExists.into()
                } else if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })
    }

    async fn mark_device_as_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET verified = true WHERE app_id = ? AND user_id = ? AND device_name = ?",
            self.executor.tables().totp_user_devices
        );

        let updated = self
            .executor
            .update(&sql, |q| q.bind(app.app_id()).bind(user_id).bind(device_name))
            .await?;

        // Zero changed rows also covers a device that was already verified
        if updated == 0 && !self.does_device_exist(app, user_id, device_name).await? {
            return Err(TotpError::UnknownDevice.into());
        }
        Ok(())
    }

    async fn delete_device(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<(), StorageError> {
        self.executor
            .start_transaction(|mut tx| async move {
                let deleted = self
                    .delete_device_transaction(&mut tx, app, user_id, device_name)
                    .await?;
                if deleted == 0 {
                    return Err(TotpError::UnknownDevice.into());
                }

                let remaining = self.get_devices_transaction(&mut tx, app, user_id).await?;
                if remaining.is_empty() {
                    self.remove_user_transaction(&mut tx, app, user_id).await?;
                    tracing::debug!(app = %app, user_id, "Removed TOTP user with its last device");
                }
                tx.commit().await
            })
            .await
    }

    async fn update_device_name(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        old_device_name: &str,
        new_device_name: &str,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET device_name = ? WHERE app_id = ? AND user_id = ? AND device_name = ?",
            self.executor.tables().totp_user_devices
        );

        let updated = self
            .executor
            .update(&sql, |q| {
                q.bind(new_device_name)
                    .bind(app.app_id())
                    .bind(user_id)
                    .bind(old_device_name)
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    TotpError::DeviceAlreadyExists.into()
                } else {
                    e
                }
            })?;

        if updated == 0 && !self.does_device_exist(app, user_id, old_device_name).await? {
            return Err(TotpError::UnknownDevice.into());
        }
        Ok(())
    }

    async fn get_devices(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpDevice>, StorageError> {
        let sql = self.devices_sql(false);

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id),
                |rows| rows.iter().map(Self::row_to_device).collect(),
            )
            .await
    }

    async fn insert_used_code(
        &self,
        tenant: &TenantIdentifier,
        code: &TotpUsedCode,
    ) -> Result<(), StorageError> {
        let user_fk = TableNames::foreign_key(&self.executor.tables().totp_used_codes, "user_id");

        self.executor
            .start_transaction(|mut tx| async move {
                // Serializes concurrent inserts for the same user
                self.get_all_used_codes_desc_order_transaction(&mut tx, tenant, &code.user_id)
                    .await?;
                self.insert_used_code_transaction(&mut tx, tenant, code).await?;
                tx.commit().await
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    TotpError::UsedCodeAlreadyExists.into()
                } else if e.violates_constraint(&user_fk) {
                    TotpError::UnknownUserId.into()
                } else if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })
    }

    async fn get_all_used_codes_desc_order(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpUsedCode>, StorageError> {
        let sql = self.used_codes_sql(false);

        self.executor
            .execute(
                &sql,
                |q| {
                    q.bind(tenant.app_id())
                        .bind(tenant.tenant_id())
                        .bind(user_id)
                },
                |rows| rows.iter().map(Self::row_to_used_code).collect(),
            )
            .await
    }

    async fn remove_expired_codes(
        &self,
        tenant: &TenantIdentifier,
        expired_before_ms: i64,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND expiry_time_ms < ?",
            self.executor.tables().totp_used_codes
        );

        self.executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(expired_before_ms)
            })
            .await
    }

    async fn remove_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ?",
            self.executor.tables().totp_used_codes
        );

        let deleted = self
            .executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn remove_user_from_app(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().totp_users
        );

        let deleted = self
            .executor
            .update(&sql, |q| q.bind(app.app_id()).bind(user_id))
            .await?;
        Ok(deleted > 0)
    }
}
