//! MySQL implementation of the MultitenancyRepository trait.

use async_trait::async_trait;

use tv_core::domain::value_objects::{AppIdentifier, TenantIdentifier};
use tv_core::errors::StorageError;
use tv_core::repositories::MultitenancyRepository;
use tv_shared::time::current_time_millis;

use crate::database::executor::QueryExecutor;

/// MySQL implementation of MultitenancyRepository
#[derive(Clone)]
pub struct MySqlMultitenancyRepository {
    executor: QueryExecutor,
}

impl MySqlMultitenancyRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl MultitenancyRepository for MySqlMultitenancyRepository {
    async fn create_app(&self, app: &AppIdentifier) -> Result<bool, StorageError> {
        let apps = &self.executor.tables().apps;
        let sql = format!(
            "INSERT INTO {apps} (app_id, created_at_time) SELECT ?, ? FROM DUAL \
             WHERE NOT EXISTS (SELECT app_id FROM {apps} WHERE app_id = ?)"
        );

        let inserted = self
            .executor
            .update(&sql, |q| {
                q.bind(app.app_id())
                    .bind(current_time_millis())
                    .bind(app.app_id())
            })
            .await?;
        Ok(inserted > 0)
    }

    async fn create_tenant(&self, tenant: &TenantIdentifier) -> Result<bool, StorageError> {
        let tenants = &self.executor.tables().tenants;
        let sql = format!(
            "INSERT INTO {tenants} (app_id, tenant_id, created_at_time) SELECT ?, ?, ? FROM DUAL \
             WHERE NOT EXISTS (SELECT app_id FROM {tenants} WHERE app_id = ? AND tenant_id = ?)"
        );

        let inserted = self
            .executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(current_time_millis())
                    .bind(tenant.app_id())
                    .bind(tenant.tenant_id())
            })
            .await
            .map_err(|e| {
                if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })?;
        Ok(inserted > 0)
    }

    async fn delete_app(&self, app: &AppIdentifier) -> Result<bool, StorageError> {
        let sql = format!("DELETE FROM {} WHERE app_id = ?", self.executor.tables().apps);

        let deleted = self.executor.update(&sql, |q| q.bind(app.app_id())).await?;
        tracing::info!(app = %app, deleted = deleted > 0, "Deleted app");
        Ok(deleted > 0)
    }

    async fn delete_tenant(&self, tenant: &TenantIdentifier) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ?",
            self.executor.tables().tenants
        );

        let deleted = self
            .executor
            .update(&sql, |q| q.bind(tenant.app_id()).bind(tenant.tenant_id()))
            .await?;
        tracing::info!(tenant = %tenant, deleted = deleted > 0, "Deleted tenant");
        Ok(deleted > 0)
    }

    async fn does_app_exist(&self, app: &AppIdentifier) -> Result<bool, StorageError> {
        let sql = format!("SELECT app_id FROM {} WHERE app_id = ?", self.executor.tables().apps);

        self.executor
            .execute(&sql, |q| q.bind(app.app_id()), |rows| Ok(!rows.is_empty()))
            .await
    }
}
