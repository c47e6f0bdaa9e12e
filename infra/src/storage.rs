//! Storage façade for one scope
//!
//! [`MySqlStorage`] bundles the query executor and every repository of a
//! storage scope, brings the scope online and composes operations that span
//! several features.

use std::sync::Arc;
use tracing::info;

use tv_core::domain::value_objects::AppIdentifier;
use tv_core::errors::StorageError;
use tv_core::repositories::MultitenancyRepository;
use tv_shared::DatabaseConfig;

use crate::database::connection::PoolStatistics;
use crate::database::executor::QueryExecutor;
use crate::database::mysql::{
    MySqlActiveUsersRepository, MySqlEmailVerificationRepository, MySqlMultitenancyRepository,
    MySqlTotpRepository, MySqlUserRolesRepository,
};
use crate::database::pool::{PoolManager, StorageScope, WaitPolicy};
use crate::database::schema;

/// MySQL storage for one scope
#[derive(Clone)]
pub struct MySqlStorage {
    executor: QueryExecutor,
    multitenancy: MySqlMultitenancyRepository,
    email_verification: MySqlEmailVerificationRepository,
    totp: MySqlTotpRepository,
    user_roles: MySqlUserRolesRepository,
    active_users: MySqlActiveUsersRepository,
}

impl MySqlStorage {
    pub fn new(manager: Arc<PoolManager>, scope: StorageScope) -> Self {
        let executor = QueryExecutor::new(manager, scope);
        Self {
            multitenancy: MySqlMultitenancyRepository::new(executor.clone()),
            email_verification: MySqlEmailVerificationRepository::new(executor.clone()),
            totp: MySqlTotpRepository::new(executor.clone()),
            user_roles: MySqlUserRolesRepository::new(executor.clone()),
            active_users: MySqlActiveUsersRepository::new(executor.clone()),
            executor,
        }
    }

    /// Storage for `config` registered under `scope_id`
    pub fn with_config(
        manager: Arc<PoolManager>,
        scope_id: impl Into<String>,
        config: DatabaseConfig,
    ) -> Self {
        Self::new(manager, StorageScope::new(scope_id, config))
    }

    /// Bring the scope online: pool, missing tables, default app and tenant.
    ///
    /// Safe to call more than once.
    pub async fn init(&self, wait: WaitPolicy) -> Result<(), StorageError> {
        let scope = self.executor.scope();
        self.executor.manager().initialize(scope, wait).await?;

        schema::create_tables_if_not_exist(&self.executor).await?;

        let app = AppIdentifier::default();
        self.multitenancy.create_app(&app).await?;
        self.multitenancy.create_tenant(&app.default_tenant()).await?;

        info!(scope = %scope.id(), "MySQL storage initialized");
        Ok(())
    }

    /// Release the scope's pool. Idempotent.
    pub async fn close(&self) {
        self.executor.manager().close(self.executor.scope().id()).await;
    }

    pub async fn is_initialized(&self) -> bool {
        self.executor
            .manager()
            .is_initialized(self.executor.scope().id())
            .await
    }

    pub async fn health_check(&self) -> Result<bool, StorageError> {
        self.executor.manager().health_check(self.executor.scope()).await
    }

    pub async fn statistics(&self) -> Option<PoolStatistics> {
        self.executor
            .manager()
            .statistics(self.executor.scope().id())
            .await
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    pub fn multitenancy(&self) -> &MySqlMultitenancyRepository {
        &self.multitenancy
    }

    pub fn email_verification(&self) -> &MySqlEmailVerificationRepository {
        &self.email_verification
    }

    pub fn totp(&self) -> &MySqlTotpRepository {
        &self.totp
    }

    pub fn user_roles(&self) -> &MySqlUserRolesRepository {
        &self.user_roles
    }

    pub fn active_users(&self) -> &MySqlActiveUsersRepository {
        &self.active_users
    }

    /// Remove everything this layer stores about a user in the app, in one
    /// transaction.
    pub async fn delete_user_data(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<(), StorageError> {
        self.executor
            .start_transaction(|mut tx| async move {
                self.email_verification
                    .delete_email_verification_user_info_transaction(&mut tx, app, user_id)
                    .await?;
                self.user_roles
                    .delete_all_roles_for_user_in_app_transaction(&mut tx, app, user_id)
                    .await?;
                self.totp.remove_user_transaction(&mut tx, app, user_id).await?;
                self.active_users
                    .delete_user_active_transaction(&mut tx, app, user_id)
                    .await?;
                tx.commit().await
            })
            .await?;

        info!(app = %app, user_id, "Deleted user data");
        Ok(())
    }
}
