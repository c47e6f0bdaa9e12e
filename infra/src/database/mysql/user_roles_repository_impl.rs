//! MySQL implementation of the UserRolesRepository trait.

use async_trait::async_trait;
use sqlx::mysql::MySqlRow;

use tv_core::domain::value_objects::{AppIdentifier, TenantIdentifier};
use tv_core::errors::{StorageError, UserRolesError};
use tv_core::repositories::UserRolesRepository;
use tv_shared::TableNames;

use crate::database::executor::{column, execute_on, update_on, QueryExecutor};
use crate::database::transaction::TransactionConnection;

/// MySQL implementation of UserRolesRepository
#[derive(Clone)]
pub struct MySqlUserRolesRepository {
    executor: QueryExecutor,
}

fn string_column(rows: Vec<MySqlRow>, name: &str) -> Result<Vec<String>, StorageError> {
    rows.iter().map(|row| column(row, name)).collect()
}

impl MySqlUserRolesRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    fn create_role_sql(&self) -> String {
        let roles = &self.executor.tables().roles;
        format!(
            "INSERT INTO {roles} (app_id, role) SELECT ?, ? FROM DUAL \
             WHERE NOT EXISTS (SELECT role FROM {roles} WHERE app_id = ? AND role = ?)"
        )
    }

    fn map_app_not_found(error: StorageError) -> StorageError {
        if error.is_foreign_key_violation() {
            StorageError::TenantOrAppNotFound
        } else {
            error
        }
    }

    /// Returns whether the role was created.
    pub async fn create_new_role_or_do_nothing_if_exists_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<bool, StorageError> {
        let sql = self.create_role_sql();

        let inserted = update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id())
                .bind(role)
                .bind(app.app_id())
                .bind(role)
        })
        .await?;
        Ok(inserted > 0)
    }

    pub async fn add_permission_to_role_or_do_nothing_if_exists_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        role: &str,
        permission: &str,
    ) -> Result<(), StorageError> {
        let permissions = &self.executor.tables().role_permissions;
        let sql = format!(
            "INSERT INTO {permissions} (app_id, role, permission) SELECT ?, ?, ? FROM DUAL \
             WHERE NOT EXISTS (SELECT permission FROM {permissions} \
             WHERE app_id = ? AND role = ? AND permission = ?)"
        );

        update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id())
                .bind(role)
                .bind(permission)
                .bind(app.app_id())
                .bind(role)
                .bind(permission)
        })
        .await?;
        Ok(())
    }

    /// Check for the role and lock its row.
    pub async fn does_role_exist_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT role FROM {} WHERE app_id = ? AND role = ? FOR UPDATE",
            self.executor.tables().roles
        );

        execute_on(
            tx.connection()?,
            &sql,
            |q| q.bind(app.app_id()).bind(role),
            |rows| Ok(!rows.is_empty()),
        )
        .await
    }

    pub async fn delete_permission_for_role_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        role: &str,
        permission: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND role = ? AND permission = ?",
            self.executor.tables().role_permissions
        );

        let deleted = update_on(tx.connection()?, &sql, |q| {
            q.bind(app.app_id()).bind(role).bind(permission)
        })
        .await?;
        Ok(deleted > 0)
    }

    pub async fn delete_all_permissions_for_role_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND role = ?",
            self.executor.tables().role_permissions
        );

        update_on(tx.connection()?, &sql, |q| q.bind(app.app_id()).bind(role)).await
    }

    /// Remove the user's role assignments in every tenant of the app.
    pub async fn delete_all_roles_for_user_in_app_transaction(
        &self,
        tx: &mut TransactionConnection,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().user_roles
        );

        update_on(tx.connection()?, &sql, |q| q.bind(app.app_id()).bind(user_id)).await
    }
}

#[async_trait]
impl UserRolesRepository for MySqlUserRolesRepository {
    async fn create_new_role_or_do_nothing_if_exists(
        &self,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<bool, StorageError> {
        let sql = self.create_role_sql();

        let inserted = self
            .executor
            .update(&sql, |q| {
                q.bind(app.app_id())
                    .bind(role)
                    .bind(app.app_id())
                    .bind(role)
            })
            .await
            .map_err(Self::map_app_not_found)?;
        Ok(inserted > 0)
    }

    async fn create_new_role_or_modify_its_permissions(
        &self,
        app: &AppIdentifier,
        role: &str,
        permissions: &[String],
    ) -> Result<bool, StorageError> {
        self.executor
            .start_transaction(|mut tx| async move {
                let created = self
                    .create_new_role_or_do_nothing_if_exists_transaction(&mut tx, app, role)
                    .await?;
                for permission in permissions {
                    self.add_permission_to_role_or_do_nothing_if_exists_transaction(
                        &mut tx, app, role, permission,
                    )
                    .await?;
                }
                tx.commit().await?;
                Ok(created)
            })
            .await
            .map_err(Self::map_app_not_found)
    }

    async fn delete_role(&self, app: &AppIdentifier, role: &str) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND role = ?",
            self.executor.tables().roles
        );

        let deleted = self
            .executor
            .update(&sql, |q| q.bind(app.app_id()).bind(role))
            .await?;
        Ok(deleted > 0)
    }

    async fn does_role_exist(&self, app: &AppIdentifier, role: &str) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT role FROM {} WHERE app_id = ? AND role = ?",
            self.executor.tables().roles
        );

        self.executor
            .execute(&sql, |q| q.bind(app.app_id()).bind(role), |rows| Ok(!rows.is_empty()))
            .await
    }

    async fn get_permissions_for_role(
        &self,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT permission FROM {} WHERE app_id = ? AND role = ?",
            self.executor.tables().role_permissions
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(role),
                |rows| string_column(rows, "permission"),
            )
            .await
    }

    async fn get_roles(&self, app: &AppIdentifier) -> Result<Vec<String>, StorageError> {
        let sql = format!("SELECT role FROM {} WHERE app_id = ?", self.executor.tables().roles);

        self.executor
            .execute(&sql, |q| q.bind(app.app_id()), |rows| string_column(rows, "role"))
            .await
    }

    async fn delete_permissions_for_role(
        &self,
        app: &AppIdentifier,
        role: &str,
        permissions: Option<&[String]>,
    ) -> Result<u64, StorageError> {
        self.executor
            .start_transaction(|mut tx| async move {
                if !self.does_role_exist_transaction(&mut tx, app, role).await? {
                    return Err(UserRolesError::UnknownRole.into());
                }

                let deleted = match permissions {
                    None => {
                        self.delete_all_permissions_for_role_transaction(&mut tx, app, role)
                            .await?
                    }
                    Some(permissions) => {
                        let mut deleted = 0;
                        for permission in permissions {
                            let removed = self
                                .delete_permission_for_role_transaction(
                                    &mut tx, app, role, permission,
                                )
                                .await?;
                            if removed {
                                deleted += 1;
                            }
                        }
                        deleted
                    }
                };

                tx.commit().await?;
                Ok(deleted)
            })
            .await
    }

    async fn get_roles_that_have_permission(
        &self,
        app: &AppIdentifier,
        permission: &str,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT role FROM {} WHERE app_id = ? AND permission = ?",
            self.executor.tables().role_permissions
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(permission),
                |rows| string_column(rows, "role"),
            )
            .await
    }

    async fn add_role_to_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        role: &str,
    ) -> Result<(), StorageError> {
        let user_roles = &self.executor.tables().user_roles;
        let sql = format!(
            "INSERT INTO {} (app_id, tenant_id, user_id, role) VALUES (?, ?, ?, ?)",
            user_roles
        );
        let role_fk = TableNames::foreign_key(user_roles, "role");

        self.executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
                    .bind(role)
            })
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    UserRolesError::DuplicateUserRoleMapping.into()
                } else if e.violates_constraint(&role_fk) {
                    UserRolesError::UnknownRole.into()
                } else if e.is_foreign_key_violation() {
                    StorageError::TenantOrAppNotFound
                } else {
                    e
                }
            })?;
        Ok(())
    }

    async fn get_roles_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT role FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ?",
            self.executor.tables().user_roles
        );

        self.executor
            .execute(
                &sql,
                |q| {
                    q.bind(tenant.app_id())
                        .bind(tenant.tenant_id())
                        .bind(user_id)
                },
                |rows| string_column(rows, "role"),
            )
            .await
    }

    async fn get_roles_for_user_in_app(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT DISTINCT role FROM {} WHERE app_id = ? AND user_id = ?",
            self.executor.tables().user_roles
        );

        self.executor
            .execute(
                &sql,
                |q| q.bind(app.app_id()).bind(user_id),
                |rows| string_column(rows, "role"),
            )
            .await
    }

    async fn delete_role_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        role: &str,
    ) -> Result<bool, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ? AND role = ?",
            self.executor.tables().user_roles
        );

        let deleted = self
            .executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
                    .bind(role)
            })
            .await?;
        Ok(deleted > 0)
    }

    async fn get_users_for_role(
        &self,
        tenant: &TenantIdentifier,
        role: &str,
    ) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT user_id FROM {} WHERE app_id = ? AND tenant_id = ? AND role = ?",
            self.executor.tables().user_roles
        );

        self.executor
            .execute(
                &sql,
                |q| {
                    q.bind(tenant.app_id())
                        .bind(tenant.tenant_id())
                        .bind(role)
                },
                |rows| string_column(rows, "user_id"),
            )
            .await
    }

    async fn delete_all_roles_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "DELETE FROM {} WHERE app_id = ? AND tenant_id = ? AND user_id = ?",
            self.executor.tables().user_roles
        );

        self.executor
            .update(&sql, |q| {
                q.bind(tenant.app_id())
                    .bind(tenant.tenant_id())
                    .bind(user_id)
            })
            .await
    }
}
