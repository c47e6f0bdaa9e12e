//! User roles repository trait.
//!
//! Roles and their permissions are app-scoped; role assignments are tenant-scoped.

use async_trait::async_trait;

use crate::domain::value_objects::{AppIdentifier, TenantIdentifier};
use crate::errors::StorageError;

/// Repository trait for roles, permissions and role assignments
#[async_trait]
pub trait UserRolesRepository: Send + Sync {
    /// # Returns
    /// `true` if the role was created, `false` if it already existed
    async fn create_new_role_or_do_nothing_if_exists(
        &self,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<bool, StorageError>;

    /// Create the role when absent and add each missing permission, atomically
    ///
    /// # Returns
    /// `true` if the role was created
    async fn create_new_role_or_modify_its_permissions(
        &self,
        app: &AppIdentifier,
        role: &str,
        permissions: &[String],
    ) -> Result<bool, StorageError>;

    /// Delete the role; its permissions and assignments cascade
    async fn delete_role(&self, app: &AppIdentifier, role: &str) -> Result<bool, StorageError>;

    async fn does_role_exist(&self, app: &AppIdentifier, role: &str) -> Result<bool, StorageError>;

    async fn get_permissions_for_role(
        &self,
        app: &AppIdentifier,
        role: &str,
    ) -> Result<Vec<String>, StorageError>;

    async fn get_roles(&self, app: &AppIdentifier) -> Result<Vec<String>, StorageError>;

    /// Remove `permissions` from the role, or all of them when `None`
    ///
    /// # Returns
    /// Number of permissions removed
    ///
    /// # Errors
    /// * `UserRolesError::UnknownRole` - The role does not exist
    async fn delete_permissions_for_role(
        &self,
        app: &AppIdentifier,
        role: &str,
        permissions: Option<&[String]>,
    ) -> Result<u64, StorageError>;

    async fn get_roles_that_have_permission(
        &self,
        app: &AppIdentifier,
        permission: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// # Errors
    /// * `UserRolesError::UnknownRole` - The role does not exist in the app
    /// * `UserRolesError::DuplicateUserRoleMapping` - The user already has the role
    /// * `StorageError::TenantOrAppNotFound` - The tenant does not exist
    async fn add_role_to_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        role: &str,
    ) -> Result<(), StorageError>;

    async fn get_roles_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError>;

    /// Roles of the user across every tenant of the app
    async fn get_roles_for_user_in_app(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError>;

    async fn delete_role_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        role: &str,
    ) -> Result<bool, StorageError>;

    async fn get_users_for_role(
        &self,
        tenant: &TenantIdentifier,
        role: &str,
    ) -> Result<Vec<String>, StorageError>;

    async fn delete_all_roles_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<u64, StorageError>;
}
