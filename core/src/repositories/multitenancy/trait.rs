//! Apps and tenants: the owners every scoped row cascades from.

use async_trait::async_trait;

use crate::domain::value_objects::{AppIdentifier, TenantIdentifier};
use crate::errors::StorageError;

/// Repository trait for the app/tenant hierarchy
#[async_trait]
pub trait MultitenancyRepository: Send + Sync {
    /// Create the app if it does not exist yet
    ///
    /// # Returns
    /// * `Ok(true)` - The app was created
    /// * `Ok(false)` - The app already existed
    async fn create_app(&self, app: &AppIdentifier) -> Result<bool, StorageError>;

    /// Create the tenant if it does not exist yet
    ///
    /// # Returns
    /// * `Ok(true)` - The tenant was created
    /// * `Ok(false)` - The tenant already existed
    /// * `Err(StorageError::TenantOrAppNotFound)` - The owning app does not exist
    async fn create_tenant(&self, tenant: &TenantIdentifier) -> Result<bool, StorageError>;

    /// Delete the app and, through cascading foreign keys, everything it owns
    async fn delete_app(&self, app: &AppIdentifier) -> Result<bool, StorageError>;

    /// Delete the tenant and every tenant-scoped row
    async fn delete_tenant(&self, tenant: &TenantIdentifier) -> Result<bool, StorageError>;

    async fn does_app_exist(&self, app: &AppIdentifier) -> Result<bool, StorageError>;
}
