//! TOTP repository trait.
//!
//! TOTP users and devices are app-scoped; used codes are tenant-scoped.

use async_trait::async_trait;

use crate::domain::entities::{TotpDevice, TotpUsedCode};
use crate::domain::value_objects::{AppIdentifier, TenantIdentifier};
use crate::errors::StorageError;

/// Repository trait for TOTP persistence
///
/// Devices belong to a TOTP user row, which is created on the first device and
/// removed together with the last one.
#[async_trait]
pub trait TotpRepository: Send + Sync {
    /// Register a device, creating the TOTP user when absent
    ///
    /// # Errors
    /// * `TotpError::DeviceAlreadyExists` - The user already has a device with that name
    /// * `StorageError::TenantOrAppNotFound` - The app does not exist
    async fn create_device(
        &self,
        app: &AppIdentifier,
        device: &TotpDevice,
    ) -> Result<(), StorageError>;

    /// # Errors
    /// * `TotpError::UnknownDevice` - No such device
    async fn mark_device_as_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<(), StorageError>;

    /// Delete a device, removing the TOTP user (and its used codes) when it was the last one
    ///
    /// # Errors
    /// * `TotpError::UnknownDevice` - No such device
    async fn delete_device(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        device_name: &str,
    ) -> Result<(), StorageError>;

    /// # Errors
    /// * `TotpError::UnknownDevice` - No device named `old_device_name`
    /// * `TotpError::DeviceAlreadyExists` - `new_device_name` is taken
    async fn update_device_name(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        old_device_name: &str,
        new_device_name: &str,
    ) -> Result<(), StorageError>;

    async fn get_devices(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpDevice>, StorageError>;

    /// Record a submitted code. Concurrent inserts for the same user are
    /// serialized by locking the user's existing codes first.
    ///
    /// # Errors
    /// * `TotpError::UsedCodeAlreadyExists` - A code with the same creation time exists
    /// * `TotpError::UnknownUserId` - The user has no TOTP devices
    /// * `StorageError::TenantOrAppNotFound` - The tenant does not exist
    async fn insert_used_code(
        &self,
        tenant: &TenantIdentifier,
        code: &TotpUsedCode,
    ) -> Result<(), StorageError>;

    /// All used codes of the user, newest first
    async fn get_all_used_codes_desc_order(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<Vec<TotpUsedCode>, StorageError>;

    /// Prune codes that expired before `expired_before_ms`
    async fn remove_expired_codes(
        &self,
        tenant: &TenantIdentifier,
        expired_before_ms: i64,
    ) -> Result<u64, StorageError>;

    /// Remove the user's used codes in one tenant
    async fn remove_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError>;

    /// Remove the TOTP user from the app with all devices and used codes
    async fn remove_user_from_app(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError>;
}
