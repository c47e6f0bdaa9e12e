use async_trait::async_trait;

use crate::domain::value_objects::AppIdentifier;
use crate::errors::StorageError;

/// Tracks when users were last active, per app
#[async_trait]
pub trait ActiveUsersRepository: Send + Sync {
    /// Record `user_id` as active now
    async fn update_last_active(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<(), StorageError>;

    /// Number of users active at or after `since_ms`
    async fn count_users_active_since(
        &self,
        app: &AppIdentifier,
        since_ms: i64,
    ) -> Result<u64, StorageError>;

    /// Number of users with TOTP enabled
    async fn count_users_enabled_totp(&self, app: &AppIdentifier) -> Result<u64, StorageError>;

    /// Number of users with TOTP enabled that were active at or after `since_ms`
    async fn count_users_enabled_totp_and_active_since(
        &self,
        app: &AppIdentifier,
        since_ms: i64,
    ) -> Result<u64, StorageError>;

    async fn get_last_active_by_user_id(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<Option<i64>, StorageError>;
}
