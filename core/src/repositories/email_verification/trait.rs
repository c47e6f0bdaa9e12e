//! Email verification repository trait.
//!
//! Verified emails are app-scoped; verification tokens are tenant-scoped.

use async_trait::async_trait;

use crate::domain::entities::{EmailVerificationTokenInfo, UserIdAndEmail};
use crate::domain::value_objects::{AppIdentifier, TenantIdentifier};
use crate::errors::StorageError;

/// Repository trait for email verification persistence
#[async_trait]
pub trait EmailVerificationRepository: Send + Sync {
    /// Store a newly issued token
    ///
    /// # Errors
    /// * `EmailVerificationError::DuplicateToken` - The token hash is already stored
    /// * `StorageError::TenantOrAppNotFound` - The tenant does not exist
    async fn add_email_verification_token(
        &self,
        tenant: &TenantIdentifier,
        token: &EmailVerificationTokenInfo,
    ) -> Result<(), StorageError>;

    async fn get_email_verification_token_info(
        &self,
        tenant: &TenantIdentifier,
        token: &str,
    ) -> Result<Option<EmailVerificationTokenInfo>, StorageError>;

    async fn get_all_email_verification_tokens_for_user(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<EmailVerificationTokenInfo>, StorageError>;

    /// Delete every token issued to (user, email) in the tenant
    async fn revoke_all_tokens(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError>;

    /// Consume `token`: all tokens of its (user, email) are deleted and the email
    /// is marked verified, atomically.
    ///
    /// # Returns
    /// The consumed token
    ///
    /// # Errors
    /// * `EmailVerificationError::InvalidToken` - The token is unknown or expired
    async fn verify_email_using_token(
        &self,
        tenant: &TenantIdentifier,
        token: &str,
    ) -> Result<EmailVerificationTokenInfo, StorageError>;

    /// Set or clear the verified flag. Marking an already verified email is a no-op.
    async fn update_is_email_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
        is_verified: bool,
    ) -> Result<(), StorageError>;

    async fn is_email_verified(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<bool, StorageError>;

    /// Bulk form of [`is_email_verified`](Self::is_email_verified)
    ///
    /// # Returns
    /// The user ids whose requested email is verified. A user id whose stored
    /// verified email differs from the requested one is never returned.
    ///
    /// # Errors
    /// * `StorageError::IllegalUsage` - The same user id appears twice
    async fn is_email_verified_bulk(
        &self,
        app: &AppIdentifier,
        users: &[UserIdAndEmail],
    ) -> Result<Vec<String>, StorageError>;

    async fn unverify_email(
        &self,
        app: &AppIdentifier,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError>;

    /// Prune tokens whose expiry has passed, across all tenants
    async fn delete_expired_email_verification_tokens(&self) -> Result<u64, StorageError>;

    /// Delete the user's tokens in one tenant
    ///
    /// # Returns
    /// `true` if any row was removed
    async fn delete_email_verification_user_info(
        &self,
        tenant: &TenantIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError>;

    /// Whether the user holds any pending verification token in the app.
    /// Verified emails alone do not count.
    async fn is_user_id_being_used_for_email_verification(
        &self,
        app: &AppIdentifier,
        user_id: &str,
    ) -> Result<bool, StorageError>;
}
