//! MySQL repository implementations
//!
//! Each repository exposes its trait operations plus `_transaction` variants
//! that run on a caller's open [`TransactionConnection`], so that operations
//! spanning several features can be composed atomically.
//!
//! [`TransactionConnection`]: crate::database::transaction::TransactionConnection

pub mod active_users_repository_impl;
pub mod email_verification_repository_impl;
pub mod multitenancy_repository_impl;
pub mod totp_repository_impl;
pub mod user_roles_repository_impl;

pub use active_users_repository_impl::MySqlActiveUsersRepository;
pub use email_verification_repository_impl::MySqlEmailVerificationRepository;
pub use multitenancy_repository_impl::MySqlMultitenancyRepository;
pub use totp_repository_impl::MySqlTotpRepository;
pub use user_roles_repository_impl::MySqlUserRolesRepository;
