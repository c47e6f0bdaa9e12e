//! Storage contract consumed by the host, one trait per feature area.

pub mod active_users;
pub mod email_verification;
pub mod multitenancy;
pub mod totp;
pub mod user_roles;

pub use active_users::ActiveUsersRepository;
pub use email_verification::EmailVerificationRepository;
pub use multitenancy::MultitenancyRepository;
pub use totp::TotpRepository;
pub use user_roles::UserRolesRepository;
