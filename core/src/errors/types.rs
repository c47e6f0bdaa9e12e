//! Feature-specific storage outcomes.
//!
//! Repositories translate particular query failures (unique or foreign key
//! violations) into these variants; the query harness never does.

use thiserror::Error;

/// Classification of a failed statement, taken from the driver's structured
/// error kind rather than its message text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    Other,
}

/// Email verification outcomes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailVerificationError {
    #[error("Duplicate email verification token")]
    DuplicateToken,

    #[error("Invalid email verification token")]
    InvalidToken,
}

/// TOTP outcomes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TotpError {
    #[error("Device already exists")]
    DeviceAlreadyExists,

    #[error("Unknown device")]
    UnknownDevice,

    #[error("Unknown TOTP user id")]
    UnknownUserId,

    #[error("Used code already exists")]
    UsedCodeAlreadyExists,
}

/// User role outcomes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserRolesError {
    #[error("Unknown role")]
    UnknownRole,

    #[error("Role is already assigned to the user")]
    DuplicateUserRoleMapping,
}
