//! Domain entities stored by the feature repositories.

pub mod email_verification;
pub mod totp;

// Re-export commonly used types
pub use email_verification::{EmailVerificationTokenInfo, UserIdAndEmail};
pub use totp::{TotpDevice, TotpUsedCode};
