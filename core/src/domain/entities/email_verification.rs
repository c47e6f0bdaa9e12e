//! Email verification entities.

use serde::{Deserialize, Serialize};

/// A pending email verification token issued within a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailVerificationTokenInfo {
    pub user_id: String,
    /// Hash of the token handed to the user; unique across the table
    pub token: String,
    /// Expiry in epoch milliseconds. Advisory only: expired rows are pruned
    /// periodically and rejected on use, never by a schema constraint.
    pub token_expiry: i64,
    pub email: String,
}

impl EmailVerificationTokenInfo {
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        token_expiry: i64,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            token_expiry,
            email: email.into(),
        }
    }

    /// Whether the token had expired at `now_ms`
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.token_expiry < now_ms
    }
}

/// A (user, email) pair submitted to the bulk verification check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdAndEmail {
    pub user_id: String,
    pub email: String,
}

impl UserIdAndEmail {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let token = EmailVerificationTokenInfo::new("user", "hash", 1_000, "a@example.com");
        assert!(!token.is_expired_at(999));
        assert!(!token.is_expired_at(1_000));
        assert!(token.is_expired_at(1_001));
    }
}
