//! TOTP entities.

use serde::{Deserialize, Serialize};

/// A TOTP device registered by a user within an app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpDevice {
    pub user_id: String,
    pub device_name: String,
    pub secret_key: String,
    /// Step length in seconds
    pub period: i32,
    /// Number of neighbouring steps accepted
    pub skew: i32,
    pub verified: bool,
}

impl TotpDevice {
    pub fn new(
        user_id: impl Into<String>,
        device_name: impl Into<String>,
        secret_key: impl Into<String>,
        period: i32,
        skew: i32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            device_name: device_name.into(),
            secret_key: secret_key.into(),
            period,
            skew,
            verified: false,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}

/// A code a user submitted within a tenant, kept to prevent replay and to rate limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpUsedCode {
    pub user_id: String,
    pub code: String,
    pub is_valid: bool,
    /// Epoch milliseconds after which the row may be pruned
    pub expiry_time_ms: i64,
    /// Epoch milliseconds; unique per (app, tenant, user)
    pub created_time_ms: i64,
}

impl TotpUsedCode {
    pub fn new(
        user_id: impl Into<String>,
        code: impl Into<String>,
        is_valid: bool,
        expiry_time_ms: i64,
        created_time_ms: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            code: code.into(),
            is_valid,
            expiry_time_ms,
            created_time_ms,
        }
    }
}
