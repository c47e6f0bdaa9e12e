//! Time helpers

use chrono::Utc;

/// Milliseconds since the Unix epoch
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}
