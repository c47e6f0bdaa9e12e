//! Value objects representing immutable domain concepts.

pub mod identifiers;

// Re-export commonly used types
pub use identifiers::{AppIdentifier, TenantIdentifier, DEFAULT_APP_ID, DEFAULT_TENANT_ID};
