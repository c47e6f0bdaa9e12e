//! Hierarchical scoping keys.
//!
//! Every app-scoped row carries an app id; every tenant-scoped row carries both
//! the app id and the tenant id. Both default to [`DEFAULT_APP_ID`] /
//! [`DEFAULT_TENANT_ID`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// App id used when none is given
pub const DEFAULT_APP_ID: &str = "public";

/// Tenant id used when none is given
pub const DEFAULT_TENANT_ID: &str = "public";

/// Identifies an app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppIdentifier {
    app_id: String,
}

impl AppIdentifier {
    /// Creates an identifier for `app_id`; a blank id maps to the default app.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: normalize(app_id.into(), DEFAULT_APP_ID),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The tenant identifier of this app's default tenant
    pub fn default_tenant(&self) -> TenantIdentifier {
        TenantIdentifier::new(self.app_id.clone(), DEFAULT_TENANT_ID)
    }
}

impl Default for AppIdentifier {
    fn default() -> Self {
        Self::new(DEFAULT_APP_ID)
    }
}

impl fmt::Display for AppIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.app_id)
    }
}

/// Identifies a tenant within an app
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantIdentifier {
    app_id: String,
    tenant_id: String,
}

impl TenantIdentifier {
    /// Creates an identifier; blank ids map to the defaults.
    pub fn new(app_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            app_id: normalize(app_id.into(), DEFAULT_APP_ID),
            tenant_id: normalize(tenant_id.into(), DEFAULT_TENANT_ID),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// The app this tenant belongs to
    pub fn to_app_identifier(&self) -> AppIdentifier {
        AppIdentifier::new(self.app_id.clone())
    }
}

impl Default for TenantIdentifier {
    fn default() -> Self {
        Self::new(DEFAULT_APP_ID, DEFAULT_TENANT_ID)
    }
}

impl fmt::Display for TenantIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.tenant_id)
    }
}

fn normalize(id: String, default: &str) -> String {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_ids_map_to_defaults() {
        assert_eq!(AppIdentifier::new("  ").app_id(), DEFAULT_APP_ID);

        let tenant = TenantIdentifier::new("", "");
        assert_eq!(tenant.app_id(), DEFAULT_APP_ID);
        assert_eq!(tenant.tenant_id(), DEFAULT_TENANT_ID);
        assert_eq!(tenant, TenantIdentifier::default());
    }

    #[test]
    fn test_tenant_to_app() {
        let tenant = TenantIdentifier::new("acme", "eu");
        assert_eq!(tenant.to_app_identifier(), AppIdentifier::new("acme"));
        assert_eq!(tenant.to_string(), "acme/eu");
    }

    #[test]
    fn test_default_tenant_of_app() {
        let tenant = AppIdentifier::new("acme").default_tenant();
        assert_eq!(tenant.app_id(), "acme");
        assert_eq!(tenant.tenant_id(), DEFAULT_TENANT_ID);
    }
}
