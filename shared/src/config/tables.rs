//! Table naming module
//!
//! Every table name may carry a deployment-specific prefix so several storage
//! layers can share one database.

use serde::{Deserialize, Serialize};

/// Resolved table names for one storage scope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TableNames {
    pub apps: String,
    pub tenants: String,
    pub email_verification: String,
    pub email_verification_tokens: String,
    pub roles: String,
    pub role_permissions: String,
    pub user_roles: String,
    pub totp_users: String,
    pub totp_user_devices: String,
    pub totp_used_codes: String,
    pub user_last_active: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

impl TableNames {
    /// Resolve all table names with `prefix`. A blank prefix leaves names untouched,
    /// otherwise the prefix is joined with an underscore.
    pub fn with_prefix(prefix: &str) -> Self {
        let name = |table: &str| {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                table.to_string()
            } else {
                format!("{}_{}", prefix, table)
            }
        };

        Self {
            apps: name("apps"),
            tenants: name("tenants"),
            email_verification: name("emailverification_verified_emails"),
            email_verification_tokens: name("emailverification_tokens"),
            roles: name("roles"),
            role_permissions: name("role_permissions"),
            user_roles: name("user_roles"),
            totp_users: name("totp_users"),
            totp_user_devices: name("totp_user_devices"),
            totp_used_codes: name("totp_used_codes"),
            user_last_active: name("user_last_active"),
        }
    }

    /// Name of the foreign key constraint on `table` covering `columns`.
    ///
    /// Constraint names are unique per database in MySQL, so they are derived
    /// from the (possibly prefixed) table name.
    pub fn foreign_key(table: &str, columns: &str) -> String {
        format!("{}_{}_fkey", table, columns)
    }

    /// Tables in creation order; every table only references tables before it.
    pub fn creation_order(&self) -> [&str; 11] {
        [
            &self.apps,
            &self.tenants,
            &self.email_verification,
            &self.email_verification_tokens,
            &self.roles,
            &self.role_permissions,
            &self.user_roles,
            &self.totp_users,
            &self.totp_user_devices,
            &self.totp_used_codes,
            &self.user_last_active,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_names() {
        let tables = TableNames::default();
        assert_eq!(tables.email_verification, "emailverification_verified_emails");
        assert_eq!(tables.totp_used_codes, "totp_used_codes");
    }

    #[test]
    fn test_prefixed_names() {
        let tables = TableNames::with_prefix("acme");
        assert_eq!(tables.apps, "acme_apps");
        assert_eq!(tables.user_last_active, "acme_user_last_active");
        assert!(tables.creation_order().iter().all(|t| t.starts_with("acme_")));
    }

    #[test]
    fn test_blank_prefix_is_ignored() {
        assert_eq!(TableNames::with_prefix("  "), TableNames::default());
    }

    #[test]
    fn test_foreign_key_name() {
        let tables = TableNames::with_prefix("acme");
        assert_eq!(
            TableNames::foreign_key(&tables.user_roles, "role"),
            "acme_user_roles_role_fkey"
        );
    }
}
