//! Schema bootstrap
//!
//! Tables are created in dependency order, each only when it is missing from
//! the current database. Indexes are checked one by one, so an index whose
//! table was created by an interrupted bootstrap is still added later.
//! Foreign keys carry explicit names (see [`TableNames::foreign_key`]) so that
//! a violation can be attributed to the constraint that raised it.

use tracing::info;

use tv_core::errors::StorageError;
use tv_shared::TableNames;

use super::executor::QueryExecutor;

/// DDL for one table
#[derive(Debug, Clone)]
pub struct TableDefinition<'a> {
    pub name: &'a str,
    pub create: String,
    pub indexes: Vec<IndexDefinition>,
}

/// A secondary index, identified by its name within the table
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub statement: String,
}

fn index(name: &'static str, table: &str, columns: &str) -> IndexDefinition {
    IndexDefinition {
        name,
        statement: format!("CREATE INDEX {} ON {} ({})", name, table, columns),
    }
}

/// Create every missing table and index.
pub async fn create_tables_if_not_exist(executor: &QueryExecutor) -> Result<(), StorageError> {
    for definition in table_definitions(executor.tables()) {
        if !does_table_exist(executor, definition.name).await? {
            info!(table = %definition.name, "Creating table");
            executor.update(&definition.create, |q| q).await?;
        }

        for index in &definition.indexes {
            if does_index_exist(executor, definition.name, index.name).await? {
                continue;
            }
            info!(table = %definition.name, index = index.name, "Creating index");
            executor.update(&index.statement, |q| q).await?;
        }
    }
    Ok(())
}

async fn does_table_exist(executor: &QueryExecutor, table: &str) -> Result<bool, StorageError> {
    executor
        .execute(
            "SELECT 1 FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            |q| q.bind(table),
            |rows| Ok(!rows.is_empty()),
        )
        .await
}

async fn does_index_exist(
    executor: &QueryExecutor,
    table: &str,
    index: &str,
) -> Result<bool, StorageError> {
    executor
        .execute(
            "SELECT 1 FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ? LIMIT 1",
            |q| q.bind(table).bind(index),
            |rows| Ok(!rows.is_empty()),
        )
        .await
}

/// Table DDL in creation order
pub fn table_definitions(t: &TableNames) -> Vec<TableDefinition<'_>> {
    let fk = TableNames::foreign_key;

    vec![
        TableDefinition {
            name: &t.apps,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {apps} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    created_at_time BIGINT UNSIGNED,
                    PRIMARY KEY (app_id)
                )",
                apps = t.apps
            ),
            indexes: Vec::new(),
        },
        TableDefinition {
            name: &t.tenants,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {tenants} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    tenant_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    created_at_time BIGINT UNSIGNED,
                    PRIMARY KEY (app_id, tenant_id),
                    CONSTRAINT {app_fk} FOREIGN KEY (app_id)
                        REFERENCES {apps} (app_id) ON DELETE CASCADE
                )",
                tenants = t.tenants,
                apps = t.apps,
                app_fk = fk(&t.tenants, "app_id"),
            ),
            indexes: vec![index("tenants_app_id_index", &t.tenants, "app_id")],
        },
        TableDefinition {
            name: &t.email_verification,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    email VARCHAR(256) NOT NULL,
                    PRIMARY KEY (app_id, user_id, email),
                    CONSTRAINT {app_fk} FOREIGN KEY (app_id)
                        REFERENCES {apps} (app_id) ON DELETE CASCADE
                )",
                table = t.email_verification,
                apps = t.apps,
                app_fk = fk(&t.email_verification, "app_id"),
            ),
            indexes: vec![
                index(
                    "emailverification_verified_emails_app_id_index",
                    &t.email_verification,
                    "app_id",
                ),
            ],
        },
        TableDefinition {
            name: &t.email_verification_tokens,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    tenant_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    email VARCHAR(256) NOT NULL,
                    token VARCHAR(128) NOT NULL UNIQUE,
                    token_expiry BIGINT UNSIGNED NOT NULL,
                    PRIMARY KEY (app_id, tenant_id, user_id, email, token),
                    CONSTRAINT {tenant_fk} FOREIGN KEY (app_id, tenant_id)
                        REFERENCES {tenants} (app_id, tenant_id) ON DELETE CASCADE
                )",
                table = t.email_verification_tokens,
                tenants = t.tenants,
                tenant_fk = fk(&t.email_verification_tokens, "tenant_id"),
            ),
            indexes: vec![
                index(
                    "emailverification_tokens_index",
                    &t.email_verification_tokens,
                    "token_expiry",
                ),
                index(
                    "emailverification_tokens_tenant_id_index",
                    &t.email_verification_tokens,
                    "app_id, tenant_id",
                ),
            ],
        },
        TableDefinition {
            name: &t.roles,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {roles} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    role VARCHAR(255) NOT NULL,
                    PRIMARY KEY (app_id, role),
                    CONSTRAINT {app_fk} FOREIGN KEY (app_id)
                        REFERENCES {apps} (app_id) ON DELETE CASCADE
                )",
                roles = t.roles,
                apps = t.apps,
                app_fk = fk(&t.roles, "app_id"),
            ),
            indexes: vec![index("roles_app_id_index", &t.roles, "app_id")],
        },
        TableDefinition {
            name: &t.role_permissions,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    role VARCHAR(255) NOT NULL,
                    permission VARCHAR(255) NOT NULL,
                    PRIMARY KEY (app_id, role, permission),
                    CONSTRAINT {role_fk} FOREIGN KEY (app_id, role)
                        REFERENCES {roles} (app_id, role) ON DELETE CASCADE
                )",
                table = t.role_permissions,
                roles = t.roles,
                role_fk = fk(&t.role_permissions, "role"),
            ),
            indexes: vec![
                index(
                    "role_permissions_permission_index",
                    &t.role_permissions,
                    "app_id, permission",
                ),
                index("role_permissions_role_index", &t.role_permissions, "app_id, role"),
            ],
        },
        TableDefinition {
            name: &t.user_roles,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    tenant_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    role VARCHAR(255) NOT NULL,
                    PRIMARY KEY (app_id, tenant_id, user_id, role),
                    CONSTRAINT {tenant_fk} FOREIGN KEY (app_id, tenant_id)
                        REFERENCES {tenants} (app_id, tenant_id) ON DELETE CASCADE,
                    CONSTRAINT {role_fk} FOREIGN KEY (app_id, role)
                        REFERENCES {roles} (app_id, role) ON DELETE CASCADE
                )",
                table = t.user_roles,
                tenants = t.tenants,
                roles = t.roles,
                tenant_fk = fk(&t.user_roles, "tenant_id"),
                role_fk = fk(&t.user_roles, "role"),
            ),
            indexes: vec![
                index("user_roles_role_index", &t.user_roles, "app_id, tenant_id, role"),
                index("user_roles_app_id_role_index", &t.user_roles, "app_id, role"),
            ],
        },
        TableDefinition {
            name: &t.totp_users,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    PRIMARY KEY (app_id, user_id),
                    CONSTRAINT {app_fk} FOREIGN KEY (app_id)
                        REFERENCES {apps} (app_id) ON DELETE CASCADE
                )",
                table = t.totp_users,
                apps = t.apps,
                app_fk = fk(&t.totp_users, "app_id"),
            ),
            indexes: vec![index("totp_users_app_id_index", &t.totp_users, "app_id")],
        },
        TableDefinition {
            name: &t.totp_user_devices,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    device_name VARCHAR(256) NOT NULL,
                    secret_key VARCHAR(256) NOT NULL,
                    period INTEGER NOT NULL,
                    skew INTEGER NOT NULL,
                    verified BOOLEAN NOT NULL,
                    PRIMARY KEY (app_id, user_id, device_name),
                    CONSTRAINT {user_fk} FOREIGN KEY (app_id, user_id)
                        REFERENCES {users} (app_id, user_id) ON DELETE CASCADE
                )",
                table = t.totp_user_devices,
                users = t.totp_users,
                user_fk = fk(&t.totp_user_devices, "user_id"),
            ),
            indexes: vec![
                index("totp_user_devices_user_id_index", &t.totp_user_devices, "app_id, user_id"),
            ],
        },
        TableDefinition {
            name: &t.totp_used_codes,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    tenant_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    code VARCHAR(8) NOT NULL,
                    is_valid BOOLEAN NOT NULL,
                    expiry_time_ms BIGINT UNSIGNED NOT NULL,
                    created_time_ms BIGINT UNSIGNED NOT NULL,
                    PRIMARY KEY (app_id, tenant_id, user_id, created_time_ms),
                    CONSTRAINT {user_fk} FOREIGN KEY (app_id, user_id)
                        REFERENCES {users} (app_id, user_id) ON DELETE CASCADE,
                    CONSTRAINT {tenant_fk} FOREIGN KEY (app_id, tenant_id)
                        REFERENCES {tenants} (app_id, tenant_id) ON DELETE CASCADE
                )",
                table = t.totp_used_codes,
                users = t.totp_users,
                tenants = t.tenants,
                user_fk = fk(&t.totp_used_codes, "user_id"),
                tenant_fk = fk(&t.totp_used_codes, "tenant_id"),
            ),
            indexes: vec![
                index(
                    "totp_used_codes_expiry_time_ms_index",
                    &t.totp_used_codes,
                    "app_id, tenant_id, expiry_time_ms",
                ),
                index("totp_used_codes_user_id_index", &t.totp_used_codes, "app_id, user_id"),
                index("totp_used_codes_tenant_id_index", &t.totp_used_codes, "app_id, tenant_id"),
            ],
        },
        TableDefinition {
            name: &t.user_last_active,
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    app_id VARCHAR(64) NOT NULL DEFAULT 'public',
                    user_id VARCHAR(128) NOT NULL,
                    last_active_time BIGINT UNSIGNED,
                    PRIMARY KEY (app_id, user_id),
                    CONSTRAINT {app_fk} FOREIGN KEY (app_id)
                        REFERENCES {apps} (app_id) ON DELETE CASCADE
                )",
                table = t.user_last_active,
                apps = t.apps,
                app_fk = fk(&t.user_last_active, "app_id"),
            ),
            indexes: vec![index("user_last_active_app_id_index", &t.user_last_active, "app_id")],
        },
    ]
}
