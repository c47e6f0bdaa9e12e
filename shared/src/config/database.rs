//! Database configuration module

use serde::{Deserialize, Serialize};

/// MySQL connection and pool configuration for one storage scope
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Host name of the MySQL server
    pub host: String,

    /// Port of the MySQL server; omitted from the URL when unset
    pub port: Option<u16>,

    /// Full connection URI. When present it wins over the discrete fields.
    pub connection_uri: Option<String>,

    /// Database (schema) name
    pub database_name: String,

    /// User name
    pub user: String,

    /// Password (empty means none)
    pub password: Option<String>,

    /// Maximum number of connections in the pool
    pub connection_pool_size: u32,

    /// URL scheme, `mysql` or `mariadb`
    pub connection_scheme: String,

    /// Extra `key=value&key=value` connection attributes appended to the URL
    pub connection_attributes: String,

    /// Connect through a managed unix socket instead of host/port
    pub managed_socket: bool,

    /// Instance connection name used to derive the managed socket path
    pub instance_connection_name: Option<String>,

    /// Explicit managed socket path
    pub instance_unix_socket: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout: u64,

    /// Maximum lifetime of a connection in seconds
    pub max_lifetime: u64,

    /// Prepared statement cache capacity per connection
    pub statement_cache_capacity: usize,

    /// Enable SQL statement logging
    pub enable_logging: bool,

    /// Slow query threshold in milliseconds
    pub slow_query_threshold: u64,

    /// Prefix applied to every table name
    pub table_names_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: Some(3306),
            connection_uri: None,
            database_name: String::from("tenantvault"),
            user: String::from("root"),
            password: None,
            connection_pool_size: 10,
            connection_scheme: String::from("mysql"),
            connection_attributes: String::new(),
            managed_socket: false,
            instance_connection_name: None,
            instance_unix_socket: None,
            connect_timeout: 5,
            idle_timeout: 600,
            max_lifetime: 1800,
            statement_cache_capacity: 250,
            enable_logging: false,
            slow_query_threshold: default_slow_query_threshold(),
            table_names_prefix: String::new(),
        }
    }
}

impl DatabaseConfig {
    /// Create from environment variables
    ///
    /// Reads `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_CONNECTION_URI`, `MYSQL_DATABASE_NAME`,
    /// `MYSQL_USER`, `MYSQL_PASSWORD`, `MYSQL_CONNECTION_POOL_SIZE` and
    /// `MYSQL_TABLE_NAMES_PREFIX`. A `.env` file is honoured when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port = match std::env::var("MYSQL_PORT") {
            Ok(value) if value == "-1" => None,
            Ok(value) => value.parse().ok().or(defaults.port),
            Err(_) => defaults.port,
        };
        let connection_pool_size = std::env::var("MYSQL_CONNECTION_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(defaults.connection_pool_size);

        Self {
            host: std::env::var("MYSQL_HOST").unwrap_or(defaults.host),
            port,
            connection_uri: std::env::var("MYSQL_CONNECTION_URI").ok(),
            database_name: std::env::var("MYSQL_DATABASE_NAME").unwrap_or(defaults.database_name),
            user: std::env::var("MYSQL_USER").unwrap_or(defaults.user),
            password: std::env::var("MYSQL_PASSWORD").ok(),
            connection_pool_size,
            table_names_prefix: std::env::var("MYSQL_TABLE_NAMES_PREFIX").unwrap_or_default(),
            ..defaults
        }
    }

    /// Create a configuration for the given host and database
    pub fn new(host: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database_name: database_name.into(),
            ..Default::default()
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the credentials
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = Some(password.into());
        self
    }

    /// Set the maximum number of connections
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.connection_pool_size = size;
        self
    }

    /// Set the table name prefix
    pub fn with_table_names_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_names_prefix = prefix.into();
        self
    }

    /// Enable SQL query logging
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// Connection URL built from the discrete fields:
    /// `{scheme}://{host}[:{port}]/{database}[?{attributes}]`
    pub fn host_url(&self) -> String {
        let port = self.port.map(|p| format!(":{}", p)).unwrap_or_default();
        let attributes = if self.connection_attributes.is_empty() {
            String::new()
        } else {
            format!("?{}", self.connection_attributes)
        };
        format!(
            "{}://{}{}/{}{}",
            self.connection_scheme, self.host, port, self.database_name, attributes
        )
    }

    /// Path of the managed unix socket, if one can be derived
    pub fn managed_socket_path(&self) -> Option<String> {
        self.instance_unix_socket.clone().or_else(|| {
            self.instance_connection_name
                .as_ref()
                .map(|name| format!("/cloudsql/{}", name))
        })
    }

    /// Password, treating an empty string as absent
    pub fn effective_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

fn default_slow_query_threshold() -> u64 {
    1000 // 1 second
}
