//! Configuration module
//!
//! - `database` - MySQL connection and pool configuration
//! - `tables` - Table naming (with optional per-deployment prefix)
//!
//! The host owns where configuration comes from; [`StorageConfig::load`] layers an
//! optional file and `TENANTVAULT__*` environment variables over the defaults.

pub mod database;
pub mod tables;

use serde::{Deserialize, Serialize};

pub use database::DatabaseConfig;
pub use tables::TableNames;

/// Complete storage configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database configuration
    pub database: DatabaseConfig,
}

impl StorageConfig {
    /// Load configuration from an optional file (any format the `config` crate
    /// understands) overlaid with `TENANTVAULT__DATABASE__*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix("TENANTVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Table names resolved from the configured prefix
    pub fn table_names(&self) -> TableNames {
        TableNames::with_prefix(&self.database.table_names_prefix)
    }
}
