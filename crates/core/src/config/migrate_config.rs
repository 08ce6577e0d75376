use crate::config::{ConfigError, ConfigValidator, IdentifierValidator, NamingConvention};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding comma separated script directories
pub const ENV_SCRIPT_LOCATIONS: &str = "LINEAGE_SCRIPT_LOCATIONS";
pub const ENV_DATABASE_URL: &str = "LINEAGE_DATABASE_URL";
pub const ENV_VERSION_TABLE: &str = "LINEAGE_VERSION_TABLE";
pub const ENV_VERSION_TABLE_SCHEMA: &str = "LINEAGE_VERSION_TABLE_SCHEMA";
pub const ENV_TRANSACTION_PER_MIGRATION: &str = "LINEAGE_TRANSACTION_PER_MIGRATION";
pub const ENV_LOG_LEVEL: &str = "LINEAGE_LOG_LEVEL";

/// Configuration for the migration engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Directories containing revision files, searched in order
    pub script_locations: Vec<PathBuf>,
    /// Connection string for online mode
    pub database_url: Option<String>,
    /// Table recording the applied heads
    pub version_table: String,
    /// Schema of the version table
    pub version_table_schema: Option<String>,
    /// Commit after every revision instead of once per run
    pub transaction_per_migration: bool,
    /// Templates for generated constraint names
    pub naming_convention: NamingConvention,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            script_locations: vec![PathBuf::from("migrations")],
            database_url: None,
            version_table: "lineage_version".to_string(),
            version_table_schema: None,
            transaction_per_migration: false,
            naming_convention: NamingConvention::default(),
            log_level: "info".to_string(),
        }
    }
}

impl MigrateConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: MigrateConfig = serde_yaml::from_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "loaded migration configuration");
        Ok(config)
    }

    /// Builder-style override of the script locations
    pub fn with_script_locations<I, P>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.script_locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style override of the database URL
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builder-style override of the version table name
    pub fn with_version_table(mut self, table: impl Into<String>) -> Self {
        self.version_table = table.into();
        self
    }

    /// Overlay values found in the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(locations) = env::var(ENV_SCRIPT_LOCATIONS) {
            let parsed: Vec<PathBuf> = locations
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect();
            if parsed.is_empty() {
                return Err(ConfigError::invalid_value(
                    ENV_SCRIPT_LOCATIONS,
                    locations,
                    "a comma separated list of directories",
                ));
            }
            self.script_locations = parsed;
        }

        if let Ok(url) = env::var(ENV_DATABASE_URL).or_else(|_| env::var("DATABASE_URL")) {
            self.database_url = Some(url);
        }

        if let Ok(table) = env::var(ENV_VERSION_TABLE) {
            self.version_table = table;
        }

        if let Ok(schema) = env::var(ENV_VERSION_TABLE_SCHEMA) {
            self.version_table_schema = Some(schema);
        }

        if let Ok(flag) = env::var(ENV_TRANSACTION_PER_MIGRATION) {
            self.transaction_per_migration = parse_bool(ENV_TRANSACTION_PER_MIGRATION, &flag)?;
        }

        if let Ok(level) = env::var(ENV_LOG_LEVEL) {
            self.log_level = level;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.script_locations.is_empty() {
            return Err(ConfigError::missing_required(
                "script_locations",
                format!("Set {} or list directories in the config file", ENV_SCRIPT_LOCATIONS),
            ));
        }

        IdentifierValidator::new("version_table").validate(&self.version_table)?;
        if let Some(schema) = &self.version_table_schema {
            IdentifierValidator::new("version_table_schema").validate(schema)?;
        }

        if let Some(url) = &self.database_url {
            if url.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "database_url",
                    url.clone(),
                    "a non-empty connection string",
                ));
            }
        }

        self.naming_convention.validate()?;
        Ok(())
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(field, value, "true or false")),
    }
}
