//! Logging initialisation
//!
//! Logs go to stderr so rendered SQL on stdout stays clean. `RUST_LOG` wins
//! over the configured level.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lineage_core::MigrateConfig;

/// Logging configuration for the command line tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "warn")
    pub level: String,
    /// Enable JSON structured logging (vs plain text)
    pub json_format: bool,
    /// Include file and line number information
    pub include_location: bool,
    /// Environment filter (supports filters like "lineage_migrate=debug,sqlx=warn")
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_config(config: &MigrateConfig, json_format: bool) -> Self {
        Self {
            level: config.log_level.clone(),
            json_format,
            include_location: config.log_level == "debug" || config.log_level == "trace",
            env_filter: None,
        }
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        match &self.env_filter {
            Some(filter) => filter.clone(),
            None => format!(
                "lineage={level},lineage_migrate={level},lineage_core={level},sqlx=warn",
                level = self.level
            ),
        }
    }
}

/// Initialize logging for the process
pub fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.filter_directive()))?;

    let layer = Layer::new()
        .with_writer(io::stderr)
        .with_target(false)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()?;
    }

    tracing::debug!(
        "Logging initialized (level: {}, format: {})",
        config.level,
        if config.json_format { "JSON" } else { "text" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let config = LoggingConfig::from_config(&MigrateConfig::default(), false);
        assert_eq!(
            config.filter_directive(),
            "lineage=info,lineage_migrate=info,lineage_core=info,sqlx=warn"
        );

        let custom = LoggingConfig {
            env_filter: Some("lineage_migrate=trace".to_string()),
            ..LoggingConfig::default()
        };
        assert_eq!(custom.filter_directive(), "lineage_migrate=trace");
    }

    #[test]
    fn test_debug_level_includes_location() {
        let mut migrate = MigrateConfig::default();
        migrate.log_level = "debug".to_string();
        let config = LoggingConfig::from_config(&migrate, true);
        assert!(config.include_location);
        assert!(config.json_format);
    }
}
