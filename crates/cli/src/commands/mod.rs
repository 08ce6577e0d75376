pub mod inspect;
pub mod migrate;

use std::path::{Path, PathBuf};

use lineage_core::MigrateConfig;
use lineage_migrate::{MigrateResult, MigrationEnvironment};

/// Configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "lineage.yaml";

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub script_locations: Vec<PathBuf>,
    pub database_url: Option<String>,
    pub json: bool,
}

/// Resolve configuration: file (or environment only), then command line flags
pub fn load_config(args: &GlobalArgs) -> MigrateResult<MigrateConfig> {
    let file = args
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()));

    let mut config = match file {
        Some(path) => MigrateConfig::from_file(&path)?,
        None => {
            let mut config = MigrateConfig::default();
            config.apply_env()?;
            config
        }
    };

    if !args.script_locations.is_empty() {
        config.script_locations = args.script_locations.clone();
    }
    if let Some(url) = &args.database_url {
        config.database_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

pub fn environment(config: MigrateConfig) -> MigrateResult<MigrationEnvironment> {
    MigrationEnvironment::load(config)
}

/// Print a path relative to the working directory when possible
pub(crate) fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("migrate.yaml");
        fs::write(
            &file,
            "script_locations: [db/revisions]\nversion_table: schema_heads\ndatabase_url: postgres://file/db\n",
        )
        .unwrap();

        let args = GlobalArgs {
            config: Some(file),
            script_locations: vec![PathBuf::from("other")],
            database_url: Some("postgres://flag/db".to_string()),
            json: false,
        };
        let config = load_config(&args).unwrap();

        assert_eq!(config.script_locations, vec![PathBuf::from("other")]);
        assert_eq!(config.database_url.as_deref(), Some("postgres://flag/db"));
        assert_eq!(config.version_table, "schema_heads");
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_an_error() {
        let args = GlobalArgs {
            config: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..GlobalArgs::default()
        };
        let err = load_config(&args).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    #[serial]
    fn test_invalid_flag_value_is_rejected() {
        let args = GlobalArgs {
            database_url: Some("  ".to_string()),
            ..GlobalArgs::default()
        };
        assert!(load_config(&args).is_err());
    }
}
