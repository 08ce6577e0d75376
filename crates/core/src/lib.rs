//! # lineage-core
//!
//! Configuration shared by the migration engine and the command line tool:
//! script locations, the version table, and constraint naming conventions.

pub mod config;

pub use config::{
    ConfigError, ConfigValidator, ConstraintKind, IdentifierValidator, MigrateConfig, NamingArgs,
    NamingConvention,
};
