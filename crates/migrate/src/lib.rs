//! # lineage-migrate: revision-graph schema migrations
//!
//! Revisions form a DAG through their `down_revision` and dependency edges.
//! The engine computes the ordered apply/revert sequence between the state a
//! database records and any target, then executes it in a transaction or
//! renders it as a SQL script.
//!
//! ```no_run
//! use lineage_core::MigrateConfig;
//! use lineage_migrate::{MigrationEnvironment, RevisionSpec};
//!
//! # async fn run() -> lineage_migrate::MigrateResult<()> {
//! let env = MigrationEnvironment::load(MigrateConfig::from_env()?)?;
//! let backend = env.connect().await?;
//! env.runner(None).upgrade(&backend, &RevisionSpec::Heads).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod context;
pub mod environment;
pub mod error;
pub mod graph;
pub mod history;
pub mod resolver;
pub mod revision;
pub mod runner;
pub mod schema;
pub mod spec;
pub mod store;
pub mod version;

pub use backends::{
    BackendType, MemoryBackend, MemoryState, MigrationBackend, MigrationTransaction,
    PostgresBackend,
};
pub use context::{ContextMode, Operations};
pub use environment::MigrationEnvironment;
pub use error::{MigrateError, MigrateResult};
pub use graph::RevisionGraph;
pub use history::{format_entry, History, Introspector, RevisionAnnotation};
pub use resolver::{MigrationPlan, PathResolver};
pub use revision::{Direction, FnScript, MigrationStep, Revision, RevisionScript, SqlScript};
pub use runner::{MigrationRunResult, MigrationRunner};
pub use schema::TableBuilder;
pub use spec::RevisionSpec;
pub use store::RevisionStore;
pub use version::{VersionStore, VersionTable};
