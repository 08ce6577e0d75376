//! Migration environment
//!
//! Bundles the configuration with the revision graph loaded from it. Build it
//! once per process and hand out references; runners and introspectors borrow
//! the graph from here.

use std::collections::BTreeSet;

use lineage_core::{ConfigError, MigrateConfig};

use crate::backends::{BackendType, MigrationBackend, PostgresBackend};
use crate::error::{MigrateError, MigrateResult};
use crate::graph::RevisionGraph;
use crate::history::Introspector;
use crate::runner::MigrationRunner;
use crate::store::RevisionStore;
use crate::version::{VersionStore, VersionTable};

/// Configuration plus the revision graph it describes
#[derive(Debug)]
pub struct MigrationEnvironment {
    config: MigrateConfig,
    graph: RevisionGraph,
}

impl MigrationEnvironment {
    /// Validate `config` and load revisions from its script locations
    pub fn load(config: MigrateConfig) -> MigrateResult<Self> {
        Self::with_store(config, RevisionStore::new())
    }

    /// Like [`load`](Self::load), keeping revisions already registered on `store`
    pub fn with_store(config: MigrateConfig, store: RevisionStore) -> MigrateResult<Self> {
        config.validate()?;
        let graph = store.load(&config.script_locations)?;
        tracing::debug!(
            revisions = graph.len(),
            heads = graph.heads().len(),
            "migration environment ready"
        );
        Ok(Self { config, graph })
    }

    /// Use an already built graph
    pub fn from_graph(config: MigrateConfig, graph: RevisionGraph) -> Self {
        Self { config, graph }
    }

    pub fn graph(&self) -> &RevisionGraph {
        &self.graph
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn version_table(&self) -> VersionTable {
        VersionTable::from_config(&self.config)
    }

    /// Runner configured from the environment
    pub fn runner(&self, tag: Option<&str>) -> MigrationRunner<'_> {
        let runner = MigrationRunner::from_config(&self.graph, &self.config);
        match tag {
            Some(tag) => runner.with_tag(tag),
            None => runner,
        }
    }

    pub fn introspect(&self) -> Introspector<'_> {
        Introspector::new(&self.graph)
    }

    /// Connect to the configured database
    pub async fn connect(&self) -> MigrateResult<PostgresBackend> {
        let url = self.config.database_url.as_deref().ok_or_else(|| {
            MigrateError::Config(ConfigError::missing_required(
                "database_url",
                "Set LINEAGE_DATABASE_URL or pass --database-url",
            ))
        })?;
        match BackendType::from_url(url) {
            Some(BackendType::PostgreSQL) => {}
            _ => {
                return Err(MigrateError::Config(ConfigError::invalid_value(
                    "database_url",
                    url,
                    "a postgres:// or postgresql:// connection string",
                )))
            }
        }
        PostgresBackend::connect(url, self.version_table()).await
    }

    /// Heads recorded by `backend`
    pub async fn current(&self, backend: &dyn MigrationBackend) -> MigrateResult<BTreeSet<String>> {
        let mut tx = backend.begin().await?;
        let heads = tx.get_current_heads().await;
        tx.rollback().await?;
        heads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::spec::RevisionSpec;
    use std::fs;
    use tempfile::TempDir;

    fn write_revisions(dir: &TempDir) {
        fs::write(
            dir.path().join("001_a.sql"),
            "-- Revision: a\n-- Up migration\nCREATE TABLE a (id INT);\n-- Down migration\nDROP TABLE a;\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("002_b.sql"),
            "-- Revision: b\n-- Down-Revision: a\n-- Up migration\nCREATE TABLE b (id INT);\n-- Down migration\nDROP TABLE b;\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_environment_runs_upgrade() {
        let dir = TempDir::new().unwrap();
        write_revisions(&dir);

        let config = MigrateConfig::new().with_script_locations([dir.path()]);
        let env = MigrationEnvironment::load(config).unwrap();
        assert_eq!(env.graph().len(), 2);

        let backend = MemoryBackend::new();
        env.runner(Some("ci"))
            .upgrade(&backend, &RevisionSpec::Heads)
            .await
            .unwrap();

        let current = env.current(&backend).await.unwrap();
        assert_eq!(current, BTreeSet::from(["b".to_string()]));
        assert_eq!(env.introspect().current(&current).unwrap()[0].id(), "b");
    }

    #[tokio::test]
    async fn test_connect_requires_database_url() {
        let dir = TempDir::new().unwrap();
        write_revisions(&dir);

        let env = MigrationEnvironment::load(MigrateConfig::new().with_script_locations([dir.path()]))
            .unwrap();
        let err = env.connect().await.unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[tokio::test]
    async fn test_connect_rejects_other_databases() {
        let dir = TempDir::new().unwrap();
        write_revisions(&dir);

        for url in ["mysql://localhost/app", "memory://", "localhost:5432"] {
            let config = MigrateConfig::new()
                .with_script_locations([dir.path()])
                .with_database_url(url);
            let env = MigrationEnvironment::load(config).unwrap();
            match env.connect().await {
                Err(MigrateError::Config(ConfigError::InvalidValue { field, .. })) => {
                    assert_eq!(field, "database_url");
                }
                other => panic!("{url}: expected a config error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MigrateConfig::new().with_version_table("bad table");
        assert!(matches!(
            MigrationEnvironment::load(config),
            Err(MigrateError::Config(_))
        ));
    }
}
