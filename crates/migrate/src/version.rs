//! Version table
//!
//! The database records the applied state as one row per head revision.
//! [`VersionStore`] is the read/replace interface over that set;
//! [`VersionTable`] generates the SQL for it.

use async_trait::async_trait;
use std::collections::BTreeSet;

use lineage_core::MigrateConfig;

use crate::error::MigrateResult;

/// Column holding the revision ids
pub const VERSION_COLUMN: &str = "version_num";

/// Persistent set of head revision ids
///
/// The store enforces nothing about the set it holds; consistency with the
/// revision graph is checked by the resolver.
#[async_trait]
pub trait VersionStore: Send {
    /// Heads currently recorded
    async fn get_current_heads(&mut self) -> MigrateResult<BTreeSet<String>>;

    /// Replace the recorded heads with `heads`
    async fn set_heads(&mut self, heads: &BTreeSet<String>) -> MigrateResult<()>;
}

/// Name and SQL of the version table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTable {
    name: String,
    schema: Option<String>,
}

impl VersionTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self {
            name: config.version_table.clone(),
            schema: config.version_table_schema.clone(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Schema-qualified table name
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {} VARCHAR(255) NOT NULL,\n    CONSTRAINT {}_pkc PRIMARY KEY ({})\n)",
            self.qualified_name(),
            VERSION_COLUMN,
            self.name,
            VERSION_COLUMN
        )
    }

    pub fn select_sql(&self) -> String {
        format!("SELECT {} FROM {}", VERSION_COLUMN, self.qualified_name())
    }

    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {}", self.qualified_name())
    }

    /// Parameterised insert of a single id
    pub fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ($1)",
            self.qualified_name(),
            VERSION_COLUMN
        )
    }

    /// Insert with the id inlined, for rendered scripts
    pub fn render_insert(&self, revision: &str) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_name(),
            VERSION_COLUMN,
            quote_literal(revision)
        )
    }

    /// Statements replacing the recorded heads, with ids inlined
    pub fn render_set_heads(&self, heads: &BTreeSet<String>) -> Vec<String> {
        std::iter::once(self.delete_sql())
            .chain(heads.iter().map(|id| self.render_insert(id)))
            .collect()
    }
}

impl Default for VersionTable {
    fn default() -> Self {
        Self::from_config(&MigrateConfig::default())
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_uses_qualified_name() {
        let table = VersionTable::new("lineage_version").with_schema("ops");

        assert_eq!(table.qualified_name(), "ops.lineage_version");
        assert_eq!(table.select_sql(), "SELECT version_num FROM ops.lineage_version");
        assert_eq!(
            table.insert_sql(),
            "INSERT INTO ops.lineage_version (version_num) VALUES ($1)"
        );
        assert!(table
            .create_sql()
            .starts_with("CREATE TABLE IF NOT EXISTS ops.lineage_version"));
        assert!(table.create_sql().contains("version_num VARCHAR(255) NOT NULL"));
    }

    #[test]
    fn test_rendered_inserts_escape_quotes() {
        let table = VersionTable::new("v");
        assert_eq!(
            table.render_insert("o'brien"),
            "INSERT INTO v (version_num) VALUES ('o''brien')"
        );
    }

    #[test]
    fn test_render_set_heads_clears_first() {
        let table = VersionTable::new("v");
        let heads: BTreeSet<String> = ["b2".to_string(), "a1".to_string()].into();

        assert_eq!(
            table.render_set_heads(&heads),
            vec![
                "DELETE FROM v".to_string(),
                "INSERT INTO v (version_num) VALUES ('a1')".to_string(),
                "INSERT INTO v (version_num) VALUES ('b2')".to_string(),
            ]
        );
    }

    #[test]
    fn test_from_config() {
        let config = MigrateConfig::default().with_version_table("alembic_version");
        let table = VersionTable::from_config(&config);
        assert_eq!(table.name(), "alembic_version");
        assert_eq!(table.schema(), None);
    }
}
