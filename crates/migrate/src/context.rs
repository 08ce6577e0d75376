//! Schema-modification context handed to revision scripts
//!
//! Scripts never talk to a connection directly. They describe their changes
//! through [`Operations`]; the runner then either executes the collected
//! statements on the open transaction or renders them as SQL text.

use lineage_core::{ConstraintKind, NamingArgs, NamingConvention};

use crate::error::MigrateResult;
use crate::revision::Direction;
use crate::schema::TableBuilder;

/// Whether statements will be executed or rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Online,
    Offline,
}

/// Operations available to a revision script
pub struct Operations<'a> {
    revision: &'a str,
    direction: Direction,
    mode: ContextMode,
    naming: &'a NamingConvention,
    tag: Option<&'a str>,
    statements: Vec<String>,
}

impl<'a> Operations<'a> {
    pub fn new(
        revision: &'a str,
        direction: Direction,
        mode: ContextMode,
        naming: &'a NamingConvention,
        tag: Option<&'a str>,
    ) -> Self {
        Self {
            revision,
            direction,
            mode,
            naming,
            tag,
            statements: Vec::new(),
        }
    }

    /// Id of the revision being run
    pub fn revision(&self) -> &str {
        self.revision
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True when statements are rendered instead of executed
    pub fn is_offline(&self) -> bool {
        self.mode == ContextMode::Offline
    }

    /// Opaque value passed through from the command line `--tag`
    pub fn tag(&self) -> Option<&str> {
        self.tag
    }

    pub fn naming_convention(&self) -> &NamingConvention {
        self.naming
    }

    /// Statements collected so far
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub(crate) fn into_statements(self) -> Vec<String> {
        self.statements
    }

    /// Queue a raw SQL statement
    pub fn execute(&mut self, sql: impl Into<String>) -> &mut Self {
        let sql = sql.into();
        let trimmed = sql.trim().trim_end_matches(';').trim_end();
        if !trimmed.is_empty() {
            self.statements.push(trimmed.to_string());
        }
        self
    }

    /// Create a new table
    pub fn create_table<F>(&mut self, table_name: &str, callback: F) -> MigrateResult<&mut Self>
    where
        F: FnOnce(&mut TableBuilder<'_>),
    {
        let mut table = TableBuilder::new(table_name, self.naming);
        callback(&mut table);
        let sql = table.to_sql()?;
        Ok(self.execute(sql))
    }

    /// Drop a table
    pub fn drop_table(&mut self, table_name: &str) -> &mut Self {
        self.execute(format!("DROP TABLE IF EXISTS {}", table_name))
    }

    /// Rename a table
    pub fn rename_table(&mut self, from: &str, to: &str) -> &mut Self {
        self.execute(format!("ALTER TABLE {} RENAME TO {}", from, to))
    }

    /// Add a column to existing table
    pub fn add_column(&mut self, table_name: &str, column_name: &str, column_type: &str) -> &mut Self {
        self.execute(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table_name, column_name, column_type
        ))
    }

    /// Drop a column from existing table
    pub fn drop_column(&mut self, table_name: &str, column_name: &str) -> &mut Self {
        self.execute(format!("ALTER TABLE {} DROP COLUMN {}", table_name, column_name))
    }

    /// Create an index, named by convention unless a name is given
    pub fn create_index(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        index_name: Option<&str>,
    ) -> MigrateResult<&mut Self> {
        let name = self.constraint_name(
            ConstraintKind::Index,
            index_name,
            &NamingArgs::new(table_name, column_names),
        )?;
        Ok(self.execute(format!(
            "CREATE INDEX {} ON {} ({})",
            name,
            table_name,
            column_names.join(", ")
        )))
    }

    /// Drop an index
    pub fn drop_index(&mut self, index_name: &str) -> &mut Self {
        self.execute(format!("DROP INDEX IF EXISTS {}", index_name))
    }

    /// Add a unique constraint to an existing table
    pub fn create_unique_constraint(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        constraint_name: Option<&str>,
    ) -> MigrateResult<&mut Self> {
        let name = self.constraint_name(
            ConstraintKind::Unique,
            constraint_name,
            &NamingArgs::new(table_name, column_names),
        )?;
        Ok(self.execute(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            table_name,
            name,
            column_names.join(", ")
        )))
    }

    /// Add a foreign key to an existing table
    pub fn create_foreign_key(
        &mut self,
        table_name: &str,
        column_names: &[&str],
        referred_table: &str,
        referred_columns: &[&str],
        constraint_name: Option<&str>,
    ) -> MigrateResult<&mut Self> {
        let args = NamingArgs::new(table_name, column_names).with_referred(referred_table, referred_columns);
        let name = self.constraint_name(ConstraintKind::ForeignKey, constraint_name, &args)?;
        Ok(self.execute(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            table_name,
            name,
            column_names.join(", "),
            referred_table,
            referred_columns.join(", ")
        )))
    }

    /// Add a check constraint; `name` feeds the `constraint_name` placeholder
    pub fn create_check_constraint(
        &mut self,
        table_name: &str,
        name: &str,
        condition: &str,
    ) -> MigrateResult<&mut Self> {
        let args = NamingArgs::new(table_name, &[]).with_constraint_name(name);
        let name = self.naming.render(ConstraintKind::Check, &args)?;
        Ok(self.execute(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            table_name, name, condition
        )))
    }

    /// Drop a named constraint
    pub fn drop_constraint(&mut self, table_name: &str, constraint_name: &str) -> &mut Self {
        self.execute(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            table_name, constraint_name
        ))
    }

    fn constraint_name(
        &self,
        kind: ConstraintKind,
        explicit: Option<&str>,
        args: &NamingArgs<'_>,
    ) -> MigrateResult<String> {
        match explicit {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.naming.render(kind, args)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(naming: &NamingConvention) -> Operations<'_> {
        Operations::new("1a2b", Direction::Upgrade, ContextMode::Online, naming, Some("ci"))
    }

    #[test]
    fn test_execute_normalizes_statements() {
        let naming = NamingConvention::default();
        let mut op = ops(&naming);
        op.execute("  CREATE TABLE t (id INT);  ").execute("   ").execute(";");

        assert_eq!(op.statements(), &["CREATE TABLE t (id INT)".to_string()]);
        assert_eq!(op.tag(), Some("ci"));
        assert!(!op.is_offline());
    }

    #[test]
    fn test_generated_names_follow_convention() {
        let naming = NamingConvention::default();
        let mut op = ops(&naming);
        op.create_index("users", &["email"], None).unwrap();
        op.create_unique_constraint("users", &["tenant_id", "email"], None)
            .unwrap();
        op.create_foreign_key("posts", &["user_id"], "users", &["id"], None)
            .unwrap();
        op.create_check_constraint("posts", "score_positive", "score > 0")
            .unwrap();
        op.create_index("users", &["name"], Some("users_by_name")).unwrap();

        let statements = op.into_statements();
        assert_eq!(statements[0], "CREATE INDEX ix_email ON users (email)");
        assert_eq!(
            statements[1],
            "ALTER TABLE users ADD CONSTRAINT uq_users_tenant_id_email UNIQUE (tenant_id, email)"
        );
        assert_eq!(
            statements[2],
            "ALTER TABLE posts ADD CONSTRAINT fk_posts_user_id_users FOREIGN KEY (user_id) REFERENCES users (id)"
        );
        assert_eq!(
            statements[3],
            "ALTER TABLE posts ADD CONSTRAINT ck_posts_score_positive CHECK (score > 0)"
        );
        assert_eq!(statements[4], "CREATE INDEX users_by_name ON users (name)");
    }

    #[test]
    fn test_create_table_uses_builder() {
        let naming = NamingConvention::default();
        let mut op = ops(&naming);
        op.create_table("users", |table| {
            table.id("id");
            table.string("email", Some(255));
            table.unique(&["email"]);
        })
        .unwrap();

        let sql = &op.statements()[0];
        assert!(sql.contains("CREATE TABLE users"));
        assert!(sql.contains("CONSTRAINT uq_users_email UNIQUE (email)"));
    }
}
