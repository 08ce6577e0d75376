//! Table builder for CREATE TABLE statements issued from revision scripts
//!
//! Constraints are named through the configured [`NamingConvention`], so the
//! same revision produces identical names online and offline.

use lineage_core::{ConstraintKind, NamingArgs, NamingConvention};

use crate::error::MigrateResult;

enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        references_table: String,
        references_columns: Vec<String>,
    },
    Check {
        name: String,
        condition: String,
    },
}

/// Table builder for CREATE TABLE statements
pub struct TableBuilder<'a> {
    table_name: String,
    columns: Vec<String>,
    constraints: Vec<TableConstraint>,
    naming: &'a NamingConvention,
}

impl<'a> TableBuilder<'a> {
    pub fn new(table_name: &str, naming: &'a NamingConvention) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: Vec::new(),
            constraints: Vec::new(),
            naming,
        }
    }

    /// Add a column
    pub fn column(&mut self, name: &str, column_type: &str) -> &mut Self {
        self.columns.push(format!("{} {}", name, column_type));
        self
    }

    /// Add an ID column (auto-increment primary key)
    pub fn id(&mut self, name: &str) -> &mut Self {
        self.columns.push(format!("{} SERIAL NOT NULL", name));
        self.constraints
            .push(TableConstraint::PrimaryKey(vec![name.to_string()]));
        self
    }

    /// Add a string column
    pub fn string(&mut self, name: &str, length: Option<u32>) -> &mut Self {
        let column_type = match length {
            Some(len) => format!("VARCHAR({})", len),
            None => "TEXT".to_string(),
        };
        self.column(name, &column_type)
    }

    /// Add an integer column
    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.column(name, "INTEGER")
    }

    /// Add a boolean column
    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.column(name, "BOOLEAN")
    }

    /// Add timestamp columns
    pub fn timestamps(&mut self) -> &mut Self {
        self.columns
            .push("created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP".to_string());
        self.columns
            .push("updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP".to_string());
        self
    }

    /// Add a primary key constraint
    pub fn primary_key(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints
            .push(TableConstraint::PrimaryKey(to_owned(columns)));
        self
    }

    /// Add a foreign key constraint
    pub fn foreign_key(
        &mut self,
        column: &str,
        references_table: &str,
        references_column: &str,
    ) -> &mut Self {
        self.constraints.push(TableConstraint::ForeignKey {
            columns: vec![column.to_string()],
            references_table: references_table.to_string(),
            references_columns: vec![references_column.to_string()],
        });
        self
    }

    /// Add a unique constraint
    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.constraints.push(TableConstraint::Unique(to_owned(columns)));
        self
    }

    /// Add a named check constraint
    pub fn check(&mut self, name: &str, condition: &str) -> &mut Self {
        self.constraints.push(TableConstraint::Check {
            name: name.to_string(),
            condition: condition.to_string(),
        });
        self
    }

    /// Build the CREATE TABLE SQL
    pub fn to_sql(&self) -> MigrateResult<String> {
        let mut parts = self.columns.clone();
        for constraint in &self.constraints {
            parts.push(self.render_constraint(constraint)?);
        }

        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.table_name,
            parts.join(",\n    ")
        ))
    }

    fn render_constraint(&self, constraint: &TableConstraint) -> MigrateResult<String> {
        let table = self.table_name.as_str();
        let sql = match constraint {
            TableConstraint::PrimaryKey(columns) => {
                let cols = borrowed(columns);
                let name = self
                    .naming
                    .render(ConstraintKind::PrimaryKey, &NamingArgs::new(table, &cols))?;
                format!("CONSTRAINT {} PRIMARY KEY ({})", name, columns.join(", "))
            }
            TableConstraint::Unique(columns) => {
                let cols = borrowed(columns);
                let name = self
                    .naming
                    .render(ConstraintKind::Unique, &NamingArgs::new(table, &cols))?;
                format!("CONSTRAINT {} UNIQUE ({})", name, columns.join(", "))
            }
            TableConstraint::ForeignKey {
                columns,
                references_table,
                references_columns,
            } => {
                let cols = borrowed(columns);
                let referred = borrowed(references_columns);
                let args = NamingArgs::new(table, &cols).with_referred(references_table, &referred);
                let name = self.naming.render(ConstraintKind::ForeignKey, &args)?;
                format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    name,
                    columns.join(", "),
                    references_table,
                    references_columns.join(", ")
                )
            }
            TableConstraint::Check { name, condition } => {
                let args = NamingArgs::new(table, &[]).with_constraint_name(name);
                let name = self.naming.render(ConstraintKind::Check, &args)?;
                format!("CONSTRAINT {} CHECK ({})", name, condition)
            }
        };
        Ok(sql)
    }
}

fn to_owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn borrowed(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}
