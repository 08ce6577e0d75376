//! Constraint naming conventions
//!
//! Templates use `{placeholder}` tokens. Supported placeholders are
//! `table_name`, `column_0_name`, `column_0_N_name` (all columns joined with
//! `_`), `constraint_name`, `referred_table_name` and
//! `referred_column_0_name`.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Kind of generated database object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Index,
    Unique,
    Check,
    ForeignKey,
    PrimaryKey,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ConstraintKind::Index => "ix",
            ConstraintKind::Unique => "uq",
            ConstraintKind::Check => "ck",
            ConstraintKind::ForeignKey => "fk",
            ConstraintKind::PrimaryKey => "pk",
        };
        write!(f, "{}", kind)
    }
}

/// Values available to a naming template
#[derive(Debug, Clone, Default)]
pub struct NamingArgs<'a> {
    pub table_name: &'a str,
    pub columns: &'a [&'a str],
    pub constraint_name: Option<&'a str>,
    pub referred_table_name: Option<&'a str>,
    pub referred_columns: &'a [&'a str],
}

impl<'a> NamingArgs<'a> {
    pub fn new(table_name: &'a str, columns: &'a [&'a str]) -> Self {
        Self {
            table_name,
            columns,
            ..Default::default()
        }
    }

    pub fn with_constraint_name(mut self, name: &'a str) -> Self {
        self.constraint_name = Some(name);
        self
    }

    pub fn with_referred(mut self, table: &'a str, columns: &'a [&'a str]) -> Self {
        self.referred_table_name = Some(table);
        self.referred_columns = columns;
        self
    }
}

/// Templates for generated constraint and index names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub index: String,
    pub unique: String,
    pub check: String,
    pub foreign_key: String,
    pub primary_key: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            index: "ix_{column_0_N_name}".to_string(),
            unique: "uq_{table_name}_{column_0_N_name}".to_string(),
            check: "ck_{table_name}_{constraint_name}".to_string(),
            foreign_key: "fk_{table_name}_{column_0_N_name}_{referred_table_name}".to_string(),
            primary_key: "pk_{table_name}".to_string(),
        }
    }
}

impl NamingConvention {
    /// Get the template for a constraint kind
    pub fn template(&self, kind: ConstraintKind) -> &str {
        match kind {
            ConstraintKind::Index => &self.index,
            ConstraintKind::Unique => &self.unique,
            ConstraintKind::Check => &self.check,
            ConstraintKind::ForeignKey => &self.foreign_key,
            ConstraintKind::PrimaryKey => &self.primary_key,
        }
    }

    /// Render the name for a constraint of the given kind
    pub fn render(&self, kind: ConstraintKind, args: &NamingArgs<'_>) -> Result<String, ConfigError> {
        render_template(self.template(kind), args)
    }

    /// Check every template only uses known placeholders
    pub fn validate(&self) -> Result<(), ConfigError> {
        let columns = ["column"];
        let sample = NamingArgs::new("table", &columns)
            .with_constraint_name("name")
            .with_referred("other", &columns);

        for kind in [
            ConstraintKind::Index,
            ConstraintKind::Unique,
            ConstraintKind::Check,
            ConstraintKind::ForeignKey,
            ConstraintKind::PrimaryKey,
        ] {
            self.render(kind, &sample)?;
        }
        Ok(())
    }
}

fn render_template(template: &str, args: &NamingArgs<'_>) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ConfigError::invalid_value("naming_convention", template, "balanced {placeholder} tokens")
        })?;
        let placeholder = &after[..end];
        output.push_str(&placeholder_value(template, placeholder, args)?);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn placeholder_value(
    template: &str,
    placeholder: &str,
    args: &NamingArgs<'_>,
) -> Result<String, ConfigError> {
    let missing = |argument: &str| ConfigError::MissingNamingArgument {
        template: template.to_string(),
        argument: argument.to_string(),
    };

    match placeholder {
        "table_name" => Ok(args.table_name.to_string()),
        "column_0_name" => args
            .columns
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| missing("column_0_name")),
        "column_0_N_name" => {
            if args.columns.is_empty() {
                Err(missing("column_0_N_name"))
            } else {
                Ok(args.columns.join("_"))
            }
        }
        "constraint_name" => args
            .constraint_name
            .map(str::to_string)
            .ok_or_else(|| missing("constraint_name")),
        "referred_table_name" => args
            .referred_table_name
            .map(str::to_string)
            .ok_or_else(|| missing("referred_table_name")),
        "referred_column_0_name" => args
            .referred_columns
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| missing("referred_column_0_name")),
        other => Err(ConfigError::UnknownPlaceholder {
            template: template.to_string(),
            placeholder: other.to_string(),
        }),
    }
}
