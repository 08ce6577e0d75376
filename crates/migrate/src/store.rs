//! Revision store - loading revisions from script locations
//!
//! A revision file is plain SQL with a comment header:
//!
//! ```sql
//! -- Revision: 27c6a30d7c24
//! -- Down-Revision: ae1027a6acf
//! -- Depends-On: 1975ea83b712
//! -- Branch-Labels: accounts
//! -- Message: add account table
//! -- Create Date: 2024-03-01 12:00:00
//!
//! -- Up migration
//! CREATE TABLE account (id INT PRIMARY KEY);
//!
//! -- Down migration
//! DROP TABLE account;
//! ```

use chrono::NaiveDateTime;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, MigrateResult};
use crate::graph::RevisionGraph;
use crate::revision::{Revision, SqlScript};

/// Format of the `Create Date` header
pub const CREATE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collects revisions from disk and code and builds the graph
#[derive(Debug, Default)]
pub struct RevisionStore {
    registered: Vec<Revision>,
}

impl RevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a revision defined in code; it loads after every file revision
    pub fn register(&mut self, revision: Revision) -> &mut Self {
        self.registered.push(revision);
        self
    }

    /// Read every `*.sql` file under `directories` and build the graph
    ///
    /// Files load in file-name order within a directory, directories in the
    /// order given. That sequence is the load order used for tie-breaking.
    pub fn load<P: AsRef<Path>>(self, directories: &[P]) -> MigrateResult<RevisionGraph> {
        let mut revisions = Vec::new();
        for directory in directories {
            revisions.extend(load_directory(directory.as_ref())?);
        }
        revisions.extend(self.registered);

        tracing::debug!(count = revisions.len(), "loaded revisions");
        RevisionGraph::from_revisions(revisions)
    }
}

fn load_directory(directory: &Path) -> MigrateResult<Vec<Revision>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "sql") {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths.iter().map(|path| parse_revision_file(path)).collect()
}

/// Parse a single revision file
pub fn parse_revision_file(path: &Path) -> MigrateResult<Revision> {
    let content = fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| parse_error(path, "invalid revision file name"))?;

    parse_revision_source(stem, path, &content)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Up,
    Down,
}

#[derive(Default)]
struct Header {
    id: Option<String>,
    down_revisions: Vec<String>,
    dependencies: Vec<String>,
    branch_labels: Vec<String>,
    message: Option<String>,
    create_date: Option<NaiveDateTime>,
    own_transaction: bool,
}

fn parse_revision_source(stem: &str, path: &Path, content: &str) -> MigrateResult<Revision> {
    let mut header = Header::default();
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut section = Section::Header;
    let mut saw_up = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = trimmed.strip_prefix("--") {
            let comment = comment.trim();
            let lowered = comment.to_lowercase();
            if lowered == "up" || lowered.starts_with("up migration") {
                section = Section::Up;
                saw_up = true;
                continue;
            }
            if lowered == "down" || lowered.starts_with("down migration") {
                section = Section::Down;
                continue;
            }
            if section == Section::Header {
                parse_header_line(&mut header, comment, path)?;
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Header => {
                return Err(parse_error(
                    path,
                    "SQL found before the '-- Up migration' marker",
                ))
            }
        }
    }

    if !saw_up {
        return Err(parse_error(path, "missing '-- Up migration' section"));
    }

    let upgrade = split_sql_statements(&up_sql.join("\n"));
    let downgrade = split_sql_statements(&down_sql.join("\n"));

    let mut revision = Revision::new(
        header.id.unwrap_or_else(|| stem.to_string()),
        SqlScript::new(upgrade, downgrade),
    )
    .down_revisions(header.down_revisions)
    .depends_on(header.dependencies)
    .branch_labels(header.branch_labels)
    .own_transaction(header.own_transaction)
    .path(path);

    if let Some(message) = header.message {
        revision = revision.message(message);
    }
    if let Some(date) = header.create_date {
        revision = revision.create_date(date);
    }
    Ok(revision)
}

fn parse_header_line(header: &mut Header, comment: &str, path: &Path) -> MigrateResult<()> {
    let Some((key, value)) = comment.split_once(':') else {
        return Ok(());
    };
    let value = value.trim();

    match key.trim().to_lowercase().replace('_', "-").as_str() {
        "revision" => {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(parse_error(path, format!("invalid revision id '{}'", value)));
            }
            header.id = Some(value.to_string());
        }
        "down-revision" | "revises" => header.down_revisions = split_ids(value),
        "depends-on" => header.dependencies = split_ids(value),
        "branch-labels" => header.branch_labels = split_ids(value),
        "message" => header.message = Some(value.to_string()),
        "create date" | "create-date" => {
            let date = NaiveDateTime::parse_from_str(value, CREATE_DATE_FORMAT).map_err(|e| {
                parse_error(path, format!("invalid create date '{}': {}", value, e))
            })?;
            header.create_date = Some(date);
        }
        "transactional" => {
            header.own_transaction = match value.to_lowercase().as_str() {
                "true" | "yes" => false,
                "false" | "no" => true,
                other => {
                    return Err(parse_error(
                        path,
                        format!("invalid value '{}' for Transactional", other),
                    ))
                }
            };
        }
        // free-form comments in the header
        _ => {}
    }
    Ok(())
}

/// Comma separated ids; `None` or an empty value means no ids
fn split_ids(value: &str) -> Vec<String> {
    if value.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split SQL statements for execution using proper SQL parsing
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = PostgreSqlDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| stmt.to_string()).collect(),
        Err(e) => {
            // If parsing fails, fall back to naive splitting with a warning
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

fn parse_error(path: &Path, message: impl Into<String>) -> MigrateError {
    MigrateError::Parse {
        path: PathBuf::from(path),
        message: message.into(),
    }
}
