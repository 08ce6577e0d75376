//! Revision definitions
//!
//! A [`Revision`] is an immutable unit of schema change. Its operations are
//! supplied by a [`RevisionScript`], either parsed from a `.sql` revision
//! file ([`SqlScript`]) or written in Rust ([`FnScript`]).

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::context::Operations;
use crate::error::MigrateResult;

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Apply the revision
    Upgrade,
    /// Revert the revision
    Downgrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upgrade => write!(f, "upgrade"),
            Direction::Downgrade => write!(f, "downgrade"),
        }
    }
}

/// The apply/revert operations of a revision
pub trait RevisionScript: Send + Sync {
    /// Emit the schema changes applying this revision
    fn upgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()>;

    /// Emit the schema changes reverting this revision
    fn downgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()>;
}

/// Script made of plain SQL statements, as loaded from revision files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlScript {
    upgrade: Vec<String>,
    downgrade: Vec<String>,
}

impl SqlScript {
    pub fn new(upgrade: Vec<String>, downgrade: Vec<String>) -> Self {
        Self { upgrade, downgrade }
    }

    pub fn upgrade_statements(&self) -> &[String] {
        &self.upgrade
    }

    pub fn downgrade_statements(&self) -> &[String] {
        &self.downgrade
    }
}

impl RevisionScript for SqlScript {
    fn upgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()> {
        for statement in &self.upgrade {
            op.execute(statement.as_str());
        }
        Ok(())
    }

    fn downgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()> {
        for statement in &self.downgrade {
            op.execute(statement.as_str());
        }
        Ok(())
    }
}

type ScriptFn = dyn Fn(&mut Operations<'_>) -> MigrateResult<()> + Send + Sync;

/// Script backed by two closures
pub struct FnScript {
    upgrade: Box<ScriptFn>,
    downgrade: Box<ScriptFn>,
}

impl FnScript {
    pub fn new<U, D>(upgrade: U, downgrade: D) -> Self
    where
        U: Fn(&mut Operations<'_>) -> MigrateResult<()> + Send + Sync + 'static,
        D: Fn(&mut Operations<'_>) -> MigrateResult<()> + Send + Sync + 'static,
    {
        Self {
            upgrade: Box::new(upgrade),
            downgrade: Box::new(downgrade),
        }
    }
}

impl RevisionScript for FnScript {
    fn upgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()> {
        (self.upgrade)(op)
    }

    fn downgrade(&self, op: &mut Operations<'_>) -> MigrateResult<()> {
        (self.downgrade)(op)
    }
}

/// Represents one revision in the graph
#[derive(Clone)]
pub struct Revision {
    id: String,
    down_revisions: Vec<String>,
    dependencies: Vec<String>,
    branch_labels: BTreeSet<String>,
    message: Option<String>,
    create_date: Option<NaiveDateTime>,
    own_transaction: bool,
    path: Option<PathBuf>,
    script: Arc<dyn RevisionScript>,
}

impl Revision {
    /// Create a base revision with the given operations
    pub fn new(id: impl Into<String>, script: impl RevisionScript + 'static) -> Self {
        Self::with_script(id, Arc::new(script))
    }

    /// Create a base revision sharing an existing script
    pub fn with_script(id: impl Into<String>, script: Arc<dyn RevisionScript>) -> Self {
        Self {
            id: id.into(),
            down_revisions: Vec::new(),
            dependencies: Vec::new(),
            branch_labels: BTreeSet::new(),
            message: None,
            create_date: None,
            own_transaction: false,
            path: None,
            script,
        }
    }

    /// Create a revision with no schema changes, handy for merge points
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, SqlScript::default())
    }

    pub fn down_revisions<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.down_revisions.clear();
        for parent in parents {
            let parent = parent.into();
            if !self.down_revisions.contains(&parent) {
                self.down_revisions.push(parent);
            }
        }
        self.dependencies.retain(|d| !self.down_revisions.contains(d));
        self
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dependency in dependencies {
            let dependency = dependency.into();
            if !self.down_revisions.contains(&dependency) && !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    pub fn branch_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.branch_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn create_date(mut self, date: NaiveDateTime) -> Self {
        self.create_date = Some(date);
        self
    }

    /// Run this revision in its own transaction when migrating online
    pub fn own_transaction(mut self, own: bool) -> Self {
        self.own_transaction = own;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_ids(&self) -> &[String] {
        &self.down_revisions
    }

    pub fn dependency_ids(&self) -> &[String] {
        &self.dependencies
    }

    /// Every edge leading to this revision: lineage parents then dependencies
    pub fn all_parent_ids(&self) -> impl Iterator<Item = &str> {
        self.down_revisions
            .iter()
            .chain(self.dependencies.iter())
            .map(String::as_str)
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.branch_labels
    }

    pub fn doc(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn created(&self) -> Option<NaiveDateTime> {
        self.create_date
    }

    pub fn requires_own_transaction(&self) -> bool {
        self.own_transaction
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn script(&self) -> &dyn RevisionScript {
        self.script.as_ref()
    }

    /// A base has no lineage parent
    pub fn is_base(&self) -> bool {
        self.down_revisions.is_empty()
    }

    /// Render `parents -> id` as used in log lines and history output
    pub fn lineage(&self) -> String {
        format!("{} -> {}", self.down_revisions.join(", "), self.id)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("id", &self.id)
            .field("down_revisions", &self.down_revisions)
            .field("dependencies", &self.dependencies)
            .field("branch_labels", &self.branch_labels)
            .field("message", &self.message)
            .field("own_transaction", &self.own_transaction)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Revision {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Revision {}

/// One scheduled unit of work: a revision and the direction to run it in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep<'g> {
    pub revision: &'g Revision,
    pub direction: Direction,
}

impl<'g> MigrationStep<'g> {
    pub fn upgrade(revision: &'g Revision) -> Self {
        Self {
            revision,
            direction: Direction::Upgrade,
        }
    }

    pub fn downgrade(revision: &'g Revision) -> Self {
        Self {
            revision,
            direction: Direction::Downgrade,
        }
    }

    pub fn id(&self) -> &'g str {
        self.revision.id()
    }
}

impl fmt::Display for MigrationStep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parents = self.revision.parent_ids().join(", ");
        match self.direction {
            Direction::Upgrade => write!(f, "Running upgrade {} -> {}", parents, self.revision.id()),
            Direction::Downgrade => write!(f, "Running downgrade {} -> {}", self.revision.id(), parents),
        }
    }
}
