//! Migration Runner - Executes migration plans
//!
//! Online runs read the recorded heads inside the transaction they write to,
//! so resolution and execution see the same state. Offline runs render the
//! same statements as a SQL script and never open a connection.

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;

use lineage_core::{MigrateConfig, NamingConvention};

use crate::backends::{MigrationBackend, MigrationTransaction};
use crate::context::{ContextMode, Operations};
use crate::error::{MigrateError, MigrateResult};
use crate::graph::RevisionGraph;
use crate::resolver::{MigrationPlan, PathResolver};
use crate::revision::{Direction, MigrationStep};
use crate::spec::RevisionSpec;
use crate::version::{VersionStore, VersionTable};

/// Outcome of an online run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRunResult {
    /// `None` for stamps, which run no revisions
    pub direction: Option<Direction>,
    /// Revision ids in execution order
    pub revisions: Vec<String>,
    /// Heads recorded once the run committed
    pub heads: BTreeSet<String>,
    pub execution_time_ms: u128,
}

/// Executes or renders plans over one revision graph
pub struct MigrationRunner<'g> {
    graph: &'g RevisionGraph,
    naming: NamingConvention,
    version_table: VersionTable,
    tag: Option<String>,
    transaction_per_migration: bool,
}

impl<'g> MigrationRunner<'g> {
    pub fn new(graph: &'g RevisionGraph) -> Self {
        Self {
            graph,
            naming: NamingConvention::default(),
            version_table: VersionTable::default(),
            tag: None,
            transaction_per_migration: false,
        }
    }

    pub fn from_config(graph: &'g RevisionGraph, config: &MigrateConfig) -> Self {
        Self {
            graph,
            naming: config.naming_convention.clone(),
            version_table: VersionTable::from_config(config),
            tag: None,
            transaction_per_migration: config.transaction_per_migration,
        }
    }

    /// Opaque value exposed to scripts through [`Operations::tag`]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_naming_convention(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_version_table(mut self, table: VersionTable) -> Self {
        self.version_table = table;
        self
    }

    /// Commit after every revision instead of once per run
    pub fn transaction_per_migration(mut self, enabled: bool) -> Self {
        self.transaction_per_migration = enabled;
        self
    }

    pub fn graph(&self) -> &'g RevisionGraph {
        self.graph
    }

    /// Apply everything needed to reach `target`
    pub async fn upgrade(
        &self,
        backend: &dyn MigrationBackend,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationRunResult> {
        self.run(backend, Direction::Upgrade, target).await
    }

    /// Revert everything that is not an ancestor of `target`
    pub async fn downgrade(
        &self,
        backend: &dyn MigrationBackend,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationRunResult> {
        self.run(backend, Direction::Downgrade, target).await
    }

    /// Revert the current revision only
    pub async fn step_back(&self, backend: &dyn MigrationBackend) -> MigrateResult<MigrationRunResult> {
        self.downgrade(backend, &RevisionSpec::Offset(1)).await
    }

    /// Revert every applied revision
    pub async fn reset(&self, backend: &dyn MigrationBackend) -> MigrateResult<MigrationRunResult> {
        self.downgrade(backend, &RevisionSpec::Base).await
    }

    /// Record `targets` as applied without running anything
    pub async fn stamp(
        &self,
        backend: &dyn MigrationBackend,
        targets: &[RevisionSpec],
        purge: bool,
    ) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        let resolver = PathResolver::new(self.graph);
        resolver.check_stamp_targets(targets)?;
        let mut tx = backend.begin().await?;

        let current = if purge {
            BTreeSet::new()
        } else {
            match tx.get_current_heads().await {
                Ok(heads) => heads,
                Err(e) => return Err(abort(tx, e).await),
            }
        };

        let heads = match resolver.stamp_heads(&current, targets, purge) {
            Ok(heads) => heads,
            Err(e) => return Err(abort(tx, e).await),
        };

        tracing::info!(
            "Stamping {} -> {}",
            join(&current),
            join(&heads)
        );
        if let Err(e) = tx.set_heads(&heads).await {
            return Err(abort(tx, e).await);
        }
        tx.commit().await?;

        Ok(MigrationRunResult {
            direction: None,
            revisions: Vec::new(),
            heads,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn run(
        &self,
        backend: &dyn MigrationBackend,
        direction: Direction,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationRunResult> {
        let start_time = Instant::now();
        PathResolver::new(self.graph).check_target(direction, target)?;
        let mut tx = backend.begin().await?;

        let plan = match self.resolve_in(tx.as_mut(), direction, target).await {
            Ok(plan) => plan,
            Err(e) => return Err(abort(tx, e).await),
        };

        if plan.is_empty() {
            tracing::info!("Nothing to {}; already at {}", direction, target);
            tx.commit().await?;
            return Ok(MigrationRunResult {
                direction: Some(direction),
                revisions: Vec::new(),
                heads: plan.starting_heads().clone(),
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        let mut pending_tx = Some(tx);
        let mut completed = 0;
        let mut heads = plan.starting_heads().clone();

        for segment in self.segments(plan.steps()) {
            let mut tx = match pending_tx.take() {
                Some(tx) => tx,
                None => backend.begin().await?,
            };

            for step in segment {
                if let Err(e) = self.execute_step(tx.as_mut(), step).await {
                    let err = MigrateError::execution(step.id(), step.direction, e);
                    return Err(abort(tx, err).await);
                }
                completed += 1;
            }

            heads = plan.heads_after(completed);
            if let Err(e) = tx.set_heads(&heads).await {
                return Err(abort(tx, e).await);
            }
            tx.commit().await?;
            tracing::debug!(heads = %join(&heads), "committed");
        }

        Ok(MigrationRunResult {
            direction: Some(direction),
            revisions: plan.revision_ids().into_iter().map(str::to_string).collect(),
            heads,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn resolve_in(
        &self,
        tx: &mut dyn MigrationTransaction,
        direction: Direction,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationPlan<'g>> {
        let current = tx.get_current_heads().await?;
        let resolver = PathResolver::new(self.graph);
        match direction {
            Direction::Upgrade => resolver.upgrade(&current, target),
            Direction::Downgrade => resolver.downgrade(&current, target),
        }
    }

    async fn execute_step(
        &self,
        tx: &mut dyn MigrationTransaction,
        step: &MigrationStep<'g>,
    ) -> MigrateResult<()> {
        tracing::info!("{}", step);
        for statement in self.collect(step, ContextMode::Online)? {
            tx.execute(&statement).await?;
        }
        Ok(())
    }

    fn collect(&self, step: &MigrationStep<'g>, mode: ContextMode) -> MigrateResult<Vec<String>> {
        let mut op = Operations::new(
            step.id(),
            step.direction,
            mode,
            &self.naming,
            self.tag.as_deref(),
        );
        let script = step.revision.script();
        match step.direction {
            Direction::Upgrade => script.upgrade(&mut op)?,
            Direction::Downgrade => script.downgrade(&mut op)?,
        }
        Ok(op.into_statements())
    }

    /// Group steps into transactions
    fn segments<'p>(&self, steps: &'p [MigrationStep<'g>]) -> Vec<&'p [MigrationStep<'g>]> {
        if self.transaction_per_migration {
            return steps.chunks(1).collect();
        }

        let mut segments = Vec::new();
        let mut start = 0;
        for (i, step) in steps.iter().enumerate() {
            if step.revision.requires_own_transaction() {
                if start < i {
                    segments.push(&steps[start..i]);
                }
                segments.push(&steps[i..=i]);
                start = i + 1;
            }
        }
        if start < steps.len() {
            segments.push(&steps[start..]);
        }
        segments
    }

    /// Render an upgrade as SQL; a plain target starts from base
    pub fn upgrade_sql(&self, target: &RevisionSpec) -> MigrateResult<String> {
        let plan = PathResolver::new(self.graph).offline_upgrade(target)?;
        self.render(&plan)
    }

    /// Render a downgrade as SQL; `target` must be a `from:to` range
    pub fn downgrade_sql(&self, target: &RevisionSpec) -> MigrateResult<String> {
        let plan = PathResolver::new(self.graph).offline_downgrade(target)?;
        self.render(&plan)
    }

    /// Render the version table statements of a stamp
    pub fn stamp_sql(&self, targets: &[RevisionSpec], purge: bool) -> MigrateResult<String> {
        let resolver = PathResolver::new(self.graph);

        let mut start: Option<&RevisionSpec> = None;
        let mut destinations = Vec::with_capacity(targets.len());
        for target in targets {
            let destination = match target {
                RevisionSpec::Range(from, to) => {
                    match start {
                        Some(existing) if existing != from.as_ref() => {
                            return Err(MigrateError::invalid_range(
                                "Stamp operation with --sql only supports a single starting revision at a time",
                            ))
                        }
                        _ => start = Some(from.as_ref()),
                    }
                    to.as_ref()
                }
                other => other,
            };
            destinations.push(destination.clone());
        }

        let current = match start {
            Some(from) => resolver.offline_start(from)?,
            None => BTreeSet::new(),
        };
        let heads = resolver.stamp_heads(&current, &destinations, purge)?;

        let mut out = String::from("BEGIN;\n\n");
        push_statement(&mut out, &self.version_table.create_sql());
        out.push_str(&format!("-- Stamping {} -> {}\n\n", join(&current), join(&heads)));
        for statement in self.version_table.render_set_heads(&heads) {
            push_statement(&mut out, &statement);
        }
        out.push_str("COMMIT;\n");
        Ok(out)
    }

    fn render(&self, plan: &MigrationPlan<'g>) -> MigrateResult<String> {
        let mut segments = self.segments(plan.steps());
        if segments.is_empty() {
            segments.push(&[]);
        }

        let mut out = String::new();
        for segment in segments {
            out.push_str("BEGIN;\n\n");
            for step in segment {
                tracing::info!("{}", step);
                let statements = self
                    .collect(step, ContextMode::Offline)
                    .map_err(|e| MigrateError::execution(step.id(), step.direction, e))?;

                out.push_str(&format!("-- {}\n\n", step));
                for statement in statements {
                    push_statement(&mut out, &statement);
                }
            }
            out.push_str("COMMIT;\n\n");
        }

        Ok(out.trim_end().to_string() + "\n")
    }
}

/// Roll back after a failure, keeping the original error
async fn abort(tx: Box<dyn MigrationTransaction>, err: MigrateError) -> MigrateError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(error = %rollback_err, "Rollback failed after: {}", err);
    }
    err
}

fn push_statement(out: &mut String, statement: &str) {
    out.push_str(statement);
    out.push_str(";\n\n");
}

fn join(heads: &BTreeSet<String>) -> String {
    if heads.is_empty() {
        "base".to_string()
    } else {
        heads.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
