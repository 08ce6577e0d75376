//! Path resolution
//!
//! Computes the ordered apply/revert sequence between the applied state and a
//! target. The applied state is the ancestor closure of the persisted heads
//! and stays closed under ancestry after every step of a produced plan:
//! upgrades are ordered parents first, downgrades children first.

use std::collections::BTreeSet;

use crate::error::{MigrateError, MigrateResult};
use crate::graph::RevisionGraph;
use crate::revision::{Direction, MigrationStep};
use crate::spec::RevisionSpec;

/// Ordered steps plus the heads before and after running them
#[derive(Debug, Clone)]
pub struct MigrationPlan<'g> {
    graph: &'g RevisionGraph,
    direction: Direction,
    steps: Vec<MigrationStep<'g>>,
    positions: Vec<usize>,
    start: BTreeSet<usize>,
    starting_heads: BTreeSet<String>,
    target_heads: BTreeSet<String>,
}

impl<'g> MigrationPlan<'g> {
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn steps(&self) -> &[MigrationStep<'g>] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Heads recorded before the plan runs
    pub fn starting_heads(&self) -> &BTreeSet<String> {
        &self.starting_heads
    }

    /// Heads to record once every step has run
    pub fn target_heads(&self) -> &BTreeSet<String> {
        &self.target_heads
    }

    pub fn revision_ids(&self) -> Vec<&'g str> {
        self.steps.iter().map(|s| s.id()).collect()
    }

    /// Heads once the first `completed` steps have run
    pub fn heads_after(&self, completed: usize) -> BTreeSet<String> {
        let mut applied = self.graph.closure_up(self.start.iter().copied());
        for (&position, step) in self.positions.iter().zip(&self.steps).take(completed) {
            match step.direction {
                Direction::Upgrade => applied.insert(position),
                Direction::Downgrade => applied.remove(&position),
            };
        }
        self.graph.ids(&self.graph.heads_of(&applied))
    }
}

/// Resolves targets against a graph
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'g> {
    graph: &'g RevisionGraph,
}

impl<'g> PathResolver<'g> {
    pub fn new(graph: &'g RevisionGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g RevisionGraph {
        self.graph
    }

    /// Map persisted head ids to graph positions
    pub(crate) fn current_positions(&self, heads: &BTreeSet<String>) -> MigrateResult<BTreeSet<usize>> {
        heads
            .iter()
            .map(|id| {
                self.graph
                    .position(id)
                    .map_err(|_| MigrateError::State { revision: id.clone() })
            })
            .collect()
    }

    /// Plan an upgrade from the recorded heads
    pub fn upgrade(
        &self,
        current_heads: &BTreeSet<String>,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationPlan<'g>> {
        if target.is_range() {
            return Err(range_not_allowed());
        }
        let current = self.current_positions(current_heads)?;
        self.plan_upgrade(&current, target)
    }

    /// Plan a downgrade from the recorded heads
    pub fn downgrade(
        &self,
        current_heads: &BTreeSet<String>,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationPlan<'g>> {
        if target.is_range() {
            return Err(range_not_allowed());
        }
        let current = self.current_positions(current_heads)?;
        self.plan_downgrade(&current, target)
    }

    /// Validate the parts of an online target that need no recorded state
    ///
    /// Only `current` and `-n` depend on the version table; everything else
    /// is resolved here so bad input fails before a connection is used.
    pub fn check_target(&self, direction: Direction, target: &RevisionSpec) -> MigrateResult<()> {
        match target {
            RevisionSpec::Range(..) => Err(range_not_allowed()),
            RevisionSpec::Offset(_) if direction == Direction::Upgrade => {
                Err(offset_as_upgrade(target))
            }
            _ => self.check_stateless(target),
        }
    }

    /// Like [`check_target`](Self::check_target) for every stamp target
    pub fn check_stamp_targets(&self, targets: &[RevisionSpec]) -> MigrateResult<()> {
        for target in targets {
            if target.is_range() {
                return Err(stamp_range_not_allowed());
            }
            self.check_stateless(target)?;
        }
        Ok(())
    }

    fn check_stateless(&self, target: &RevisionSpec) -> MigrateResult<()> {
        match target {
            RevisionSpec::Current | RevisionSpec::Offset(_) => Ok(()),
            _ => self.resolve_positions(target, &BTreeSet::new()).map(|_| ()),
        }
    }

    /// Plan an upgrade without a database; a plain target starts from base
    pub fn offline_upgrade(&self, target: &RevisionSpec) -> MigrateResult<MigrationPlan<'g>> {
        let (from, to) = target.endpoints();
        let start = self.offline_start_positions(from)?;
        self.plan_upgrade(&start, to)
    }

    /// Plan a downgrade without a database; only `from:to` ranges are accepted
    pub fn offline_downgrade(&self, target: &RevisionSpec) -> MigrateResult<MigrationPlan<'g>> {
        match target {
            RevisionSpec::Range(from, to) => {
                let start = self.offline_start_positions(from)?;
                self.plan_downgrade(&start, to)
            }
            _ => Err(MigrateError::invalid_range(
                "downgrade with --sql requires <fromrev>:<torev>",
            )),
        }
    }

    /// Heads denoted by the starting side of an offline range
    pub fn offline_start(&self, from: &RevisionSpec) -> MigrateResult<BTreeSet<String>> {
        let start = self.offline_start_positions(from)?;
        Ok(self.graph.ids(&start))
    }

    fn offline_start_positions(&self, from: &RevisionSpec) -> MigrateResult<BTreeSet<usize>> {
        match from {
            RevisionSpec::Current | RevisionSpec::Offset(_) => Err(MigrateError::invalid_range(format!(
                "'{}' needs a database connection; give an explicit <fromrev>:<torev>",
                from
            ))),
            RevisionSpec::Range(..) => Err(MigrateError::invalid_range("nested ranges are not allowed")),
            _ => {
                let start = self.resolve_positions(from, &BTreeSet::new())?;
                Ok(self.graph.heads_of(&start))
            }
        }
    }

    /// Heads to record for a stamp
    ///
    /// With `purge` the result is exactly the heads of the targets. Otherwise
    /// current heads that are neither ancestors nor descendants of a target
    /// are kept alongside the targets.
    pub fn stamp_heads(
        &self,
        current_heads: &BTreeSet<String>,
        targets: &[RevisionSpec],
        purge: bool,
    ) -> MigrateResult<BTreeSet<String>> {
        let current = if purge {
            BTreeSet::new()
        } else {
            self.current_positions(current_heads)?
        };

        let mut resolved = BTreeSet::new();
        let mut to_base = false;
        for target in targets {
            if target.is_range() {
                return Err(stamp_range_not_allowed());
            }
            let positions = self.resolve_positions(target, &current)?;
            // base sits below every lineage
            to_base |= positions.is_empty();
            resolved.extend(positions);
        }

        let mut related = self.graph.closure_up(resolved.iter().copied());
        related.extend(self.graph.closure_down(resolved.iter().copied()));
        if to_base {
            related.extend(current.iter().copied());
        }

        let mut stamped: BTreeSet<usize> = current
            .into_iter()
            .filter(|head| !related.contains(head))
            .collect();
        stamped.extend(resolved);

        Ok(self.graph.ids(&self.graph.heads_of(&stamped)))
    }

    /// Concrete ids a specifier denotes, given the current heads
    pub fn resolve_ids(
        &self,
        spec: &RevisionSpec,
        current_heads: &BTreeSet<String>,
    ) -> MigrateResult<BTreeSet<String>> {
        let current = self.current_positions(current_heads)?;
        let positions = self.resolve_positions(spec, &current)?;
        Ok(self.graph.ids(&positions))
    }

    pub(crate) fn resolve_positions(
        &self,
        spec: &RevisionSpec,
        current: &BTreeSet<usize>,
    ) -> MigrateResult<BTreeSet<usize>> {
        match spec {
            RevisionSpec::Exact(id) => Ok(BTreeSet::from([self.graph.resolve_position(id)?])),
            RevisionSpec::Heads => Ok(self.graph.head_positions()),
            RevisionSpec::Base => Ok(BTreeSet::new()),
            RevisionSpec::Current => Ok(current.clone()),
            RevisionSpec::Offset(steps) => self.walk_back(current, *steps, spec),
            RevisionSpec::HeadOffset(steps) => {
                self.walk_back(&self.graph.head_positions(), *steps, spec)
            }
            RevisionSpec::Range(..) => Err(MigrateError::invalid_range(format!(
                "'{}' is a range where a single target was expected",
                spec
            ))),
        }
    }

    /// Follow `down_revision` links `steps` times from a single starting head
    fn walk_back(
        &self,
        from: &BTreeSet<usize>,
        steps: u32,
        spec: &RevisionSpec,
    ) -> MigrateResult<BTreeSet<usize>> {
        let start = match from.len() {
            0 => {
                return Err(MigrateError::invalid_range(format!(
                    "relative revision '{}' has no revision to count from",
                    spec
                )))
            }
            1 => from.iter().copied().next(),
            _ => {
                return Err(MigrateError::AmbiguousRevision {
                    spec: spec.to_string(),
                    candidates: self.graph.ids(from).into_iter().collect(),
                })
            }
        };

        let mut position = start;
        for _ in 0..steps {
            let node = position.ok_or_else(|| {
                MigrateError::invalid_range(format!(
                    "Relative revision {} didn't produce {} migrations",
                    spec, steps
                ))
            })?;
            position = match self.graph.lineage_parents(node) {
                [] => None,
                [single] => Some(*single),
                many => {
                    return Err(MigrateError::AmbiguousRevision {
                        spec: spec.to_string(),
                        candidates: many
                            .iter()
                            .map(|&p| self.graph.at(p).id().to_string())
                            .collect(),
                    })
                }
            };
        }

        Ok(position.into_iter().collect())
    }

    fn plan_upgrade(
        &self,
        current: &BTreeSet<usize>,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationPlan<'g>> {
        if let RevisionSpec::Offset(_) = target {
            return Err(offset_as_upgrade(target));
        }

        let targets = self.resolve_positions(target, current)?;
        let applied = self.graph.closure_up(current.iter().copied());
        let wanted = self.graph.closure_up(targets.iter().copied());
        let pending: BTreeSet<usize> = wanted.difference(&applied).copied().collect();

        let positions = self.graph.topological_order(&pending);
        let steps = positions
            .iter()
            .map(|&i| MigrationStep::upgrade(self.graph.at(i)))
            .collect::<Vec<_>>();

        let after: BTreeSet<usize> = applied.union(&pending).copied().collect();
        tracing::debug!(target = %target, pending = steps.len(), "resolved upgrade");

        Ok(MigrationPlan {
            graph: self.graph,
            direction: Direction::Upgrade,
            steps,
            positions,
            start: current.clone(),
            starting_heads: self.graph.ids(&self.graph.heads_of(current)),
            target_heads: self.graph.ids(&self.graph.heads_of(&after)),
        })
    }

    fn plan_downgrade(
        &self,
        current: &BTreeSet<usize>,
        target: &RevisionSpec,
    ) -> MigrateResult<MigrationPlan<'g>> {
        let targets = self.resolve_positions(target, current)?;
        let applied = self.graph.closure_up(current.iter().copied());

        if let Some(&missing) = targets.iter().find(|t| !applied.contains(t)) {
            let heads: Vec<String> = self.graph.ids(current).into_iter().collect();
            return Err(MigrateError::invalid_range(format!(
                "Destination {} is not a valid downgrade target from current heads [{}]",
                self.graph.at(missing).id(),
                heads.join(", ")
            )));
        }

        let keep = self.graph.closure_up(targets.iter().copied());
        let revert: BTreeSet<usize> = applied.difference(&keep).copied().collect();

        let positions = self.graph.reverse_topological_order(&revert);
        let steps = positions
            .iter()
            .map(|&i| MigrationStep::downgrade(self.graph.at(i)))
            .collect::<Vec<_>>();

        tracing::debug!(target = %target, pending = steps.len(), "resolved downgrade");

        Ok(MigrationPlan {
            graph: self.graph,
            direction: Direction::Downgrade,
            steps,
            positions,
            start: current.clone(),
            starting_heads: self.graph.ids(&self.graph.heads_of(current)),
            target_heads: self.graph.ids(&self.graph.heads_of(&keep)),
        })
    }
}

fn range_not_allowed() -> MigrateError {
    MigrateError::invalid_range("Range revision not allowed; ranges are only accepted in offline mode")
}

fn stamp_range_not_allowed() -> MigrateError {
    MigrateError::invalid_range("Range revision not allowed when stamping a live database")
}

fn offset_as_upgrade(target: &RevisionSpec) -> MigrateError {
    MigrateError::invalid_range(format!(
        "relative downgrade '{}' can't be used as an upgrade target",
        target
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::Revision;

    fn rev(id: &str, parents: &[&str]) -> Revision {
        Revision::empty(id).down_revisions(parents.iter().copied())
    }

    fn heads(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn spec(s: &str) -> RevisionSpec {
        s.parse().unwrap()
    }

    fn merge_graph() -> RevisionGraph {
        RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("b", &["a"]),
            rev("c", &["b"]),
            rev("d", &[]),
            rev("e", &["d"]),
            rev("f", &["c", "e"]),
        ])
        .unwrap()
    }

    fn linear_graph() -> RevisionGraph {
        RevisionGraph::from_revisions(vec![
            rev("r1", &[]),
            rev("r2", &["r1"]),
            rev("r3", &["r2"]),
            rev("r4", &["r3"]),
        ])
        .unwrap()
    }

    /// Every parent of an upgraded revision is applied before it
    fn assert_parents_first(graph: &RevisionGraph, start: &BTreeSet<String>, plan: &MigrationPlan<'_>) {
        let resolver = PathResolver::new(graph);
        let positions = resolver.current_positions(start).unwrap();
        let mut applied: BTreeSet<String> = graph.ids(&graph.closure_up(positions));
        for step in plan.steps() {
            for parent in step.revision.all_parent_ids() {
                assert!(applied.contains(parent), "{} ran before {}", step.id(), parent);
            }
            applied.insert(step.id().to_string());
        }
    }

    #[test]
    fn test_upgrade_merge_scenario() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.upgrade(&BTreeSet::new(), &RevisionSpec::Heads).unwrap();
        assert_eq!(plan.revision_ids(), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(plan.direction(), Direction::Upgrade);
        assert_eq!(plan.target_heads(), &heads(&["f"]));
        assert_parents_first(&graph, &BTreeSet::new(), &plan);
    }

    #[test]
    fn test_downgrade_merge_scenario() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.downgrade(&heads(&["f"]), &RevisionSpec::Base).unwrap();
        assert_eq!(plan.revision_ids(), vec!["f", "e", "d", "c", "b", "a"]);
        assert!(plan.target_heads().is_empty());
        assert_eq!(plan.starting_heads(), &heads(&["f"]));
    }

    #[test]
    fn test_intermediate_heads() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.upgrade(&BTreeSet::new(), &RevisionSpec::Heads).unwrap();
        assert!(plan.heads_after(0).is_empty());
        assert_eq!(plan.heads_after(3), heads(&["c"]));
        assert_eq!(plan.heads_after(5), heads(&["c", "e"]));
        assert_eq!(plan.heads_after(plan.len()), *plan.target_heads());

        let down = resolver.downgrade(&heads(&["f"]), &RevisionSpec::Base).unwrap();
        assert_eq!(down.heads_after(1), heads(&["c", "e"]));
        assert_eq!(down.heads_after(2), heads(&["c", "d"]));
    }

    #[test]
    fn test_partial_upgrade_from_one_branch() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.upgrade(&heads(&["c"]), &RevisionSpec::Heads).unwrap();
        assert_eq!(plan.revision_ids(), vec!["d", "e", "f"]);
        assert_parents_first(&graph, &heads(&["c"]), &plan);

        let plan = resolver.upgrade(&heads(&["c", "e"]), &spec("f")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["f"]);
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        assert!(resolver.upgrade(&heads(&["f"]), &RevisionSpec::Heads).unwrap().is_empty());
        assert!(resolver.upgrade(&heads(&["f"]), &spec("b")).unwrap().is_empty());
        assert!(resolver.upgrade(&heads(&["c"]), &spec("a")).unwrap().is_empty());
        assert!(resolver.upgrade(&heads(&["c"]), &RevisionSpec::Current).unwrap().is_empty());
    }

    #[test]
    fn test_downgrade_to_branch_revision() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        // everything that is not an ancestor of b goes, including the d/e branch
        let plan = resolver.downgrade(&heads(&["f"]), &spec("b")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["f", "e", "d", "c"]);
        assert_eq!(plan.target_heads(), &heads(&["b"]));
    }

    #[test]
    fn test_downgrade_to_unapplied_target_fails() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        assert!(matches!(
            resolver.downgrade(&heads(&["c"]), &spec("e")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
        assert!(matches!(
            resolver.downgrade(&heads(&["c"]), &spec("nope")),
            Err(MigrateError::UnknownRevision { .. })
        ));
    }

    #[test]
    fn test_linear_round_trip_counts_match() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        let up = resolver.upgrade(&BTreeSet::new(), &RevisionSpec::Heads).unwrap();
        let down = resolver.downgrade(up.target_heads(), &RevisionSpec::Base).unwrap();

        assert_eq!(up.len(), down.len());
        assert_eq!(down.revision_ids(), vec!["r4", "r3", "r2", "r1"]);
        assert!(down.target_heads().is_empty());
    }

    #[test]
    fn test_dependency_orders_across_branches() {
        let graph = RevisionGraph::from_revisions(vec![
            Revision::empty("orders").down_revisions(["accounts"]).depends_on(["billing"]),
            rev("accounts", &[]),
            rev("billing", &[]),
        ])
        .unwrap();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.upgrade(&BTreeSet::new(), &spec("orders")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["accounts", "billing", "orders"]);

        let back = resolver.downgrade(&heads(&["orders"]), &spec("accounts")).unwrap();
        assert_eq!(back.revision_ids(), vec!["orders", "billing"]);
    }

    #[test]
    fn test_relative_offsets() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.downgrade(&heads(&["r4"]), &spec("-1")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r4"]);

        let plan = resolver.downgrade(&heads(&["r4"]), &spec("-4")).unwrap();
        assert_eq!(plan.len(), 4);

        assert!(matches!(
            resolver.downgrade(&heads(&["r2"]), &spec("-3")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
        assert!(matches!(
            resolver.upgrade(&heads(&["r2"]), &spec("-1")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));

        // heads-n counts from the graph head, not the database
        let plan = resolver.upgrade(&heads(&["r1"]), &spec("heads-1")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r2", "r3"]);
    }

    #[test]
    fn test_offset_through_merge_is_ambiguous() {
        let graph = merge_graph();
        let resolver = PathResolver::new(&graph);

        assert!(matches!(
            resolver.downgrade(&heads(&["f"]), &spec("-2")),
            Err(MigrateError::AmbiguousRevision { .. })
        ));
        assert!(matches!(
            resolver.downgrade(&heads(&["c", "e"]), &spec("-1")),
            Err(MigrateError::AmbiguousRevision { .. })
        ));
    }

    #[test]
    fn test_multiple_heads_upgrade_includes_every_branch() {
        let graph = RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("b", &["a"]),
            rev("c", &["a"]),
            rev("d", &["c"]),
        ])
        .unwrap();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.upgrade(&BTreeSet::new(), &RevisionSpec::Heads).unwrap();
        assert_eq!(plan.revision_ids(), vec!["a", "b", "c", "d"]);
        assert_eq!(plan.target_heads(), &heads(&["b", "d"]));

        assert!(matches!(
            resolver.upgrade(&BTreeSet::new(), &spec("heads-1")),
            Err(MigrateError::AmbiguousRevision { .. })
        ));
    }

    #[test]
    fn test_unknown_current_is_state_error() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        let err = resolver.upgrade(&heads(&["gone"]), &RevisionSpec::Heads).unwrap_err();
        assert!(matches!(err, MigrateError::State { revision } if revision == "gone"));
    }

    #[test]
    fn test_ranges_rejected_online() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        assert!(matches!(
            resolver.upgrade(&BTreeSet::new(), &spec("r1:r3")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
        assert!(matches!(
            resolver.downgrade(&heads(&["r3"]), &spec("r3:r1")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
    }

    #[test]
    fn test_offline_plans() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        let plan = resolver.offline_upgrade(&spec("r3")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r1", "r2", "r3"]);

        let plan = resolver.offline_upgrade(&spec("r2:heads")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r3", "r4"]);

        let plan = resolver.offline_downgrade(&spec("r4:r2")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r4", "r3"]);

        let plan = resolver.offline_downgrade(&spec("r4:-1")).unwrap();
        assert_eq!(plan.revision_ids(), vec!["r4"]);

        assert!(matches!(
            resolver.offline_downgrade(&spec("r2")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
        assert!(matches!(
            resolver.offline_upgrade(&spec("current:heads")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
    }

    #[test]
    fn test_stamp_heads() {
        let graph = RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("b", &["a"]),
            rev("x", &[]),
            rev("y", &["x"]),
        ])
        .unwrap();
        let resolver = PathResolver::new(&graph);

        // unrelated branch is kept, the stamped branch moves
        let stamped = resolver
            .stamp_heads(&heads(&["a", "x"]), &[spec("b")], false)
            .unwrap();
        assert_eq!(stamped, heads(&["b", "x"]));

        // stamping backwards replaces the descendant head
        let stamped = resolver
            .stamp_heads(&heads(&["b", "y"]), &[spec("a")], false)
            .unwrap();
        assert_eq!(stamped, heads(&["a", "y"]));

        let purged = resolver
            .stamp_heads(&heads(&["b", "y"]), &[spec("a")], true)
            .unwrap();
        assert_eq!(purged, heads(&["a"]));

        assert!(resolver
            .stamp_heads(&heads(&["b"]), &[RevisionSpec::Base], true)
            .unwrap()
            .is_empty());

        // purge ignores ids the graph no longer knows
        assert_eq!(
            resolver.stamp_heads(&heads(&["zz"]), &[spec("y")], true).unwrap(),
            heads(&["y"])
        );
        assert!(matches!(
            resolver.stamp_heads(&heads(&["zz"]), &[spec("y")], false),
            Err(MigrateError::State { .. })
        ));
    }

    #[test]
    fn test_stamp_base_clears_heads_without_purge() {
        let graph = RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("b", &["a"]),
            rev("x", &[]),
        ])
        .unwrap();
        let resolver = PathResolver::new(&graph);

        assert!(resolver
            .stamp_heads(&heads(&["b", "x"]), &[RevisionSpec::Base], false)
            .unwrap()
            .is_empty());

        // base next to a real target keeps only that target
        assert_eq!(
            resolver
                .stamp_heads(&heads(&["b", "x"]), &[RevisionSpec::Base, spec("a")], false)
                .unwrap(),
            heads(&["a"])
        );

        // -1 from a base revision lands on base as well
        assert!(resolver
            .stamp_heads(&heads(&["a"]), &[spec("-1")], false)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_check_target_needs_no_state() {
        let graph = linear_graph();
        let resolver = PathResolver::new(&graph);

        assert!(resolver.check_target(Direction::Upgrade, &spec("r2")).is_ok());
        assert!(resolver.check_target(Direction::Upgrade, &RevisionSpec::Current).is_ok());
        assert!(resolver.check_target(Direction::Downgrade, &spec("-2")).is_ok());

        assert!(matches!(
            resolver.check_target(Direction::Upgrade, &spec("nope")),
            Err(MigrateError::UnknownRevision { .. })
        ));
        assert!(matches!(
            resolver.check_target(Direction::Upgrade, &spec("r")),
            Err(MigrateError::AmbiguousRevision { .. })
        ));
        assert!(matches!(
            resolver.check_target(Direction::Downgrade, &spec("r1:r2")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
        assert!(matches!(
            resolver.check_target(Direction::Upgrade, &spec("-1")),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));

        assert!(resolver.check_stamp_targets(&[spec("r1"), RevisionSpec::Base]).is_ok());
        assert!(matches!(
            resolver.check_stamp_targets(&[spec("r1"), spec("gone")]),
            Err(MigrateError::UnknownRevision { .. })
        ));
    }
}
