//! Read-only views over the revision graph
//!
//! Revisions are never mutated for display; per-revision flags are computed
//! into a side map of [`RevisionAnnotation`]s.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::{MigrateError, MigrateResult};
use crate::graph::RevisionGraph;
use crate::resolver::PathResolver;
use crate::revision::Revision;
use crate::spec::RevisionSpec;

/// Display flags of a revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevisionAnnotation {
    pub is_current: bool,
    pub is_head: bool,
    pub is_base: bool,
    pub is_branch_point: bool,
    pub is_merge_point: bool,
}

/// Revisions within a range, oldest first, with their annotations
#[derive(Debug, Clone)]
pub struct History<'g> {
    entries: Vec<&'g Revision>,
    annotations: HashMap<String, RevisionAnnotation>,
}

impl<'g> History<'g> {
    pub fn entries(&self) -> &[&'g Revision] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn annotation(&self, id: &str) -> Option<&RevisionAnnotation> {
        self.annotations.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'g Revision, RevisionAnnotation)> + '_ {
        self.entries.iter().map(move |&revision| {
            let annotation = self
                .annotations
                .get(revision.id())
                .copied()
                .unwrap_or_default();
            (revision, annotation)
        })
    }

    /// One formatted line per entry
    pub fn lines(&self) -> Vec<String> {
        self.iter()
            .map(|(revision, annotation)| format_entry(revision, &annotation))
            .collect()
    }
}

/// Queries over a graph and, optionally, the recorded heads
#[derive(Debug, Clone, Copy)]
pub struct Introspector<'g> {
    graph: &'g RevisionGraph,
}

impl<'g> Introspector<'g> {
    pub fn new(graph: &'g RevisionGraph) -> Self {
        Self { graph }
    }

    /// Revisions between the endpoints of `range`, both inclusive
    ///
    /// `current` may only appear in the range when `current_heads` is given.
    pub fn history(
        &self,
        range: &RevisionSpec,
        current_heads: Option<&BTreeSet<String>>,
    ) -> MigrateResult<History<'g>> {
        let RevisionSpec::Range(from, to) = range else {
            return Err(MigrateError::invalid_range(
                "History range requires [start]:[end], [start]:, or :[end]",
            ));
        };

        let resolver = PathResolver::new(self.graph);
        let current = match current_heads {
            Some(heads) => resolver.current_positions(heads)?,
            None => {
                if uses_current(from) || uses_current(to) {
                    return Err(MigrateError::invalid_range(
                        "'current' in a history range needs a database connection",
                    ));
                }
                BTreeSet::new()
            }
        };

        let lower = resolver.resolve_positions(from, &current)?;
        let upper = resolver.resolve_positions(to, &current)?;
        let below_upper = self.graph.closure_up(upper.iter().copied());

        if let Some(&outside) = lower.iter().find(|p| !below_upper.contains(p)) {
            return Err(MigrateError::invalid_range(format!(
                "Revision {} is not an ancestor of {}",
                self.graph.at(outside).id(),
                to
            )));
        }

        let selected: BTreeSet<usize> = if lower.is_empty() {
            below_upper
        } else {
            let above_lower = self.graph.closure_down(lower.iter().copied());
            below_upper.intersection(&above_lower).copied().collect()
        };

        let entries: Vec<&'g Revision> = self
            .graph
            .topological_order(&selected)
            .into_iter()
            .map(|i| self.graph.at(i))
            .collect();
        let annotations = selected
            .iter()
            .map(|&i| (self.graph.at(i).id().to_string(), self.annotate(i, &current)))
            .collect();

        Ok(History { entries, annotations })
    }

    /// Branch points, oldest first
    pub fn branches(&self) -> Vec<&'g Revision> {
        self.graph
            .chronological()
            .into_iter()
            .filter(|r| self.graph.is_branch_point(r.id()).unwrap_or(false))
            .collect()
    }

    /// Heads over every edge, or over `down_revision` edges only
    pub fn heads(&self, resolve_dependencies: bool) -> Vec<&'g Revision> {
        if resolve_dependencies {
            self.graph.heads()
        } else {
            self.graph.primary_heads()
        }
    }

    pub fn bases(&self) -> Vec<&'g Revision> {
        self.graph.bases()
    }

    /// Revisions a specifier denotes, oldest first
    pub fn show(
        &self,
        spec: &RevisionSpec,
        current_heads: Option<&BTreeSet<String>>,
    ) -> MigrateResult<Vec<&'g Revision>> {
        let resolver = PathResolver::new(self.graph);
        let current = match current_heads {
            Some(heads) => resolver.current_positions(heads)?,
            None => BTreeSet::new(),
        };
        let positions = resolver.resolve_positions(spec, &current)?;
        Ok(self
            .graph
            .topological_order(&positions)
            .into_iter()
            .map(|i| self.graph.at(i))
            .collect())
    }

    /// Recorded heads as revisions
    pub fn current(&self, heads: &BTreeSet<String>) -> MigrateResult<Vec<&'g Revision>> {
        heads
            .iter()
            .map(|id| {
                self.graph
                    .get(id)
                    .ok_or_else(|| MigrateError::State { revision: id.clone() })
            })
            .collect()
    }

    /// Flags of `revision`; it is current when it is one of `current_heads`
    pub fn annotation(
        &self,
        revision: &Revision,
        current_heads: &BTreeSet<String>,
    ) -> MigrateResult<RevisionAnnotation> {
        let position = self.graph.position(revision.id())?;
        let current = PathResolver::new(self.graph).current_positions(current_heads)?;
        Ok(self.annotate(position, &current))
    }

    fn annotate(&self, position: usize, current: &BTreeSet<usize>) -> RevisionAnnotation {
        let revision = self.graph.at(position);
        RevisionAnnotation {
            is_current: current.contains(&position),
            is_head: self.graph.child_positions(position).is_empty(),
            is_base: revision.is_base(),
            is_branch_point: self.graph.lineage_child_positions(position).len() > 1,
            is_merge_point: revision.parent_ids().len() > 1,
        }
    }
}

fn uses_current(spec: &RevisionSpec) -> bool {
    matches!(spec, RevisionSpec::Current | RevisionSpec::Offset(_))
}

/// `parents -> id (head) (branchpoint) (mergepoint) (current), message`
pub fn format_entry(revision: &Revision, annotation: &RevisionAnnotation) -> String {
    let parents = if revision.is_base() {
        "<base>".to_string()
    } else {
        revision.parent_ids().join(", ")
    };

    let mut line = format!("{} -> {}", parents, revision.id());
    if annotation.is_head {
        line.push_str(" (head)");
    }
    if annotation.is_branch_point {
        line.push_str(" (branchpoint)");
    }
    if annotation.is_merge_point {
        line.push_str(" (mergepoint)");
    }
    if annotation.is_current {
        line.push_str(" (current)");
    }
    if let Some(message) = revision.doc() {
        line.push_str(", ");
        line.push_str(message);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(id: &str, parents: &[&str]) -> Revision {
        Revision::empty(id)
            .down_revisions(parents.iter().copied())
            .message(format!("rev {}", id))
    }

    fn graph() -> RevisionGraph {
        // a -> b -> c, b -> d, merge m{c, d}
        RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("b", &["a"]),
            rev("c", &["b"]),
            rev("d", &["b"]),
            rev("m", &["c", "d"]),
        ])
        .unwrap()
    }

    fn heads(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn ids(revisions: &[&Revision]) -> Vec<String> {
        revisions.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn test_full_history_is_chronological() {
        let graph = graph();
        let introspect = Introspector::new(&graph);

        let history = introspect.history(&":".parse().unwrap(), None).unwrap();
        assert_eq!(ids(history.entries()), vec!["a", "b", "c", "d", "m"]);

        let b = history.annotation("b").unwrap();
        assert!(b.is_branch_point);
        assert!(!b.is_head);
        let m = history.annotation("m").unwrap();
        assert!(m.is_merge_point && m.is_head);
        assert!(history.annotation("a").unwrap().is_base);
    }

    #[test]
    fn test_bounded_history() {
        let graph = graph();
        let introspect = Introspector::new(&graph);

        let history = introspect.history(&"b:c".parse().unwrap(), None).unwrap();
        assert_eq!(ids(history.entries()), vec!["b", "c"]);

        let history = introspect.history(&"d:".parse().unwrap(), None).unwrap();
        assert_eq!(ids(history.entries()), vec!["d", "m"]);

        assert!(matches!(
            introspect.history(&"c:d".parse().unwrap(), None),
            Err(MigrateError::InvalidRangeSpec { .. })
        ));
    }

    #[test]
    fn test_history_requires_range() {
        let graph = graph();
        let introspect = Introspector::new(&graph);

        let err = introspect.history(&"heads".parse().unwrap(), None).unwrap_err();
        assert!(err.to_string().contains("History range requires"));
    }

    #[test]
    fn test_history_with_current() {
        let graph = graph();
        let introspect = Introspector::new(&graph);
        let current = heads(&["c"]);

        let history = introspect
            .history(&"current:".parse().unwrap(), Some(&current))
            .unwrap();
        assert_eq!(ids(history.entries()), vec!["c", "m"]);
        assert!(history.annotation("c").unwrap().is_current);
        assert!(!history.annotation("m").unwrap().is_current);

        assert!(introspect.history(&"current:".parse().unwrap(), None).is_err());
    }

    #[test]
    fn test_format_entry() {
        let graph = graph();
        let introspect = Introspector::new(&graph);
        let history = introspect
            .history(&":".parse().unwrap(), Some(&heads(&["m"])))
            .unwrap();

        assert_eq!(
            history.lines(),
            vec![
                "<base> -> a, rev a",
                "a -> b (branchpoint), rev b",
                "b -> c, rev c",
                "b -> d, rev d",
                "c, d -> m (head) (mergepoint) (current), rev m",
            ]
        );
    }

    #[test]
    fn test_branches_heads_and_bases() {
        let graph = graph();
        let introspect = Introspector::new(&graph);

        assert_eq!(ids(&introspect.branches()), vec!["b"]);
        assert_eq!(ids(&introspect.heads(true)), vec!["m"]);
        assert_eq!(ids(&introspect.bases()), vec!["a"]);
    }

    #[test]
    fn test_heads_with_dependencies() {
        let graph = RevisionGraph::from_revisions(vec![
            rev("a", &[]),
            rev("x", &[]),
            Revision::empty("b").down_revisions(["a"]).depends_on(["x"]),
        ])
        .unwrap();
        let introspect = Introspector::new(&graph);

        assert_eq!(ids(&introspect.heads(true)), vec!["b"]);
        assert_eq!(ids(&introspect.heads(false)), vec!["x", "b"]);
    }

    #[test]
    fn test_dependency_edges_are_not_branches() {
        let graph = RevisionGraph::from_revisions(vec![
            rev("x", &[]),
            rev("y", &["x"]),
            rev("a", &[]),
            Revision::empty("b").down_revisions(["a"]).depends_on(["x"]),
        ])
        .unwrap();
        let introspect = Introspector::new(&graph);

        assert!(introspect.branches().is_empty());
        let history = introspect.history(&":".parse().unwrap(), None).unwrap();
        assert!(!history.annotation("x").unwrap().is_branch_point);
        assert!(history.lines().iter().all(|line| !line.contains("(branchpoint)")));
    }

    #[test]
    fn test_show_and_current() {
        let graph = graph();
        let introspect = Introspector::new(&graph);

        assert_eq!(
            ids(&introspect.show(&"heads".parse().unwrap(), None).unwrap()),
            vec!["m"]
        );
        assert_eq!(
            ids(&introspect.show(&"-1".parse().unwrap(), Some(&heads(&["c"]))).unwrap()),
            vec!["b"]
        );
        assert_eq!(ids(&introspect.current(&heads(&["c", "d"])).unwrap()), vec!["c", "d"]);
        assert!(matches!(
            introspect.current(&heads(&["gone"])),
            Err(MigrateError::State { .. })
        ));
    }
}
