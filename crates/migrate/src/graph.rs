//! Revision graph
//!
//! The DAG formed by `down_revision` and dependency edges. Revisions keep the
//! order they were loaded in; that order breaks ties whenever several
//! revisions are ready at once, which keeps every computed sequence
//! reproducible across runs.

use std::collections::{BTreeSet, HashMap};

use crate::error::{MigrateError, MigrateResult};
use crate::revision::Revision;

/// Immutable graph of revisions plus derived child adjacency
#[derive(Debug)]
pub struct RevisionGraph {
    revisions: Vec<Revision>,
    index: HashMap<String, usize>,
    labels: HashMap<String, usize>,
    /// Parents over every edge, lineage parents first
    parents: Vec<Vec<usize>>,
    /// Children over every edge, in load order
    children: Vec<Vec<usize>>,
    /// Children over `down_revision` edges only
    lineage_children: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl RevisionGraph {
    /// Build and validate a graph; `revisions` order is the load order
    pub fn from_revisions(revisions: Vec<Revision>) -> MigrateResult<Self> {
        let mut index = HashMap::with_capacity(revisions.len());
        for (position, revision) in revisions.iter().enumerate() {
            if index.insert(revision.id().to_string(), position).is_some() {
                return Err(MigrateError::DuplicateRevision {
                    id: revision.id().to_string(),
                });
            }
        }

        let mut labels: HashMap<String, usize> = HashMap::new();
        for (position, revision) in revisions.iter().enumerate() {
            for label in revision.labels() {
                if let Some(&other) = labels.get(label) {
                    return Err(MigrateError::DuplicateBranchLabel {
                        label: label.clone(),
                        first: revisions[other].id().to_string(),
                        second: revision.id().to_string(),
                    });
                }
                labels.insert(label.clone(), position);
            }
        }

        let mut parents = Vec::with_capacity(revisions.len());
        for revision in &revisions {
            let mut resolved = Vec::new();
            for parent in revision.all_parent_ids() {
                let parent_index = index.get(parent).copied().ok_or_else(|| {
                    MigrateError::UnresolvedParent {
                        revision: revision.id().to_string(),
                        parent: parent.to_string(),
                    }
                })?;
                resolved.push(parent_index);
            }
            parents.push(resolved);
        }

        let mut children = vec![Vec::new(); revisions.len()];
        let mut lineage_children = vec![Vec::new(); revisions.len()];
        for (child, revision) in revisions.iter().enumerate() {
            let lineage_count = revision.parent_ids().len();
            for (edge, &parent) in parents[child].iter().enumerate() {
                children[parent].push(child);
                if edge < lineage_count {
                    lineage_children[parent].push(child);
                }
            }
        }

        let graph = Self {
            revisions,
            index,
            labels,
            parents,
            children,
            lineage_children,
        };
        graph.detect_cycle()?;

        tracing::debug!(
            revisions = graph.revisions.len(),
            heads = graph.heads().len(),
            "revision graph built"
        );
        Ok(graph)
    }

    /// Depth-first search over parent edges looking for a back edge
    fn detect_cycle(&self) -> MigrateResult<()> {
        let mut marks = vec![Mark::Unvisited; self.revisions.len()];

        for start in 0..self.revisions.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }

            marks[start] = Mark::InProgress;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, cursor) = *frame;
                if cursor >= self.parents[node].len() {
                    marks[node] = Mark::Done;
                    stack.pop();
                    continue;
                }

                frame.1 += 1;
                let parent = self.parents[node][cursor];
                match marks[parent] {
                    Mark::Unvisited => {
                        marks[parent] = Mark::InProgress;
                        stack.push((parent, 0));
                    }
                    Mark::InProgress => {
                        let position = stack.iter().position(|(n, _)| *n == parent).unwrap_or(0);
                        let mut path: Vec<String> = stack[position..]
                            .iter()
                            .map(|(n, _)| self.revisions[*n].id().to_string())
                            .collect();
                        path.push(self.revisions[parent].id().to_string());
                        path.reverse();
                        return Err(MigrateError::CycleDetected { path });
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// All revisions in load order
    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.index.get(id).map(|&i| &self.revisions[i])
    }

    /// Look up a revision by exact id
    pub fn revision(&self, id: &str) -> MigrateResult<&Revision> {
        self.get(id).ok_or_else(|| MigrateError::unknown(id))
    }

    pub(crate) fn at(&self, position: usize) -> &Revision {
        &self.revisions[position]
    }

    pub(crate) fn position(&self, id: &str) -> MigrateResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| MigrateError::unknown(id))
    }

    pub(crate) fn lineage_parents(&self, position: usize) -> &[usize] {
        let count = self.revisions[position].parent_ids().len();
        &self.parents[position][..count]
    }

    pub(crate) fn child_positions(&self, position: usize) -> &[usize] {
        &self.children[position]
    }

    pub(crate) fn lineage_child_positions(&self, position: usize) -> &[usize] {
        &self.lineage_children[position]
    }

    pub(crate) fn head_positions(&self) -> BTreeSet<usize> {
        (0..self.revisions.len())
            .filter(|&i| self.children[i].is_empty())
            .collect()
    }

    /// Revisions with no children
    pub fn heads(&self) -> Vec<&Revision> {
        self.head_positions().into_iter().map(|i| self.at(i)).collect()
    }

    /// Revisions with no children when dependency edges are ignored
    pub fn primary_heads(&self) -> Vec<&Revision> {
        (0..self.revisions.len())
            .filter(|&i| self.lineage_children[i].is_empty())
            .map(|i| self.at(i))
            .collect()
    }

    /// Revisions with no `down_revision`
    pub fn bases(&self) -> Vec<&Revision> {
        self.revisions.iter().filter(|r| r.is_base()).collect()
    }

    /// Direct children over every edge
    pub fn children(&self, id: &str) -> MigrateResult<Vec<&Revision>> {
        let position = self.position(id)?;
        Ok(self.children[position].iter().map(|&c| self.at(c)).collect())
    }

    /// Transitive parents of `id`, excluding itself, in load order
    pub fn ancestors(&self, id: &str) -> MigrateResult<Vec<&Revision>> {
        let position = self.position(id)?;
        let mut closure = self.closure_up([position]);
        closure.remove(&position);
        Ok(closure.into_iter().map(|i| self.at(i)).collect())
    }

    /// Transitive children of `id`, excluding itself, in load order
    pub fn descendants(&self, id: &str) -> MigrateResult<Vec<&Revision>> {
        let position = self.position(id)?;
        let mut closure = self.closure_down([position]);
        closure.remove(&position);
        Ok(closure.into_iter().map(|i| self.at(i)).collect())
    }

    /// More than one child over `down_revision` edges
    pub fn is_branch_point(&self, id: &str) -> MigrateResult<bool> {
        Ok(self.lineage_children[self.position(id)?].len() > 1)
    }

    /// More than one `down_revision`
    pub fn is_merge_point(&self, id: &str) -> MigrateResult<bool> {
        Ok(self.revision(id)?.parent_ids().len() > 1)
    }

    /// Resolve an exact id, branch label or unique id prefix
    pub fn resolve(&self, spec: &str) -> MigrateResult<&Revision> {
        self.resolve_position(spec).map(|i| self.at(i))
    }

    pub(crate) fn resolve_position(&self, spec: &str) -> MigrateResult<usize> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(MigrateError::unknown(spec));
        }
        if let Some(&position) = self.index.get(spec) {
            return Ok(position);
        }
        if let Some(&position) = self.labels.get(spec) {
            return Ok(position);
        }

        let candidates: Vec<usize> = self
            .revisions
            .iter()
            .enumerate()
            .filter(|(_, r)| r.id().starts_with(spec))
            .map(|(i, _)| i)
            .collect();

        match candidates.as_slice() {
            [] => Err(MigrateError::unknown(spec)),
            [single] => Ok(*single),
            many => {
                let mut ids: Vec<String> = many
                    .iter()
                    .map(|&i| self.revisions[i].id().to_string())
                    .collect();
                ids.sort();
                Err(MigrateError::AmbiguousRevision {
                    spec: spec.to_string(),
                    candidates: ids,
                })
            }
        }
    }

    /// Seeds plus everything reachable along parent edges
    pub(crate) fn closure_up<I>(&self, seeds: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        self.closure(seeds, &self.parents)
    }

    /// Seeds plus everything reachable along child edges
    pub(crate) fn closure_down<I>(&self, seeds: I) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        self.closure(seeds, &self.children)
    }

    fn closure<I>(&self, seeds: I, edges: &[Vec<usize>]) -> BTreeSet<usize>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<usize> = seeds.into_iter().collect();
        while let Some(node) = pending.pop() {
            if seen.insert(node) {
                pending.extend(edges[node].iter().copied().filter(|n| !seen.contains(n)));
            }
        }
        seen
    }

    /// Members of `set` that are not an ancestor of another member
    pub(crate) fn heads_of(&self, set: &BTreeSet<usize>) -> BTreeSet<usize> {
        let closure = self.closure_up(set.iter().copied());
        set.iter()
            .copied()
            .filter(|&i| !self.children[i].iter().any(|c| closure.contains(c)))
            .collect()
    }

    pub(crate) fn ids(&self, set: &BTreeSet<usize>) -> BTreeSet<String> {
        set.iter().map(|&i| self.revisions[i].id().to_string()).collect()
    }

    /// Parents before children; ready revisions are taken in load order
    pub(crate) fn topological_order(&self, set: &BTreeSet<usize>) -> Vec<usize> {
        let mut in_degree: HashMap<usize, usize> = set
            .iter()
            .map(|&i| (i, self.parents[i].iter().filter(|p| set.contains(p)).count()))
            .collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&i, _)| i)
            .collect();

        let mut result = Vec::with_capacity(set.len());
        while let Some(current) = ready.pop_first() {
            result.push(current);
            for child in &self.children[current] {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
        result
    }

    /// Children before parents; ready revisions are taken latest-loaded first
    pub(crate) fn reverse_topological_order(&self, set: &BTreeSet<usize>) -> Vec<usize> {
        let mut out_degree: HashMap<usize, usize> = set
            .iter()
            .map(|&i| (i, self.children[i].iter().filter(|c| set.contains(c)).count()))
            .collect();

        let mut ready: BTreeSet<usize> = out_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&i, _)| i)
            .collect();

        let mut result = Vec::with_capacity(set.len());
        while let Some(current) = ready.pop_last() {
            result.push(current);
            for parent in &self.parents[current] {
                if let Some(degree) = out_degree.get_mut(parent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*parent);
                    }
                }
            }
        }
        result
    }

    /// Every revision, oldest first
    pub fn chronological(&self) -> Vec<&Revision> {
        let all: BTreeSet<usize> = (0..self.revisions.len()).collect();
        self.topological_order(&all)
            .into_iter()
            .map(|i| self.at(i))
            .collect()
    }
}
