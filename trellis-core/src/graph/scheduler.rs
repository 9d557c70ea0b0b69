//! Dependency Graph and Batch Scheduler
//!
//! The graph records which computations read which cells, and the scheduler
//! side of it turns a closed write batch into an ordered re-run plan.
//!
//! # Algorithm
//!
//! 1. A write batch closes with a set of (cell, new version) pairs.
//! 2. Every computation whose recorded read version for a written cell
//!    differs from the new version is dirty.
//! 3. The dirty set is ordered topologically over containment edges
//!    (Kahn's algorithm), so a parent always re-runs before a descendant.
//!    Re-rendering a parent may replace or remove children whose own dirty
//!    computations would otherwise run against a stale tree.
//! 4. If the sort cannot consume the whole dirty set, the batch has a
//!    dependency cycle and the session is failed rather than looping.
//!
//! Before a computation re-runs, its old dependency record is dropped from
//! the reverse index, so ghost subscriptions from earlier runs never dirty
//! it again.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::trace;

use super::node::{ComputationId, ComputationNode};
use crate::error::EngineError;
use crate::reactive::CellId;

/// The per-session dependency graph.
///
/// Holds one [`ComputationNode`] per live component instance plus a reverse
/// index from cells to the computations that read them last run.
#[derive(Debug, Default)]
pub struct DepGraph {
    /// All live computations, indexed by ID.
    nodes: HashMap<ComputationId, ComputationNode>,

    /// Reverse index: cell -> computations that recorded a read of it.
    readers: HashMap<CellId, HashSet<ComputationId>>,
}

impl DepGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly mounted computation.
    pub fn add_computation(&mut self, id: ComputationId, parent: Option<ComputationId>) {
        self.nodes.insert(id, ComputationNode::new(id, parent));
    }

    /// Remove a computation on teardown, dropping all its subscriptions.
    pub fn remove_computation(&mut self, id: ComputationId) {
        if let Some(node) = self.nodes.remove(&id) {
            for cell in node.deps().keys() {
                if let Some(readers) = self.readers.get_mut(cell) {
                    readers.remove(&id);
                    if readers.is_empty() {
                        self.readers.remove(cell);
                    }
                }
            }
        }
    }

    /// Drop a destroyed cell from the reverse index.
    ///
    /// Called when the component scope owning the cell is torn down.
    pub fn drop_cell(&mut self, cell: CellId) {
        self.readers.remove(&cell);
    }

    /// Whether a computation is still registered.
    pub fn contains(&self, id: ComputationId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The dependency record of a computation's last run.
    pub fn deps_of(&self, id: ComputationId) -> Option<&IndexMap<CellId, u64>> {
        self.nodes.get(&id).map(|n| n.deps())
    }

    /// Whether `id` is stale with respect to `writes`.
    pub fn is_dirty(&self, id: ComputationId, writes: &IndexMap<CellId, u64>) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.is_dirty(writes))
    }

    /// Replace a computation's dependency record after a run.
    ///
    /// The old record's subscriptions are cleared first, then the fresh
    /// reads are installed in the reverse index.
    pub fn record_run(&mut self, id: ComputationId, deps: IndexMap<CellId, u64>) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let old_cells: Vec<CellId> = node.deps().keys().copied().collect();
        for cell in old_cells {
            if let Some(readers) = self.readers.get_mut(&cell) {
                readers.remove(&id);
                if readers.is_empty() {
                    self.readers.remove(&cell);
                }
            }
        }
        for cell in deps.keys() {
            self.readers.entry(*cell).or_default().insert(id);
        }
        node.record_run(deps);
    }

    /// Computations that recorded a read of `cell`.
    pub fn readers_of(&self, cell: CellId) -> impl Iterator<Item = ComputationId> + '_ {
        self.readers.get(&cell).into_iter().flatten().copied()
    }

    /// Number of live computations.
    pub fn computation_count(&self) -> usize {
        self.nodes.len()
    }

    /// Compute the ordered dirty set for a closed batch.
    ///
    /// Returns the dirty computations in an order where every computation
    /// comes after its nearest dirty ancestor. A write to a cell with no
    /// readers contributes nothing.
    ///
    /// # Errors
    ///
    /// [`EngineError::DependencyCycle`] if the dirty set cannot be
    /// topologically ordered.
    pub fn dirty_after(
        &self,
        writes: &IndexMap<CellId, u64>,
    ) -> Result<Vec<ComputationId>, EngineError> {
        let mut dirty: Vec<ComputationId> = Vec::new();
        let mut seen: HashSet<ComputationId> = HashSet::new();

        for (cell, new_version) in writes {
            for reader in self.readers_of(*cell) {
                if seen.contains(&reader) {
                    continue;
                }
                if let Some(node) = self.nodes.get(&reader) {
                    let stale = node
                        .deps()
                        .get(cell)
                        .is_none_or(|read_version| read_version != new_version);
                    if stale {
                        seen.insert(reader);
                        dirty.push(reader);
                    }
                }
            }
        }

        trace!(written = writes.len(), dirty = dirty.len(), "batch closed");
        self.order_by_containment(dirty)
    }

    /// Topologically sort `dirty` so ancestors come before descendants.
    ///
    /// Uses Kahn's algorithm over "nearest ancestor in the set" edges. The
    /// containment relation of a live tree is acyclic, so a sort that fails
    /// to consume the set means the graph has been corrupted by a cycle.
    fn order_by_containment(
        &self,
        dirty: Vec<ComputationId>,
    ) -> Result<Vec<ComputationId>, EngineError> {
        let set: HashSet<ComputationId> = dirty.iter().copied().collect();
        let mut children: HashMap<ComputationId, Vec<ComputationId>> = HashMap::new();
        let mut in_degree: HashMap<ComputationId, usize> = HashMap::new();

        for &id in &dirty {
            let ancestor = self.nearest_ancestor_in(id, &set);
            match ancestor {
                Some(parent) => {
                    children.entry(parent).or_default().push(id);
                    in_degree.insert(id, 1);
                }
                None => {
                    in_degree.insert(id, 0);
                }
            }
        }

        let mut queue: VecDeque<ComputationId> = dirty
            .iter()
            .copied()
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();
        let mut result = Vec::with_capacity(dirty.len());

        while let Some(id) = queue.pop_front() {
            result.push(id);
            if let Some(kids) = children.get(&id) {
                for &kid in kids {
                    if let Some(degree) = in_degree.get_mut(&kid) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(kid);
                        }
                    }
                }
            }
        }

        if result.len() != dirty.len() {
            return Err(EngineError::DependencyCycle(format!(
                "could not order {} of {} dirty computations",
                dirty.len() - result.len(),
                dirty.len()
            )));
        }

        Ok(result)
    }

    /// Walk the parent chain of `id` to the nearest computation in `set`.
    fn nearest_ancestor_in(
        &self,
        id: ComputationId,
        set: &HashSet<ComputationId>,
    ) -> Option<ComputationId> {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent());
        while let Some(ancestor) = current {
            if set.contains(&ancestor) {
                return Some(ancestor);
            }
            current = self.nodes.get(&ancestor).and_then(|n| n.parent());
        }
        None
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
