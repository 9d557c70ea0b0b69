//! Graph Nodes
//!
//! This module defines the per-computation bookkeeping that lives in the
//! dependency graph: the identity of a render invocation and the dependency
//! record from its last run.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::reactive::CellId;

/// Unique identifier for a computation (one component instance's render).
///
/// The ID is allocated when the component instance mounts and stays stable
/// across re-renders, so it doubles as the node identity the remote renderer
/// uses to address interaction events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A computation's entry in the dependency graph.
#[derive(Debug)]
pub struct ComputationNode {
    /// Unique identifier for this computation.
    id: ComputationId,

    /// The computation whose render mounted this one, if any. Containment
    /// edges drive the topological ordering of re-runs: a parent's re-render
    /// may replace or remove children, so parents always run first.
    parent: Option<ComputationId>,

    /// Cells read during the last run, with the version observed at read.
    /// Replaced wholesale on every run.
    deps: IndexMap<CellId, u64>,

    /// Whether the computation has ever run. A computation that has never
    /// run is dirty by definition.
    has_run: bool,
}

impl ComputationNode {
    /// Create a node for a freshly mounted computation.
    pub fn new(id: ComputationId, parent: Option<ComputationId>) -> Self {
        Self {
            id,
            parent,
            deps: IndexMap::new(),
            has_run: false,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> ComputationId {
        self.id
    }

    /// Get the parent computation, if any.
    pub fn parent(&self) -> Option<ComputationId> {
        self.parent
    }

    /// The dependency record from the last run.
    pub fn deps(&self) -> &IndexMap<CellId, u64> {
        &self.deps
    }

    /// Whether the computation has run at least once.
    pub fn has_run(&self) -> bool {
        self.has_run
    }

    /// Replace the dependency record after a run.
    pub fn record_run(&mut self, deps: IndexMap<CellId, u64>) {
        self.deps = deps;
        self.has_run = true;
    }

    /// Whether this computation is stale given a set of writes.
    ///
    /// Dirty iff it has never run, or some written cell's new version
    /// differs from the version recorded at last read.
    pub fn is_dirty(&self, writes: &IndexMap<CellId, u64>) -> bool {
        if !self.has_run {
            return true;
        }
        writes.iter().any(|(cell, new_version)| {
            self.deps
                .get(cell)
                .is_some_and(|read_version| read_version != new_version)
        })
    }
}
