//! Read Scopes and Write Batches
//!
//! These are the explicit tracking contexts threaded through the engine.
//! Instead of relying on an ambient thread-local to know "which computation
//! is currently rendering", every tracked read takes a `&mut ReadScope` and
//! every write takes a `&mut WriteBatch`. This keeps the reactive system
//! testable and reentrant, and makes "write outside a batch" impossible to
//! express rather than a silent no-op.
//!
//! # Read Scopes
//!
//! A [`ReadScope`] belongs to exactly one computation (one render
//! invocation). It records the (cell id, version at read) pairs observed
//! during the run. After the run, the record replaces the computation's
//! previous dependency set in the graph, so stale subscriptions never
//! linger.
//!
//! # Write Batches
//!
//! A [`WriteBatch`] coalesces all writes that occur within one logical tick
//! (one incoming browser event, or several cell writes inside one event
//! handler) into a single render/diff/sync cycle. Intermediate inconsistent
//! states are never rendered or synced.

use indexmap::IndexMap;

use super::cell::CellId;
use crate::graph::ComputationId;

/// Dependency-recording context for one render invocation.
#[derive(Debug)]
pub struct ReadScope {
    /// The computation this scope belongs to.
    computation: ComputationId,

    /// Cells read during this run, with the version observed at first read.
    reads: IndexMap<CellId, u64>,
}

impl ReadScope {
    /// Create a fresh scope for the given computation.
    pub fn new(computation: ComputationId) -> Self {
        Self {
            computation,
            reads: IndexMap::new(),
        }
    }

    /// The computation this scope records for.
    pub fn computation(&self) -> ComputationId {
        self.computation
    }

    /// Record a read of `cell` at `version`.
    ///
    /// Only the first read of a cell is recorded; later reads within the
    /// same run observe the same version because values only change between
    /// batches.
    pub fn record_read(&mut self, cell: CellId, version: u64) {
        self.reads.entry(cell).or_insert(version);
    }

    /// Whether this scope has recorded a read of `cell`.
    pub fn has_read(&self, cell: CellId) -> bool {
        self.reads.contains_key(&cell)
    }

    /// The recorded dependency set.
    pub fn reads(&self) -> &IndexMap<CellId, u64> {
        &self.reads
    }

    /// Consume the scope, yielding the recorded dependency set.
    pub fn into_reads(self) -> IndexMap<CellId, u64> {
        self.reads
    }
}

/// Write-coalescing context for one logical tick.
///
/// All writes recorded here are flushed together: the scheduler computes
/// the dirty set from the recorded (cell, new version) pairs, re-runs dirty
/// computations in dependency order, and exactly one patch batch results.
#[derive(Debug, Default)]
pub struct WriteBatch {
    /// Cells written during this tick, with the latest version written.
    writes: IndexMap<CellId, u64>,
}

impl WriteBatch {
    /// Open a new, empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write of `cell` producing `version`.
    pub fn record_write(&mut self, cell: CellId, version: u64) {
        self.writes.insert(cell, version);
    }

    /// Whether any writes were recorded.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The recorded writes.
    pub fn writes(&self) -> &IndexMap<CellId, u64> {
        &self.writes
    }

    /// Consume the batch, yielding the recorded writes.
    pub fn into_writes(self) -> IndexMap<CellId, u64> {
        self.writes
    }
}
