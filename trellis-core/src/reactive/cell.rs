//! Cell Implementation
//!
//! A Cell is the fundamental reactive primitive. It holds a value and a
//! version number, and every committed write bumps the version exactly once.
//!
//! # How Cells Work
//!
//! 1. When a cell is read through a [`ReadScope`], the scope records the
//!    pair (cell id, version at read). This is the cell's only coupling to
//!    the dependency machinery: the cell itself never stores subscribers.
//!
//! 2. When a cell is written through a [`WriteBatch`], the version is
//!    incremented and the write is recorded in the batch. Dirtying of
//!    dependent computations happens when the batch is flushed; the value
//!    assignment itself is invisible until the next render pass commits.
//!
//! 3. A computation is dirty iff some recorded (id, version) pair no longer
//!    matches the cell's current version.
//!
//! # Write Semantics
//!
//! Writing a value equal to the current value still increments the version
//! and still dirties readers. Writes are observable, not "changes"; callers
//! that want deduplication must compare before writing.
//!
//! # Thread Safety
//!
//! The value lives behind a `parking_lot::RwLock` and the version behind an
//! atomic, so clones of a cell can be held across threads. Within one
//! session, all reads and writes happen from that session's single active
//! batch, so the lock is uncontended in practice.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::scope::{ReadScope, WriteBatch};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(u64);

impl CellId {
    /// Generate a new unique cell ID.
    pub fn next() -> Self {
        Self(CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A reactive cell holding a value of type T.
///
/// Cloning a cell shares the underlying value and version.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(0);
///
/// // Tracked read, inside a render pass:
/// let value = count.read(&mut scope);
///
/// // Write, inside a batch:
/// count.write(&mut batch, value + 1);
/// ```
pub struct Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this cell.
    id: CellId,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Monotonically increasing write counter. Starts at 0; the first
    /// committed write makes it 1.
    version: Arc<AtomicU64>,
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: CellId::next(),
            value: Arc::new(RwLock::new(value)),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> CellId {
        self.id
    }

    /// Get the current version.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Read the current value, recording the dependency in `scope`.
    ///
    /// The scope stores the version observed at read time; the scheduler
    /// later compares it against the cell's current version to decide
    /// whether the reading computation is stale.
    pub fn read(&self, scope: &mut ReadScope) -> T {
        scope.record_read(self.id, self.version());
        self.value.read().clone()
    }

    /// Read the current value without recording a dependency.
    pub fn peek(&self) -> T {
        self.value.read().clone()
    }

    /// Store a new value and record the write in `batch`.
    ///
    /// Increments the version exactly once, even if `value` equals the
    /// current value. The only externally observable effect is the dirtying
    /// that happens when the batch flushes.
    pub fn write(&self, batch: &mut WriteBatch, value: T) {
        {
            let mut guard = self.value.write();
            *guard = value;
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        batch.record_write(self.id, version);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, batch: &mut WriteBatch, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.write(batch, new_value);
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
            version: Arc::clone(&self.version),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("value", &self.peek())
            .field("version", &self.version())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
