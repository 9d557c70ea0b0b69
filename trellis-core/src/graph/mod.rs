//! Dependency Graph
//!
//! This module implements the dependency graph that connects cells to the
//! computations that read them, and the scheduling logic that turns a
//! closed write batch into an ordered re-run plan.
//!
//! # Overview
//!
//! The graph has two kinds of edges:
//!
//! - Read edges: cell -> computation, recorded during a render and replaced
//!   wholesale on every re-run.
//! - Containment edges: parent computation -> child computation, mirroring
//!   the component tree. These drive re-run ordering, because a parent's
//!   re-render decides which children even exist.
//!
//! # Design Decisions
//!
//! 1. The graph is per-session and centrally owned, rather than distributed
//!    across cells, because that makes topological ordering and cycle
//!    detection straightforward and keeps cells themselves passive.
//!
//! 2. Dirtiness is version-based: a computation is dirty iff some recorded
//!    (cell, version-at-read) pair no longer matches the cell's current
//!    version. There is no "maybe dirty" state; writes always count.

mod node;
mod scheduler;

pub use node::{ComputationId, ComputationNode};
pub use scheduler::DepGraph;
