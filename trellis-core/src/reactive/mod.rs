//! Reactive Primitives
//!
//! This module implements the core reactive state system: cells and the
//! explicit tracking contexts used to read and write them.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for one piece of mutable state. It carries a
//! monotonically increasing version number: every committed write bumps the
//! version exactly once, whether or not the value changed.
//!
//! ## Scopes and Batches
//!
//! Reads go through a [`ReadScope`], which records which cells (and at which
//! versions) a computation observed. Writes go through a [`WriteBatch`],
//! which coalesces all writes of one logical tick into a single re-render
//! pass.
//!
//! # Implementation Notes
//!
//! Many reactive systems (SolidJS, Vue 3, Leptos) detect dependencies with
//! an ambient thread-local "current computation" context. Here the context
//! is an explicit parameter instead: render functions receive the scope and
//! hand it to every read. This trades a little ceremony for reentrancy and
//! straightforward testing, and it lets the type system rule out writes
//! outside a batch entirely.

mod cell;
mod scope;

pub use cell::{Cell, CellId};
pub use scope::{ReadScope, WriteBatch};
