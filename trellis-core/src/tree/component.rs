//! Component Authoring Interface
//!
//! A component is anything that can render itself into attributes plus an
//! ordered list of children, given a [`RenderCtx`]. The engine does not
//! prescribe attribute schemas; it only requires that renders be pure
//! functions of the cells they read, because the differ assumes that equal
//! dependency values produce equal output shape.
//!
//! # State
//!
//! Components keep per-instance state in cells obtained from
//! [`RenderCtx::cell`]. Cells are allocated positionally on first render
//! and handed back on later renders, so a component must request them in a
//! stable order. A cell created this way is owned by the component scope:
//! it is destroyed when the instance unmounts.
//!
//! # Keys
//!
//! A component should declare an explicit key whenever the order among
//! siblings of the same type can change; otherwise siblings are matched by
//! type and position, and a reorder tears state down.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ComponentError;
use crate::graph::ComputationId;
use crate::protocol::EventPayload;
use crate::reactive::{Cell, CellId, ReadScope, WriteBatch};

use super::node::{AttrValue, Node};

/// A renderable component.
pub trait Component: Send + Sync + 'static {
    /// The type tag, used for node identity and diffing.
    fn type_tag(&self) -> &'static str;

    /// Explicit stable key among siblings, if any.
    fn key(&self) -> Option<&str> {
        None
    }

    /// Produce this instance's attributes and children.
    ///
    /// Must be a pure function of the cells read through `ctx`.
    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError>;

    /// Handle an interaction event addressed to this instance (or one of
    /// its inert child nodes). Writes go into the supplied batch.
    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        let _ = (event, batch);
    }
}

/// The output of one render: own attributes plus ordered children.
#[derive(Default)]
pub struct Rendered {
    /// Attribute mapping for this node.
    pub attrs: IndexMap<String, AttrValue>,

    /// Ordered children: inert nodes or child components to mount.
    pub children: Vec<Child>,
}

/// One child produced by a render.
pub enum Child {
    /// A plain node with no behavior and no state of its own.
    Inert(Node),

    /// A child component, to be mounted (or matched against a surviving
    /// instance) and rendered recursively.
    Component(Arc<dyn Component>),
}

impl Rendered {
    /// An empty render output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Builder: append an inert child node.
    pub fn node(mut self, node: Node) -> Self {
        self.children.push(Child::Inert(node));
        self
    }

    /// Builder: append a child component.
    pub fn child(mut self, component: Arc<dyn Component>) -> Self {
        self.children.push(Child::Component(component));
        self
    }
}

/// Per-instance cell storage, keyed by call order.
pub(crate) struct SlotStore {
    slots: Vec<Slot>,
    cursor: usize,
}

struct Slot {
    cell_id: CellId,
    cell: Box<dyn Any + Send + Sync>,
}

impl SlotStore {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
        }
    }

    /// Reset the cursor at the start of a render.
    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    /// IDs of all cells owned by this store.
    pub(crate) fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.slots.iter().map(|s| s.cell_id)
    }

    /// Return the cell at the current slot, creating it on first render.
    fn next_cell<T, F>(&mut self, init: F) -> Result<Cell<T>, ComponentError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let index = self.cursor;
        self.cursor += 1;

        if let Some(slot) = self.slots.get(index) {
            let cell = slot
                .cell
                .downcast_ref::<Cell<T>>()
                .ok_or_else(|| {
                    ComponentError::new(format!(
                        "state slot {index} was created with a different type; \
                         cells must be requested in a stable order"
                    ))
                })?
                .clone();
            return Ok(cell);
        }

        let cell = Cell::new(init());
        self.slots.push(Slot {
            cell_id: cell.id(),
            cell: Box::new(cell.clone()),
        });
        Ok(cell)
    }
}

/// The context handed to a component's render function.
///
/// Wraps the instance's [`ReadScope`] and state slots, and mediates the few
/// writes that are legal during a render (two-way bindings). Writes to a
/// cell that the writing computation, or any ancestor on the current render
/// stack, has already read are dependency cycles and fail the batch.
pub struct RenderCtx<'a> {
    scope: ReadScope,
    slots: &'a mut SlotStore,
    batch: &'a mut WriteBatch,
    ancestor_reads: &'a [HashSet<CellId>],
    cycle: Option<String>,
}

impl<'a> RenderCtx<'a> {
    pub(crate) fn new(
        computation: ComputationId,
        slots: &'a mut SlotStore,
        batch: &'a mut WriteBatch,
        ancestor_reads: &'a [HashSet<CellId>],
    ) -> Self {
        slots.begin();
        Self {
            scope: ReadScope::new(computation),
            slots,
            batch,
            ancestor_reads,
            cycle: None,
        }
    }

    /// Read a cell, recording the dependency.
    pub fn get<T>(&mut self, cell: &Cell<T>) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        cell.read(&mut self.scope)
    }

    /// Get this instance's cell at the next state slot, creating it with
    /// `init` on first render.
    pub fn cell<T, F>(&mut self, init: F) -> Result<Cell<T>, ComponentError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.slots.next_cell(init)
    }

    /// Write a cell from within a render.
    ///
    /// Legal only for cells this computation has not read in the current
    /// pass (directly or through an ancestor). A violating write is a
    /// dependency cycle: it would schedule the writer to re-run forever.
    pub fn write<T>(&mut self, cell: &Cell<T>, value: T) -> Result<(), ComponentError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = cell.id();
        let cycles = self.scope.has_read(id)
            || self.ancestor_reads.iter().any(|reads| reads.contains(&id));
        if cycles {
            let detail = format!(
                "computation {:?} wrote cell {:?} read in the same render pass",
                self.scope.computation(),
                id
            );
            self.cycle = Some(detail.clone());
            return Err(ComponentError::new(detail));
        }
        cell.write(self.batch, value);
        Ok(())
    }

    /// Dismantle the context after the render, yielding the dependency
    /// record and any cycle detected by an in-render write.
    pub(crate) fn finish(self) -> (IndexMap<CellId, u64>, Option<String>) {
        (self.scope.into_reads(), self.cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_hand_back_same_cell_across_renders() {
        let mut slots = SlotStore::new();

        slots.begin();
        let first: Cell<i32> = slots.next_cell(|| 5).unwrap();

        slots.begin();
        let second: Cell<i32> = slots.next_cell(|| 99).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(second.peek(), 5);
    }

    #[test]
    fn slot_type_mismatch_is_an_error() {
        let mut slots = SlotStore::new();

        slots.begin();
        let _c: Cell<i32> = slots.next_cell(|| 0).unwrap();

        slots.begin();
        let result: Result<Cell<String>, _> = slots.next_cell(String::new);
        assert!(result.is_err());
    }

    #[test]
    fn ctx_write_to_read_cell_is_a_cycle() {
        let cell = Cell::new(0);
        let mut slots = SlotStore::new();
        let mut batch = WriteBatch::new();
        let ancestors: Vec<HashSet<CellId>> = Vec::new();

        let mut ctx = RenderCtx::new(
            ComputationId::next(),
            &mut slots,
            &mut batch,
            &ancestors,
        );
        let _ = ctx.get(&cell);
        assert!(ctx.write(&cell, 1).is_err());

        let (_, cycle) = ctx.finish();
        assert!(cycle.is_some());
    }

    #[test]
    fn ctx_write_to_ancestor_read_cell_is_a_cycle() {
        let cell = Cell::new(0);
        let mut slots = SlotStore::new();
        let mut batch = WriteBatch::new();
        let ancestors = vec![HashSet::from([cell.id()])];

        let mut ctx = RenderCtx::new(
            ComputationId::next(),
            &mut slots,
            &mut batch,
            &ancestors,
        );
        assert!(ctx.write(&cell, 1).is_err());
    }

    #[test]
    fn ctx_write_to_unread_cell_is_allowed() {
        let cell = Cell::new(0);
        let mut slots = SlotStore::new();
        let mut batch = WriteBatch::new();
        let ancestors: Vec<HashSet<CellId>> = Vec::new();

        let mut ctx = RenderCtx::new(
            ComputationId::next(),
            &mut slots,
            &mut batch,
            &ancestors,
        );
        ctx.write(&cell, 7).unwrap();

        let (_, cycle) = ctx.finish();
        assert!(cycle.is_none());
        assert_eq!(cell.peek(), 7);
        assert!(!batch.is_empty());
    }
}
