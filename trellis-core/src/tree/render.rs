//! Render Pass
//!
//! The render pass maintains the live instance tree: one [`Instance`] per
//! mounted component, holding its computation id, its state slots, and the
//! attributes/children from its last render. Re-running a batch re-invokes
//! only the computations the scheduler marked dirty; everything else keeps
//! its cached output.
//!
//! # Child Matching
//!
//! When an instance re-renders, its new child list is matched against the
//! surviving instances from the previous render: explicit key first, else
//! type and position. Matched instances keep their computation id and state
//! slots; unmatched old instances are torn down (their cells are destroyed
//! and their subscriptions dropped); unmatched new children mount fresh.
//!
//! # Error Policy
//!
//! A failing render either aborts the pass, leaving the committed tree
//! authoritative ([`RenderPolicy::KeepCommitted`]), or substitutes an
//! `error` placeholder node at the failing instance and keeps going
//! ([`RenderPolicy::Placeholder`]).

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::graph::{ComputationId, DepGraph};
use crate::reactive::{CellId, WriteBatch};

use super::component::{Child, Component, RenderCtx, SlotStore};
use super::node::Node;

/// What to do when a component's render function fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPolicy {
    /// Abort the pass; the previously committed tree stays authoritative.
    #[default]
    KeepCommitted,

    /// Substitute an `error` placeholder node at the failing instance and
    /// continue the pass.
    Placeholder,
}

/// One mounted component instance.
struct Instance {
    id: ComputationId,
    component: Arc<dyn Component>,
    slots: SlotStore,
    attrs: IndexMap<String, super::node::AttrValue>,
    children: Vec<ChildSlot>,
    error_message: Option<String>,
}

/// A child position in an instance: inert content or a nested instance.
enum ChildSlot {
    Inert(Node),
    Mounted(Instance),
}

impl Instance {
    fn mount(
        component: Arc<dyn Component>,
        parent: Option<ComputationId>,
        graph: &mut DepGraph,
    ) -> Self {
        let id = ComputationId::next();
        graph.add_computation(id, parent);
        Self {
            id,
            component,
            slots: SlotStore::new(),
            attrs: IndexMap::new(),
            children: Vec::new(),
            error_message: None,
        }
    }
}

/// The live component tree for one session.
pub struct RenderTree {
    root: Instance,
    policy: RenderPolicy,
}

impl RenderTree {
    /// Mount the root component and render the initial tree.
    ///
    /// Writes performed during the initial render (e.g. cells initialized
    /// by two-way bindings) land in `batch` for the caller to flush.
    pub fn mount(
        root: Arc<dyn Component>,
        graph: &mut DepGraph,
        batch: &mut WriteBatch,
        policy: RenderPolicy,
    ) -> Result<Self, EngineError> {
        let mut root = Instance::mount(root, None, graph);
        let mut ancestors = Vec::new();
        render_instance(&mut root, graph, batch, &mut ancestors, policy)?;
        debug!(computations = graph.computation_count(), "tree mounted");
        Ok(Self { root, policy })
    }

    /// The root computation's id.
    pub fn root_id(&self) -> ComputationId {
        self.root.id
    }

    /// Re-run the given dirty computations, in the order provided by the
    /// scheduler (ancestors first).
    ///
    /// Computations that were unmounted by an earlier re-run in the same
    /// pass, or whose dependency record was refreshed by an ancestor's
    /// re-render, are skipped: running them would evaluate a stale tree.
    pub fn rerun(
        &mut self,
        order: &[ComputationId],
        writes: &IndexMap<CellId, u64>,
        graph: &mut DepGraph,
        batch: &mut WriteBatch,
    ) -> Result<(), EngineError> {
        for &id in order {
            if !graph.contains(id) || !graph.is_dirty(id, writes) {
                continue;
            }
            let mut ancestors = Vec::new();
            let policy = self.policy;
            find_and_render(&mut self.root, id, graph, batch, &mut ancestors, policy)?;
        }
        Ok(())
    }

    /// Assemble the current tree from cached instance output.
    pub fn snapshot(&self) -> Node {
        assemble(&self.root)
    }

    /// Resolve an inbound event's node identity to the owning component.
    pub fn component_for(&self, node_id: u64) -> Option<Arc<dyn Component>> {
        find_component(&self.root, node_id)
    }

    /// Tear down every instance, destroying owned cells and subscriptions.
    pub fn unmount(self, graph: &mut DepGraph) {
        unmount_instance(self.root, graph);
    }
}

/// Render one instance and reconcile its children.
fn render_instance(
    inst: &mut Instance,
    graph: &mut DepGraph,
    batch: &mut WriteBatch,
    ancestors: &mut Vec<HashSet<CellId>>,
    policy: RenderPolicy,
) -> Result<(), EngineError> {
    let component = Arc::clone(&inst.component);

    let (result, reads, cycle) = {
        let mut ctx = RenderCtx::new(inst.id, &mut inst.slots, batch, ancestors);
        let result = component.render(&mut ctx);
        let (reads, cycle) = ctx.finish();
        (result, reads, cycle)
    };

    if let Some(detail) = cycle {
        return Err(EngineError::DependencyCycle(detail));
    }

    let rendered = match result {
        Ok(rendered) => {
            inst.error_message = None;
            rendered
        }
        Err(source) => {
            graph.record_run(inst.id, reads);
            match policy {
                RenderPolicy::KeepCommitted => {
                    return Err(EngineError::Render {
                        tag: component.type_tag(),
                        source,
                    });
                }
                RenderPolicy::Placeholder => {
                    warn!(
                        tag = component.type_tag(),
                        error = %source,
                        "render failed, substituting placeholder"
                    );
                    inst.error_message = Some(source.to_string());
                    inst.attrs.clear();
                    for child in inst.children.drain(..) {
                        if let ChildSlot::Mounted(child) = child {
                            unmount_instance(child, graph);
                        }
                    }
                    return Ok(());
                }
            }
        }
    };

    let own_reads: HashSet<CellId> = reads.keys().copied().collect();
    graph.record_run(inst.id, reads);
    inst.attrs = rendered.attrs;
    reconcile_children(inst, rendered.children, graph, batch, ancestors, own_reads, policy)
}

/// A surviving instance from the previous render, available for matching.
struct PoolEntry {
    index: usize,
    tag: &'static str,
    key: Option<String>,
    instance: Instance,
}

fn reconcile_children(
    inst: &mut Instance,
    new_children: Vec<Child>,
    graph: &mut DepGraph,
    batch: &mut WriteBatch,
    ancestors: &mut Vec<HashSet<CellId>>,
    own_reads: HashSet<CellId>,
    policy: RenderPolicy,
) -> Result<(), EngineError> {
    let old_children = std::mem::take(&mut inst.children);
    let mut pool: Vec<Option<PoolEntry>> = old_children
        .into_iter()
        .enumerate()
        .filter_map(|(index, slot)| match slot {
            ChildSlot::Mounted(instance) => Some(Some(PoolEntry {
                index,
                tag: instance.component.type_tag(),
                key: instance.component.key().map(str::to_string),
                instance,
            })),
            ChildSlot::Inert(_) => None,
        })
        .collect();

    let parent_id = inst.id;
    ancestors.push(own_reads);
    let result = mount_children(
        inst,
        new_children,
        &mut pool,
        graph,
        batch,
        ancestors,
        policy,
        parent_id,
    );
    ancestors.pop();

    for entry in pool.into_iter().flatten() {
        unmount_instance(entry.instance, graph);
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn mount_children(
    inst: &mut Instance,
    new_children: Vec<Child>,
    pool: &mut Vec<Option<PoolEntry>>,
    graph: &mut DepGraph,
    batch: &mut WriteBatch,
    ancestors: &mut Vec<HashSet<CellId>>,
    policy: RenderPolicy,
    parent_id: ComputationId,
) -> Result<(), EngineError> {
    let mut next = Vec::with_capacity(new_children.len());
    for (position, child) in new_children.into_iter().enumerate() {
        match child {
            Child::Inert(mut node) => {
                // Inert nodes borrow the owning instance's identity so the
                // remote renderer can still address events at them.
                if node.node_id == 0 {
                    node.node_id = parent_id.raw();
                }
                next.push(ChildSlot::Inert(node));
            }
            Child::Component(component) => {
                let mut instance = match take_match(pool, component.as_ref(), position) {
                    Some(mut existing) => {
                        existing.component = Arc::clone(&component);
                        existing
                    }
                    None => Instance::mount(Arc::clone(&component), Some(parent_id), graph),
                };
                if let Err(err) = render_instance(&mut instance, graph, batch, ancestors, policy)
                {
                    // Unwind: everything mounted so far this pass must come
                    // back out of the graph, or failed passes leak
                    // computations and subscriptions.
                    unmount_instance(instance, graph);
                    for slot in next {
                        if let ChildSlot::Mounted(built) = slot {
                            unmount_instance(built, graph);
                        }
                    }
                    return Err(err);
                }
                next.push(ChildSlot::Mounted(instance));
            }
        }
    }
    inst.children = next;
    Ok(())
}

/// Take the old instance matching a new child: explicit key first, else
/// type and position.
fn take_match(
    pool: &mut [Option<PoolEntry>],
    component: &dyn Component,
    position: usize,
) -> Option<Instance> {
    let tag = component.type_tag();
    let key = component.key();
    let found = pool.iter().position(|entry| {
        entry.as_ref().is_some_and(|entry| match key {
            Some(key) => entry.tag == tag && entry.key.as_deref() == Some(key),
            None => entry.tag == tag && entry.key.is_none() && entry.index == position,
        })
    })?;
    pool[found].take().map(|entry| entry.instance)
}

fn unmount_instance(instance: Instance, graph: &mut DepGraph) {
    graph.remove_computation(instance.id);
    for cell in instance.slots.cell_ids() {
        graph.drop_cell(cell);
    }
    for child in instance.children {
        if let ChildSlot::Mounted(child) = child {
            unmount_instance(child, graph);
        }
    }
}

/// Descend to `target`, tracking ancestor read sets for cycle detection,
/// and re-render its subtree in place.
fn find_and_render(
    inst: &mut Instance,
    target: ComputationId,
    graph: &mut DepGraph,
    batch: &mut WriteBatch,
    ancestors: &mut Vec<HashSet<CellId>>,
    policy: RenderPolicy,
) -> Result<bool, EngineError> {
    if inst.id == target {
        render_instance(inst, graph, batch, ancestors, policy)?;
        return Ok(true);
    }

    let own_reads: HashSet<CellId> = graph
        .deps_of(inst.id)
        .map(|deps| deps.keys().copied().collect())
        .unwrap_or_default();
    ancestors.push(own_reads);

    let mut found = false;
    for child in inst.children.iter_mut() {
        if let ChildSlot::Mounted(child) = child {
            if find_and_render(child, target, graph, batch, ancestors, policy)? {
                found = true;
                break;
            }
        }
    }

    ancestors.pop();
    Ok(found)
}

fn assemble(inst: &Instance) -> Node {
    if let Some(message) = &inst.error_message {
        let mut node = Node::new("error").with_attr("message", message.clone());
        node.node_id = inst.id.raw();
        return node;
    }

    let mut node = Node {
        tag: inst.component.type_tag().to_string(),
        key: inst.component.key().map(str::to_string),
        node_id: inst.id.raw(),
        attrs: inst.attrs.clone(),
        children: Vec::with_capacity(inst.children.len()),
    };
    for child in &inst.children {
        node.children.push(match child {
            ChildSlot::Inert(n) => n.clone(),
            ChildSlot::Mounted(i) => assemble(i),
        });
    }
    node
}

fn find_component(inst: &Instance, node_id: u64) -> Option<Arc<dyn Component>> {
    if inst.id.raw() == node_id {
        return Some(Arc::clone(&inst.component));
    }
    inst.children.iter().find_map(|child| match child {
        ChildSlot::Mounted(i) => find_component(i, node_id),
        ChildSlot::Inert(_) => None,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
