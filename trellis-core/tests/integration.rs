//! Integration Tests for the Session Loop
//!
//! These tests drive full sessions over the in-process transport: mount,
//! event, re-render, diff, and the patch batches a remote renderer would
//! receive.

use std::sync::Arc;

use trellis_core::diff::PatchOp;
use trellis_core::error::{ComponentError, EngineError};
use trellis_core::protocol::{EventPayload, Inbound, Outbound};
use trellis_core::reactive::{Cell, WriteBatch};
use trellis_core::session::SessionRegistry;
use trellis_core::transport::memory::{self, ClientEnd};
use trellis_core::tree::{AttrValue, Component, Node, RenderCtx, RenderPolicy, Rendered};

/// A counter that renders its value as an attribute and increments on an
/// `increment` event.
struct Counter {
    count: Cell<i64>,
}

impl Counter {
    fn new() -> Self {
        Self {
            count: Cell::new(0),
        }
    }
}

impl Component for Counter {
    fn type_tag(&self) -> &'static str {
        "counter"
    }

    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        let value = ctx.get(&self.count);
        Ok(Rendered::new().attr("count", value))
    }

    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        match event.name.as_str() {
            "increment" => self.count.write(batch, self.count.peek() + 1),
            // Writes the current value back unchanged.
            "touch" => self.count.write(batch, self.count.peek()),
            _ => {}
        }
    }
}

/// A keyed item with stable output, so reorders diff to pure moves.
struct Item {
    key: String,
}

impl Component for Item {
    fn type_tag(&self) -> &'static str {
        "item"
    }

    fn key(&self) -> Option<&str> {
        Some(&self.key)
    }

    fn render(&self, _ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        Ok(Rendered::new().attr("k", self.key.as_str()))
    }
}

/// A list of keyed items that rotates its order on a `rotate` event.
struct ItemList {
    items: Cell<Vec<String>>,
}

impl Component for ItemList {
    fn type_tag(&self) -> &'static str {
        "list"
    }

    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        let mut out = Rendered::new();
        for key in ctx.get(&self.items) {
            out = out.child(Arc::new(Item { key }));
        }
        Ok(out)
    }

    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        if event.name == "rotate" {
            let mut items = self.items.peek();
            items.rotate_left(1);
            self.items.write(batch, items);
        }
    }
}

/// Renders nothing state-dependent, but writes a cell nothing reads.
struct DeadEnd {
    unused: Cell<i64>,
}

impl Component for DeadEnd {
    fn type_tag(&self) -> &'static str {
        "dead-end"
    }

    fn render(&self, _ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        Ok(Rendered::new().attr("static", true))
    }

    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        if event.name == "poke" {
            self.unused.write(batch, self.unused.peek() + 1);
        }
    }
}

/// A parent and child that both render from the same shared cell.
struct SharedChild {
    shared: Cell<String>,
}

impl Component for SharedChild {
    fn type_tag(&self) -> &'static str {
        "shared-child"
    }

    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        let value = ctx.get(&self.shared);
        Ok(Rendered::new().attr("echo", value))
    }
}

struct SharedParent {
    shared: Cell<String>,
}

impl Component for SharedParent {
    fn type_tag(&self) -> &'static str {
        "shared-parent"
    }

    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        let value = ctx.get(&self.shared);
        Ok(Rendered::new().attr("title", value).child(Arc::new(
            SharedChild {
                shared: self.shared.clone(),
            },
        )))
    }

    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        if event.name == "set" {
            if let AttrValue::String(value) = &event.data {
                self.shared.write(batch, value.clone());
            }
        }
    }
}

/// Once kicked, renders by writing the very cell it just read.
struct Feedback {
    value: Cell<i64>,
}

impl Component for Feedback {
    fn type_tag(&self) -> &'static str {
        "feedback"
    }

    fn render(&self, ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        let value = ctx.get(&self.value);
        if value > 0 {
            ctx.write(&self.value, value + 1)?;
        }
        Ok(Rendered::new().attr("value", value))
    }

    fn on_event(&self, event: &EventPayload, batch: &mut WriteBatch) {
        if event.name == "kick" {
            self.value.write(batch, 1);
        }
    }
}

struct Failing;

impl Component for Failing {
    fn type_tag(&self) -> &'static str {
        "failing"
    }

    fn render(&self, _ctx: &mut RenderCtx<'_>) -> Result<Rendered, ComponentError> {
        Err(ComponentError::new("deliberate"))
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

async fn expect_full_tree(client: &mut ClientEnd) -> (u64, Node) {
    match client.recv().await {
        Some(Outbound::FullTree {
            seq,
            root: Some(root),
        }) => (seq, root),
        other => panic!("expected full tree, got {other:?}"),
    }
}

async fn expect_patch(client: &mut ClientEnd) -> (u64, Vec<PatchOp>) {
    match client.recv().await {
        Some(Outbound::Patch { seq, ops }) => (seq, ops),
        other => panic!("expected patch, got {other:?}"),
    }
}

fn event(node_id: u64, name: &str) -> Inbound {
    Inbound::Event {
        seq: 0,
        node_id,
        name: name.to_string(),
        data: AttrValue::Null,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

/// Test that a session's first message is always the full tree.
#[tokio::test]
async fn session_opens_with_full_tree() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(Arc::new(Counter::new()), server);

    let (seq, root) = expect_full_tree(&mut client).await;
    assert_eq!(seq, 0);
    assert_eq!(root.tag, "counter");
    assert_eq!(root.attrs.get("count"), Some(&AttrValue::from(0i64)));
}

/// Test that one counter click produces exactly one patch with a single
/// attribute update.
#[tokio::test]
async fn counter_click_patches_one_attribute() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(Arc::new(Counter::new()), server);

    let (_, root) = expect_full_tree(&mut client).await;
    client.send(event(root.node_id, "increment")).await.unwrap();

    let (seq, ops) = expect_patch(&mut client).await;
    assert_eq!(seq, 1);
    assert_eq!(ops.len(), 1);
    assert!(matches!(
        &ops[0],
        PatchOp::UpdateAttr { path, name, value: Some(AttrValue::Int(1)) }
            if path.is_empty() && name == "count"
    ));
}

/// Test that reordering keyed children diffs to moves only, with no
/// inserts or removals.
#[tokio::test]
async fn keyed_reorder_diffs_to_moves() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(
        Arc::new(ItemList {
            items: Cell::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
        }),
        server,
    );

    let (_, root) = expect_full_tree(&mut client).await;
    assert_eq!(root.children.len(), 3);

    client.send(event(root.node_id, "rotate")).await.unwrap();
    let (_, ops) = expect_patch(&mut client).await;

    assert!(!ops.is_empty());
    assert!(
        ops.iter().all(|op| matches!(op, PatchOp::Move { .. })),
        "expected only moves, got {ops:?}"
    );
}

/// Test that a write with no readers produces no outbound traffic. A
/// later productive event is the next message the client sees, proving
/// nothing was sent in between.
#[tokio::test]
async fn write_with_no_readers_sends_nothing() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(
        Arc::new(DeadEnd {
            unused: Cell::new(0),
        }),
        server,
    );

    let (_, root) = expect_full_tree(&mut client).await;
    client.send(event(root.node_id, "poke")).await.unwrap();
    client.send(event(root.node_id, "poke")).await.unwrap();

    // Hang up after the pokes; the session drains its queue, tears down,
    // and the only message it ever sent was the initial full tree.
    let mut remaining = client.close();
    assert!(remaining.recv().await.is_none());
    drop(registry);
}

/// Test that re-rendering to an identical tree sends no patch, even
/// though the write bumped the cell version and dirtied the reader.
#[tokio::test]
async fn identical_rerender_sends_no_patch() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(Arc::new(Counter::new()), server);

    let (_, root) = expect_full_tree(&mut client).await;
    client.send(event(root.node_id, "touch")).await.unwrap();
    client.send(event(root.node_id, "increment")).await.unwrap();

    // The increment's patch arrives with seq 1: the touch consumed no
    // sequence number because it sent nothing.
    let (seq, ops) = expect_patch(&mut client).await;
    assert_eq!(seq, 1);
    assert_eq!(ops.len(), 1);
}

/// Test that an event addressed at an unknown node is dropped without
/// disturbing the session.
#[tokio::test]
async fn unknown_node_event_is_dropped() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(Arc::new(Counter::new()), server);

    let (_, root) = expect_full_tree(&mut client).await;
    client.send(event(u64::MAX, "increment")).await.unwrap();
    client.send(event(root.node_id, "increment")).await.unwrap();

    let (seq, _) = expect_patch(&mut client).await;
    assert_eq!(seq, 1);
}

/// Test that one write read by a parent and child re-renders both within
/// a single patch batch.
#[tokio::test]
async fn shared_write_batches_into_one_patch() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(
        Arc::new(SharedParent {
            shared: Cell::new("old".to_string()),
        }),
        server,
    );

    let (_, root) = expect_full_tree(&mut client).await;
    client
        .send(Inbound::Event {
            seq: 0,
            node_id: root.node_id,
            name: "set".to_string(),
            data: AttrValue::from("new"),
        })
        .await
        .unwrap();

    let (_, ops) = expect_patch(&mut client).await;
    let updates: Vec<_> = ops
        .iter()
        .filter_map(|op| match op {
            PatchOp::UpdateAttr { name, value, .. } => Some((name.as_str(), value.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(updates.len(), 2);
    assert!(updates
        .iter()
        .all(|(_, value)| *value == Some(AttrValue::from("new"))));
}

/// Test that a reconnect is a fresh session whose first message is again
/// the full tree, with sequence numbers starting over.
#[tokio::test]
async fn reconnect_starts_with_full_tree() {
    let registry = SessionRegistry::new();

    let (server, mut client) = memory::pair(8);
    let first = registry.open_session(Arc::new(Counter::new()), server);
    let (_, root) = expect_full_tree(&mut client).await;
    client.send(event(root.node_id, "increment")).await.unwrap();
    let (seq, _) = expect_patch(&mut client).await;
    assert_eq!(seq, 1);

    // Drop the connection; the session tears down on its own.
    drop(client.close());

    let (server, mut client) = memory::pair(8);
    let second = registry.open_session(Arc::new(Counter::new()), server);
    assert_ne!(first.id(), second.id());

    let (seq, root) = expect_full_tree(&mut client).await;
    assert_eq!(seq, 0);
    // No partial resume: the new session starts from its own state.
    assert_eq!(root.attrs.get("count"), Some(&AttrValue::from(0i64)));
}

/// Test server-side event delivery through the registry.
#[tokio::test]
async fn registry_delivers_server_side_events() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    let handle = registry.open_session(Arc::new(Counter::new()), server);

    let (_, root) = expect_full_tree(&mut client).await;
    registry
        .deliver_event(
            &handle,
            EventPayload {
                node_id: root.node_id,
                name: "increment".to_string(),
                data: AttrValue::Null,
            },
        )
        .await
        .unwrap();

    let (_, ops) = expect_patch(&mut client).await;
    assert_eq!(ops.len(), 1);
}

/// Test that closing a session from the server side tears it down and
/// rejects further deliveries.
#[tokio::test]
async fn closed_session_rejects_events() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    let handle = registry.open_session(Arc::new(Counter::new()), server);
    let _ = expect_full_tree(&mut client).await;

    assert_eq!(registry.session_count(), 1);
    registry.close_session(handle.clone());
    assert!(!registry.is_active(&handle));
    assert_eq!(registry.session_count(), 0);

    // The aborted task drops its transport; once the client observes the
    // hangup the event queue is gone too.
    assert!(client.recv().await.is_none());

    let result = registry
        .deliver_event(
            &handle,
            EventPayload {
                node_id: 1,
                name: "increment".to_string(),
                data: AttrValue::Null,
            },
        )
        .await;
    assert!(matches!(result, Err(EngineError::ChannelClosed)));
}

/// Test that a render writing a cell it read is fatal: the session tears
/// down with nothing committed past the last good tree.
#[tokio::test]
async fn in_render_cycle_tears_the_session_down() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session(
        Arc::new(Feedback {
            value: Cell::new(0),
        }),
        server,
    );

    let (_, root) = expect_full_tree(&mut client).await;
    assert_eq!(root.attrs.get("value"), Some(&AttrValue::from(0i64)));

    client.send(event(root.node_id, "kick")).await.unwrap();

    // The cycle aborts the batch before anything is sent; the next thing
    // the client observes is the hangup.
    assert!(client.recv().await.is_none());
}

/// Test that the placeholder policy surfaces a failing root as an error
/// node instead of killing the session.
#[tokio::test]
async fn placeholder_policy_ships_error_node() {
    let registry = SessionRegistry::new();
    let (server, mut client) = memory::pair(8);
    registry.open_session_with_policy(Arc::new(Failing), server, RenderPolicy::Placeholder);

    let (_, root) = expect_full_tree(&mut client).await;
    assert_eq!(root.tag, "error");
    assert_eq!(
        root.attrs.get("message"),
        Some(&AttrValue::from("deliberate"))
    );
}
