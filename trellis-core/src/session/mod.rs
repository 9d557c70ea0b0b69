//! Sessions
//!
//! A session binds one sync channel to one component tree root and one
//! dependency graph. Its lifecycle: connection open -> render/sync loop ->
//! connection close, at which point every cell and computation it owns is
//! torn down. Sessions are fully independent of one another; there is no
//! cross-session shared mutable state in the core.
//!
//! # Processing Model
//!
//! Each session is a task with a strictly sequential loop. An event,
//! whether it arrives over the transport or through
//! [`SessionRegistry::deliver_event`], is processed to completion (open
//! batch -> handler -> settle renders -> diff -> send) before the next
//! event is looked at. Events arriving mid-batch simply wait in the queue.
//!
//! # Reconnects
//!
//! There is no partial-resume state. A dropped channel tears the session
//! down; a reconnect opens a fresh session whose first outbound message is
//! a full tree, equivalent to diffing against an empty committed tree.

mod registry;

pub use registry::{SessionHandle, SessionRegistry};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::diff::{apply, diff, PatchOp};
use crate::error::EngineError;
use crate::graph::DepGraph;
use crate::protocol::{EventPayload, Outbound};
use crate::reactive::{CellId, WriteBatch};
use crate::transport::Transport;
use crate::tree::{Component, Node, RenderPolicy, RenderTree};

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ceiling on cascaded render passes within one batch. Renders that keep
/// writing cells other renders read will hit this and fail as a cycle.
const MAX_SETTLE_PASSES: usize = 64;

/// The full reactive + tree + channel state for one remote connection.
pub struct Session<T: Transport> {
    id: SessionId,
    root: Arc<dyn Component>,
    policy: RenderPolicy,
    transport: T,
    graph: DepGraph,
    tree: Option<RenderTree>,
    committed: Option<Node>,
    seq: u64,
}

impl<T: Transport> Session<T> {
    /// Create a session. Nothing renders until [`Session::run`].
    pub fn new(
        id: SessionId,
        root: Arc<dyn Component>,
        transport: T,
        policy: RenderPolicy,
    ) -> Self {
        Self {
            id,
            root,
            policy,
            transport,
            graph: DepGraph::new(),
            tree: None,
            committed: None,
            seq: 0,
        }
    }

    /// The session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Drive the session to completion: initial full-tree send, then the
    /// event loop until the channel closes or a fatal error occurs.
    pub async fn run(mut self, mut events: mpsc::Receiver<EventPayload>) {
        if let Err(err) = self.bootstrap().await {
            error!(session = %self.id, %err, "session failed to start");
            self.teardown();
            return;
        }

        loop {
            let event = tokio::select! {
                inbound = self.transport.recv() => match inbound {
                    Some(msg) => EventPayload::from(msg),
                    None => break,
                },
                delivered = events.recv() => match delivered {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Err(err) = self.process_event(event).await {
                error!(session = %self.id, %err, "fatal session error");
                break;
            }
        }

        self.teardown();
    }

    /// Mount the root component and send the initial full tree.
    async fn bootstrap(&mut self) -> Result<(), EngineError> {
        let mut batch = WriteBatch::new();
        let tree = RenderTree::mount(
            Arc::clone(&self.root),
            &mut self.graph,
            &mut batch,
            self.policy,
        )?;
        self.tree = Some(tree);
        self.settle(batch.into_writes())?;

        let root = self.tree.as_ref().map(RenderTree::snapshot);
        self.transport
            .send(Outbound::FullTree {
                seq: self.seq,
                root: root.clone(),
            })
            .await?;
        self.seq += 1;
        self.committed = root;
        debug!(session = %self.id, "session bootstrapped");
        Ok(())
    }

    /// Process one interaction event end to end.
    async fn process_event(&mut self, event: EventPayload) -> Result<(), EngineError> {
        let Some(tree) = self.tree.as_ref() else {
            return Ok(());
        };
        let Some(component) = tree.component_for(event.node_id) else {
            // A stale event can race a teardown: the browser fires at a
            // node the server has already unmounted.
            warn!(
                session = %self.id,
                node_id = event.node_id,
                "ignoring event for unknown node"
            );
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        component.on_event(&event, &mut batch);
        if batch.is_empty() {
            return Ok(());
        }

        match self.settle(batch.into_writes()) {
            Ok(true) => self.commit().await,
            // Writes with no readers: nothing dirtied, nothing to send.
            Ok(false) => Ok(()),
            Err(EngineError::Render { tag, source }) => {
                warn!(
                    session = %self.id,
                    tag,
                    %source,
                    "render pass aborted, committed tree stays authoritative"
                );
                self.resend_committed().await
            }
            Err(err) => Err(err),
        }
    }

    /// Re-run dirty computations until no render produces further writes.
    ///
    /// Returns whether anything re-rendered. Errors if the batch has a
    /// dependency cycle or render writes refuse to settle.
    fn settle(&mut self, mut writes: IndexMap<CellId, u64>) -> Result<bool, EngineError> {
        let Some(tree) = self.tree.as_mut() else {
            return Ok(false);
        };

        let mut rendered = false;
        let mut passes = 0;
        while !writes.is_empty() {
            passes += 1;
            if passes > MAX_SETTLE_PASSES {
                return Err(EngineError::DependencyCycle(format!(
                    "render writes did not settle after {MAX_SETTLE_PASSES} passes"
                )));
            }

            let order = self.graph.dirty_after(&writes)?;
            if order.is_empty() {
                break;
            }

            let mut batch = WriteBatch::new();
            tree.rerun(&order, &writes, &mut self.graph, &mut batch)?;
            rendered = true;
            writes = batch.into_writes();
        }
        Ok(rendered)
    }

    /// Snapshot, diff against the committed tree, and ship the patch.
    ///
    /// The committed tree is only replaced after a successful send, so a
    /// failed send never leaves the server believing in a tree the
    /// renderer does not have.
    async fn commit(&mut self) -> Result<(), EngineError> {
        let Some(tree) = self.tree.as_ref() else {
            return Ok(());
        };
        let new_root = Some(tree.snapshot());

        let ops = diff(self.committed.as_ref(), new_root.as_ref());
        if ops.is_empty() {
            self.committed = new_root;
            return Ok(());
        }

        let msg = self.outbound_for(ops, &new_root);
        self.transport.send(msg).await?;
        self.seq += 1;
        self.committed = new_root;
        Ok(())
    }

    /// Choose the outgoing message for a non-empty patch: the patch itself
    /// if it verifies, a full tree otherwise.
    fn outbound_for(&self, ops: Vec<PatchOp>, new_root: &Option<Node>) -> Outbound {
        match self.verify(&ops, new_root) {
            Ok(()) => Outbound::Patch { seq: self.seq, ops },
            Err(err) => {
                warn!(session = %self.id, %err, "falling back to full-tree resend");
                Outbound::FullTree {
                    seq: self.seq,
                    root: new_root.clone(),
                }
            }
        }
    }

    /// Check the differ's round-trip invariant before shipping.
    fn verify(&self, ops: &[PatchOp], new_root: &Option<Node>) -> Result<(), EngineError> {
        let mut replayed = self.committed.clone();
        apply(&mut replayed, ops).map_err(|err| EngineError::DiffInvariant(err.to_string()))?;
        if &replayed != new_root {
            return Err(EngineError::DiffInvariant(
                "replayed patch does not reproduce the rendered tree".to_string(),
            ));
        }
        Ok(())
    }

    /// Re-send the committed tree unchanged after an aborted render pass.
    async fn resend_committed(&mut self) -> Result<(), EngineError> {
        self.transport
            .send(Outbound::FullTree {
                seq: self.seq,
                root: self.committed.clone(),
            })
            .await?;
        self.seq += 1;
        Ok(())
    }

    /// Release every cell and computation owned by this session.
    fn teardown(&mut self) {
        if let Some(tree) = self.tree.take() {
            tree.unmount(&mut self.graph);
        }
        debug!(session = %self.id, "session torn down");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
