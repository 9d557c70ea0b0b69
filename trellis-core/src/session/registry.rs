//! Session Registry
//!
//! Tracks live sessions and owns their tasks. Opening a session spawns its
//! run loop onto the tokio runtime; the task removes itself from the
//! registry when its channel closes, and [`SessionRegistry::close_session`]
//! tears one down early from the server side.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::EngineError;
use crate::protocol::EventPayload;
use crate::transport::Transport;
use crate::tree::{Component, RenderPolicy};

use super::{Session, SessionId};

/// Buffered events per session before `deliver_event` applies backpressure.
const EVENT_QUEUE_DEPTH: usize = 64;

struct SessionEntry {
    events: mpsc::Sender<EventPayload>,
    task: Option<JoinHandle<()>>,
}

/// A handle to one live session, returned by
/// [`SessionRegistry::open_session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    events: mpsc::Sender<EventPayload>,
}

impl SessionHandle {
    /// The session's ID.
    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Registry of all live sessions on a server.
///
/// Cloning is cheap; clones share the same session table.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session over the given transport with the default render
    /// policy. The session's run loop is spawned immediately.
    pub fn open_session<T: Transport>(
        &self,
        root: Arc<dyn Component>,
        transport: T,
    ) -> SessionHandle {
        self.open_session_with_policy(root, transport, RenderPolicy::default())
    }

    /// Open a session with an explicit render-failure policy.
    pub fn open_session_with_policy<T: Transport>(
        &self,
        root: Arc<dyn Component>,
        transport: T,
        policy: RenderPolicy,
    ) -> SessionHandle {
        let id = SessionId::next();
        let (events, queue) = mpsc::channel(EVENT_QUEUE_DEPTH);
        self.inner.insert(
            id,
            SessionEntry {
                events: events.clone(),
                task: None,
            },
        );

        let session = Session::new(id, root, transport, policy);
        let table = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            session.run(queue).await;
            table.remove(&id);
        });

        // The task may already have finished and removed itself; in that
        // case the handle has nothing left to manage.
        if let Some(mut entry) = self.inner.get_mut(&id) {
            entry.task = Some(task);
        }

        info!(session = %id, "session opened");
        SessionHandle { id, events }
    }

    /// Deliver a server-originated event into a session's queue.
    ///
    /// # Errors
    ///
    /// [`EngineError::ChannelClosed`] if the session has already torn down.
    pub async fn deliver_event(
        &self,
        handle: &SessionHandle,
        event: EventPayload,
    ) -> Result<(), EngineError> {
        handle
            .events
            .send(event)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Tear a session down from the server side.
    pub fn close_session(&self, handle: SessionHandle) {
        if let Some((id, entry)) = self.inner.remove(&handle.id) {
            if let Some(task) = entry.task {
                task.abort();
            }
            info!(session = %id, "session closed");
        }
    }

    /// Look up a live session's handle by ID.
    pub fn handle_for(&self, id: SessionId) -> Option<SessionHandle> {
        self.inner.get(&id).map(|entry| SessionHandle {
            id,
            events: entry.events.clone(),
        })
    }

    /// Whether the session behind a handle is still live.
    pub fn is_active(&self, handle: &SessionHandle) -> bool {
        self.inner.contains_key(&handle.id)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.len()
    }
}
