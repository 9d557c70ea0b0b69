//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis server-driven UI
//! framework. It implements:
//!
//! - Reactive state cells with versioned, batched writes
//! - A per-session dependency graph and re-render scheduler
//! - The component tree and render pass
//! - A keyed tree differ producing minimal patch batches
//! - The duplex sync protocol and its transports
//!
//! All UI state lives on the server. A remote renderer holds a dumb mirror
//! of the node tree, applies patch batches the server sends, and reports
//! interaction events back; it never computes state of its own.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: state cells, read scopes, and write batches
//! - `graph`: the dependency graph and dirty-computation scheduler
//! - `tree`: components, rendered nodes, and the render pass
//! - `diff`: the tree differ and patch application
//! - `protocol`: wire messages and their encodings
//! - `transport`: sync channels (in-process and WebSocket)
//! - `session`: the per-connection run loop and session registry
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_core::session::SessionRegistry;
//! use trellis_core::transport::memory;
//!
//! let registry = SessionRegistry::new();
//! let (server_end, mut client_end) = memory::pair(32);
//!
//! // `Counter` is any type implementing `Component`.
//! let handle = registry.open_session(Arc::new(Counter::default()), server_end);
//!
//! // The first message is always the full tree; after that the client
//! // receives minimal patch batches as events change state.
//! let initial = client_end.recv().await;
//! ```

pub mod diff;
pub mod error;
pub mod graph;
pub mod protocol;
pub mod reactive;
pub mod session;
pub mod transport;
pub mod tree;

pub use diff::{diff, PatchOp};
pub use error::{ComponentError, EngineError};
pub use protocol::{EventPayload, Inbound, Outbound};
pub use reactive::{Cell, ReadScope, WriteBatch};
pub use session::{SessionHandle, SessionId, SessionRegistry};
pub use tree::{AttrValue, Component, Node, RenderCtx, RenderPolicy, Rendered};
