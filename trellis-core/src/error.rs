//! Error Types
//!
//! This module defines the failure taxonomy for the engine. Errors are
//! always local to a single session: a fatal error tears down the session
//! that produced it and never affects other sessions.
//!
//! # Taxonomy
//!
//! - `DependencyCycle`: a computation wrote a cell it (or an ancestor on the
//!   current render stack) read in the same pass, or the batch scheduler
//!   could not order the dirty set. Fatal to the session; nothing commits.
//! - `Render`: a component's render function failed. The render pass aborts
//!   without committing; the previously committed tree stays authoritative
//!   (or a placeholder subtree is substituted, depending on the session's
//!   render policy).
//! - `DiffInvariant`: replaying the computed patch against the committed
//!   tree did not reproduce the new tree. Handled by falling back to a
//!   full-tree resend rather than crashing.
//! - `ChannelClosed`: the sync channel dropped. The session is torn down;
//!   a reconnect starts a fresh session from scratch.

use thiserror::Error;

/// Fatal and recoverable engine-level errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A computation read and wrote the same cell within one batch, or the
    /// dirty set could not be topologically ordered.
    #[error("dependency cycle: {0}")]
    DependencyCycle(String),

    /// A component's render function returned an error.
    #[error("render failed in <{tag}>: {source}")]
    Render {
        /// Type tag of the failing component.
        tag: &'static str,
        #[source]
        source: ComponentError,
    },

    /// The patch produced by the differ does not replay to the new tree.
    #[error("diff invariant violation: {0}")]
    DiffInvariant(String),

    /// The sync channel to the remote renderer closed.
    #[error("sync channel closed")]
    ChannelClosed,
}

/// An error produced by a component's render function or event handler.
///
/// Components report failures with a message; the engine decides what to do
/// with them based on the session's render policy.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ComponentError {
    message: String,
}

impl ComponentError {
    /// Create a new component error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ComponentError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ComponentError {
    fn from(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
