//! Sync Channel Transports
//!
//! A transport is the server side of one duplex, ordered, reliable channel
//! to a remote renderer. The session layer is generic over this trait; the
//! engine never assumes anything about the wire beyond in-order,
//! exactly-once delivery per direction.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory`]: an in-process pair over tokio channels, for tests and
//!   embedded use.
//! - [`ws`]: an adapter over a `tokio-tungstenite` WebSocket stream.

use std::future::Future;

use crate::error::EngineError;
use crate::protocol::{Inbound, Outbound};

pub mod memory;
pub mod ws;

/// The server end of one sync channel.
///
/// Implementations must deliver messages in order and exactly once in each
/// direction; the session relies on the transport for ordering and never
/// waits for acknowledgements.
pub trait Transport: Send + 'static {
    /// Send one outbound message. May suspend; suspension never blocks
    /// other sessions.
    ///
    /// # Errors
    ///
    /// [`EngineError::ChannelClosed`] once the channel has dropped; the
    /// session responds by tearing down.
    fn send(&mut self, msg: Outbound) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Receive the next inbound message, or `None` when the channel has
    /// closed.
    fn recv(&mut self) -> impl Future<Output = Option<Inbound>> + Send;
}
