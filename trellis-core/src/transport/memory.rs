//! In-Process Transport
//!
//! A duplex channel pair over `tokio::sync::mpsc`, providing the same
//! ordering guarantees as a real connection. The [`ClientEnd`] plays the
//! remote renderer; tests drive it directly.

use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::protocol::{Inbound, Outbound};

use super::Transport;

/// Server end of an in-process channel pair.
pub struct MemoryTransport {
    outbound: mpsc::Sender<Outbound>,
    inbound: mpsc::Receiver<Inbound>,
}

/// Client (remote renderer) end of an in-process channel pair.
pub struct ClientEnd {
    outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::Sender<Inbound>,
}

/// Create a connected transport pair with the given buffer capacity.
pub fn pair(capacity: usize) -> (MemoryTransport, ClientEnd) {
    let (out_tx, out_rx) = mpsc::channel(capacity);
    let (in_tx, in_rx) = mpsc::channel(capacity);
    (
        MemoryTransport {
            outbound: out_tx,
            inbound: in_rx,
        },
        ClientEnd {
            outbound: out_rx,
            inbound: in_tx,
        },
    )
}

impl Transport for MemoryTransport {
    async fn send(&mut self, msg: Outbound) -> Result<(), EngineError> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }
}

impl ClientEnd {
    /// Receive the next server message, or `None` when the session closed.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// Send an interaction event to the server.
    pub async fn send(&mut self, msg: Inbound) -> Result<(), EngineError> {
        self.inbound
            .send(msg)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    /// Drop the inbound sender, simulating a disconnect from the renderer
    /// side while still allowing buffered outbound messages to be drained.
    pub fn close(self) -> mpsc::Receiver<Outbound> {
        self.outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::AttrValue;

    #[tokio::test]
    async fn pair_delivers_in_order() {
        let (mut server, mut client) = pair(8);

        server
            .send(Outbound::FullTree { seq: 0, root: None })
            .await
            .unwrap();
        server
            .send(Outbound::Patch {
                seq: 1,
                ops: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(client.recv().await.unwrap().seq(), 0);
        assert_eq!(client.recv().await.unwrap().seq(), 1);
    }

    #[tokio::test]
    async fn events_flow_back() {
        let (mut server, mut client) = pair(8);

        client
            .send(Inbound::Event {
                seq: 0,
                node_id: 1,
                name: "click".to_string(),
                data: AttrValue::Null,
            })
            .await
            .unwrap();

        let msg = server.recv().await.unwrap();
        assert!(matches!(msg, Inbound::Event { node_id: 1, .. }));
    }

    #[tokio::test]
    async fn closed_client_ends_the_channel() {
        let (mut server, client) = pair(8);
        drop(client);

        assert!(server.recv().await.is_none());
        assert!(matches!(
            server.send(Outbound::FullTree { seq: 0, root: None }).await,
            Err(EngineError::ChannelClosed)
        ));
    }
}
