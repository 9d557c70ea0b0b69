//! WebSocket Transport
//!
//! Adapts a `tokio-tungstenite` WebSocket stream to the [`Transport`]
//! trait. Outbound messages are MessagePack-encoded binary frames; inbound
//! frames may be binary (MessagePack) or text (JSON), so browser-side
//! renderers can speak whichever is convenient. WebSocket framing already
//! guarantees ordered, exactly-once delivery per direction.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

use crate::error::EngineError;
use crate::protocol::{self, Inbound, Outbound};

use super::Transport;

/// A sync channel over one WebSocket connection.
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an accepted WebSocket stream.
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, msg: Outbound) -> Result<(), EngineError> {
        let bytes = protocol::encode_msgpack(&msg).map_err(|err| {
            warn!(%err, "failed to encode outbound message");
            EngineError::ChannelClosed
        })?;
        self.stream
            .send(Message::Binary(bytes))
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<Inbound> {
        while let Some(frame) = self.stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => return None,
            };
            match frame {
                Message::Binary(bytes) => match protocol::decode_msgpack(&bytes) {
                    Ok(msg) => return Some(msg),
                    Err(err) => {
                        warn!(%err, "dropping undecodable binary frame");
                    }
                },
                Message::Text(text) => match protocol::decode_json(text.as_bytes()) {
                    Ok(msg) => return Some(msg),
                    Err(err) => {
                        warn!(%err, "dropping undecodable text frame");
                    }
                },
                Message::Close(_) => return None,
                // Ping/pong are handled by tungstenite itself.
                _ => {}
            }
        }
        None
    }
}
