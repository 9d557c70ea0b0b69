//! Sync Protocol
//!
//! Wire messages exchanged between a session and its remote renderer. The
//! protocol is transport-agnostic: it only assumes in-order, exactly-once
//! delivery per direction. Every message carries a monotonically increasing
//! sequence number; the remote renderer applies outbound batches in
//! sequence order and may not skip or reorder.
//!
//! Two encodings are provided: JSON (debuggable, used for text frames) and
//! MessagePack (compact, used for binary frames). The session itself never
//! touches bytes; encoding is the transport's business.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::PatchOp;
use crate::tree::{AttrValue, Node};

/// Server-to-renderer messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outbound {
    /// An incremental patch batch, applied atomically.
    Patch { seq: u64, ops: Vec<PatchOp> },

    /// A complete tree replacing whatever the renderer holds. Sent as the
    /// first message of every session and as the fallback when incremental
    /// patching cannot be trusted.
    FullTree { seq: u64, root: Option<Node> },
}

impl Outbound {
    /// The message's sequence number.
    pub fn seq(&self) -> u64 {
        match self {
            Outbound::Patch { seq, .. } => *seq,
            Outbound::FullTree { seq, .. } => *seq,
        }
    }
}

/// Renderer-to-server messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Inbound {
    /// An interaction event originating at a node.
    Event {
        seq: u64,
        node_id: u64,
        name: String,
        data: AttrValue,
    },
}

/// An interaction event as delivered to a component.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// Identity of the node the event originated at.
    pub node_id: u64,

    /// Event name (e.g. `click`, `input`).
    pub name: String,

    /// Event-specific payload.
    pub data: AttrValue,
}

impl From<Inbound> for EventPayload {
    fn from(msg: Inbound) -> Self {
        let Inbound::Event {
            node_id, name, data, ..
        } = msg;
        Self {
            node_id,
            name,
            data,
        }
    }
}

/// Encoding and decoding failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    MsgpackEncode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    MsgpackDecode(#[from] rmp_serde::decode::Error),
}

/// Encode a message as JSON bytes.
pub fn encode_json<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Decode a message from JSON bytes.
pub fn decode_json<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode a message as MessagePack bytes.
///
/// Uses named-field (map) encoding so messages stay self-describing and
/// the `kind` tag survives.
pub fn encode_msgpack<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

/// Decode a message from MessagePack bytes.
pub fn decode_msgpack<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
