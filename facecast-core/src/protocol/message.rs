//! Wire messages exchanged with the recognition server.
//!
//! Every JSON message is an envelope `{ "op": <n>, "data": { ... } }`.
//! Inbound text is decoded in two steps: the envelope first, then the
//! op-specific body, so shape-specific fields are never touched before
//! the discriminator has been checked.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FacecastError;
use crate::protocol::task::RecognitionTask;

// ── Op ───────────────────────────────────────────────────────────

/// Operation discriminator carried by every JSON message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Server asks the client to end the session (server → client).
    CloseSession = 1,
    /// Handshake request (client → server) and acknowledgment (server → client).
    Handshake = 2,
    /// Recognition task progress (server → client).
    TaskUpdate = 4,
    /// Image metadata, followed by a binary frame (client → server).
    ImageRequest = 5,
}

impl TryFrom<u64> for Op {
    type Error = FacecastError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Op::CloseSession),
            2 => Ok(Op::Handshake),
            4 => Ok(Op::TaskUpdate),
            5 => Ok(Op::ImageRequest),
            _ => Err(FacecastError::UnknownVariant {
                type_name: "Op",
                value,
            }),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, *self as u8)
    }
}

// ── Message bodies ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub agent: String,
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandshakeAck {
    pub server_id: String,
    pub server_name: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub content_length: usize,
    pub content_type: String,
    pub request_id: u64,
}

/// Only `op` is strict. The close directive's `code` and `reason` are
/// informational, so they are read leniently from whatever JSON the
/// server sent.
#[derive(Debug, Deserialize)]
struct Envelope {
    op: u64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    code: Value,
    #[serde(default)]
    reason: Value,
}

fn close_code(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn close_reason(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T> {
    op: u8,
    data: &'a T,
}

// ── ServerMessage ────────────────────────────────────────────────

/// A decoded server → client message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    CloseSession { code: Option<u16>, reason: String },
    HandshakeAck(HandshakeAck),
    TaskUpdate(Box<RecognitionTask>),
    /// Any op this client does not act on. Kept so callers can log it.
    Unknown { op: u64 },
}

impl ServerMessage {
    /// Decode one JSON text frame.
    pub fn decode(text: &str) -> Result<Self, FacecastError> {
        let envelope: Envelope = serde_json::from_str(text)?;

        let op = match Op::try_from(envelope.op) {
            Ok(op) => op,
            Err(_) => return Ok(Self::Unknown { op: envelope.op }),
        };

        match op {
            Op::CloseSession => {
                // Code and reason may sit beside `op` or inside `data`.
                let nested = |key: &str| envelope.data.get(key);
                Ok(Self::CloseSession {
                    code: close_code(&envelope.code).or_else(|| nested("code").and_then(close_code)),
                    reason: close_reason(&envelope.reason)
                        .or_else(|| nested("reason").and_then(close_reason))
                        .unwrap_or_default(),
                })
            }
            Op::Handshake => Ok(Self::HandshakeAck(serde_json::from_value(envelope.data)?)),
            Op::TaskUpdate => Ok(Self::TaskUpdate(Box::new(serde_json::from_value(
                envelope.data,
            )?))),
            Op::ImageRequest => Ok(Self::Unknown { op: envelope.op }),
        }
    }

    /// The op this message was tagged with.
    pub fn op(&self) -> u64 {
        match self {
            Self::CloseSession { .. } => Op::CloseSession as u64,
            Self::HandshakeAck(_) => Op::Handshake as u64,
            Self::TaskUpdate(_) => Op::TaskUpdate as u64,
            Self::Unknown { op } => *op,
        }
    }
}

// ── ClientMessage ────────────────────────────────────────────────

/// A client → server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Handshake(HandshakeRequest),
    ImageRequest(ImageMetadata),
    /// Raw image bytes; always sent right after its `ImageRequest`.
    ImagePayload(Bytes),
}

/// A single transport frame ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Binary(Bytes),
}

impl ClientMessage {
    /// Encode into the frame that goes on the wire.
    pub fn to_frame(&self) -> Result<OutboundFrame, FacecastError> {
        let text = match self {
            Self::Handshake(body) => serde_json::to_string(&OutboundEnvelope {
                op: Op::Handshake as u8,
                data: body,
            })?,
            Self::ImageRequest(body) => serde_json::to_string(&OutboundEnvelope {
                op: Op::ImageRequest as u8,
                data: body,
            })?,
            Self::ImagePayload(bytes) => return Ok(OutboundFrame::Binary(bytes.clone())),
        };
        Ok(OutboundFrame::Text(text))
    }
}
