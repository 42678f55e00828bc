//! Domain-specific error types for facecast.
//!
//! Transport and protocol failures are absorbed by the session client
//! and never reach callers; this type mostly surfaces at the
//! collaborator seams (frame source, encoder, surface) and in decoding.

use thiserror::Error;

/// The canonical error type for facecast.
#[derive(Debug, Error)]
pub enum FacecastError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A JSON message could not be parsed or serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A connection state transition was attempted from the wrong state.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    // ── Connection Errors ────────────────────────────────────────
    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    // ── Collaborator Errors ──────────────────────────────────────
    /// The frame source has no active video track to encode.
    #[error("no active video track")]
    NoActiveTrack,

    /// The frame encoder could not produce an image.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The presentation surface failed to draw.
    #[error("render error: {0}")]
    Render(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// A spawned loop panicked or was aborted.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
