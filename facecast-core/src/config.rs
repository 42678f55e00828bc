//! Configuration sections consumed by the core.
//!
//! Each section deserializes with `#[serde(default)]`, so a config file
//! only needs to name the values it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket endpoint URL.
    pub endpoint: String,
    /// Delay before reconnecting after the connection closes, in milliseconds.
    pub retry_ms: u64,
    /// Agent tag sent in the handshake.
    pub agent: String,
    /// Give up on opening a connection after this long, in milliseconds.
    pub connect_timeout_ms: u64,
    /// How long to wait for the peer to finish a close we started, in milliseconds.
    pub close_grace_ms: u64,
    /// Image requests buffered between the capture loop and the socket.
    pub request_buffer: usize,
}

/// Capture loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device frame rate requested from the camera.
    pub frame_rate: u32,
    pub width: u32,
    pub height: u32,
    /// Pause between two image submissions, in milliseconds.
    pub interval_ms: u64,
    /// Encoded image format.
    pub content_type: String,
    /// Encoder quality, 0.0..=1.0.
    pub quality: f32,
}

/// Render loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Best-candidate distance below which a face counts as a match.
    pub threshold: f64,
    /// Pause between two redraws, in milliseconds.
    pub interval_ms: u64,
    /// Frame-rate sampling window, in milliseconds.
    pub stats_interval_ms: u64,
    /// How long a task stays on screen unless replaced, in milliseconds.
    pub clear_after_ms: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8080/ws".into(),
            retry_ms: 1000,
            agent: concat!("facecast/", env!("CARGO_PKG_VERSION")).into(),
            connect_timeout_ms: 5000,
            close_grace_ms: 2000,
            request_buffer: 2,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            width: 640,
            height: 480,
            interval_ms: 250,
            content_type: "image/jpeg".into(),
            quality: 0.75,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            interval_ms: 25,
            stats_interval_ms: 1000,
            clear_after_ms: 500,
        }
    }
}

// ── Accessors ────────────────────────────────────────────────────

impl SessionConfig {
    pub fn retry(&self) -> Duration {
        Duration::from_millis(self.retry_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl RenderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub fn clear_after(&self) -> Duration {
        Duration::from_millis(self.clear_after_ms)
    }
}
