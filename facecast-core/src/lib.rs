//! # facecast-core
//!
//! Client side of a live face-recognition stream.
//!
//! This crate contains:
//! - **Protocol types**: `Op`, `ServerMessage`, `ClientMessage`, `RecognitionTask`
//! - **State**: `ConnectionState` and the sans-IO `SessionMachine`
//! - **Network**: `SessionClient`, the WebSocket driver with reconnects
//! - **Capture**: `FrameSource` / `FrameEncoder` seams for camera and codec
//! - **Overlay / Render**: what is on screen and how it is drawn onto a `Surface`
//! - **Orchestrator**: the capture, render and statistics loops
//! - **Error**: `FacecastError`, typed and `thiserror`-based

pub mod capture;
pub mod config;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod overlay;
pub mod protocol;
pub mod render;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{EncodedImage, FrameEncoder, FrameSource, VideoFrame};
pub use config::{CaptureConfig, RenderConfig, SessionConfig};
pub use error::FacecastError;
pub use network::{SessionClient, SessionHandle};
pub use orchestrator::{CaptureLoop, Orchestrator, PresenterEvent};
pub use overlay::{OverlayContent, Slot, StatsContent};
pub use protocol::{ClientMessage, Op, RecognitionTask, ServerMessage, StageState};
pub use render::{Color, NO_VIDEO_TEXT, Rect, Renderer, Surface, TextStyle};
pub use state::{ConnectionState, Session, SessionMachine, SessionStatus};
