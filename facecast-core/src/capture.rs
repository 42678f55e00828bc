//! Frame acquisition and encoding seams.
//!
//! Camera access and image compression live outside this crate. The
//! orchestrator only needs something that can hand out the current
//! frame ([`FrameSource`]) and something that can turn it into an
//! uploadable still image ([`FrameEncoder`]).

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FacecastError;

// ── VideoFrame ───────────────────────────────────────────────────

/// The current picture of a live video surface.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// MIME type of `data` (`image/jpeg`, `image/png`, or a raw pixel format).
    pub content_type: String,
    pub data: Bytes,
}

impl VideoFrame {
    /// A frame with no pixel data means the track has ended.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── EncodedImage ─────────────────────────────────────────────────

/// A compressed still image ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub content_type: String,
    pub data: Bytes,
}

impl EncodedImage {
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Traits ───────────────────────────────────────────────────────

/// A live video surface.
pub trait FrameSource: Send + Sync {
    /// The latest frame, or `None` when no device stream is active.
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// Turns a video frame into an uploadable image.
///
/// Format and quality are fixed when the encoder is built.
#[async_trait]
pub trait FrameEncoder: Send + Sync {
    async fn encode(&self, frame: &VideoFrame) -> Result<EncodedImage, FacecastError>;
}
