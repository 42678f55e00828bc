//! Frame source and encoder for the viewer.
//!
//! There is no camera in a terminal, so frames come from a directory of
//! still images replayed in a loop at the configured device frame rate.
//! Those files are already JPEG or PNG, which makes encoding a copy.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use facecast_core::{CaptureConfig, EncodedImage, FacecastError, FrameEncoder, FrameSource, VideoFrame};
use tokio::time::Instant;
use tracing::info;

// ── ReplaySource ─────────────────────────────────────────────────

/// Loops over pre-encoded image files as if they were a live track.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    frames: Vec<VideoFrame>,
    frame_time: Duration,
    started: Instant,
}

impl ReplaySource {
    /// Read every JPEG/PNG file in `dir`, sorted by file name.
    pub fn open(dir: &Path, capture: &CaptureConfig) -> Result<Self, FacecastError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| content_type(p).is_some())
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(content_type) = content_type(path) else {
                continue;
            };
            frames.push(VideoFrame {
                width: capture.width,
                height: capture.height,
                content_type: content_type.to_string(),
                data: Bytes::from(std::fs::read(path)?),
            });
        }

        info!(dir = %dir.display(), frames = frames.len(), "replay source loaded");
        Ok(Self::from_frames(frames, capture.frame_rate))
    }

    pub fn from_frames(frames: Vec<VideoFrame>, frame_rate: u32) -> Self {
        Self {
            frames,
            frame_time: Duration::from_secs(1) / frame_rate.max(1),
            started: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ReplaySource {
    fn current_frame(&self) -> Option<VideoFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let tick = self.started.elapsed().as_nanos() / self.frame_time.as_nanos().max(1);
        let index = (tick % self.frames.len() as u128) as usize;
        self.frames.get(index).cloned()
    }
}

/// A source with nothing attached; every capture tick is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevice;

impl FrameSource for NoDevice {
    fn current_frame(&self) -> Option<VideoFrame> {
        None
    }
}

fn content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

// ── PassthroughEncoder ───────────────────────────────────────────

/// Forwards frames that are already compressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEncoder;

#[async_trait]
impl FrameEncoder for PassthroughEncoder {
    async fn encode(&self, frame: &VideoFrame) -> Result<EncodedImage, FacecastError> {
        if frame.is_empty() {
            return Err(FacecastError::NoActiveTrack);
        }
        if !frame.content_type.starts_with("image/") {
            return Err(FacecastError::Encoding(format!(
                "cannot pass through {} frames",
                frame.content_type
            )));
        }
        Ok(EncodedImage::new(frame.content_type.clone(), frame.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still(tag: &'static [u8]) -> VideoFrame {
        VideoFrame {
            width: 640,
            height: 480,
            content_type: "image/jpeg".into(),
            data: Bytes::from_static(tag),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replay_cycles_at_frame_rate() {
        let source = ReplaySource::from_frames(vec![still(b"a"), still(b"b"), still(b"c")], 10);
        assert_eq!(source.current_frame().unwrap().data, "a");

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(source.current_frame().unwrap().data, "b");

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(source.current_frame().unwrap().data, "c");

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(source.current_frame().unwrap().data, "a");
    }

    #[test]
    fn empty_replay_has_no_frame() {
        assert!(ReplaySource::from_frames(Vec::new(), 30).current_frame().is_none());
        assert!(NoDevice.current_frame().is_none());
    }

    #[test]
    fn open_reads_images_in_name_order() {
        let dir = std::env::temp_dir().join(format!("facecast-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("002.png"), b"png").unwrap();
        std::fs::write(dir.join("001.JPG"), b"jpg").unwrap();
        std::fs::write(dir.join("notes.txt"), b"skip").unwrap();

        let source = ReplaySource::open(&dir, &CaptureConfig::default()).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.frames[0].content_type, "image/jpeg");
        assert_eq!(source.frames[1].content_type, "image/png");
        assert_eq!(source.frames[0].width, 640);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn open_missing_dir_fails() {
        assert!(ReplaySource::open(Path::new("/nonexistent/frames"), &CaptureConfig::default()).is_err());
    }

    #[tokio::test]
    async fn passthrough_keeps_bytes() {
        let image = PassthroughEncoder.encode(&still(b"\xff\xd8")).await.unwrap();
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(image.data, Bytes::from_static(b"\xff\xd8"));
    }

    #[tokio::test]
    async fn passthrough_rejects_empty_and_raw_frames() {
        assert!(matches!(
            PassthroughEncoder.encode(&still(b"")).await,
            Err(FacecastError::NoActiveTrack)
        ));
        let mut raw = still(b"\0\0\0");
        raw.content_type = "video/raw-rgba".into();
        assert!(matches!(
            PassthroughEncoder.encode(&raw).await,
            Err(FacecastError::Encoding(_))
        ));
    }
}
