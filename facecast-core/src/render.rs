//! Overlay renderer.
//!
//! Draws the video layer, face boxes and the statistics block onto any
//! [`Surface`]. The surface is a fixed-size 2D target that understands
//! two primitives: rectangle outlines and multi-line text.

use crate::capture::VideoFrame;
use crate::config::RenderConfig;
use crate::error::FacecastError;
use crate::overlay::OverlayContent;
use crate::protocol::{FacePosition, RecognitionTask};

/// Placeholder drawn when there is no video frame.
pub const NO_VIDEO_TEXT: &str = "No active video device stream";

// ── Primitives ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Best candidate below the distance threshold.
    pub const MATCH: Color = Color::rgba(195, 39, 43, 0.8);
    /// Best candidate at or above the threshold, or no candidate at all.
    pub const NO_MATCH: Color = Color::rgba(91, 137, 48, 0.8);
    pub const GREY: Color = Color::rgba(128, 128, 128, 1.0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 1.0);
    pub const RED: Color = Color::rgba(255, 0, 0, 1.0);
    pub const STATS_FILL: Color = Color::rgba(198, 194, 182, 0.75);
    pub const STATS_OUTLINE: Color = Color::rgba(25, 34, 54, 0.75);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<&FacePosition> for Rect {
    fn from(p: &FacePosition) -> Self {
        Self {
            x: p.x1,
            y: p.y1,
            width: p.width(),
            height: p.height(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub fill: Color,
    pub outline: Color,
    /// Font size in em.
    pub scale: f32,
}

impl TextStyle {
    const PLACEHOLDER: TextStyle = TextStyle {
        fill: Color::RED,
        outline: Color::WHITE,
        scale: 2.0,
    };
    const LABEL: TextStyle = TextStyle {
        fill: Color::WHITE,
        outline: Color::GREY,
        scale: 2.0,
    };
    const STATS: TextStyle = TextStyle {
        fill: Color::STATS_FILL,
        outline: Color::STATS_OUTLINE,
        scale: 1.2,
    };
}

// ── Surface ──────────────────────────────────────────────────────

/// A fixed-size 2D presentation target.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Start a new frame.
    fn clear(&mut self);

    fn draw_video(&mut self, frame: &VideoFrame);

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);

    /// Draw text; `\n` starts a new line below the previous one.
    fn draw_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle);

    /// Show the finished frame.
    fn present(&mut self) -> Result<(), FacecastError>;

    /// Distance between two text lines at `scale`.
    fn line_height(&self, scale: f32) -> f64 {
        16.0 * f64::from(scale) * 1.5
    }
}

// ── Renderer ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Renderer {
    threshold: f64,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }

    /// Redraw everything from scratch.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        overlay: &OverlayContent,
        frame: Option<&VideoFrame>,
    ) -> Result<(), FacecastError> {
        surface.clear();

        match frame {
            Some(frame) => surface.draw_video(frame),
            None => surface.draw_text(NO_VIDEO_TEXT, 0.0, 0.0, TextStyle::PLACEHOLDER),
        }

        if let Some(faces) = overlay.detected().and_then(RecognitionTask::detected_faces) {
            let width = surface.line_height(1.0) * 0.1;
            for face in faces {
                surface.stroke_rect(Rect::from(&face.position), Color::GREY, width);
            }
        }

        if let Some(matches) = overlay.result().and_then(RecognitionTask::best_matches) {
            let h = surface.line_height(TextStyle::LABEL.scale);
            for (face, best) in matches {
                let color = match best {
                    Some(m) if m.distance < self.threshold => Color::MATCH,
                    _ => Color::NO_MATCH,
                };
                surface.stroke_rect(Rect::from(&face.position), color, h * 0.5);

                if let Some(m) = best {
                    let p = &face.position;
                    surface.draw_text(&format!("Label #{}", m.label), p.x1, p.y1 - h, TextStyle::LABEL);
                    surface.draw_text(&format!("{}", m.distance), p.x1, p.y2, TextStyle::LABEL);
                }
            }
        }

        surface.draw_text(&Self::stats_text(overlay), 0.0, 0.0, TextStyle::STATS);
        surface.present()
    }

    /// The statistics block, one fact per line.
    pub fn stats_text(overlay: &OverlayContent) -> String {
        let stats = overlay.stats();
        let session = &stats.session;
        let none = "-";

        let (detection_count, detection_time) = match overlay.detected() {
            Some(t) => (
                format!("Count={}, Time={}", t.face_count, t.detection.time),
                format!("Timestamp={}", t.detection.start),
            ),
            None => ("No Data".to_string(), "No Data".to_string()),
        };
        let (task_count, task_time) = match overlay.result() {
            Some(t) => (
                format!("Count={}, Time={}", t.face_count, t.time),
                format!("Timestamp={}", t.start),
            ),
            None => ("No Data".to_string(), "No Data".to_string()),
        };

        [
            format!("[Renderer] frameRate={}", stats.frame_rate),
            format!("[Detection] {detection_count}"),
            format!("[Detection] {detection_time}"),
            format!("[Full_Task] {task_count}"),
            format!("[Full_Task] {task_time}"),
            format!("[WebSocket] State={}", session.state),
            format!(
                "[WebSocket] ClientId={}",
                if session.client_id.is_empty() { none } else { session.client_id.as_str() }
            ),
            format!(
                "[WebSocket] SessionId={}",
                session.session_id.as_deref().unwrap_or(none)
            ),
        ]
        .join("\n")
    }
}

// ── Test support ─────────────────────────────────────────────────
