//! Recognition task payloads carried by `op = 4` task updates.
//!
//! Field names follow the server's camelCase JSON. Stage-gated fields
//! (`faces`, per-face `results`) are optional on the wire; the accessors
//! only expose them once the owning stage has reached a terminal state.

use serde::{Deserialize, Serialize};

// ── StageState ───────────────────────────────────────────────────

/// Lifecycle state of one server-side processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StageState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Any state string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl StageState {
    /// `Succeeded` and `Failed` are terminal; nothing else is.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// State and timing of a stage, or of the task as a whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StageStatus {
    /// Start timestamp as reported by the server.
    pub start: String,
    pub state: StageState,
    /// Elapsed time in milliseconds.
    pub time: f64,
}

// ── Faces ────────────────────────────────────────────────────────

/// Bounding box of a face in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FacePosition {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl FacePosition {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// One candidate identity for a face. Lower distance is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub distance: f64,
    pub label: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizedFace {
    #[serde(rename = "_id")]
    pub id: String,
    pub position: FacePosition,
    /// Candidate matches, best first. Absent until search completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<FaceMatch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

// ── RecognitionTask ──────────────────────────────────────────────

/// Server-side result for one submitted image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecognitionTask {
    /// Echo of the `requestId` sent with the image, if the server supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub start: String,
    pub state: StageState,
    pub time: f64,
    pub face_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<Vec<RecognizedFace>>,
    pub detection: StageStatus,
    pub vector: StageStatus,
    pub search: StageStatus,
}

impl RecognitionTask {
    /// Detected faces, available once detection is terminal.
    pub fn detected_faces(&self) -> Option<&[RecognizedFace]> {
        if !self.detection.state.is_terminal() {
            return None;
        }
        self.faces.as_deref()
    }

    /// Faces paired with their best candidate, available once search is
    /// terminal. Faces without candidates yield `None` as the match.
    pub fn best_matches(&self) -> Option<Vec<(&RecognizedFace, Option<&FaceMatch>)>> {
        if !self.search.state.is_terminal() {
            return None;
        }
        let faces = self.faces.as_deref()?;
        Some(
            faces
                .iter()
                .map(|face| (face, face.results.as_ref().and_then(|r| r.first())))
                .collect(),
        )
    }

    pub fn detection_succeeded(&self) -> bool {
        self.detection.state == StageState::Succeeded
    }

    pub fn search_succeeded(&self) -> bool {
        self.search.state == StageState::Succeeded
    }
}
