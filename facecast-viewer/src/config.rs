//! Viewer configuration file.

use std::path::Path;

use facecast_core::{CaptureConfig, FacecastError, RenderConfig, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the viewer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Recognition server connection.
    pub session: SessionConfig,
    /// Capture loop and encoding.
    pub capture: CaptureConfig,
    /// Render and statistics loops.
    pub render: RenderConfig,
    /// Where frames come from.
    pub source: SourceConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Frame source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of JPEG/PNG frames replayed in name order. Empty means
    /// no video device.
    pub frames_dir: String,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset.
    pub level: String,
    /// Log file. The terminal is taken by the overlay, so logs are
    /// dropped when this is empty.
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ViewerConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, FacecastError> {
        toml::from_str(contents).map_err(|e| FacecastError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, FacecastError> {
        toml::to_string_pretty(self).map_err(|e| FacecastError::Config(e.to_string()))
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> Result<(), FacecastError> {
        std::fs::write(path, Self::default().to_toml()?)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = ViewerConfig::default().to_toml().unwrap();
        assert!(text.contains("[session]"));
        assert!(text.contains("endpoint"));
        assert!(text.contains("clear_after_ms"));
    }

    #[test]
    fn roundtrip_config() {
        let text = ViewerConfig::default().to_toml().unwrap();
        let parsed = ViewerConfig::parse(&text).unwrap();
        assert_eq!(parsed.session.endpoint, "ws://127.0.0.1:8080/ws");
        assert_eq!(parsed.capture.interval_ms, 250);
        assert_eq!(parsed.render.threshold, 0.6);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed = ViewerConfig::parse(
            r#"
            [session]
            endpoint = "ws://10.1.1.1:9000/recognize"

            [source]
            frames_dir = "/tmp/frames"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.session.endpoint, "ws://10.1.1.1:9000/recognize");
        assert_eq!(parsed.session.retry_ms, 1000);
        assert_eq!(parsed.source.frames_dir, "/tmp/frames");
        assert_eq!(parsed.render.clear_after_ms, 500);
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        assert!(matches!(
            ViewerConfig::parse("[session]\nretry_ms = \"soon\""),
            Err(FacecastError::Config(_))
        ));
    }

    #[test]
    fn write_then_load() {
        let path = std::env::temp_dir().join(format!("facecast-viewer-{}.toml", std::process::id()));
        ViewerConfig::write_default(&path).unwrap();
        let loaded = ViewerConfig::load(&path);
        assert_eq!(loaded.render.interval_ms, 25);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let loaded = ViewerConfig::load(Path::new("/nonexistent/facecast.toml"));
        assert_eq!(loaded.session.retry_ms, 1000);
    }
}
