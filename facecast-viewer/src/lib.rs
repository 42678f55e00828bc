//! # facecast-viewer: terminal viewer
//!
//! Replays frames to a recognition server through `facecast-core` and
//! draws the returned faces, labels and session statistics in the
//! terminal with ratatui.

pub mod config;
pub mod source;
pub mod terminal;
