//! Connection state machine for the session client.
//!
//! Provides a `ConnectionState` enum that models the lifecycle of the
//! server connection, with validated transitions that return `Result`
//! instead of panicking.

use serde::{Deserialize, Serialize};

use crate::error::FacecastError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current state of the server connection.
///
/// ```text
///  Closed ──► Connecting ──► Connected ──► Ready
///    ▲            │              │           │
///    └────────────┴──────────────┴───────────┘
///            (transport closed / protocol failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport. Initial state, and the state a retry starts from.
    #[default]
    Closed,

    /// Transport connection initiated but not yet open.
    Connecting,

    /// Transport is open; handshake sent but not acknowledged.
    Connected,

    /// Handshake acknowledged; image requests may be sent.
    Ready,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Ready => "ready",
        }
    }

    /// Returns `true` only in the state where requests are accepted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Closed`.
    pub fn begin_connect(&mut self) -> Result<(), FacecastError> {
        self.step(Self::Closed, Self::Connecting, "connect")
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn transport_opened(&mut self) -> Result<(), FacecastError> {
        self.step(Self::Connecting, Self::Connected, "open transport")
    }

    /// Transition to `Ready`.
    ///
    /// Valid from: `Connected`.
    pub fn accept_handshake(&mut self) -> Result<(), FacecastError> {
        self.step(Self::Connected, Self::Ready, "accept handshake")
    }

    /// Force to `Closed` regardless of current state.
    ///
    /// Any transport closure or fatal protocol error lands here.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    fn step(&mut self, from: Self, to: Self, action: &'static str) -> Result<(), FacecastError> {
        if *self != from {
            return Err(FacecastError::InvalidTransition {
                from: self.as_str(),
                action,
            });
        }
        *self = to;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = ConnectionState::Closed;

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        state.transport_opened().unwrap();
        assert_eq!(state, ConnectionState::Connected);

        state.accept_handshake().unwrap();
        assert!(state.is_ready());

        state.close();
        assert!(state.is_closed());
    }

    #[test]
    fn ready_only_through_handshake() {
        for start in [
            ConnectionState::Closed,
            ConnectionState::Connecting,
            ConnectionState::Ready,
        ] {
            let mut state = start;
            assert!(state.accept_handshake().is_err());
            assert_eq!(state, start);
        }
    }

    #[test]
    fn invalid_transition_connect_when_ready() {
        let mut state = ConnectionState::Ready;
        let err = state.begin_connect().unwrap_err();
        assert_eq!(err.to_string(), "cannot connect while ready");
    }

    #[test]
    fn invalid_transition_open_from_closed() {
        let mut state = ConnectionState::Closed;
        assert!(state.transport_opened().is_err());
    }

    #[test]
    fn close_from_any_state() {
        for start in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Ready,
        ] {
            let mut state = start;
            state.close();
            assert!(state.is_closed());
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Ready.to_string(), "ready");
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ConnectionState::Ready).unwrap(),
            "\"ready\""
        );
    }

    #[test]
    fn default_state_is_closed() {
        assert!(ConnectionState::default().is_closed());
    }
}
