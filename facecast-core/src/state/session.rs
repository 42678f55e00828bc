//! Session protocol state, independent of any socket.
//!
//! [`SessionMachine`] consumes transport events (opened, text received,
//! closed) and image submissions, and answers with the
//! [`SessionAction`]s the network driver must carry out. Keeping the
//! protocol here means every transition can be exercised in plain unit
//! tests, without a server or a clock.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::capture::EncodedImage;
use crate::protocol::{
    ClientMessage, HandshakeAck, HandshakeRequest, ImageMetadata, RecognitionTask, ServerMessage,
};
use crate::state::connection::ConnectionState;

// ── Session ──────────────────────────────────────────────────────

/// Identity assigned by the server on a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub server_id: String,
    pub server_name: String,
    pub session_id: String,
}

impl From<HandshakeAck> for Session {
    fn from(ack: HandshakeAck) -> Self {
        Self {
            server_id: ack.server_id,
            server_name: ack.server_name,
            session_id: ack.session_id,
        }
    }
}

/// Immutable snapshot handed to status observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub client_id: String,
    pub server_id: Option<String>,
    pub server_name: Option<String>,
    pub session_id: Option<String>,
    pub state: ConnectionState,
}

impl SessionStatus {
    /// Status of a client that has never connected.
    pub fn closed(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            server_id: None,
            server_name: None,
            session_id: None,
            state: ConnectionState::Closed,
        }
    }
}

// ── CloseKind ────────────────────────────────────────────────────

/// Why the client itself is closing the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// The server asked for the session to end.
    Normal,
    /// The server broke the handshake; forces a reconnect cycle.
    ProtocolFailure,
}

impl CloseKind {
    /// WebSocket close code sent on the wire.
    ///
    /// 1006 is reserved for locally detected drops and may not be sent,
    /// so protocol failures use 1002.
    pub fn code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ProtocolFailure => 1002,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Normal => "Server requested closure",
            Self::ProtocolFailure => "Expecting handshake response",
        }
    }
}

// ── SessionAction ────────────────────────────────────────────────

/// Work the network driver must perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Write a message to the transport.
    Send(ClientMessage),
    /// Close the transport from our side.
    Close(CloseKind),
    /// Notify the status observer.
    Status(SessionStatus),
    /// Notify the task-update observer.
    Task(Box<RecognitionTask>),
    /// Wait this long, then connect again.
    Reconnect(Duration),
}

// ── SessionMachine ───────────────────────────────────────────────

/// Handshake/ready/closed protocol state for one client.
#[derive(Debug)]
pub struct SessionMachine {
    client_id: String,
    agent: String,
    retry: Duration,
    state: ConnectionState,
    session: Option<Session>,
    /// Set once we have asked the transport to close.
    closing: bool,
    next_request_id: u64,
}

impl SessionMachine {
    pub fn new(client_id: impl Into<String>, agent: impl Into<String>, retry: Duration) -> Self {
        Self {
            client_id: client_id.into(),
            agent: agent.into(),
            retry,
            state: ConnectionState::Closed,
            session: None,
            closing: false,
            next_request_id: 0,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            client_id: self.client_id.clone(),
            server_id: self.session.as_ref().map(|s| s.server_id.clone()),
            server_name: self.session.as_ref().map(|s| s.server_name.clone()),
            session_id: self.session.as_ref().map(|s| s.session_id.clone()),
            state: self.state,
        }
    }

    // ── Transport events ──────────────────────────────────────────

    /// A new transport connection is being opened.
    ///
    /// Ignored unless the machine is `Closed`.
    pub fn connect(&mut self) -> Vec<SessionAction> {
        if let Err(e) = self.state.begin_connect() {
            warn!("ignoring connect: {e}");
            return Vec::new();
        }
        self.closing = false;
        self.next_request_id = 0;
        vec![SessionAction::Status(self.status())]
    }

    /// The transport is open: send the handshake.
    pub fn on_open(&mut self) -> Vec<SessionAction> {
        if let Err(e) = self.state.transport_opened() {
            warn!("ignoring transport open: {e}");
            return Vec::new();
        }
        let handshake = ClientMessage::Handshake(HandshakeRequest {
            agent: self.agent.clone(),
            client_id: self.client_id.clone(),
        });
        vec![
            SessionAction::Send(handshake),
            SessionAction::Status(self.status()),
        ]
    }

    /// A text frame arrived.
    pub fn on_text(&mut self, text: &str) -> Vec<SessionAction> {
        if self.closing {
            return Vec::new();
        }

        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) if self.state == ConnectionState::Connected => {
                error!("server failed to complete handshake: {e}");
                return self.close(CloseKind::ProtocolFailure);
            }
            Err(e) => {
                warn!("dropping undecodable message: {e}");
                return Vec::new();
            }
        };

        match (self.state, message) {
            (ConnectionState::Connected | ConnectionState::Ready, ServerMessage::CloseSession { code, reason }) => {
                error!(?code, %reason, "server requested session closure");
                self.close(CloseKind::Normal)
            }
            (ConnectionState::Connected, ServerMessage::HandshakeAck(ack)) => self.accept_session(ack),
            (ConnectionState::Connected, other) => {
                error!(op = other.op(), "server failed to complete handshake");
                self.close(CloseKind::ProtocolFailure)
            }
            (ConnectionState::Ready, ServerMessage::TaskUpdate(task)) => {
                vec![SessionAction::Task(task)]
            }
            (state, other) => {
                debug!(%state, op = other.op(), "ignoring message");
                Vec::new()
            }
        }
    }

    /// The transport closed, for whatever reason.
    ///
    /// Discards the session and schedules the next connect.
    pub fn on_closed(&mut self, code: Option<u16>, reason: &str) -> Vec<SessionAction> {
        if self.state.is_closed() {
            return Vec::new();
        }
        warn!(?code, %reason, from = %self.state, "connection closed");
        self.state.close();
        self.session = None;
        self.closing = false;
        vec![
            SessionAction::Status(self.status()),
            SessionAction::Reconnect(self.retry),
        ]
    }

    // ── Requests ──────────────────────────────────────────────────

    /// Submit an image. Produces nothing unless the session is ready.
    pub fn image_request(&mut self, image: &EncodedImage) -> Vec<SessionAction> {
        if !self.state.is_ready() || self.closing {
            return Vec::new();
        }
        self.next_request_id += 1;
        let metadata = ClientMessage::ImageRequest(ImageMetadata {
            content_length: image.len(),
            content_type: image.content_type.clone(),
            request_id: self.next_request_id,
        });
        vec![
            SessionAction::Send(metadata),
            SessionAction::Send(ClientMessage::ImagePayload(image.data.clone())),
        ]
    }

    // ── Internals ─────────────────────────────────────────────────

    fn accept_session(&mut self, ack: HandshakeAck) -> Vec<SessionAction> {
        self.session = Some(Session::from(ack));
        if let Err(e) = self.state.accept_handshake() {
            warn!("cannot accept session: {e}");
            return Vec::new();
        }
        if let Some(session) = &self.session {
            info!(
                server = %session.server_name,
                session = %session.session_id,
                "session ready"
            );
        }
        vec![SessionAction::Status(self.status())]
    }

    fn close(&mut self, kind: CloseKind) -> Vec<SessionAction> {
        self.closing = true;
        vec![SessionAction::Close(kind)]
    }
}

// ── Tests ────────────────────────────────────────────────────────
