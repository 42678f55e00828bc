//! WebSocket driver for the session protocol.
//!
//! [`SessionClient`] owns the socket and the [`SessionMachine`]. It
//! connects, feeds transport events into the machine, carries out the
//! resulting actions, and reconnects after every closure. Nothing it
//! encounters on the wire is returned as an error; failures become
//! state transitions and a scheduled retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::EncodedImage;
use crate::config::SessionConfig;
use crate::error::FacecastError;
use crate::protocol::{ClientMessage, OutboundFrame, RecognitionTask};
use crate::state::{CloseKind, ConnectionState, SessionAction, SessionMachine, SessionStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Observer for connection status changes.
pub type StatusCallback = Box<dyn FnMut(SessionStatus) + Send + 'static>;

/// Observer for recognition task updates.
pub type TaskCallback = Box<dyn FnMut(RecognitionTask) + Send + 'static>;

// ── SessionHandle ────────────────────────────────────────────────

/// Cheap, cloneable front door to a running [`SessionClient`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    requests: mpsc::Sender<EncodedImage>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// A handle with no client behind it.
    ///
    /// The caller plays the client: it receives submitted images on the
    /// returned receiver and drives `state` through the watch sender.
    pub fn detached(
        state: ConnectionState,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<EncodedImage>, watch::Sender<SessionStatus>) {
        let (requests, requests_rx) = mpsc::channel(capacity.max(1));
        let mut status = SessionStatus::closed(String::new());
        status.state = state;
        let (status_tx, status) = watch::channel(status);
        (Self { requests, status }, requests_rx, status_tx)
    }

    /// Submit an image for recognition.
    ///
    /// Returns immediately. When the session is not `ready`, or the
    /// socket is still busy with earlier requests, the image is dropped.
    pub fn send_image_request(&self, image: EncodedImage) {
        if !self.status.borrow().state.is_ready() {
            return;
        }
        if let Err(e) = self.requests.try_send(image) {
            debug!("image request dropped: {e}");
        }
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// A `watch::Receiver` that changes with every status notification.
    pub fn status_receiver(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }
}

// ── SessionClient ────────────────────────────────────────────────

/// Owns one server connection and keeps it alive forever.
///
/// # Lifetime
///
/// Register observers, take a [`handle`](Self::handle), then spawn
/// [`run`](Self::run). It loops until [`stop`](Self::stop) is called or
/// the task is dropped.
pub struct SessionClient {
    config: SessionConfig,
    machine: SessionMachine,
    on_status: Option<StatusCallback>,
    on_task: Option<TaskCallback>,
    requests_tx: mpsc::Sender<EncodedImage>,
    requests_rx: mpsc::Receiver<EncodedImage>,
    status_tx: watch::Sender<SessionStatus>,
    running: Arc<AtomicBool>,
}

impl SessionClient {
    /// Create a client with a fresh client id. Does not connect yet.
    pub fn new(config: SessionConfig) -> Self {
        let client_id = Uuid::new_v4().to_string();
        let machine = SessionMachine::new(client_id.clone(), config.agent.clone(), config.retry());
        let (requests_tx, requests_rx) = mpsc::channel(config.request_buffer.max(1));
        let (status_tx, _) = watch::channel(SessionStatus::closed(client_id));
        Self {
            config,
            machine,
            on_status: None,
            on_task: None,
            requests_tx,
            requests_rx,
            status_tx,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The stable id sent in every handshake.
    pub fn client_id(&self) -> &str {
        self.machine.client_id()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            requests: self.requests_tx.clone(),
            status: self.status_tx.subscribe(),
        }
    }

    /// Replace the status observer. Notifications with no observer are dropped.
    pub fn on_status_changed<F>(&mut self, f: F)
    where
        F: FnMut(SessionStatus) + Send + 'static,
    {
        self.on_status = Some(Box::new(f));
    }

    /// Replace the task-update observer. Updates with no observer are dropped.
    pub fn on_task_update<F>(&mut self, f: F)
    where
        F: FnMut(RecognitionTask) + Send + 'static,
    {
        self.on_task = Some(Box::new(f));
    }

    /// A cloneable stop handle.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Signal the client to stop after the current connection ends.
    ///
    /// Sticky: a stop requested before [`run`](Self::run) makes it return
    /// without connecting.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Connect, serve, and reconnect until stopped.
    pub async fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            let actions = self.machine.connect();
            self.dispatch_all(actions);

            info!(endpoint = %self.config.endpoint, "connecting");
            let (code, reason) = match tokio::time::timeout(
                self.config.connect_timeout(),
                tokio_tungstenite::connect_async(self.config.endpoint.as_str()),
            )
            .await
            {
                Ok(Ok((stream, _response))) => self.serve(stream).await,
                Ok(Err(e)) => (None, e.to_string()),
                Err(_) => (None, "connect timed out".to_string()),
            };

            // Requests queued for the dead connection are not replayed.
            while self.requests_rx.try_recv().is_ok() {}

            let mut retry = None;
            for action in self.machine.on_closed(code, &reason) {
                match action {
                    SessionAction::Reconnect(delay) => retry = Some(delay),
                    other => self.dispatch(other),
                }
            }

            if let Some(delay) = retry {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Drive one open connection until it closes.
    ///
    /// Returns the close code (when known) and a reason for logging.
    async fn serve(&mut self, stream: WsStream) -> (Option<u16>, String) {
        let (mut sink, mut source) = stream.split();

        let actions = self.machine.on_open();
        let mut close_deadline = match self.execute(&mut sink, actions).await {
            Ok(deadline) => deadline,
            Err(e) => return (None, e.to_string()),
        };
        let mut peer_close: Option<(Option<u16>, String)> = None;

        loop {
            let grace = async move {
                match close_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            let actions = tokio::select! {
                inbound = source.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.machine.on_text(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        peer_close = Some(match frame {
                            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                            None => (None, String::new()),
                        });
                        continue;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return peer_close.unwrap_or((None, e.to_string())),
                    None => return peer_close.unwrap_or((None, "connection closed".to_string())),
                },
                Some(image) = self.requests_rx.recv() => self.machine.image_request(&image),
                _ = grace => return (None, "close handshake timed out".to_string()),
            };

            match self.execute(&mut sink, actions).await {
                Ok(Some(deadline)) => close_deadline = Some(deadline),
                Ok(None) => {}
                Err(e) => return peer_close.unwrap_or((None, e.to_string())),
            }
        }
    }

    /// Carry out actions against an open socket.
    ///
    /// Returns the close deadline if one of the actions started a close.
    async fn execute(
        &mut self,
        sink: &mut WsSink,
        actions: Vec<SessionAction>,
    ) -> Result<Option<Instant>, FacecastError> {
        let mut deadline = None;
        for action in actions {
            match action {
                SessionAction::Send(message) => sink.send(to_ws(&message)?).await?,
                SessionAction::Close(kind) => {
                    close(sink, kind).await?;
                    deadline = Some(Instant::now() + self.config.close_grace());
                }
                other => self.dispatch(other),
            }
        }
        Ok(deadline)
    }

    fn dispatch_all(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            self.dispatch(action);
        }
    }

    /// Deliver observer notifications.
    fn dispatch(&mut self, action: SessionAction) {
        match action {
            SessionAction::Status(status) => {
                self.status_tx.send_replace(status.clone());
                if let Some(callback) = self.on_status.as_mut() {
                    callback(status);
                }
            }
            SessionAction::Task(task) => {
                if let Some(callback) = self.on_task.as_mut() {
                    callback(*task);
                }
            }
            other => warn!(?other, "action needs an open connection; dropped"),
        }
    }
}

fn to_ws(message: &ClientMessage) -> Result<Message, FacecastError> {
    Ok(match message.to_frame()? {
        OutboundFrame::Text(text) => Message::text(text),
        OutboundFrame::Binary(bytes) => Message::binary(bytes),
    })
}

async fn close(sink: &mut WsSink, kind: CloseKind) -> Result<(), FacecastError> {
    let frame = CloseFrame {
        code: CloseCode::from(kind.code()),
        reason: Utf8Bytes::from_static(kind.reason()),
    };
    sink.send(Message::Close(Some(frame))).await?;
    Ok(())
}
