//! Capture/render orchestration.
//!
//! Three self-rescheduling loops share one stop flag:
//!
//! 1. **Capture**: encode the current frame, submit it, sleep a fixed
//!    interval. Runs in its own Tokio task.
//! 2. **Render**: redraw the overlay and count the frame.
//! 3. **Statistics**: publish the frame count and reset it.
//!
//! Render and statistics run inside the presenter loop together with
//! session events and the delayed slot clears, so [`OverlayContent`] is
//! only ever touched from one task and needs no lock. Each loop re-arms
//! its own timer after its body runs, so their phases drift freely.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::time::DelayQueue;
use tracing::{debug, info, warn};

use crate::capture::{FrameEncoder, FrameSource};
use crate::config::{CaptureConfig, RenderConfig};
use crate::error::FacecastError;
use crate::network::{SessionClient, SessionHandle};
use crate::overlay::{OverlayContent, Slot};
use crate::protocol::RecognitionTask;
use crate::render::{Renderer, Surface};
use crate::state::SessionStatus;

/// Inbound notifications for the presenter loop.
#[derive(Debug, Clone)]
pub enum PresenterEvent {
    Status(SessionStatus),
    Task(RecognitionTask),
}

// ── CaptureLoop ──────────────────────────────────────────────────

/// Samples the frame source and submits images at a fixed pace.
#[derive(Clone)]
pub struct CaptureLoop {
    session: SessionHandle,
    source: Arc<dyn FrameSource>,
    encoder: Arc<dyn FrameEncoder>,
    interval: Duration,
    stopping: Arc<AtomicBool>,
}

impl CaptureLoop {
    /// Encode the current frame and hand it to the session.
    ///
    /// Fails when there is no frame or the encoder rejects it. Whether
    /// the image actually goes out depends on the session being ready.
    pub async fn capture_once(&self) -> Result<(), FacecastError> {
        let frame = self
            .source
            .current_frame()
            .ok_or(FacecastError::NoActiveTrack)?;
        let image = self.encoder.encode(&frame).await?;
        self.session.send_image_request(image);
        Ok(())
    }

    /// Loop until the stop flag is raised.
    ///
    /// The pause after each tick does not depend on how long encoding
    /// took or on the session state.
    pub async fn run(self) {
        while !self.stopping.load(Ordering::SeqCst) {
            if let Err(e) = self.capture_once().await {
                warn!("capture failed: {e}");
            }
            if self.stopping.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        debug!("capture loop stopped");
    }
}

// ── Orchestrator ─────────────────────────────────────────────────

/// Owns the overlay and drives the capture, render and statistics loops.
///
/// # Lifetime
///
/// Build it, [`attach`](Self::attach) it to a session client, then call
/// [`run`](Self::run). Raising the flag from
/// [`stop_handle`](Self::stop_handle) ends all loops on their next tick.
pub struct Orchestrator<S> {
    capture: CaptureLoop,
    render: RenderConfig,
    renderer: Renderer,
    surface: S,
    overlay: OverlayContent,
    events_tx: mpsc::UnboundedSender<PresenterEvent>,
    events_rx: mpsc::UnboundedReceiver<PresenterEvent>,
    clears: DelayQueue<(Slot, Arc<RecognitionTask>)>,
    frames: u32,
    stopping: Arc<AtomicBool>,
}

impl<S: Surface> Orchestrator<S> {
    pub fn new(
        capture: &CaptureConfig,
        render: &RenderConfig,
        session: SessionHandle,
        source: Arc<dyn FrameSource>,
        encoder: Arc<dyn FrameEncoder>,
        surface: S,
    ) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut overlay = OverlayContent::new();
        overlay.set_session(session.status());

        Self {
            capture: CaptureLoop {
                session,
                source,
                encoder,
                interval: capture.interval(),
                stopping: Arc::clone(&stopping),
            },
            render: render.clone(),
            renderer: Renderer::new(render),
            surface,
            overlay,
            events_tx,
            events_rx,
            clears: DelayQueue::new(),
            frames: 0,
            stopping,
        }
    }

    /// Register this orchestrator as the client's status and task observer.
    pub fn attach(&self, client: &mut SessionClient) {
        let tx = self.events_tx.clone();
        client.on_status_changed(move |status| {
            let _ = tx.send(PresenterEvent::Status(status));
        });
        let tx = self.events_tx.clone();
        client.on_task_update(move |task| {
            let _ = tx.send(PresenterEvent::Task(task));
        });
    }

    /// Sender for feeding events without a client (replays, tests).
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PresenterEvent> {
        self.events_tx.clone()
    }

    /// A cloneable stop flag shared by all three loops.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopping)
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn overlay(&self) -> &OverlayContent {
        &self.overlay
    }

    /// The capture loop alone, e.g. to call `capture_once` directly.
    pub fn capture_loop(&self) -> &CaptureLoop {
        &self.capture
    }

    /// Run every loop until stopped, then hand the surface back.
    pub async fn run(mut self) -> Result<S, FacecastError> {
        info!("starting capture and render loops");
        let capture = tokio::spawn(self.capture.clone().run());

        self.present().await;

        capture.await?;
        info!("capture and render loops stopped");
        Ok(self.surface)
    }

    /// Render, statistics, event and clear handling on one task.
    async fn present(&mut self) {
        let render_interval = self.render.interval();
        let stats_interval = self.render.stats_interval();

        let render_tick = tokio::time::sleep(Duration::ZERO);
        let stats_tick = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(render_tick, stats_tick);

        loop {
            tokio::select! {
                biased;

                _ = &mut stats_tick => {
                    if self.is_stopping() {
                        break;
                    }
                    self.sample_stats();
                    stats_tick.as_mut().reset(Instant::now() + stats_interval);
                }
                _ = &mut render_tick => {
                    if self.is_stopping() {
                        break;
                    }
                    self.render_frame();
                    render_tick.as_mut().reset(Instant::now() + render_interval);
                }
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                Some(expired) = self.clears.next(), if !self.clears.is_empty() => {
                    let (slot, task) = expired.into_inner();
                    self.overlay.clear_if_same(slot, &task);
                }
            }
        }
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn render_frame(&mut self) {
        self.frames += 1;
        let frame = self.capture.source.current_frame();
        if let Err(e) = self
            .renderer
            .render(&mut self.surface, &self.overlay, frame.as_ref())
        {
            warn!("render failed: {e}");
        }
    }

    fn sample_stats(&mut self) {
        self.overlay.set_frame_rate(self.frames);
        self.frames = 0;
    }

    fn handle_event(&mut self, event: PresenterEvent) {
        match event {
            PresenterEvent::Status(status) => self.overlay.set_session(status),
            PresenterEvent::Task(task) => {
                let clear_after = self.render.clear_after();
                for entry in self.overlay.apply_task(task) {
                    self.clears.insert(entry, clear_after);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::capture::{EncodedImage, VideoFrame};
    use crate::protocol::{FacePosition, RecognizedFace, StageState};
    use crate::render::testing::RecordingSurface;
    use crate::state::ConnectionState;

    struct StillSource(Option<VideoFrame>);

    impl FrameSource for StillSource {
        fn current_frame(&self) -> Option<VideoFrame> {
            self.0.clone()
        }
    }

    /// Passes frames through, failing the first `fail_first` calls.
    #[derive(Default)]
    struct CountingEncoder {
        calls: Mutex<u32>,
        fail_first: u32,
    }

    #[async_trait]
    impl FrameEncoder for CountingEncoder {
        async fn encode(&self, frame: &VideoFrame) -> Result<EncodedImage, FacecastError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.fail_first {
                return Err(FacecastError::Encoding("camera warming up".into()));
            }
            Ok(EncodedImage::new(frame.content_type.clone(), frame.data.clone()))
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame {
            width: 4,
            height: 4,
            content_type: "image/jpeg".into(),
            data: Bytes::from_static(b"\xff\xd8jpeg"),
        }
    }

    fn detection(x1: f64) -> RecognitionTask {
        let mut task = RecognitionTask {
            face_count: 1,
            faces: Some(vec![RecognizedFace {
                id: format!("face-{x1}"),
                position: FacePosition {
                    x1,
                    x2: x1 + 20.0,
                    y1: 0.0,
                    y2: 20.0,
                },
                results: None,
                vector: None,
            }]),
            ..Default::default()
        };
        task.detection.state = StageState::Succeeded;
        task
    }

    fn orchestrator(
        session: SessionHandle,
        source: Option<VideoFrame>,
        encoder: Arc<CountingEncoder>,
    ) -> (Orchestrator<RecordingSurface>, RecordingSurface) {
        let surface = RecordingSurface::default();
        let orch = Orchestrator::new(
            &CaptureConfig::default(),
            &RenderConfig::default(),
            session,
            Arc::new(StillSource(source)),
            encoder,
            surface.clone(),
        );
        (orch, surface)
    }

    #[tokio::test(start_paused = true)]
    async fn frame_rate_counts_renders_per_window() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Closed, 4);
        let (orch, surface) = orchestrator(session, None, Arc::default());
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        tokio::time::sleep(Duration::from_millis(1010)).await;
        let texts = surface.texts();
        let stats = texts.last().unwrap();
        assert!(
            stats.starts_with("[Renderer] frameRate=40\n"),
            "unexpected stats block: {stats}"
        );

        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_clear_leaves_newer_task_on_screen() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Ready, 4);
        let (orch, surface) = orchestrator(session, Some(frame()), Arc::default());
        let events = orch.event_sender();
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        events.send(PresenterEvent::Task(detection(10.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        events.send(PresenterEvent::Task(detection(200.0))).unwrap();

        // First task's clear fires at 500 and must not touch the second.
        tokio::time::sleep(Duration::from_millis(210)).await;
        let rects = surface.rects();
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].0.x, 200.0);

        // Second task's own clear fires at 800.
        tokio::time::sleep(Duration::from_millis(340)).await;
        assert!(surface.rects().is_empty());

        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn task_slot_cleared_after_500ms() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Ready, 4);
        let (orch, surface) = orchestrator(session, Some(frame()), Arc::default());
        let events = orch.event_sender();
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        events.send(PresenterEvent::Task(detection(10.0))).unwrap();
        tokio::time::sleep(Duration::from_millis(490)).await;
        assert_eq!(surface.rects().len(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(surface.rects().is_empty());

        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn results_after_reconnect_replace_previous_session() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Ready, 4);
        let (orch, surface) = orchestrator(session, Some(frame()), Arc::default());
        let events = orch.event_sender();
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        let mut old = detection(10.0);
        old.request_id = Some(37);
        events.send(PresenterEvent::Task(old)).unwrap();
        events.send(PresenterEvent::Status(SessionStatus::closed("client-1"))).unwrap();

        let mut ready = SessionStatus::closed("client-1");
        ready.state = ConnectionState::Ready;
        ready.session_id = Some("sess-2".into());
        events.send(PresenterEvent::Status(ready)).unwrap();

        // Request ids restart at 1 in the new session.
        let mut fresh = detection(300.0);
        fresh.request_id = Some(1);
        events.send(PresenterEvent::Task(fresh)).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let rects = surface.rects();
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].0.x, 300.0);

        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn status_events_reach_the_stats_block() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Closed, 4);
        let (orch, surface) = orchestrator(session, None, Arc::default());
        let events = orch.event_sender();
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        let mut status = SessionStatus::closed("client-9");
        status.state = ConnectionState::Ready;
        status.session_id = Some("sess-9".into());
        events.send(PresenterEvent::Status(status)).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let stats = surface.texts().last().cloned().unwrap();
        assert!(stats.contains("State=ready"));
        assert!(stats.contains("SessionId=sess-9"));

        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn capture_submits_every_250ms_when_ready() {
        let (session, mut requests, _status) = SessionHandle::detached(ConnectionState::Ready, 16);
        let (orch, _surface) = orchestrator(session, Some(frame()), Arc::default());
        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());

        tokio::time::sleep(Duration::from_millis(990)).await;
        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();

        let mut sent = 0;
        while let Ok(image) = requests.try_recv() {
            assert_eq!(image.content_type, "image/jpeg");
            sent += 1;
        }
        assert_eq!(sent, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_encode_does_not_stop_capture() {
        let encoder = Arc::new(CountingEncoder {
            fail_first: 1,
            ..Default::default()
        });
        let (session, mut requests, _status) = SessionHandle::detached(ConnectionState::Ready, 16);
        let (orch, _surface) = orchestrator(session, Some(frame()), Arc::clone(&encoder));

        let err = orch.capture_loop().capture_once().await.unwrap_err();
        assert!(matches!(err, FacecastError::Encoding(_)));

        let stop = orch.stop_handle();
        let running = tokio::spawn(orch.run());
        tokio::time::sleep(Duration::from_millis(740)).await;
        stop.store(true, Ordering::SeqCst);
        running.await.unwrap().unwrap();

        let mut sent = 0;
        while requests.try_recv().is_ok() {
            sent += 1;
        }
        assert_eq!(sent, 3);
        assert_eq!(*encoder.calls.lock().unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_submitted_while_not_ready() {
        let (session, mut requests, _status) = SessionHandle::detached(ConnectionState::Connected, 16);
        let (orch, _surface) = orchestrator(session, Some(frame()), Arc::default());

        orch.capture_loop().capture_once().await.unwrap();
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_frame_is_a_rejected_capture() {
        let (session, _requests, _status) = SessionHandle::detached(ConnectionState::Ready, 4);
        let (orch, _surface) = orchestrator(session, None, Arc::default());
        assert!(matches!(
            orch.capture_loop().capture_once().await,
            Err(FacecastError::NoActiveTrack)
        ));
    }
}
