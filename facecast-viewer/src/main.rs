//! Facecast viewer entry point.
//!
//! ```text
//! facecast-viewer                      Connect with defaults, no video
//! facecast-viewer --frames <dir>       Replay a directory of JPEG/PNG frames
//! facecast-viewer --endpoint <url>     Override the server endpoint
//! facecast-viewer --config <path>      Use custom config TOML
//! facecast-viewer --gen-config         Dump default config and exit
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use facecast_core::{FrameSource, Orchestrator, SessionClient};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use facecast_viewer::config::{LoggingConfig, ViewerConfig};
use facecast_viewer::source::{NoDevice, PassthroughEncoder, ReplaySource};
use facecast_viewer::terminal::{self, TerminalSurface};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "facecast-viewer", about = "Live face recognition overlay")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "facecast-viewer.toml")]
    config: PathBuf,

    /// Recognition server endpoint (overrides config). Example: ws://10.0.0.5:8080/ws
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory of frames to replay (overrides config).
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", ViewerConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = ViewerConfig::load(&cli.config);
    if let Some(endpoint) = cli.endpoint {
        config.session.endpoint = endpoint;
    }
    if let Some(frames) = cli.frames {
        config.source.frames_dir = frames.display().to_string();
    }

    init_tracing(&config.logging)?;
    info!("facecast-viewer v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Frame source ─────────────────────────────────────────

    let source: Arc<dyn FrameSource> = if config.source.frames_dir.is_empty() {
        warn!("no frames directory configured; running without video");
        Arc::new(NoDevice)
    } else {
        Arc::new(ReplaySource::open(Path::new(&config.source.frames_dir), &config.capture)?)
    };

    // ── 2. Wire the session client to the orchestrator ──────────

    let mut client = SessionClient::new(config.session.clone());
    info!(client_id = client.client_id(), endpoint = %config.session.endpoint, "session client ready");

    let surface = TerminalSurface::stdout(config.capture.width, config.capture.height)?;
    let orchestrator = Orchestrator::new(
        &config.capture,
        &config.render,
        client.handle(),
        source,
        Arc::new(PassthroughEncoder),
        surface,
    );
    orchestrator.attach(&mut client);

    let stopping = orchestrator.stop_handle();
    let session = tokio::spawn(async move { client.run().await });
    let input = spawn_input(Arc::clone(&stopping));

    // ── 3. Run until q / Ctrl-C ─────────────────────────────────

    let result = orchestrator.run().await;

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    session.abort();
    let _ = session.await;
    stopping.store(true, Ordering::SeqCst);
    let _ = input.await;
    terminal::restore()?;

    result?;
    Ok(())
}

/// Route logs to `logging.file`, or drop them: stdout belongs to the overlay.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    if logging.file.is_empty() {
        builder.with_writer(std::io::sink).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logging.file)?;
        builder.with_writer(std::sync::Mutex::new(file)).init();
    }
    Ok(())
}

/// Blocking crossterm poll on a dedicated thread; `q` or Ctrl-C raises `stopping`.
fn spawn_input(stopping: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stopping.load(Ordering::SeqCst) {
            if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => stopping.store(true, Ordering::SeqCst),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    stopping.store(true, Ordering::SeqCst)
                }
                _ => {}
            }
        }
    })
}
