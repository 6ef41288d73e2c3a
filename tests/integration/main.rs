//! Vigil integration test harness.
//!
//! Each test assembles a complete node in-process: a synthetic frame
//! source, the tick thread, the event loop and all three HTTP surfaces on
//! ephemeral loopback ports, plus a local UDP socket standing in for the
//! telemetry receiver.
//!
//!   cargo test --test integration
//!
//! A node owns a private document root under the temp dir and removes it
//! when dropped.

mod broadcast;
mod post;
mod stream;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast as shutdown;

pub use vigil_core::config::{CaptureConfig, DetectionConfig, StreamConfig, VideoConfig};
use vigil_core::{NodeIdentity, TelemetrySink};
use vigil_stream::{events, post as post_surface, BroadcastHub, PostState, StreamServer};
use vigil_vision::FrameAnalyzer;
use vigild::capture::{CaptureWorkflow, Notifier};
use vigild::control::EventLoop;
use vigild::dispatch::FanoutDispatcher;
use vigild::source::TestPattern;
use vigild::tick::{StreamOutput, TickScheduler};
use vigild::udp::UdpSink;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const HOSTNAME: &str = "cam-it";
pub const UNIQUE_ID: &str = "00112233445566778899aabbccddeeff";
pub const WIDTH: u32 = 96;
pub const HEIGHT: u32 = 72;

static NEXT_NODE: AtomicU32 = AtomicU32::new(0);

/// Knobs the tests vary. Everything else uses daemon defaults.
pub struct NodeOptions {
    pub framerate: u32,
    pub stream: StreamConfig,
    pub ws_queue: usize,
    pub detection: DetectionConfig,
    pub video: VideoConfig,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            framerate: 30,
            stream: StreamConfig {
                max_framerate: 30,
                max_bitrate_kbps: 0,
                ..StreamConfig::default()
            },
            ws_queue: 64,
            detection: DetectionConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

pub struct TestNode {
    pub stream_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub post_addr: SocketAddr,
    /// Receives everything the UDP sink sends.
    pub udp: UdpSocket,
    pub document_root: PathBuf,
    pub stream: Arc<StreamServer>,
    pub hub: Arc<BroadcastHub>,
    running: Arc<AtomicBool>,
    shutdown: shutdown::Sender<()>,
}

impl TestNode {
    pub async fn start(opts: NodeOptions) -> Result<Self> {
        let n = NEXT_NODE.fetch_add(1, Ordering::Relaxed);
        let document_root =
            std::env::temp_dir().join(format!("vigil-it-{}-{}", std::process::id(), n));
        let _ = std::fs::remove_dir_all(&document_root);

        let node = Arc::new(NodeIdentity::new(HOSTNAME, UNIQUE_ID));
        let (event_tx, event_rx) = events::channel(64);
        let hub = BroadcastHub::new(opts.ws_queue, event_tx.clone());
        let stream = StreamServer::new(opts.stream.clone(), event_tx.clone());

        let udp = UdpSocket::bind("127.0.0.1:0").await.context("bind udp receiver")?;
        let udp_port = udp.local_addr()?.port();

        let mut dispatcher = FanoutDispatcher::new();
        dispatcher.register(Arc::new(UdpSink::connect("127.0.0.1", udp_port)?) as Arc<dyn TelemetrySink>);
        dispatcher.register(hub.clone() as Arc<dyn TelemetrySink>);

        let analyzer = FrameAnalyzer::new(node.clone(), opts.detection, opts.video);
        let tick = TickScheduler::new(
            Box::new(TestPattern::new(WIDTH, HEIGHT, true)),
            analyzer,
            Arc::new(dispatcher),
            opts.framerate,
        )
        .with_stream(
            stream.clone(),
            StreamOutput {
                width: WIDTH,
                height: HEIGHT,
                quality: opts.stream.quality,
            },
        );
        let snapshot = tick.snapshot();
        let running = tick.running();

        let capture = CaptureWorkflow::new(
            node.clone(),
            &CaptureConfig {
                document_root: document_root.clone(),
                ..CaptureConfig::default()
            },
            snapshot,
            Some(hub.clone() as Arc<dyn Notifier>),
        );
        capture.prepare().context("prepare document root")?;

        let (shutdown_tx, _) = shutdown::channel::<()>(1);

        tick.spawn().context("spawn tick thread")?;
        tokio::spawn(
            EventLoop::new(event_rx, capture.clone(), Some(hub.clone()), shutdown_tx.subscribe())
                .run(),
        );

        let post_state = PostState {
            node,
            events: event_tx,
            stream: Some(stream.clone()),
            hub: Some(hub.clone()),
            capture,
            index_name: CaptureConfig::default().index_name,
        };

        let stream_addr = spawn_surface(
            "stream",
            stream.clone().router(),
            shutdown_tx.subscribe(),
        )
        .await?;
        let ws_addr = spawn_surface("ws", hub.clone().router(), shutdown_tx.subscribe()).await?;
        let post_addr = spawn_surface(
            "post",
            post_surface::router(post_state, &document_root),
            shutdown_tx.subscribe(),
        )
        .await?;

        Ok(Self {
            stream_addr,
            ws_addr,
            post_addr,
            udp,
            document_root,
            stream,
            hub,
            running,
            shutdown: shutdown_tx,
        })
    }

    pub fn post_url(&self, path: &str) -> String {
        format!("http://{}{}", self.post_addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.ws_addr)
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.stream.close_all();
        self.hub.close_all();
        let _ = self.shutdown.send(());
        let _ = std::fs::remove_dir_all(&self.document_root);
    }
}

async fn spawn_surface(
    name: &'static str,
    app: axum::Router,
    shutdown: shutdown::Receiver<()>,
) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = vigil_stream::serve_on(name, listener, app, shutdown).await {
            eprintln!("{name} surface failed: {e}");
        }
    });
    Ok(addr)
}

/// Poll `check` until it yields a value or `timeout` passes.
pub async fn wait_for<T, F, Fut>(timeout: Duration, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    tokio::time::timeout(timeout, async {
        loop {
            if let Some(v) = check().await {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    })
    .await
    .context("condition not met before timeout")
}
