//! The processing tick.
//!
//! One dedicated OS thread runs acquire → analyze → dispatch → stream →
//! snapshot at `tick.framerate`. It is the only writer of the current-frame
//! snapshot. Acquisition may block the tick; nothing here has a timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;

use vigil_core::Frame;
use vigil_stream::StreamServer;
use vigil_vision::FrameAnalyzer;

use crate::dispatch::FanoutDispatcher;
use crate::source::FrameSource;

pub type Snapshot = watch::Receiver<Option<Arc<Frame>>>;

/// Counters read by the stats task.
#[derive(Debug, Default)]
pub struct TickStats {
    pub ticks: AtomicU64,
    pub skipped: AtomicU64,
    pub source_errors: AtomicU64,
    pub stream_frames: AtomicU64,
}

/// Live stream output settings.
#[derive(Debug, Clone, Copy)]
pub struct StreamOutput {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

pub struct TickScheduler {
    source: Box<dyn FrameSource>,
    analyzer: FrameAnalyzer,
    dispatcher: Arc<FanoutDispatcher>,
    stream: Option<(Arc<StreamServer>, StreamOutput)>,
    snapshot: watch::Sender<Option<Arc<Frame>>>,
    running: Arc<AtomicBool>,
    period: Duration,
    stats: Arc<TickStats>,
}

impl TickScheduler {
    pub fn new(
        source: Box<dyn FrameSource>,
        analyzer: FrameAnalyzer,
        dispatcher: Arc<FanoutDispatcher>,
        framerate: u32,
    ) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            source,
            analyzer,
            dispatcher,
            stream: None,
            snapshot,
            running: Arc::new(AtomicBool::new(true)),
            period: Duration::from_secs_f64(1.0 / framerate.max(1) as f64),
            stats: Arc::new(TickStats::default()),
        }
    }

    pub fn with_stream(mut self, server: Arc<StreamServer>, output: StreamOutput) -> Self {
        self.stream = Some((server, output));
        self
    }

    /// Receiver of the current-frame snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.subscribe()
    }

    /// Clear to stop the loop after the current tick.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn stats(&self) -> Arc<TickStats> {
        self.stats.clone()
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("vigil-tick".into())
            .spawn(move || self.run())
    }

    pub fn run(mut self) {
        tracing::info!(
            source = %self.source.describe(),
            period_ms = self.period.as_millis() as u64,
            "tick loop started"
        );
        while self.running.load(Ordering::Acquire) {
            let started = Instant::now();
            self.tick();
            if let Some(rest) = self.period.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        tracing::info!("tick loop stopped");
    }

    /// One pass. Returns the number of telemetry messages dispatched.
    pub fn tick(&mut self) -> usize {
        self.stats.ticks.fetch_add(1, Ordering::Relaxed);

        let frame = match self.source.grab() {
            Ok(Some(frame)) if !frame.is_empty() => frame,
            Ok(_) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
            Err(e) => {
                self.stats.source_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "frame acquisition failed");
                return 0;
            }
        };

        let messages = self.analyzer.analyze(&frame);
        let sent = self.dispatcher.dispatch(&messages);

        if let Some((server, out)) = &self.stream {
            if server.active() > 0 {
                match frame.encode_jpeg_scaled(out.width, out.height, out.quality) {
                    Ok(jpeg) => {
                        server.publish(Bytes::from(jpeg));
                        self.stats.stream_frames.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => tracing::warn!(error = %e, "stream frame encode failed"),
                }
            }
        }

        tracing::trace!(sequence = frame.sequence, sent, "tick");
        self.snapshot.send_replace(Some(Arc::new(frame)));
        sent
    }
}
