//! Per-client delivery pacing.
//!
//! The gap between two sends is the larger of the frame interval and the
//! time the client's bitrate budget needs for an average frame:
//!
//!   interval = max(1 / max_framerate, avg_frame_bytes · 8 / max_bitrate)
//!
//! The average is an exponential moving average over delivered frames.
//! A bitrate of 0 disables the bitrate term.

use std::time::Duration;

use tokio::time::Instant;

/// Weight of the newest frame in the moving average.
const EWMA_ALPHA: f64 = 0.2;

#[derive(Debug)]
pub struct Pacer {
    frame_interval: Duration,
    bits_per_sec: Option<f64>,
    avg_frame_bytes: Option<f64>,
    last_sent: Option<Instant>,
}

impl Pacer {
    pub fn new(max_framerate: u32, max_bitrate_kbps: u32) -> Self {
        let fps = max_framerate.max(1) as f64;
        Self {
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            bits_per_sec: (max_bitrate_kbps > 0).then(|| max_bitrate_kbps as f64 * 1000.0),
            avg_frame_bytes: None,
            last_sent: None,
        }
    }

    /// Current required gap between sends.
    pub fn interval(&self) -> Duration {
        let bitrate_gap = match (self.bits_per_sec, self.avg_frame_bytes) {
            (Some(bps), Some(avg)) => Duration::from_secs_f64(avg * 8.0 / bps),
            _ => Duration::ZERO,
        };
        self.frame_interval.max(bitrate_gap)
    }

    /// Earliest instant the next frame may go out. `None` before the first send.
    pub fn ready_at(&self) -> Option<Instant> {
        self.last_sent.map(|t| t + self.interval())
    }

    /// Sleep until the next send is allowed.
    pub async fn wait(&self) {
        if let Some(at) = self.ready_at() {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Record a delivered frame of `bytes` at the current instant.
    pub fn record(&mut self, bytes: usize) {
        let b = bytes as f64;
        self.avg_frame_bytes = Some(match self.avg_frame_bytes {
            Some(avg) => avg + EWMA_ALPHA * (b - avg),
            None => b,
        });
        self.last_sent = Some(Instant::now());
    }

    pub fn avg_frame_bytes(&self) -> Option<f64> {
        self.avg_frame_bytes
    }
}
