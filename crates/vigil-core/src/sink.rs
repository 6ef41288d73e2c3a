//! Telemetry sinks.
//!
//! A sink receives every encoded telemetry datagram of a tick. Delivery is
//! best-effort: implementations must never block the caller and never
//! retry.

use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("datagram of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },
}

pub trait TelemetrySink: Send + Sync {
    /// Short name used in logs and counters.
    fn name(&self) -> &'static str;

    fn deliver(&self, datagram: &Bytes) -> Result<(), SinkError>;
}
