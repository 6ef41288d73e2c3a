//! Fans encoded telemetry out to every enabled sink.
//!
//! Each message is encoded once per tick and handed to each sink in turn.
//! A failing sink is logged and counted; the others are unaffected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vigil_core::sink::TelemetrySink;
use vigil_core::Telemetry;

struct SinkSlot {
    sink: Arc<dyn TelemetrySink>,
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkCounters {
    pub name: &'static str,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Default)]
pub struct FanoutDispatcher {
    sinks: Vec<SinkSlot>,
    messages: AtomicU64,
    encode_failures: AtomicU64,
}

impl FanoutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Arc<dyn TelemetrySink>) {
        tracing::info!(sink = sink.name(), "telemetry sink enabled");
        self.sinks.push(SinkSlot {
            sink,
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Encode each message once and offer it to every sink. Returns the
    /// number of messages encoded.
    pub fn dispatch(&self, messages: &[Telemetry]) -> usize {
        if self.sinks.is_empty() {
            return 0;
        }
        let mut encoded = 0;
        for msg in messages {
            let wire = match msg.encode() {
                Ok(w) => w,
                Err(e) => {
                    self.encode_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(kind = ?msg.kind(), error = %e, "telemetry encode failed");
                    continue;
                }
            };
            encoded += 1;
            for slot in &self.sinks {
                match slot.sink.deliver(&wire) {
                    Ok(()) => {
                        slot.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        slot.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(sink = slot.sink.name(), error = %e, "sink delivery failed");
                    }
                }
            }
        }
        self.messages.fetch_add(encoded as u64, Ordering::Relaxed);
        encoded
    }

    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn encode_failures(&self) -> u64 {
        self.encode_failures.load(Ordering::Relaxed)
    }

    pub fn counters(&self) -> Vec<SinkCounters> {
        self.sinks
            .iter()
            .map(|s| SinkCounters {
                name: s.sink.name(),
                delivered: s.delivered.load(Ordering::Relaxed),
                failed: s.failed.load(Ordering::Relaxed),
            })
            .collect()
    }
}
