//! Stream client sessions and admission control.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::queue::BoundedQueue;

pub type SessionId = u64;

/// All live stream sessions, keyed by id.
pub type SessionTable = Arc<DashMap<SessionId, Arc<StreamSession>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Admitted, response not yet started.
    Connecting,
    /// Frames are flowing.
    Active,
    Closed,
}

pub struct StreamSession {
    pub id: SessionId,
    pub peer: SocketAddr,
    pub opened_at: Instant,
    /// Encoded frames waiting for this client.
    pub queue: BoundedQueue<Bytes>,
    state: Mutex<SessionState>,
}

impl StreamSession {
    pub fn new(id: SessionId, peer: SocketAddr, queue_depth: usize) -> Self {
        Self {
            id,
            peer,
            opened_at: Instant::now(),
            queue: BoundedQueue::new(queue_depth),
            state: Mutex::new(SessionState::Connecting),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn activate(&self) {
        let mut state = self.state.lock();
        if *state == SessionState::Connecting {
            *state = SessionState::Active;
        }
    }

    /// Idempotent. Wakes the writer so it can finish.
    pub fn close(&self) {
        *self.state.lock() = SessionState::Closed;
        self.queue.close();
    }
}

// ── Admission ─────────────────────────────────────────────────────────────────

/// Counts admitted clients against a fixed ceiling.
#[derive(Debug)]
pub struct Admission {
    limit: usize,
    admitted: AtomicUsize,
}

impl Admission {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit,
            admitted: AtomicUsize::new(0),
        })
    }

    /// Claim a slot, or `None` when the ceiling is reached.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AdmissionSlot> {
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| AdmissionSlot {
                admission: self.clone(),
            })
    }

    pub fn admitted(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Held for the life of a session. Dropping it frees the slot.
#[derive(Debug)]
pub struct AdmissionSlot {
    admission: Arc<Admission>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.admission.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}
