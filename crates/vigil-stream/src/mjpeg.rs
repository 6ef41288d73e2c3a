//! MJPEG pull streaming server.
//!
//! Clients `GET /ipvideo` and receive a `multipart/x-mixed-replace` body.
//! Each client owns a bounded frame queue and a pacer; the tick pushes
//! encoded frames into every queue through `publish` and never waits on a
//! client. Clients beyond `max_clients` get 503 and are not queued.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::{BufMut, Bytes, BytesMut};
use dashmap::DashMap;

use vigil_core::config::StreamConfig;

use crate::events::{EventSender, NodeEvent, Surface};
use crate::pacing::Pacer;
use crate::session::{Admission, AdmissionSlot, SessionId, SessionTable, StreamSession};

const BOUNDARY: &str = "vigilframe";

const LIVE_VIEW: &str = r#"<!DOCTYPE html>
<html>
<head><title>vigil live</title></head>
<body style="margin:0;background:#000">
<img src="/ipvideo" style="display:block;margin:auto;max-width:100%">
</body>
</html>
"#;

pub struct StreamServer {
    config: StreamConfig,
    sessions: SessionTable,
    admission: Arc<Admission>,
    next_id: AtomicU64,
    events: EventSender,
    evicted: AtomicU64,
    refused: AtomicU64,
}

/// Admission refused: the server is at `max_clients`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refused;

impl StreamServer {
    pub fn new(config: StreamConfig, events: EventSender) -> Arc<Self> {
        Arc::new(Self {
            admission: Admission::new(config.max_clients),
            config,
            sessions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            events,
            evicted: AtomicU64::new(0),
            refused: AtomicU64::new(0),
        })
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(handle_live_view))
            .route("/ipvideo", get(handle_ipvideo))
            .with_state(self)
    }

    /// Push one encoded frame to every client. Returns the number of
    /// sessions it was queued for.
    pub fn publish(&self, jpeg: Bytes) -> usize {
        let mut queued = 0;
        for entry in self.sessions.iter() {
            if entry.value().queue.push(jpeg.clone()).is_some() {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session = entry.key(), "stream frame evicted");
            }
            queued += 1;
        }
        queued
    }

    /// Connected clients.
    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn refused(&self) -> u64 {
        self.refused.load(Ordering::Relaxed)
    }

    /// Close every session. Their responses end once drained.
    pub fn close_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().close();
        }
    }

    /// Admit a client and register its session.
    pub fn open(self: &Arc<Self>, peer: SocketAddr) -> Result<StreamSubscription, Refused> {
        let Some(slot) = self.admission.try_acquire() else {
            self.refused.fetch_add(1, Ordering::Relaxed);
            tracing::info!(%peer, limit = self.admission.limit(), "stream client refused");
            return Err(Refused);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(StreamSession::new(id, peer, self.config.max_queue));
        self.sessions.insert(id, session.clone());
        self.events.emit(NodeEvent::SessionOpened {
            surface: Surface::Stream,
            session: id,
        });
        tracing::info!(session = id, %peer, clients = self.sessions.len(), "stream client connected");

        Ok(StreamSubscription {
            pacer: Pacer::new(self.config.max_framerate, self.config.max_bitrate_kbps),
            guard: SessionGuard {
                server: self.clone(),
                session,
                _slot: slot,
            },
        })
    }

    fn release(&self, id: SessionId) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.close();
            self.events.emit(NodeEvent::SessionClosed {
                surface: Surface::Stream,
                session: id,
            });
            tracing::info!(
                session = id,
                peer = %session.peer,
                secs = session.opened_at.elapsed().as_secs(),
                "stream client disconnected"
            );
        }
    }
}

/// Removes the session and frees its admission slot when dropped.
struct SessionGuard {
    server: Arc<StreamServer>,
    session: Arc<StreamSession>,
    _slot: AdmissionSlot,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.server.release(self.session.id);
    }
}

/// One admitted client's paced view of the frame stream.
pub struct StreamSubscription {
    pacer: Pacer,
    guard: SessionGuard,
}

impl StreamSubscription {
    pub fn id(&self) -> SessionId {
        self.guard.session.id
    }

    /// Next frame, no earlier than the pacer allows. `None` once closed.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.pacer.wait().await;
        let frame = self.guard.session.queue.recv().await?;
        self.pacer.record(frame.len());
        Some(frame)
    }

    /// Next frame framed as one multipart part.
    pub async fn next_part(&mut self) -> Option<Bytes> {
        let frame = self.next_frame().await?;
        Some(multipart_part(&frame))
    }

    fn into_response(self) -> Response {
        self.guard.session.activate();
        let stream = futures::stream::unfold(self, |mut sub| async move {
            let part = sub.next_part().await?;
            Some((Ok::<_, Infallible>(part), sub))
        });

        (
            [
                (
                    header::CONTENT_TYPE,
                    format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
                ),
                (
                    header::CACHE_CONTROL,
                    "no-cache, no-store, must-revalidate".to_string(),
                ),
                (header::PRAGMA, "no-cache".to_string()),
            ],
            Body::from_stream(stream),
        )
            .into_response()
    }
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut buf = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    buf.put_slice(head.as_bytes());
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn handle_live_view() -> Html<&'static str> {
    Html(LIVE_VIEW)
}

async fn handle_ipvideo(
    State(server): State<Arc<StreamServer>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    match server.open(peer) {
        Ok(sub) => sub.into_response(),
        Err(Refused) => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONNECTION, "close")],
            "too many stream clients\n",
        )
            .into_response(),
    }
}
