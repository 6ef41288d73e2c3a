//! WebSocket broadcast hub.
//!
//! Every connected session owns a bounded outbound queue drained by its
//! own writer task. Broadcasting pushes into each queue without waiting,
//! so a stalled socket only ever loses its own oldest messages.
//!
//! Inbound text commands:
//!   "take_photo"   → `NodeEvent::TakePhoto`
//!   "stream_photo" → `NodeEvent::StreamPhoto`

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};

use vigil_core::sink::{SinkError, TelemetrySink};

use crate::events::{EventSender, NodeEvent, Origin, Surface};
use crate::queue::BoundedQueue;

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Binary(Bytes),
    Text(String),
}

pub struct BroadcastHub {
    sessions: DashMap<u64, Arc<BoundedQueue<Outbound>>>,
    next_id: AtomicU64,
    queue_depth: usize,
    events: EventSender,
    evicted: AtomicU64,
}

impl BroadcastHub {
    pub fn new(queue_depth: usize, events: EventSender) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_depth,
            events,
            evicted: AtomicU64::new(0),
        })
    }

    /// WebSocket upgrade on `/`.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route("/", get(handle_upgrade)).with_state(self)
    }

    pub fn sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Queue `msg` for every session. Returns how many sessions got it.
    pub fn broadcast(&self, msg: Outbound) -> usize {
        let mut n = 0;
        for entry in self.sessions.iter() {
            if entry.value().push(msg.clone()).is_some() {
                self.evicted.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(session = entry.key(), "broadcast message evicted");
            }
            n += 1;
        }
        n
    }

    pub fn broadcast_text(&self, text: impl Into<String>) -> usize {
        self.broadcast(Outbound::Text(text.into()))
    }

    pub fn close_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().close();
        }
    }

    /// Register a session and return its id and outbound queue.
    pub fn register(&self) -> (u64, Arc<BoundedQueue<Outbound>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(BoundedQueue::new(self.queue_depth));
        self.sessions.insert(id, queue.clone());
        self.events.emit(NodeEvent::SessionOpened {
            surface: Surface::Broadcast,
            session: id,
        });
        (id, queue)
    }

    pub fn unregister(&self, id: u64) {
        if let Some((_, queue)) = self.sessions.remove(&id) {
            queue.close();
            self.events.emit(NodeEvent::SessionClosed {
                surface: Surface::Broadcast,
                session: id,
            });
        }
    }

    /// Map an inbound text command to its event.
    fn on_text(&self, session: u64, text: &str) {
        let origin = Origin::WebSocket { session };
        match text.trim() {
            "take_photo" => self.events.emit(NodeEvent::TakePhoto { origin }),
            "stream_photo" => self.events.emit(NodeEvent::StreamPhoto { origin }),
            other => tracing::debug!(session, command = other, "unknown ws command"),
        }
    }
}

impl TelemetrySink for BroadcastHub {
    fn name(&self) -> &'static str {
        "ws"
    }

    fn deliver(&self, datagram: &Bytes) -> Result<(), SinkError> {
        self.broadcast(Outbound::Binary(datagram.clone()));
        Ok(())
    }
}

// ── Connection handling ───────────────────────────────────────────────────────

async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(hub): State<Arc<BroadcastHub>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(hub, socket, peer))
}

async fn handle_socket(hub: Arc<BroadcastHub>, socket: WebSocket, peer: SocketAddr) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (id, queue) = hub.register();
    tracing::info!(session = id, %peer, sessions = hub.sessions(), "ws session opened");

    let mut writer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                let frame = match msg {
                    Outbound::Binary(b) => Message::Binary(b),
                    Outbound::Text(t) => Message::Text(t.into()),
                };
                if let Err(e) = ws_tx.send(frame).await {
                    tracing::debug!(session = id, error = %e, "ws send failed");
                    break;
                }
            }
            queue.close();
            let _ = ws_tx.close().await;
        })
    };

    let mut writer_done = false;
    loop {
        tokio::select! {
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => hub.on_text(id, text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(session = id, error = %e, "ws receive failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
            // Writer gone means the socket is dead or the hub shut down.
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    hub.unregister(id);
    if !writer_done {
        let _ = writer.await;
    }
    tracing::info!(session = id, %peer, "ws session closed");
}
