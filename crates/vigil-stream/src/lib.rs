//! vigil-stream — the node's network surfaces.
//!
//!   mjpeg  — pull streaming server (`GET /ipvideo`), admission-controlled
//!   ws     — WebSocket broadcast hub, also a telemetry sink
//!   post   — document root, capture trigger, `/api/status`
//!
//! Every outbound path goes through a `BoundedQueue` so one slow peer
//! never holds up the producer or any other peer.

pub mod events;
pub mod mjpeg;
pub mod pacing;
pub mod post;
pub mod queue;
pub mod session;
pub mod ws;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub use events::{EventSender, NodeEvent, Origin, Surface};
pub use mjpeg::StreamServer;
pub use post::{CaptureStatus, PostState};
pub use queue::BoundedQueue;
pub use ws::BroadcastHub;

/// Serve `app` on `bind:port` until `shutdown` fires.
pub async fn serve(
    name: &'static str,
    app: Router,
    bind: &str,
    port: u16,
    shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{}:{}", bind, port)).await?;
    serve_on(name, listener, app, shutdown).await
}

/// Serve `app` on an already bound listener until `shutdown` fires.
pub async fn serve_on(
    name: &'static str,
    listener: TcpListener,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    tracing::info!(surface = name, addr = %listener.local_addr()?, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    })
    .await?;
    tracing::info!(surface = name, "stopped");
    Ok(())
}
