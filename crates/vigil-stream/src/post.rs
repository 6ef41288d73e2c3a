//! Post server: the document root, the capture trigger and node status.
//!
//! Routes:
//!   GET  /api/status  node status as JSON
//!   POST <any path>   capture trigger, answered with a redirect to the index
//!   GET  <any path>   static files under the document root

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use vigil_core::NodeIdentity;

use crate::events::{EventSender, NodeEvent, Origin};
use crate::mjpeg::StreamServer;
use crate::ws::BroadcastHub;

/// Capture state as seen from the network.
pub trait CaptureStatus: Send + Sync {
    fn state_name(&self) -> &'static str;
    fn last_photo(&self) -> Option<String>;
}

#[derive(Clone)]
pub struct PostState {
    pub node: Arc<NodeIdentity>,
    pub events: EventSender,
    /// Absent when the sink is disabled.
    pub stream: Option<Arc<StreamServer>>,
    pub hub: Option<Arc<BroadcastHub>>,
    pub capture: Arc<dyn CaptureStatus>,
    /// Page the trigger redirects to, relative to the document root.
    pub index_name: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub hostname: String,
    pub unique_id: String,
    pub stream_clients: usize,
    pub broadcast_sessions: usize,
    pub capture_state: String,
    pub last_photo: Option<String>,
}

pub fn router(state: PostState, document_root: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let files = post(handle_trigger).fallback_service(ServeDir::new(document_root));

    Router::new()
        .route("/api/status", get(handle_status))
        .route("/", files.clone())
        .route("/{*path}", files)
        .with_state(state)
        .layer(cors)
}

async fn handle_status(State(state): State<PostState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        hostname: state.node.hostname.clone(),
        unique_id: state.node.unique_id.clone(),
        stream_clients: state.stream.as_ref().map_or(0, |s| s.active()),
        broadcast_sessions: state.hub.as_ref().map_or(0, |h| h.sessions()),
        capture_state: state.capture.state_name().to_string(),
        last_photo: state.capture.last_photo(),
    })
}

/// Any form submission takes a photo.
async fn handle_trigger(
    State(state): State<PostState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Redirect {
    tracing::info!(%peer, "capture triggered over http");
    state.events.emit(NodeEvent::TakePhoto {
        origin: Origin::Post,
    });
    Redirect::to(&format!("/{}", state.index_name))
}
