//! Event loop — consumes `NodeEvent`s from the network surfaces and drives
//! capture and inline photo streaming.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use vigil_stream::{BroadcastHub, NodeEvent};

use crate::capture::CaptureWorkflow;

pub struct EventLoop {
    events: mpsc::Receiver<NodeEvent>,
    capture: Arc<CaptureWorkflow>,
    hub: Option<Arc<BroadcastHub>>,
    shutdown: broadcast::Receiver<()>,
}

impl EventLoop {
    pub fn new(
        events: mpsc::Receiver<NodeEvent>,
        capture: Arc<CaptureWorkflow>,
        hub: Option<Arc<BroadcastHub>>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            events,
            capture,
            hub,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("event loop shutting down");
                    return Ok(());
                }

                event = self.events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("event senders dropped, event loop exiting");
                        return Ok(());
                    };
                    self.handle(event);
                }
            }
        }
    }

    fn handle(&self, event: NodeEvent) {
        match event {
            NodeEvent::TakePhoto { origin } => {
                tracing::info!(?origin, "take photo");
                let capture = self.capture.clone();
                tokio::spawn(async move {
                    if let Err(e) = capture.trigger().await {
                        tracing::debug!(error = %e, "take photo finished without a photo");
                    }
                });
            }
            NodeEvent::StreamPhoto { origin } => {
                let Some(hub) = self.hub.clone() else {
                    tracing::debug!(?origin, "stream photo ignored, no broadcast hub");
                    return;
                };
                let capture = self.capture.clone();
                tokio::spawn(async move {
                    match tokio::task::spawn_blocking(move || capture.stream_photo()).await {
                        Ok(Ok(json)) => {
                            let n = hub.broadcast_text(json);
                            tracing::info!(?origin, sessions = n, "photo streamed");
                        }
                        Ok(Err(e)) => tracing::warn!(error = %e, "stream photo failed"),
                        Err(e) => tracing::warn!(error = %e, "stream photo task failed"),
                    }
                });
            }
            NodeEvent::SessionOpened { surface, session } => {
                tracing::debug!(?surface, session, "session opened");
            }
            NodeEvent::SessionClosed { surface, session } => {
                tracing::debug!(?surface, session, "session closed");
            }
        }
    }
}
