//! Events raised by the network surfaces and consumed by the daemon.

use tokio::sync::mpsc;

/// Which surface a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Stream,
    Broadcast,
}

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    WebSocket { session: u64 },
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    SessionOpened { surface: Surface, session: u64 },
    SessionClosed { surface: Surface, session: u64 },
    TakePhoto { origin: Origin },
    StreamPhoto { origin: Origin },
}

/// Non-blocking event emitter shared by all surfaces.
#[derive(Clone)]
pub struct EventSender(mpsc::Sender<NodeEvent>);

pub fn channel(depth: usize) -> (EventSender, mpsc::Receiver<NodeEvent>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (EventSender(tx), rx)
}

impl EventSender {
    /// Never waits. A full or closed channel drops the event.
    pub fn emit(&self, event: NodeEvent) {
        if let Err(e) = self.0.try_send(event) {
            tracing::warn!(error = %e, "event dropped");
        }
    }
}
