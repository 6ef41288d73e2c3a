//! Still capture.
//!
//! idle → capturing → awaiting-publish → idle
//!
//! A trigger takes the current snapshot, publishes a WAIT index right
//! away, writes the JPEG durably under `photos/`, renames it to
//! `<hostname>_photo_<ms>.jpg`, points the index at it and broadcasts
//! `"<hostname>,<file>"`. Only one capture runs at a time; triggers that
//! arrive meanwhile are rejected. Any failure returns to idle, broadcasts
//! nothing and restores the index to the last good photo.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use parking_lot::Mutex;

use vigil_core::config::CaptureConfig;
use vigil_core::frame::{unix_millis, FrameError};
use vigil_core::{Frame, NodeIdentity};
use vigil_stream::{BroadcastHub, CaptureStatus};

use crate::tick::Snapshot;

pub const PHOTOS_DIR: &str = "photos";

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>vigil</title></head>
<body>
<form method="post" action="/"><button type="submit">take photo</button></form>
<p><a href="result.html">last photo</a></p>
</body>
</html>
"#;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("a capture is already in flight")]
    Busy,
    #[error("no frame acquired yet")]
    NoFrame,
    #[error("encode: {0}")]
    Encode(#[from] FrameError),
    #[error("{0}: {1}")]
    Io(PathBuf, std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    AwaitingPublish { file_name: String },
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Capturing => "capturing",
            CaptureState::AwaitingPublish { .. } => "awaiting-publish",
        }
    }
}

/// Receives the completion broadcast.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: String);
}

impl Notifier for BroadcastHub {
    fn notify(&self, text: String) {
        self.broadcast_text(text);
    }
}

pub struct CaptureWorkflow {
    node: Arc<NodeIdentity>,
    quality: u8,
    document_root: PathBuf,
    index_name: String,
    snapshot: Snapshot,
    notifier: Option<Arc<dyn Notifier>>,
    state: Mutex<CaptureState>,
    last_photo: Mutex<Option<String>>,
}

impl CaptureWorkflow {
    pub fn new(
        node: Arc<NodeIdentity>,
        config: &CaptureConfig,
        snapshot: Snapshot,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            node,
            quality: config.still_quality,
            document_root: config.document_root.clone(),
            index_name: config.index_name.clone(),
            snapshot,
            notifier,
            state: Mutex::new(CaptureState::Idle),
            last_photo: Mutex::new(None),
        })
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.document_root.join(PHOTOS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.document_root.join(&self.index_name)
    }

    /// Create the document root layout and an empty index.
    pub fn prepare(&self) -> Result<(), CaptureError> {
        let photos = self.photos_dir();
        std::fs::create_dir_all(&photos).map_err(|e| CaptureError::Io(photos.clone(), e))?;
        let landing = self.document_root.join("index.html");
        if !landing.exists() {
            std::fs::write(&landing, LANDING_PAGE).map_err(|e| CaptureError::Io(landing, e))?;
        }
        self.write_index(&index_page(None))?;
        tracing::info!(root = %self.document_root.display(), "document root ready");
        Ok(())
    }

    pub fn state(&self) -> CaptureState {
        self.state.lock().clone()
    }

    /// Run a capture on the blocking pool.
    pub async fn trigger(self: &Arc<Self>) -> Result<String, CaptureError> {
        let frame = self.begin()?;
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.complete(frame)).await {
            Ok(result) => result,
            Err(e) => {
                *self.state.lock() = CaptureState::Idle;
                Err(CaptureError::Io(
                    self.photos_dir(),
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                ))
            }
        }
    }

    /// Run a capture on the calling thread.
    pub fn trigger_blocking(&self) -> Result<String, CaptureError> {
        let frame = self.begin()?;
        self.complete(frame)
    }

    /// idle → capturing, holding the frame to save.
    fn begin(&self) -> Result<Arc<Frame>, CaptureError> {
        let mut state = self.state.lock();
        if *state != CaptureState::Idle {
            tracing::warn!(state = state.name(), "capture rejected, busy");
            return Err(CaptureError::Busy);
        }
        let Some(frame) = self.snapshot.borrow().clone() else {
            tracing::warn!("capture rejected, no frame yet");
            return Err(CaptureError::NoFrame);
        };
        *state = CaptureState::Capturing;
        Ok(frame)
    }

    fn complete(&self, frame: Arc<Frame>) -> Result<String, CaptureError> {
        let provisional = format!("photo_{}.jpg", unix_millis());
        match self.save(&frame, &provisional) {
            Ok(file_name) => {
                *self.last_photo.lock() = Some(file_name.clone());
                if let Some(n) = &self.notifier {
                    n.notify(format!("{},{}", self.node.hostname, file_name));
                }
                *self.state.lock() = CaptureState::Idle;
                tracing::info!(file = %file_name, "photo published");
                Ok(file_name)
            }
            Err(e) => {
                let _ = std::fs::remove_file(self.photos_dir().join(&provisional));
                let last = self.last_photo.lock().clone();
                if let Err(restore) = self.write_index(&index_page(last.as_deref())) {
                    tracing::warn!(error = %restore, "index restore failed");
                }
                *self.state.lock() = CaptureState::Idle;
                tracing::warn!(error = %e, "capture failed");
                Err(e)
            }
        }
    }

    fn save(&self, frame: &Frame, provisional: &str) -> Result<String, CaptureError> {
        self.write_index(WAIT_PAGE)?;

        let jpeg = frame.encode_jpeg(self.quality)?;
        let photos = self.photos_dir();
        let tmp = photos.join(provisional);
        write_durable(&tmp, &jpeg)?;

        let file_name = format!("{}_{}", self.node.hostname, provisional);
        *self.state.lock() = CaptureState::AwaitingPublish {
            file_name: file_name.clone(),
        };
        self.publish(provisional, &file_name)?;
        Ok(file_name)
    }

    /// Rename the written photo to its final name and point the index at
    /// it. A photo the index never references is removed again.
    fn publish(&self, provisional: &str, file_name: &str) -> Result<(), CaptureError> {
        let photos = self.photos_dir();
        let target = photos.join(file_name);
        std::fs::rename(photos.join(provisional), &target)
            .map_err(|e| CaptureError::Io(target.clone(), e))?;

        if let Err(e) = self.write_index(&index_page(Some(file_name))) {
            let _ = std::fs::remove_file(&target);
            return Err(e);
        }
        Ok(())
    }

    /// Replace the index atomically.
    fn write_index(&self, html: &str) -> Result<(), CaptureError> {
        let path = self.index_path();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, html).map_err(|e| CaptureError::Io(tmp.clone(), e))?;
        std::fs::rename(&tmp, &path).map_err(|e| CaptureError::Io(path, e))
    }

    /// JSON message carrying the current frame inline. Writes no files and
    /// leaves the capture state alone.
    pub fn stream_photo(&self) -> Result<String, CaptureError> {
        let frame = self.snapshot.borrow().clone().ok_or(CaptureError::NoFrame)?;
        let jpeg = frame.encode_jpeg(self.quality)?;
        let msg = serde_json::json!({
            "unique_id": self.node.unique_id,
            "hostname": self.node.hostname,
            "photo": base64::engine::general_purpose::STANDARD.encode(&jpeg),
            "timestamp": frame.timestamp_ms.to_string(),
        });
        Ok(msg.to_string())
    }
}

impl CaptureStatus for CaptureWorkflow {
    fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    fn last_photo(&self) -> Option<String> {
        self.last_photo.lock().clone()
    }
}

const WAIT_PAGE: &str = r#"<!DOCTYPE html>
<html><head><meta http-equiv="refresh" content="0"></head><body>WAIT</body></html>
"#;

fn index_page(photo: Option<&str>) -> String {
    match photo {
        Some(name) => format!(
            "<!DOCTYPE html>\n<html><body><a href=\"{dir}/{name}\">{name}</a></body></html>\n",
            dir = PHOTOS_DIR
        ),
        None => "<!DOCTYPE html>\n<html><body></body></html>\n".to_string(),
    }
}

fn write_durable(path: &Path, data: &[u8]) -> Result<(), CaptureError> {
    let io = |e| CaptureError::Io(path.to_path_buf(), e);
    let mut file = File::create(path).map_err(io)?;
    file.write_all(data).map_err(io)?;
    file.sync_all().map_err(io)?;
    Ok(())
}
