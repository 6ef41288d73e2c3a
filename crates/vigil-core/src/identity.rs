//! Node identity: hostname plus a random unique id.
//!
//! The unique id is generated once per device and stored in the identity
//! file. Every later start reuses it, so consumers can key telemetry on it
//! across restarts.

use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::config::IdentityConfig;

/// Raw length of the unique id before hex encoding.
pub const UNIQUE_ID_BYTES: usize = 16;

/// Wire fields carry lengths as u8.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("failed to read identity {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to write identity {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("malformed identity in {0}")]
    Malformed(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub hostname: String,
    pub unique_id: String,
}

impl NodeIdentity {
    /// Build an identity, truncating the hostname to what the wire can carry.
    pub fn new(hostname: impl Into<String>, unique_id: impl Into<String>) -> Self {
        let mut hostname = hostname.into();
        truncate_to(&mut hostname, MAX_FIELD_LEN);
        Self {
            hostname,
            unique_id: unique_id.into(),
        }
    }

    /// Load the persisted id, or create and persist a fresh one.
    pub fn load_or_create(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let unique_id = load_or_create_id(&config.id_path)?;
        let hostname = if config.hostname.is_empty() {
            system_hostname()
        } else {
            config.hostname.clone()
        };
        Ok(Self::new(hostname, unique_id))
    }
}

fn load_or_create_id(path: &Path) -> Result<String, IdentityError> {
    if path.exists() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| IdentityError::ReadFailed(path.to_path_buf(), e))?;
        let id = text.trim();
        if id.len() != UNIQUE_ID_BYTES * 2 || hex::decode(id).is_err() {
            return Err(IdentityError::Malformed(path.to_path_buf()));
        }
        return Ok(id.to_string());
    }

    let mut raw = [0u8; UNIQUE_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    let id = hex::encode(raw);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| IdentityError::WriteFailed(path.to_path_buf(), e))?;
    }
    std::fs::write(path, format!("{id}\n"))
        .map_err(|e| IdentityError::WriteFailed(path.to_path_buf(), e))?;
    tracing::info!(path = %path.display(), unique_id = %id, "created node identity");
    Ok(id)
}

/// /etc/hostname, then $HOSTNAME, else "vigil".
pub fn system_hostname() -> String {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "vigil".to_string())
}

fn truncate_to(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
