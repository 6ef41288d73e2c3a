//! Node status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub hostname: String,
    pub unique_id: String,
    pub stream_clients: usize,
    pub broadcast_sessions: usize,
    pub capture_state: String,
    pub last_photo: Option<String>,
}

pub async fn fetch(host: &str, port: u16) -> Result<StatusResponse> {
    get_json(&format!("{}/api/status", base_url(host, port))).await
}

pub async fn cmd_status(host: &str, port: u16) -> Result<()> {
    let resp = fetch(host, port).await?;

    println!("═══════════════════════════════════════");
    println!("  Vigil Node Status");
    println!("═══════════════════════════════════════");
    println!("  Hostname           : {}", resp.hostname);
    println!("  Unique id          : {}", resp.unique_id);
    println!("  Stream clients     : {}", resp.stream_clients);
    println!("  Broadcast sessions : {}", resp.broadcast_sessions);
    println!("  Capture            : {}", resp.capture_state);
    match &resp.last_photo {
        Some(name) => println!("  Last photo         : {}", name),
        None => println!("  Last photo         : (none)"),
    }

    Ok(())
}
