//! Trigger a capture and wait for it to be published.

use std::time::Duration;

use anyhow::{Context, Result};

use super::http::{base_url, post_form};
use super::status::fetch;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub async fn cmd_photo(host: &str, port: u16, wait_secs: u64) -> Result<()> {
    let before = fetch(host, port).await?.last_photo;

    let location = post_form(&format!("{}/", base_url(host, port))).await?;
    println!("Capture triggered.");

    let published = tokio::time::timeout(Duration::from_secs(wait_secs), async {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let status = fetch(host, port).await?;
            if status.capture_state == "idle" && status.last_photo != before {
                return Ok::<_, anyhow::Error>(status.last_photo);
            }
        }
    })
    .await
    .with_context(|| format!("photo not published within {}s", wait_secs))??;

    match published {
        Some(name) => {
            println!("Photo    : {}", name);
            println!("URL      : {}/photos/{}", base_url(host, port), name);
        }
        None => println!("Capture finished without a photo."),
    }
    if let Some(location) = location {
        println!("Result   : {}{}", base_url(host, port), location);
    }

    Ok(())
}
