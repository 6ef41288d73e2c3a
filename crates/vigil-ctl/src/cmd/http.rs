//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn base_url(host: &str, port: u16) -> String {
    format!("http://{}:{}", host, port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to vigild at {}, is it running?", url))?
        .error_for_status()
        .context("request rejected")?
        .json::<T>()
        .await
        .context("failed to parse response")
}

/// Submit an empty form and return the redirect target, if any.
pub async fn post_form(url: &str) -> Result<Option<String>> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to build http client")?;
    let resp = client
        .post(url)
        .header("content-type", "application/x-www-form-urlencoded")
        .body("")
        .send()
        .await
        .with_context(|| format!("failed to connect to vigild at {}, is it running?", url))?;

    let status = resp.status();
    if !(status.is_success() || status.is_redirection()) {
        anyhow::bail!("trigger rejected: {}", status);
    }
    Ok(resp
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string))
}
