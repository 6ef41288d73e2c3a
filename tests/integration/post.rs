use std::time::Duration;

use serde_json::Value;

use crate::*;

fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn status(node: &TestNode) -> Result<Value> {
    Ok(reqwest::get(node.post_url("/api/status"))
        .await?
        .error_for_status()?
        .json::<Value>()
        .await?)
}

async fn wait_for_photo(node: &TestNode) -> Result<String> {
    let url = node.post_url("/api/status");
    wait_for(Duration::from_secs(10), || {
        let url = url.clone();
        async move {
            let v: Value = reqwest::get(url).await.ok()?.json().await.ok()?;
            if v["capture_state"] != "idle" {
                return None;
            }
            v["last_photo"].as_str().map(str::to_string)
        }
    })
    .await
}

/// Status reports identity, session counts and capture state.
#[tokio::test]
async fn test_post_status() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();

    let v = status(&node).await.unwrap();
    assert_eq!(v["hostname"], HOSTNAME);
    assert_eq!(v["unique_id"], UNIQUE_ID);
    assert_eq!(v["stream_clients"], 0);
    assert_eq!(v["broadcast_sessions"], 0);
    assert_eq!(v["capture_state"], "idle");
    assert!(v["last_photo"].is_null());
}

/// The document root is served as-is, starting with the landing page.
#[tokio::test]
async fn test_post_serves_document_root() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();

    let landing = reqwest::get(node.post_url("/")).await.unwrap();
    assert!(landing.status().is_success());
    let html = landing.text().await.unwrap();
    assert!(html.contains("<form"), "{html}");

    let index = reqwest::get(node.post_url("/result.html")).await.unwrap();
    assert!(index.status().is_success());

    let missing = reqwest::get(node.post_url("/nope.html")).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

/// A form POST triggers a capture and redirects to the result page,
/// which links the published photo once it is written.
#[tokio::test]
async fn test_post_trigger_publishes_photo() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let resp = no_redirect_client()
        .post(node.post_url("/"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 303);
    assert_eq!(resp.headers()["location"], "/result.html");

    let file = wait_for_photo(&node).await.unwrap();
    assert!(file.starts_with(&format!("{HOSTNAME}_photo_")), "{file}");

    let page = reqwest::get(node.post_url("/result.html"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains(&format!("photos/{file}")), "{page}");

    let jpeg = reqwest::get(node.post_url(&format!("/photos/{file}")))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

/// Any path accepts the trigger.
#[tokio::test]
async fn test_post_trigger_any_path() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let resp = no_redirect_client()
        .post(node.post_url("/cgi-bin/capture"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 303);
    wait_for_photo(&node).await.unwrap();
}
