use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vigil_core::Telemetry;

use crate::*;

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(node: &TestNode) -> Ws {
    let (ws, _) = connect_async(node.ws_url()).await.unwrap();
    ws
}

/// Next text message, skipping telemetry.
async fn next_text(ws: &mut Ws) -> Result<String> {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(t))) => return Ok(t.as_str().to_string()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(anyhow::Error::from(e)),
                None => anyhow::bail!("socket closed"),
            }
        }
    })
    .await
    .context("no text message within 10s")?
}

/// Telemetry is broadcast as binary messages in the datagram format.
#[tokio::test]
async fn test_ws_telemetry_broadcast() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();
    let mut ws = connect(&node).await;

    let msg = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(Ok(Message::Binary(b))) = ws.next().await {
                return b;
            }
        }
    })
    .await
    .unwrap();
    let decoded = Telemetry::decode(&msg).unwrap();
    assert_eq!(decoded.node.hostname, HOSTNAME);
}

/// `take_photo` publishes a photo and announces it to every session.
#[tokio::test]
async fn test_ws_take_photo() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();
    let mut trigger = connect(&node).await;
    let mut watcher = connect(&node).await;

    let hub = node.hub.clone();
    wait_for(Duration::from_secs(5), || {
        let hub = hub.clone();
        async move { (hub.sessions() == 2).then_some(()) }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    trigger
        .send(Message::Text("take_photo".into()))
        .await
        .unwrap();

    let note = next_text(&mut watcher).await.unwrap();
    let (host, file) = note.split_once(',').unwrap();
    assert_eq!(host, HOSTNAME);
    assert!(file.starts_with(&format!("{HOSTNAME}_photo_")), "{file}");
    assert!(file.ends_with(".jpg"), "{file}");
    assert_eq!(next_text(&mut trigger).await.unwrap(), note);

    let photo = node.document_root.join("photos").join(file);
    let jpeg = std::fs::read(&photo).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let index = std::fs::read_to_string(node.document_root.join("result.html")).unwrap();
    assert!(index.contains(file), "{index}");
}

/// `stream_photo` answers with the frame inline and writes nothing.
#[tokio::test]
async fn test_ws_stream_photo() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();
    let mut ws = connect(&node).await;

    // Give the tick a moment to publish a first snapshot.
    tokio::time::sleep(Duration::from_millis(200)).await;
    ws.send(Message::Text(" stream_photo\n".into())).await.unwrap();

    let text = next_text(&mut ws).await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["hostname"], HOSTNAME);
    assert_eq!(json["unique_id"], UNIQUE_ID);
    let ts: u64 = json["timestamp"].as_str().unwrap().parse().unwrap();
    assert!(ts > 0);
    assert!(json["photo"].as_str().unwrap().starts_with("/9j/"));

    let photos = std::fs::read_dir(node.document_root.join("photos")).unwrap();
    assert_eq!(photos.count(), 0);
}

/// A session that never reads does not hold up the others.
#[tokio::test]
async fn test_ws_stalled_session() {
    let node = TestNode::start(NodeOptions {
        ws_queue: 4,
        video: VideoConfig {
            sync_video: true,
            ..VideoConfig::default()
        },
        ..NodeOptions::default()
    })
    .await
    .unwrap();

    let _stalled = connect(&node).await;
    let mut live = connect(&node).await;

    let mut received = 0usize;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while let Ok(Some(Ok(msg))) = tokio::time::timeout_at(deadline, live.next()).await {
        if matches!(msg, Message::Binary(_)) {
            received += 1;
        }
    }
    assert!(received > 10, "live session received only {received}");
    assert_eq!(node.hub.sessions(), 2);
}
