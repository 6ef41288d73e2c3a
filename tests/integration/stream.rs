use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::*;

/// Issue `GET /ipvideo` and return the socket with the response head.
async fn open_ipvideo(addr: SocketAddr) -> Result<(TcpStream, String)> {
    let mut sock = TcpStream::connect(addr).await?;
    sock.write_all(b"GET /ipvideo HTTP/1.1\r\nHost: vigil\r\n\r\n")
        .await?;

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !head.ends_with(b"\r\n\r\n") {
            if sock.read(&mut byte).await? == 0 {
                anyhow::bail!("connection closed during response head");
            }
            head.push(byte[0]);
        }
        Ok(())
    })
    .await
    .context("no response head within 5s")??;

    Ok((sock, String::from_utf8_lossy(&head).into_owned()))
}

/// Read until `needle` shows up in the body, returning what was read.
async fn read_until(sock: &mut TcpStream, needle: &[u8]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !buf.windows(needle.len()).any(|w| w == needle) {
            let n = sock.read(&mut chunk).await?;
            if n == 0 {
                anyhow::bail!("stream ended");
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    })
    .await
    .context("needle not seen within 5s")??;
    Ok(buf)
}

/// Stream clients receive multipart JPEG parts.
#[tokio::test]
async fn test_stream_delivers_jpeg_parts() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();

    let (mut sock, head) = open_ipvideo(node.stream_addr).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(
        head.contains("multipart/x-mixed-replace; boundary=vigilframe"),
        "{head}"
    );

    // Part head, blank line, then the JPEG start-of-image marker.
    let body = read_until(&mut sock, b"\r\n\r\n\xFF\xD8").await.unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("--vigilframe\r\n"), "{text}");
    assert!(text.contains("Content-Type: image/jpeg\r\n"), "{text}");
    assert!(text.contains("Content-Length: "), "{text}");
}

/// Five clients are admitted, the sixth is refused, and a departure
/// frees a slot.
#[tokio::test]
async fn test_stream_admission_limit() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();

    let mut clients = Vec::new();
    for i in 0..5 {
        let (sock, head) = open_ipvideo(node.stream_addr).await.unwrap();
        assert!(head.starts_with("HTTP/1.1 200"), "client {i}: {head}");
        clients.push(sock);
    }
    assert_eq!(node.stream.active(), 5);

    let (_, head) = open_ipvideo(node.stream_addr).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 503"), "{head}");
    assert_eq!(node.stream.refused(), 1);
    assert_eq!(node.stream.active(), 5);

    drop(clients.pop());
    let stream = node.stream.clone();
    wait_for(Duration::from_secs(5), || {
        let stream = stream.clone();
        async move { (stream.active() == 4).then_some(()) }
    })
    .await
    .unwrap();

    let (_, head) = open_ipvideo(node.stream_addr).await.unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
}

/// A paced client sees frames no faster than its cap.
#[tokio::test]
async fn test_stream_framerate_cap() {
    let node = TestNode::start(NodeOptions {
        framerate: 60,
        stream: StreamConfig {
            max_framerate: 5,
            max_bitrate_kbps: 0,
            ..StreamConfig::default()
        },
        ..NodeOptions::default()
    })
    .await
    .unwrap();

    let (mut sock, _) = open_ipvideo(node.stream_addr).await.unwrap();
    // Skip the first part, then count parts over one second.
    read_until(&mut sock, b"--vigilframe").await.unwrap();

    let mut parts = 0usize;
    let mut chunk = [0u8; 8192];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    let mut carry = Vec::new();
    while let Ok(Ok(n)) = tokio::time::timeout_at(deadline, sock.read(&mut chunk)).await {
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&chunk[..n]);
        parts += carry.windows(12).filter(|w| *w == b"--vigilframe").count();
        let keep = carry.len().saturating_sub(11);
        carry.drain(..keep);
    }
    assert!(parts <= 6, "{parts} parts in one second at a 5 fps cap");
}
