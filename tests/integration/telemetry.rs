use std::time::Duration;

use vigil_core::config::{DetectionConfig, VideoConfig};
use vigil_core::{Telemetry, TelemetryBody};

use crate::*;

async fn recv_telemetry(node: &TestNode) -> Result<Telemetry> {
    let mut buf = vec![0u8; 65_535];
    let n = tokio::time::timeout(Duration::from_secs(5), node.udp.recv(&mut buf))
        .await
        .context("no datagram within 5s")??;
    Ok(Telemetry::decode(&buf[..n])?)
}

/// Collect decoded telemetry until `want` matches or 200 datagrams pass.
async fn collect_until(
    node: &TestNode,
    mut want: impl FnMut(&TelemetryBody) -> bool,
) -> Result<Vec<Telemetry>> {
    let mut seen = Vec::new();
    for _ in 0..200 {
        let msg = recv_telemetry(node).await?;
        let hit = want(&msg.body);
        seen.push(msg);
        if hit {
            return Ok(seen);
        }
    }
    anyhow::bail!("wanted message never arrived ({} seen)", seen.len())
}

/// Blob datagrams carry the node identity and normalized centers.
#[tokio::test]
async fn test_udp_blob_telemetry() {
    let node = TestNode::start(NodeOptions::default()).await.unwrap();

    let seen = collect_until(&node, |b| matches!(b, TelemetryBody::Blob { .. }))
        .await
        .unwrap();
    let msg = seen.last().unwrap();
    assert_eq!(msg.node.hostname, HOSTNAME);
    assert_eq!(msg.node.unique_id, UNIQUE_ID);
    assert!(msg.timestamp_ms > 0);
    match msg.body {
        TelemetryBody::Blob { x, y, .. } => {
            assert!((0.0..=1.0).contains(&x), "x out of range: {x}");
            assert!((0.0..=1.0).contains(&y), "y out of range: {y}");
        }
        _ => unreachable!(),
    }
}

/// Every enabled mode shows up on the wire, video first within a tick.
#[tokio::test]
async fn test_udp_all_modes() {
    let node = TestNode::start(NodeOptions {
        detection: DetectionConfig {
            blobs: true,
            contours: true,
            brightest_pixel: true,
            ..DetectionConfig::default()
        },
        video: VideoConfig {
            sync_video: true,
            thumb_width: 32,
            thumb_height: 24,
            ..VideoConfig::default()
        },
        ..NodeOptions::default()
    })
    .await
    .unwrap();

    let mut saw_video = false;
    let seen = collect_until(&node, |b| {
        saw_video |= matches!(b, TelemetryBody::Video { .. });
        saw_video && matches!(b, TelemetryBody::Pixel { .. })
    })
    .await
    .unwrap();
    // The first complete tick starts at the first video message.
    let start = seen
        .iter()
        .position(|m| matches!(m.body, TelemetryBody::Video { .. }))
        .expect("no video message in the capture window");
    let tick = &seen[start..];

    match &tick[0].body {
        TelemetryBody::Video { jpeg } => assert_eq!(&jpeg[..2], &[0xFF, 0xD8]),
        _ => unreachable!(),
    }
    assert!(tick.iter().any(|m| matches!(m.body, TelemetryBody::Blob { .. })));
    assert!(tick.iter().any(|m| matches!(m.body, TelemetryBody::Contour { .. })));
    assert!(matches!(
        tick.last().unwrap().body,
        TelemetryBody::Pixel { .. }
    ));

    // Contour indices rise monotonically within the tick.
    let indices: Vec<u32> = tick
        .iter()
        .filter_map(|m| match &m.body {
            TelemetryBody::Contour { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert!(indices.windows(2).all(|w| w[0] < w[1]), "{indices:?}");
}
