//! Per-tick analysis: runs the enabled detection modes over one frame.

use std::sync::Arc;

use bytes::Bytes;
use vigil_core::config::{DetectionConfig, VideoConfig};
use vigil_core::telemetry::{AnchorColor, Telemetry, TelemetryBody};
use vigil_core::{Frame, NodeIdentity};

use crate::{contour, peak};

pub struct FrameAnalyzer {
    node: Arc<NodeIdentity>,
    detection: DetectionConfig,
    video: VideoConfig,
}

impl FrameAnalyzer {
    pub fn new(node: Arc<NodeIdentity>, detection: DetectionConfig, video: VideoConfig) -> Self {
        Self {
            node,
            detection,
            video,
        }
    }

    /// Telemetry for one frame, in the order video, blobs, contours, pixel.
    /// An empty frame yields nothing.
    pub fn analyze(&self, frame: &Frame) -> Vec<Telemetry> {
        let mut out = Vec::new();
        if frame.is_empty() {
            return out;
        }
        let ts = frame.timestamp_ms;
        let w = frame.width() as f32;
        let h = frame.height() as f32;

        if self.video.sync_video {
            match frame.encode_jpeg_scaled(
                self.video.thumb_width,
                self.video.thumb_height,
                self.video.quality,
            ) {
                Ok(jpeg) => out.push(self.message(
                    ts,
                    TelemetryBody::Video {
                        jpeg: Bytes::from(jpeg),
                    },
                )),
                Err(e) => tracing::warn!(error = %e, "thumbnail encode failed"),
            }
        }

        if self.detection.blobs {
            for blob in contour::find_blobs(frame, &self.detection) {
                out.push(self.message(
                    ts,
                    TelemetryBody::Blob {
                        index: blob.index,
                        x: blob.cx / w,
                        y: blob.cy / h,
                    },
                ));
            }
        }

        if self.detection.contours {
            for c in contour::find_slice_contours(frame, &self.detection) {
                out.push(self.message(
                    ts,
                    TelemetryBody::Contour {
                        index: c.index,
                        color: AnchorColor::from(c.color),
                        vertices: c.vertices,
                    },
                ));
            }
        }

        if self.detection.brightest_pixel {
            if let Some((x, y)) = peak::brightest(
                frame,
                self.detection.peak_stride,
                self.detection.peak_floor,
            ) {
                out.push(self.message(
                    ts,
                    TelemetryBody::Pixel {
                        x: x as f32 / w,
                        y: y as f32 / h,
                    },
                ));
            }
        }

        tracing::trace!(sequence = frame.sequence, messages = out.len(), "frame analyzed");
        out
    }

    fn message(&self, timestamp_ms: u64, body: TelemetryBody) -> Telemetry {
        Telemetry::new(self.node.clone(), timestamp_ms, body)
    }
}
