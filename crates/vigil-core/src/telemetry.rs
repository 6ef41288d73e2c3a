//! Telemetry wire format.
//!
//! One datagram per message:
//!
//! ```text
//! TelemetryHeader (20 bytes) | hostname | unique_id | payload
//! ```
//!
//! Payloads by kind:
//!   video   — JPEG bytes
//!   blob    — x, y (f32, normalized)
//!   contour — anchor color (3×f32) then N vertices (3×f32 each)
//!   pixel   — x, y (f32, normalized)
//!
//! Integers and floats are native-endian. Consumers run on the same
//! hardware family as the node.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::identity::{NodeIdentity, MAX_FIELD_LEN};

pub const WIRE_VERSION: u8 = 1;

// ── Header ────────────────────────────────────────────────────────────────────

/// Precedes every telemetry datagram.
///
/// Wire size: 20 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct TelemetryHeader {
    /// See `TelemetryKind`.
    pub kind: u8,
    /// Currently 0x01. Unknown versions are rejected.
    pub version: u8,
    pub host_len: u8,
    pub uid_len: u8,
    /// Blob or contour index. Zero for other kinds.
    pub index: u32,
    pub timestamp_ms: u64,
    pub payload_len: u32,
}

assert_eq_size!(TelemetryHeader, [u8; 20]);

pub const HEADER_LEN: usize = std::mem::size_of::<TelemetryHeader>();

/// One contour vertex: position in pixels and brightness at the anchor.
#[derive(Debug, Clone, Copy, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

assert_eq_size!(Vertex, [u8; 12]);

/// Anchor color as floats in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct AnchorColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

assert_eq_size!(AnchorColor, [u8; 12]);

impl From<[u8; 3]> for AnchorColor {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self {
            r: r as f32,
            g: g as f32,
            b: b as f32,
        }
    }
}

/// Normalized position used by blob and pixel payloads.
#[derive(Debug, Clone, Copy, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
struct NormPoint {
    x: f32,
    y: f32,
}

assert_eq_size!(NormPoint, [u8; 8]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TelemetryKind {
    Video = 0x01,
    Blob = 0x02,
    Contour = 0x03,
    Pixel = 0x04,
}

impl TryFrom<u8> for TelemetryKind {
    type Error = WireError;

    fn try_from(v: u8) -> Result<Self, WireError> {
        match v {
            0x01 => Ok(Self::Video),
            0x02 => Ok(Self::Blob),
            0x03 => Ok(Self::Contour),
            0x04 => Ok(Self::Pixel),
            other => Err(WireError::UnknownKind(other)),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("datagram shorter than header ({0} bytes)")]
    Truncated(usize),
    #[error("unknown telemetry kind {0:#04x}")]
    UnknownKind(u8),
    #[error("unsupported wire version {0}")]
    UnknownVersion(u8),
    #[error("length mismatch: header declares {declared} bytes, datagram carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("{kind:?} payload of {len} bytes is malformed")]
    BadPayload { kind: TelemetryKind, len: usize },
    #[error("identity field is not valid utf-8")]
    BadIdentity,
    #[error("{0} exceeds the wire limit")]
    TooLong(&'static str),
}

// ── Messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryBody {
    /// JPEG thumbnail of the tick's frame.
    Video { jpeg: Bytes },
    Blob { index: u32, x: f32, y: f32 },
    Contour {
        /// Monotonic within one frame across all threshold levels.
        index: u32,
        color: AnchorColor,
        vertices: Vec<Vertex>,
    },
    Pixel { x: f32, y: f32 },
}

impl TelemetryBody {
    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryBody::Video { .. } => TelemetryKind::Video,
            TelemetryBody::Blob { .. } => TelemetryKind::Blob,
            TelemetryBody::Contour { .. } => TelemetryKind::Contour,
            TelemetryBody::Pixel { .. } => TelemetryKind::Pixel,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub node: Arc<NodeIdentity>,
    pub timestamp_ms: u64,
    pub body: TelemetryBody,
}

impl Telemetry {
    pub fn new(node: Arc<NodeIdentity>, timestamp_ms: u64, body: TelemetryBody) -> Self {
        Self {
            node,
            timestamp_ms,
            body,
        }
    }

    pub fn kind(&self) -> TelemetryKind {
        self.body.kind()
    }

    /// Serialize into one datagram.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let host = self.node.hostname.as_bytes();
        let uid = self.node.unique_id.as_bytes();
        if host.len() > MAX_FIELD_LEN {
            return Err(WireError::TooLong("hostname"));
        }
        if uid.len() > MAX_FIELD_LEN {
            return Err(WireError::TooLong("unique_id"));
        }

        let mut payload = BytesMut::new();
        let index = match &self.body {
            TelemetryBody::Video { jpeg } => {
                payload.extend_from_slice(jpeg);
                0
            }
            TelemetryBody::Blob { index, x, y } => {
                payload.extend_from_slice(NormPoint { x: *x, y: *y }.as_bytes());
                *index
            }
            TelemetryBody::Contour {
                index,
                color,
                vertices,
            } => {
                payload.reserve(12 + vertices.len() * 12);
                payload.extend_from_slice(color.as_bytes());
                payload.extend_from_slice(vertices.as_slice().as_bytes());
                *index
            }
            TelemetryBody::Pixel { x, y } => {
                payload.extend_from_slice(NormPoint { x: *x, y: *y }.as_bytes());
                0
            }
        };
        let payload_len =
            u32::try_from(payload.len()).map_err(|_| WireError::TooLong("payload"))?;

        let header = TelemetryHeader {
            kind: self.kind() as u8,
            version: WIRE_VERSION,
            host_len: host.len() as u8,
            uid_len: uid.len() as u8,
            index,
            timestamp_ms: self.timestamp_ms,
            payload_len,
        };

        let mut out = BytesMut::with_capacity(HEADER_LEN + host.len() + uid.len() + payload.len());
        out.put_slice(header.as_bytes());
        out.put_slice(host);
        out.put_slice(uid);
        out.put_slice(&payload);
        Ok(out.freeze())
    }

    /// Parse one datagram.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let header =
            TelemetryHeader::read_from_prefix(buf).ok_or(WireError::Truncated(buf.len()))?;
        if header.version != WIRE_VERSION {
            return Err(WireError::UnknownVersion(header.version));
        }
        let kind = TelemetryKind::try_from(header.kind)?;

        let host_len = header.host_len as usize;
        let uid_len = header.uid_len as usize;
        let payload_len = header.payload_len as usize;
        let rest = &buf[HEADER_LEN..];
        let declared = host_len + uid_len + payload_len;
        if rest.len() != declared {
            return Err(WireError::LengthMismatch {
                declared,
                actual: rest.len(),
            });
        }

        let (host, rest) = rest.split_at(host_len);
        let (uid, payload) = rest.split_at(uid_len);
        let hostname = std::str::from_utf8(host).map_err(|_| WireError::BadIdentity)?;
        let unique_id = std::str::from_utf8(uid).map_err(|_| WireError::BadIdentity)?;

        let bad = || WireError::BadPayload {
            kind,
            len: payload.len(),
        };
        let index = header.index;
        let body = match kind {
            TelemetryKind::Video => TelemetryBody::Video {
                jpeg: Bytes::copy_from_slice(payload),
            },
            TelemetryKind::Blob => {
                let p = NormPoint::read_from(payload).ok_or_else(bad)?;
                TelemetryBody::Blob {
                    index,
                    x: p.x,
                    y: p.y,
                }
            }
            TelemetryKind::Pixel => {
                let p = NormPoint::read_from(payload).ok_or_else(bad)?;
                TelemetryBody::Pixel { x: p.x, y: p.y }
            }
            TelemetryKind::Contour => {
                if payload.len() < 12 || payload.len() % 12 != 0 {
                    return Err(bad());
                }
                let (color, verts) = payload.split_at(12);
                let color = AnchorColor::read_from(color).ok_or_else(bad)?;
                let vertices = verts
                    .chunks_exact(12)
                    .map(|c| Vertex::read_from(c).ok_or_else(bad))
                    .collect::<Result<Vec<_>, _>>()?;
                TelemetryBody::Contour {
                    index,
                    color,
                    vertices,
                }
            }
        };

        Ok(Self {
            node: Arc::new(NodeIdentity {
                hostname: hostname.to_string(),
                unique_id: unique_id.to_string(),
            }),
            timestamp_ms: header.timestamp_ms,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Arc<NodeIdentity> {
        Arc::new(NodeIdentity::new("cam-1", "00112233445566778899aabbccddeeff"))
    }

    #[test]
    fn contour_round_trip_preserves_floats() {
        let msg = Telemetry::new(
            node(),
            1_700_000_000_123,
            TelemetryBody::Contour {
                index: 7,
                color: AnchorColor::from([10, 20, 30]),
                vertices: vec![
                    Vertex {
                        x: 1.0,
                        y: 2.0,
                        z: 0.5,
                    },
                    Vertex {
                        x: 3.0,
                        y: 4.0,
                        z: 0.5,
                    },
                ],
            },
        );
        let wire = msg.encode().unwrap();
        assert_eq!(wire.len(), HEADER_LEN + 5 + 32 + 12 + 24);

        let decoded = Telemetry::decode(&wire).unwrap();
        assert_eq!(decoded, msg);
        match decoded.body {
            TelemetryBody::Contour {
                color, vertices, ..
            } => {
                assert_eq!((color.r, color.g, color.b), (10.0, 20.0, 30.0));
                assert_eq!(vertices[1].x, 3.0);
                assert_eq!(vertices[1].z, 0.5);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn blob_header_carries_index_and_timestamp() {
        let msg = Telemetry::new(
            node(),
            42,
            TelemetryBody::Blob {
                index: 3,
                x: 0.25,
                y: 0.75,
            },
        );
        let wire = msg.encode().unwrap();
        let header = TelemetryHeader::read_from_prefix(&wire[..]).unwrap();
        assert_eq!(header.kind, TelemetryKind::Blob as u8);
        assert_eq!({ header.index }, 3);
        assert_eq!({ header.timestamp_ms }, 42);
        assert_eq!({ header.payload_len }, 8);
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let msg = Telemetry::new(node(), 0, TelemetryBody::Pixel { x: 0.1, y: 0.2 });
        let mut wire = msg.encode().unwrap().to_vec();
        wire[0] = 0x09;
        assert_eq!(Telemetry::decode(&wire), Err(WireError::UnknownKind(0x09)));
    }

    #[test]
    fn decode_rejects_truncated_datagram() {
        let msg = Telemetry::new(node(), 0, TelemetryBody::Pixel { x: 0.1, y: 0.2 });
        let wire = msg.encode().unwrap();
        assert!(matches!(
            Telemetry::decode(&wire[..wire.len() - 1]),
            Err(WireError::LengthMismatch { .. })
        ));
        assert_eq!(
            Telemetry::decode(&wire[..10]),
            Err(WireError::Truncated(10))
        );
    }

    #[test]
    fn decode_rejects_misaligned_contour_payload() {
        let msg = Telemetry::new(
            node(),
            0,
            TelemetryBody::Contour {
                index: 0,
                color: AnchorColor::from([1, 2, 3]),
                vertices: vec![],
            },
        );
        let mut wire = msg.encode().unwrap().to_vec();
        wire.push(0);
        // payload_len sits at bytes 16..20.
        let len = u32::from_ne_bytes(wire[16..20].try_into().unwrap()) + 1;
        wire[16..20].copy_from_slice(&len.to_ne_bytes());
        assert!(matches!(
            Telemetry::decode(&wire),
            Err(WireError::BadPayload { .. })
        ));
    }

    #[test]
    fn video_payload_is_opaque() {
        let jpeg = Bytes::from_static(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]);
        let msg = Telemetry::new(node(), 9, TelemetryBody::Video { jpeg: jpeg.clone() });
        let decoded = Telemetry::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.body, TelemetryBody::Video { jpeg });
    }
}
