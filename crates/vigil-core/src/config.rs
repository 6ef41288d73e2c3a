//! Configuration system for Vigil.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VIGIL_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vigil/config.toml
//!   3. ~/.config/vigil/config.toml
//!
//! The loaded value is immutable for the life of the process. Every
//! component receives the section it needs at construction time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    pub camera: CameraConfig,
    pub tick: TickConfig,
    pub detection: DetectionConfig,
    pub video: VideoConfig,
    pub sinks: SinksConfig,
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// File holding the persisted unique id. Created on first run.
    pub id_path: PathBuf,
    /// Hostname override. Empty = read from the system.
    pub hostname: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Synthetic moving light spots. Runs without camera hardware.
    TestPattern,
    /// Cycles through the images of `camera.folder`.
    ImageFolder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: SourceKind,
    pub folder: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Acquire RGB instead of grayscale.
    pub color: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target processing ticks per second.
    pub framerate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub blobs: bool,
    pub contours: bool,
    pub brightest_pixel: bool,
    /// Cut level for blob mode.
    pub threshold: u8,
    /// Number of threshold levels swept in contour-slice mode.
    pub contour_slices: u32,
    /// Douglas-Peucker tolerance in pixels.
    pub simplify: f32,
    /// Smoothing window size in vertices.
    pub smooth: u32,
    pub min_area_radius: f32,
    pub max_area_radius: f32,
    /// Grid stride of the brightness peak scan.
    pub peak_stride: u32,
    /// Brightness a peak must exceed.
    pub peak_floor: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Emit a JPEG thumbnail as video telemetry every tick.
    pub sync_video: bool,
    pub thumb_width: u32,
    pub thumb_height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Enable/disable per sink. Disabled sinks are never constructed.
    pub udp: bool,
    pub ws: bool,
    pub mjpeg: bool,
    pub post: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP/WebSocket listeners bind to.
    pub bind: String,
    /// Destination of UDP telemetry datagrams.
    pub udp_host: String,
    pub udp_port: u16,
    pub stream_port: u16,
    pub ws_port: u16,
    pub post_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub max_clients: usize,
    /// Per-client bitrate ceiling in kbit/s. 0 = unlimited.
    pub max_bitrate_kbps: u32,
    pub max_framerate: u32,
    /// Per-client queue depth in frames.
    pub max_queue: usize,
    /// Output frame dimensions. 0 = camera dimensions.
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    /// Per-session outbound queue depth of the WebSocket hub.
    pub ws_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Served by the post server. Photos land in `<document_root>/photos`.
    pub document_root: PathBuf,
    pub index_name: String,
    pub still_quality: u8,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            camera: CameraConfig::default(),
            tick: TickConfig::default(),
            detection: DetectionConfig::default(),
            video: VideoConfig::default(),
            sinks: SinksConfig::default(),
            network: NetworkConfig::default(),
            stream: StreamConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id_path: data_dir().join("node_id"),
            hostname: String::new(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::TestPattern,
            folder: data_dir().join("frames"),
            width: 640,
            height: 480,
            color: false,
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { framerate: 60 }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blobs: true,
            contours: false,
            brightest_pixel: false,
            threshold: 127,
            contour_slices: 10,
            simplify: 0.5,
            smooth: 2,
            min_area_radius: 1.0,
            max_area_radius: 250.0,
            peak_stride: 2,
            peak_floor: 127,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            sync_video: false,
            thumb_width: 120,
            thumb_height: 90,
            quality: 50,
        }
    }
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            udp: true,
            ws: true,
            mjpeg: true,
            post: true,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            udp_host: "127.0.0.1".to_string(),
            udp_port: 7110,
            stream_port: 7111,
            ws_port: 7112,
            post_port: 7113,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_clients: 5,
            max_bitrate_kbps: 512,
            max_framerate: 30,
            max_queue: 10,
            width: 0,
            height: 0,
            quality: 80,
            ws_queue: 64,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            document_root: data_dir().join("DocumentRoot"),
            index_name: "result.html".to_string(),
            still_quality: 100,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vigil")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("vigil")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load config: env vars → file → defaults, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            NodeConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VIGIL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&NodeConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(invalid("camera.width/height", "must be non-zero"));
        }
        if self.tick.framerate == 0 {
            return Err(invalid("tick.framerate", "must be non-zero"));
        }
        if self.detection.contour_slices == 0 {
            return Err(invalid("detection.contour_slices", "must be non-zero"));
        }
        if self.detection.peak_stride == 0 {
            return Err(invalid("detection.peak_stride", "must be non-zero"));
        }
        if self.detection.min_area_radius < 0.0
            || self.detection.max_area_radius < self.detection.min_area_radius
        {
            return Err(invalid(
                "detection.min_area_radius/max_area_radius",
                "need 0 <= min <= max",
            ));
        }
        if self.stream.max_queue == 0 || self.stream.ws_queue == 0 {
            return Err(invalid("stream.max_queue/ws_queue", "must be non-zero"));
        }
        if self.stream.max_framerate == 0 {
            return Err(invalid("stream.max_framerate", "must be non-zero"));
        }
        for (field, q) in [
            ("video.quality", self.video.quality),
            ("stream.quality", self.stream.quality),
            ("capture.still_quality", self.capture.still_quality),
        ] {
            if !(1..=100).contains(&q) {
                return Err(invalid(field, "must be within 1..=100"));
            }
        }
        Ok(())
    }

    /// Output dimensions of the live stream, falling back to the camera's.
    pub fn stream_dimensions(&self) -> (u32, u32) {
        let w = if self.stream.width == 0 {
            self.camera.width
        } else {
            self.stream.width
        };
        let h = if self.stream.height == 0 {
            self.camera.height
        } else {
            self.stream.height
        };
        (w, h)
    }

    /// Apply VIGIL_* env var overrides.
    fn apply_env_overrides(&mut self) {
        fn flag(v: &str) -> bool {
            v == "true" || v == "1"
        }

        if let Ok(v) = std::env::var("VIGIL_IDENTITY__HOSTNAME") {
            self.identity.hostname = v;
        }
        if let Ok(v) = std::env::var("VIGIL_NETWORK__UDP_HOST") {
            self.network.udp_host = v;
        }
        if let Ok(v) = std::env::var("VIGIL_NETWORK__UDP_PORT") {
            if let Ok(p) = v.parse() {
                self.network.udp_port = p;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_DETECTION__BLOBS") {
            self.detection.blobs = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_DETECTION__CONTOURS") {
            self.detection.contours = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_DETECTION__BRIGHTEST_PIXEL") {
            self.detection.brightest_pixel = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_VIDEO__SYNC_VIDEO") {
            self.video.sync_video = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_SINKS__UDP") {
            self.sinks.udp = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_SINKS__WS") {
            self.sinks.ws = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_SINKS__MJPEG") {
            self.sinks.mjpeg = flag(&v);
        }
        if let Ok(v) = std::env::var("VIGIL_CAPTURE__DOCUMENT_ROOT") {
            self.capture.document_root = PathBuf::from(v);
        }
    }
}
