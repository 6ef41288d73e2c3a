//! Frame acquisition.
//!
//! `FrameSource` is the seam to the camera. Two sources ship with the
//! daemon: a synthetic test pattern and a folder of still images, so a
//! node runs end to end without camera hardware.

use std::path::PathBuf;

use image::imageops::FilterType;
use image::{GrayImage, Luma, Rgb, RgbImage};

use vigil_core::config::{CameraConfig, SourceKind};
use vigil_core::Frame;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to list {0}: {1}")]
    List(PathBuf, std::io::Error),
    #[error("failed to decode {0}: {1}")]
    Decode(PathBuf, image::ImageError),
    #[error("no images in {0}")]
    Empty(PathBuf),
}

pub trait FrameSource: Send {
    /// Acquire the next frame. `Ok(None)` means nothing new this tick.
    fn grab(&mut self) -> Result<Option<Frame>, SourceError>;

    fn describe(&self) -> String;
}

pub fn from_config(config: &CameraConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    Ok(match config.source {
        SourceKind::TestPattern => Box::new(TestPattern::new(
            config.width,
            config.height,
            config.color,
        )),
        SourceKind::ImageFolder => Box::new(ImageFolder::open(
            config.folder.clone(),
            config.width,
            config.height,
            config.color,
        )?),
    })
}

// ── Test pattern ──────────────────────────────────────────────────────────────

/// Dark frame with three bright discs orbiting the center.
pub struct TestPattern {
    width: u32,
    height: u32,
    color: bool,
    sequence: u64,
}

const SPOTS: [(f32, f32, [u8; 3]); 3] = [
    (0.011, 0.0, [255, 240, 220]),
    (0.017, 2.1, [90, 255, 120]),
    (0.023, 4.2, [200, 120, 255]),
];

impl TestPattern {
    pub fn new(width: u32, height: u32, color: bool) -> Self {
        Self {
            width,
            height,
            color,
            sequence: 0,
        }
    }

    fn spot_centers(&self) -> Vec<(f32, f32, f32, [u8; 3])> {
        let w = self.width as f32;
        let h = self.height as f32;
        let orbit = w.min(h) * 0.3;
        let radius = (w.min(h) * 0.06).max(2.0);
        let t = self.sequence as f32;
        SPOTS
            .iter()
            .map(|&(speed, phase, rgb)| {
                let a = t * speed * std::f32::consts::TAU + phase;
                (w / 2.0 + orbit * a.cos(), h / 2.0 + orbit * a.sin(), radius, rgb)
            })
            .collect()
    }

    fn sample(&self, spots: &[(f32, f32, f32, [u8; 3])], x: u32, y: u32) -> [u8; 3] {
        for &(cx, cy, r, rgb) in spots {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r * r {
                return rgb;
            }
        }
        // Faint vertical gradient so thresholds have something to cut.
        let v = (y * 40 / self.height.max(1)) as u8;
        [v, v, v]
    }
}

impl FrameSource for TestPattern {
    fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
        let spots = self.spot_centers();
        let frame = if self.color {
            let img = RgbImage::from_fn(self.width, self.height, |x, y| {
                Rgb(self.sample(&spots, x, y))
            });
            Frame::rgb(img, self.sequence)
        } else {
            let img = GrayImage::from_fn(self.width, self.height, |x, y| {
                let [r, g, b] = self.sample(&spots, x, y);
                Luma([r.max(g).max(b)])
            });
            Frame::gray(img, self.sequence)
        };
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("test pattern {}x{}", self.width, self.height)
    }
}

// ── Image folder ──────────────────────────────────────────────────────────────

/// Cycles through the images of a directory in name order.
pub struct ImageFolder {
    dir: PathBuf,
    paths: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    color: bool,
    sequence: u64,
}

impl ImageFolder {
    pub fn open(dir: PathBuf, width: u32, height: u32, color: bool) -> Result<Self, SourceError> {
        let entries = std::fs::read_dir(&dir).map_err(|e| SourceError::List(dir.clone(), e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                    .unwrap_or(false)
            })
            .collect();
        if paths.is_empty() {
            return Err(SourceError::Empty(dir));
        }
        paths.sort();
        Ok(Self {
            dir,
            paths,
            next: 0,
            width,
            height,
            color,
            sequence: 0,
        })
    }
}

impl FrameSource for ImageFolder {
    fn grab(&mut self) -> Result<Option<Frame>, SourceError> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();

        let img = image::open(path).map_err(|e| SourceError::Decode(path.clone(), e))?;
        let img = if img.width() != self.width || img.height() != self.height {
            img.resize_exact(self.width, self.height, FilterType::Triangle)
        } else {
            img
        };
        let frame = if self.color {
            Frame::rgb(img.to_rgb8(), self.sequence)
        } else {
            Frame::gray(img.to_luma8(), self.sequence)
        };
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn describe(&self) -> String {
        format!("{} images in {}", self.paths.len(), self.dir.display())
    }
}
