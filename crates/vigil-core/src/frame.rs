//! The frame model.
//!
//! A `Frame` is produced once per tick by the acquisition side and never
//! mutated afterwards. Consumers outside the tick hold it through
//! `Arc<Frame>` snapshots.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("jpeg encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Pixel storage. Format is fixed for the life of the process.
#[derive(Debug, Clone)]
pub enum Pixels {
    Gray(GrayImage),
    Rgb(RgbImage),
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: Pixels,
    /// Per-source acquisition counter.
    pub sequence: u64,
    /// Wall clock at acquisition. Used for telemetry and photo names.
    pub timestamp_ms: u64,
    /// Monotonic acquisition instant.
    pub acquired_at: Instant,
}

impl Frame {
    pub fn new(pixels: Pixels, sequence: u64) -> Self {
        Self {
            pixels,
            sequence,
            timestamp_ms: unix_millis(),
            acquired_at: Instant::now(),
        }
    }

    pub fn gray(image: GrayImage, sequence: u64) -> Self {
        Self::new(Pixels::Gray(image), sequence)
    }

    pub fn rgb(image: RgbImage, sequence: u64) -> Self {
        Self::new(Pixels::Rgb(image), sequence)
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.width(),
            Pixels::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.height(),
            Pixels::Rgb(img) => img.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Luma plane. Gray frames are copied, color frames converted.
    pub fn luma(&self) -> GrayImage {
        match &self.pixels {
            Pixels::Gray(img) => img.clone(),
            Pixels::Rgb(img) => imageops::grayscale(img),
        }
    }

    /// RGB triple at (x, y). Gray pixels are replicated to all channels.
    /// Caller guarantees the coordinate is in bounds.
    pub fn color_at(&self, x: u32, y: u32) -> [u8; 3] {
        match &self.pixels {
            Pixels::Gray(img) => {
                let v = img.get_pixel(x, y).0[0];
                [v, v, v]
            }
            Pixels::Rgb(img) => img.get_pixel(x, y).0,
        }
    }

    /// Brightness = max channel.
    pub fn brightness_at(&self, x: u32, y: u32) -> u8 {
        match &self.pixels {
            Pixels::Gray(img) => img.get_pixel(x, y).0[0],
            Pixels::Rgb(img) => {
                let [r, g, b] = img.get_pixel(x, y).0;
                r.max(g).max(b)
            }
        }
    }

    /// Encode at native dimensions.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let mut buf = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            match &self.pixels {
                Pixels::Gray(img) => encoder.encode_image(img)?,
                Pixels::Rgb(img) => encoder.encode_image(img)?,
            }
        }
        Ok(buf)
    }

    /// Encode scaled to `width`×`height`. Skips the resize when the
    /// dimensions already match.
    pub fn encode_jpeg_scaled(
        &self,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, FrameError> {
        if width == self.width() && height == self.height() {
            return self.encode_jpeg(quality);
        }
        let mut buf = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            match &self.pixels {
                Pixels::Gray(img) => {
                    let scaled = imageops::resize(img, width, height, FilterType::Triangle);
                    encoder.encode_image(&scaled)?;
                }
                Pixels::Rgb(img) => {
                    let scaled = imageops::resize(img, width, height, FilterType::Triangle);
                    encoder.encode_image(&scaled)?;
                }
            }
        }
        Ok(buf)
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
