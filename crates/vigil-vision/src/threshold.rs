//! Binary thresholding.

use image::GrayImage;
use imageproc::contrast::{threshold, ThresholdType};

use vigil_core::Frame;

pub const MASK_ON: u8 = 255;

/// `255` where luma > `level`, else `0`. Color frames are converted to luma.
pub fn mask(frame: &Frame, level: u8) -> GrayImage {
    mask_luma(&frame.luma(), level)
}

/// Same as `mask` for an already-converted luma plane. The slice sweep
/// converts once and cuts many times.
pub fn mask_luma(luma: &GrayImage, level: u8) -> GrayImage {
    threshold(luma, level, ThresholdType::Binary)
}
