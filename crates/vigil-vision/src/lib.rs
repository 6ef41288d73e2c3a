//! vigil-vision — per-frame feature extraction.
//!
//! Pure functions over `Frame`s: thresholding, external contour finding,
//! blob and contour-slice extraction, and the brightness peak scan.
//! `FrameAnalyzer` runs whichever modes are enabled and returns the tick's
//! telemetry. Nothing in this crate touches the network or the clock.

pub mod analyzer;
pub mod circle;
pub mod contour;
pub mod peak;
pub mod polyline;
pub mod threshold;

pub use analyzer::FrameAnalyzer;
pub use contour::{Blob, SliceContour};
