//! External contour extraction in blob and contour-slice modes.

use std::f64::consts::PI;

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use vigil_core::config::DetectionConfig;
use vigil_core::telemetry::Vertex;
use vigil_core::Frame;

use crate::circle::min_enclosing_circle;
use crate::polyline::{self, SMOOTHING_SHAPE};
use crate::threshold;

/// A thresholded region reduced to its enclosing circle, in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Position in the frame's contour order, from 0.
    pub index: u32,
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
}

/// One simplified, smoothed contour from the slice sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceContour {
    /// Runs across all levels of the frame.
    pub index: u32,
    pub level: u8,
    pub color: [u8; 3],
    pub vertices: Vec<Vertex>,
}

/// Accepted area band, `π·min² ..= π·max²`.
#[derive(Debug, Clone, Copy)]
pub struct AreaFilter {
    min: f64,
    max: f64,
}

impl AreaFilter {
    pub fn from_radii(min_radius: f32, max_radius: f32) -> Self {
        let min = min_radius as f64;
        let max = max_radius as f64;
        Self {
            min: PI * min * min,
            max: PI * max * max,
        }
    }

    pub fn accepts(&self, points: &[Point<i32>]) -> bool {
        let a = polyline::area(points);
        a >= self.min && a <= self.max
    }
}

/// Outermost borders of the mask's foreground, in discovery order.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Threshold levels of the slice sweep: `0, step, 2·step, … < 255`.
pub fn slice_levels(slices: u32) -> impl Iterator<Item = u8> {
    let step = (255 / slices.max(1)).max(1) as usize;
    (0u32..255).step_by(step).map(|h| h as u8)
}

/// Blob mode: one cut at `detection.threshold`, one circle per contour.
pub fn find_blobs(frame: &Frame, detection: &DetectionConfig) -> Vec<Blob> {
    let mask = threshold::mask(frame, detection.threshold);
    let filter = AreaFilter::from_radii(detection.min_area_radius, detection.max_area_radius);

    let mut blobs = Vec::new();
    for points in external_contours(&mask) {
        if !filter.accepts(&points) {
            continue;
        }
        let pts: Vec<(f32, f32)> = points.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        let Some(circle) = min_enclosing_circle(&pts) else {
            continue;
        };
        blobs.push(Blob {
            index: blobs.len() as u32,
            cx: circle.cx,
            cy: circle.cy,
            radius: circle.radius,
        });
    }
    blobs
}

/// Contour-slice mode: sweep every level over the whole frame.
///
/// Each contour is simplified, then smoothed, and sampled for its anchor
/// color at the first resulting vertex. Every vertex carries the anchor's
/// brightness as z. The index restarts at 0 on every call.
pub fn find_slice_contours(frame: &Frame, detection: &DetectionConfig) -> Vec<SliceContour> {
    let luma = frame.luma();
    let filter = AreaFilter::from_radii(detection.min_area_radius, detection.max_area_radius);
    let max_x = frame.width().saturating_sub(1) as f32;
    let max_y = frame.height().saturating_sub(1) as f32;

    let mut out = Vec::new();
    let mut counter = 0u32;
    for level in slice_levels(detection.contour_slices) {
        let mask = threshold::mask_luma(&luma, level);
        for points in external_contours(&mask) {
            if !filter.accepts(&points) {
                continue;
            }
            let simplified = polyline::simplify(&points, detection.simplify);
            let as_f: Vec<(f32, f32)> = simplified
                .iter()
                .map(|p| (p.x as f32, p.y as f32))
                .collect();
            let smoothed =
                polyline::smooth_closed(&as_f, detection.smooth as usize, SMOOTHING_SHAPE);
            let Some(&(ax, ay)) = smoothed.first() else {
                continue;
            };

            let sx = ax.floor().clamp(0.0, max_x) as u32;
            let sy = ay.floor().clamp(0.0, max_y) as u32;
            let color = frame.color_at(sx, sy);
            let z = color.iter().copied().max().unwrap_or(0) as f32;

            out.push(SliceContour {
                index: counter,
                level,
                color,
                vertices: smoothed
                    .into_iter()
                    .map(|(x, y)| Vertex { x, y, z })
                    .collect(),
            });
            counter += 1;
        }
    }
    tracing::trace!(contours = out.len(), "slice sweep");
    out
}
