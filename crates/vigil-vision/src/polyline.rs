//! Closed-polyline helpers: area, simplification and smoothing.

use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Edge weight of the outermost neighbor in the smoothing window.
pub const SMOOTHING_SHAPE: f32 = 0.5;

/// Absolute polygon area (shoelace). Fewer than three points enclose nothing.
pub fn area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice as f64 / 2.0).abs()
}

/// Douglas-Peucker over a closed contour. Inputs too short to simplify are
/// returned as-is.
pub fn simplify(points: &[Point<i32>], tolerance: f32) -> Vec<Point<i32>> {
    if points.len() < 3 || tolerance <= 0.0 {
        return points.to_vec();
    }
    approximate_polygon_dp(points, tolerance as f64, true)
}

/// Weighted moving average over a closed polyline.
///
/// Each output vertex is its input vertex (weight 1) plus its neighbors
/// `j = 1..size` on both sides, neighbor `j` weighted linearly from 1 at
/// distance 0 down to `shape` at distance `size`. Indices wrap.
pub fn smooth_closed(points: &[(f32, f32)], size: usize, shape: f32) -> Vec<(f32, f32)> {
    let n = points.len();
    let size = size.min(n);
    let shape = shape.clamp(0.0, 1.0);
    if size < 2 {
        return points.to_vec();
    }

    let weights: Vec<f32> = (0..size)
        .map(|j| 1.0 + (shape - 1.0) * (j as f32 / size as f32))
        .collect();

    let mut out = points.to_vec();
    for (i, slot) in out.iter_mut().enumerate() {
        let mut sum = 1.0;
        for (j, w) in weights.iter().enumerate().skip(1) {
            let mut cur = (0.0, 0.0);
            let left = (i + n - j) % n;
            cur.0 += points[left].0;
            cur.1 += points[left].1;
            sum += w;
            let right = (i + j) % n;
            cur.0 += points[right].0;
            cur.1 += points[right].1;
            sum += w;
            slot.0 += cur.0 * w;
            slot.1 += cur.1 * w;
        }
        slot.0 /= sum;
        slot.1 /= sum;
    }
    out
}
