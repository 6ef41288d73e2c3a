//! Decimated brightest-pixel scan.

use vigil_core::Frame;

/// Brightest sampled pixel whose brightness is strictly above `floor`.
///
/// Samples `x = 0, stride, …` while `x < width - stride` and likewise for
/// `y`, so the last `stride` rows and columns are never visited. Ties keep
/// the first maximum in row-major order.
pub fn brightest(frame: &Frame, stride: u32, floor: u8) -> Option<(u32, u32)> {
    let stride = stride.max(1);
    let x_end = frame.width().saturating_sub(stride);
    let y_end = frame.height().saturating_sub(stride);

    let mut best: Option<((u32, u32), u8)> = None;
    for y in (0..y_end).step_by(stride as usize) {
        for x in (0..x_end).step_by(stride as usize) {
            let b = frame.brightness_at(x, y);
            if b <= floor {
                continue;
            }
            if best.map_or(true, |(_, max)| b > max) {
                best = Some(((x, y), b));
            }
        }
    }
    best.map(|(at, _)| at)
}
