use crate::types::SkeletonPoint;

/// A joint position mapped into color-frame pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

/// Maps a skeleton-space coordinate in roughly `[-max_skeleton, max_skeleton]`
/// onto `[0, max_pixel]`, clamping anything outside.
pub fn scale(max_pixel: u32, max_skeleton: f32, position: f32) -> f32 {
    let max = max_pixel as f32;
    // Integer halving of the pixel range matches the device sample code.
    let value = (max / max_skeleton / 2.0) * position + (max_pixel / 2) as f32;
    if value > max {
        return max;
    }
    if value < 0.0 || value.is_nan() {
        return 0.0;
    }
    value
}

/// Projects a skeleton-space point onto a `width` x `height` frame. The
/// skeleton Y axis points up while image rows grow downwards, so Y is
/// negated before scaling.
pub fn project(point: SkeletonPoint, width: u32, height: u32, max_skeleton: f32) -> PixelPoint {
    PixelPoint {
        x: scale(width, max_skeleton, point.x),
        y: scale(height, max_skeleton, -point.y),
    }
}
