use image::{RgbImage, imageops};
use rayon::prelude::*;

use super::scale::PixelPoint;
use crate::{
    error::{ExtractError, Result},
    types::COLOR_BYTES_PER_PIXEL,
};

/// Default divisor for the upward bias of the crop window: the window top
/// sits `height / 1.5` above the joint, so the crop keeps the area above the
/// hand center.
pub const DEFAULT_VERTICAL_BIAS_DIVISOR: f64 = 1.5;

/// Crop window in frame pixel coordinates. May lie partly outside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn right(&self) -> i64 {
        self.left + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.top + self.height as i64
    }

    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.right() <= frame_width as i64
            && self.bottom() <= frame_height as i64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropBounds {
    /// Fail with `CropOutOfBounds` when the window leaves the frame.
    Reject,
    /// Slide the window back inside the frame, keeping its size.
    Clamp,
}

/// Window of `width` x `height` around `point`, horizontally centered and
/// shifted up by `height / bias_divisor` (rounded half to even).
pub fn crop_rect(point: PixelPoint, width: u32, height: u32, bias_divisor: f64) -> CropRect {
    let lift = (height as f64 / bias_divisor).round_ties_even() as i64;
    CropRect {
        left: point.x as i64 - (width / 2) as i64,
        top: point.y as i64 - lift,
        width,
        height,
    }
}

pub fn fit_to_frame(
    rect: CropRect,
    frame_width: u32,
    frame_height: u32,
    bounds: CropBounds,
) -> Result<CropRect> {
    if rect.fits_within(frame_width, frame_height) {
        return Ok(rect);
    }

    let out_of_bounds = ExtractError::CropOutOfBounds {
        rect,
        frame_width,
        frame_height,
    };
    match bounds {
        CropBounds::Reject => Err(out_of_bounds),
        CropBounds::Clamp => {
            if rect.width > frame_width || rect.height > frame_height {
                return Err(out_of_bounds);
            }
            Ok(CropRect {
                left: rect.left.clamp(0, (frame_width - rect.width) as i64),
                top: rect.top.clamp(0, (frame_height - rect.height) as i64),
                ..rect
            })
        }
    }
}

/// Converts a BGR32 device buffer into an RGB image, dropping the padding
/// byte.
pub fn bgr32_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let pixel_count = width as usize * height as usize;
    let expected_len = pixel_count * COLOR_BYTES_PER_PIXEL;
    if pixels.len() != expected_len {
        return Err(ExtractError::buffer_mismatch(expected_len, pixels.len()));
    }

    let mut rgb = vec![0u8; pixel_count * 3];
    rgb.par_chunks_mut(3)
        .zip(pixels.par_chunks_exact(COLOR_BYTES_PER_PIXEL))
        .for_each(|(dst, src)| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        });

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ExtractError::buffer_mismatch(expected_len, pixels.len()))
}

/// Cuts `rect` out of `image`. The rectangle must already fit the image.
pub fn crop(image: &RgbImage, rect: CropRect) -> Result<RgbImage> {
    if !rect.fits_within(image.width(), image.height()) {
        return Err(ExtractError::CropOutOfBounds {
            rect,
            frame_width: image.width(),
            frame_height: image.height(),
        });
    }
    Ok(imageops::crop_imm(image, rect.left as u32, rect.top as u32, rect.width, rect.height).to_image())
}
