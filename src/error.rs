use thiserror::Error;

use crate::pipeline::crop::CropRect;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no capture device available")]
    DeviceNotFound,

    #[error("failed to start capture device {device}: {reason}")]
    DeviceStart { device: String, reason: String },

    #[error("capture device {0} is already started")]
    AlreadyStarted(String),

    #[error("{0} stream is not enabled")]
    StreamNotEnabled(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("pixel buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("crop window {rect:?} exceeds {frame_width}x{frame_height} frame")]
    CropOutOfBounds {
        rect: CropRect,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),
}

impl ExtractError {
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    pub fn device_start(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeviceStart {
            device: device.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
