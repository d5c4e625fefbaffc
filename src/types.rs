use std::time::Instant;

use crate::error::{ExtractError, Result};

/// Bytes per pixel of every color stream format (BGR32, 4th byte unused).
pub const COLOR_BYTES_PER_PIXEL: usize = 4;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SkeletonPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JointType {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    pub const COUNT: usize = 20;

    pub const ALL: [JointType; Self::COUNT] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            JointType::HipCenter => "hip-center",
            JointType::Spine => "spine",
            JointType::ShoulderCenter => "shoulder-center",
            JointType::Head => "head",
            JointType::ShoulderLeft => "shoulder-left",
            JointType::ElbowLeft => "elbow-left",
            JointType::WristLeft => "wrist-left",
            JointType::HandLeft => "hand-left",
            JointType::ShoulderRight => "shoulder-right",
            JointType::ElbowRight => "elbow-right",
            JointType::WristRight => "wrist-right",
            JointType::HandRight => "hand-right",
            JointType::HipLeft => "hip-left",
            JointType::KneeLeft => "knee-left",
            JointType::AnkleLeft => "ankle-left",
            JointType::FootLeft => "foot-left",
            JointType::HipRight => "hip-right",
            JointType::KneeRight => "knee-right",
            JointType::AnkleRight => "ankle-right",
            JointType::FootRight => "foot-right",
        }
    }
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointTrackingState {
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Joint {
    pub joint_type: JointType,
    pub position: SkeletonPoint,
    #[allow(dead_code)]
    pub tracking_state: JointTrackingState,
}

#[allow(dead_code)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkeletonTrackingState {
    NotTracked,
    PositionOnly,
    Tracked,
}

/// One body candidate reported by the device for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Skeleton {
    pub tracking_id: u32,
    pub tracking_state: SkeletonTrackingState,
    #[allow(dead_code)]
    pub position: SkeletonPoint,
    pub joints: [Joint; JointType::COUNT],
}

impl Skeleton {
    /// An empty candidate slot, as the device reports unused entries.
    pub fn untracked() -> Self {
        Self {
            tracking_id: 0,
            tracking_state: SkeletonTrackingState::NotTracked,
            position: SkeletonPoint::default(),
            joints: JointType::ALL.map(|joint_type| Joint {
                joint_type,
                position: SkeletonPoint::default(),
                tracking_state: JointTrackingState::NotTracked,
            }),
        }
    }

    /// A fully tracked body with the given joints tracked and all others
    /// left at the origin.
    pub fn tracked(tracking_id: u32, joints: &[(JointType, SkeletonPoint)]) -> Self {
        let mut skeleton = Self::untracked();
        skeleton.tracking_id = tracking_id;
        skeleton.tracking_state = SkeletonTrackingState::Tracked;
        for &(joint_type, position) in joints {
            skeleton.joints[joint_type.index()] = Joint {
                joint_type,
                position,
                tracking_state: JointTrackingState::Tracked,
            };
        }
        skeleton
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == SkeletonTrackingState::Tracked
    }

    pub fn joint(&self, joint_type: JointType) -> &Joint {
        &self.joints[joint_type.index()]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletonFrame {
    pub skeletons: Vec<Skeleton>,
}

impl SkeletonFrame {
    pub fn new(skeletons: Vec<Skeleton>) -> Self {
        Self { skeletons }
    }

    pub fn skeleton_array_length(&self) -> usize {
        self.skeletons.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorImageFormat {
    RgbResolution640x480Fps30,
}

impl ColorImageFormat {
    pub fn width(&self) -> u32 {
        match self {
            ColorImageFormat::RgbResolution640x480Fps30 => 640,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            ColorImageFormat::RgbResolution640x480Fps30 => 480,
        }
    }

    pub fn fps(&self) -> u32 {
        match self {
            ColorImageFormat::RgbResolution640x480Fps30 => 30,
        }
    }
}

/// Depth is enabled alongside color but no stage reads it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthImageFormat {
    Resolution640x480Fps30,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorStreamInfo {
    pub format: ColorImageFormat,
    pub width: u32,
    pub height: u32,
    pub frame_pixel_data_length: usize,
}

impl ColorStreamInfo {
    pub fn for_format(format: ColorImageFormat) -> Self {
        let width = format.width();
        let height = format.height();
        Self {
            format,
            width,
            height,
            frame_pixel_data_length: width as usize * height as usize * COLOR_BYTES_PER_PIXEL,
        }
    }
}

/// Raw BGR32 color snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ColorFrame {
    pub fn pixel_data_length(&self) -> usize {
        self.pixels.len()
    }

    pub fn copy_pixel_data_to(&self, dst: &mut [u8]) -> Result<()> {
        if dst.len() != self.pixel_data_length() {
            return Err(ExtractError::buffer_mismatch(dst.len(), self.pixel_data_length()));
        }
        dst.copy_from_slice(&self.pixels);
        Ok(())
    }
}

/// One "all frames ready" delivery. A missing member means the device did
/// not produce that frame this cycle.
#[derive(Clone, Debug)]
pub struct FrameSet {
    pub skeleton: Option<SkeletonFrame>,
    pub color: Option<ColorFrame>,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl FrameSet {
    pub fn new(skeleton: Option<SkeletonFrame>, color: Option<ColorFrame>) -> Self {
        Self {
            skeleton,
            color,
            timestamp: Instant::now(),
        }
    }
}
