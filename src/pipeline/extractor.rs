use std::path::PathBuf;

use crossbeam_channel::Receiver;

use super::{
    crop::{self, CropBounds, CropRect, DEFAULT_VERTICAL_BIAS_DIVISOR},
    scale::{self, PixelPoint},
    tracking::{ActiveBody, StalenessPolicy, select_active_body},
    writer::{self, OutputNaming},
};
use crate::{
    error::{ExtractError, Result},
    types::{ColorStreamInfo, FrameSet, JointType},
};

pub const DEFAULT_CROP_WIDTH: u32 = 150;
pub const DEFAULT_CROP_HEIGHT: u32 = 150;
pub const DEFAULT_MAX_SKELETON: f32 = 1.0;

/// How the handler decides that a joint was found this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionGate {
    /// A joint counts as found whenever the active body is tracked, even if
    /// it projects onto pixel 0.
    Explicit,
    /// Treat a projected coordinate of exactly zero on either axis as "not
    /// found". Joints on the top or left frame edge are skipped.
    NonZeroCoordinates,
}

#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    pub crop_width: u32,
    pub crop_height: u32,
    pub vertical_bias_divisor: f64,
    pub target_joint: JointType,
    pub max_skeleton: f32,
    pub staleness: StalenessPolicy,
    pub detection: DetectionGate,
    pub bounds: CropBounds,
    pub output: OutputNaming,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            crop_width: DEFAULT_CROP_WIDTH,
            crop_height: DEFAULT_CROP_HEIGHT,
            vertical_bias_divisor: DEFAULT_VERTICAL_BIAS_DIVISOR,
            target_joint: JointType::HandRight,
            max_skeleton: DEFAULT_MAX_SKELETON,
            staleness: StalenessPolicy::ClearWhenLost,
            detection: DetectionGate::Explicit,
            bounds: CropBounds::Reject,
            output: OutputNaming::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_crop_size(mut self, width: u32, height: u32) -> Self {
        self.crop_width = width;
        self.crop_height = height;
        self
    }

    /// The behaviour of the device sample code: stale bodies are kept, zero
    /// coordinates mean "not found", and windows are never adjusted.
    pub fn legacy() -> Self {
        Self {
            staleness: StalenessPolicy::RetainLast,
            detection: DetectionGate::NonZeroCoordinates,
            bounds: CropBounds::Reject,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.crop_width == 0 || self.crop_height == 0 {
            return Err(ExtractError::InvalidConfig(format!(
                "crop window must be non-empty, got {}x{}",
                self.crop_width, self.crop_height
            )));
        }
        if !self.vertical_bias_divisor.is_finite() || self.vertical_bias_divisor <= 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "vertical bias divisor must be positive, got {}",
                self.vertical_bias_divisor
            )));
        }
        if !self.max_skeleton.is_finite() || self.max_skeleton <= 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "skeleton range must be positive, got {}",
                self.max_skeleton
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// No color frame was delivered this cycle.
    NoColorFrame,
    /// A color frame arrived but no joint was found to crop around.
    NoJoint,
    Saved {
        path: PathBuf,
        counter: u64,
        rect: CropRect,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub images_written: u64,
    pub failures: u64,
}

/// Crops the area around a tracked joint out of every color frame and saves
/// it as a numbered image file.
pub struct HandImageExtractor {
    config: ExtractorConfig,
    color: ColorStreamInfo,
    active: ActiveBody,
    counter: u64,
}

impl HandImageExtractor {
    pub fn new(config: ExtractorConfig, color: ColorStreamInfo) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            color,
            active: ActiveBody::none(),
            counter: 0,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn active_body(&self) -> &ActiveBody {
        &self.active
    }

    pub fn frames_written(&self) -> u64 {
        self.counter
    }

    pub fn process(&mut self, frames: &FrameSet) -> Result<FrameOutcome> {
        let mut pixels = vec![0u8; self.color.frame_pixel_data_length];

        // An empty candidate array carries no body information; the retained
        // body stays but no joint is read this frame.
        let joint = match &frames.skeleton {
            Some(skeleton_frame) if skeleton_frame.skeleton_array_length() == 0 => None,
            Some(skeleton_frame) => {
                let previous = std::mem::take(&mut self.active);
                self.active =
                    select_active_body(previous, skeleton_frame, self.config.staleness);
                self.locate_joint()
            }
            None => None,
        };

        let Some(color_frame) = &frames.color else {
            return Ok(FrameOutcome::NoColorFrame);
        };
        color_frame.copy_pixel_data_to(&mut pixels)?;

        let Some(point) = joint else {
            return Ok(FrameOutcome::NoJoint);
        };

        let frame = crop::bgr32_to_rgb(&pixels, self.color.width, self.color.height)?;
        let rect = crop::crop_rect(
            point,
            self.config.crop_width,
            self.config.crop_height,
            self.config.vertical_bias_divisor,
        );
        let rect = crop::fit_to_frame(rect, frame.width(), frame.height(), self.config.bounds)?;
        let cropped = crop::crop(&frame, rect)?;

        self.counter += 1;
        let path = self.config.output.path_for(self.counter);
        writer::save_image(&path, &cropped)?;
        log::debug!("saved crop {} at {rect:?}", path.display());

        Ok(FrameOutcome::Saved {
            path,
            counter: self.counter,
            rect,
        })
    }

    fn locate_joint(&self) -> Option<PixelPoint> {
        let position = self.active.joint_position(self.config.target_joint)?;
        let point = scale::project(
            position,
            self.color.width,
            self.color.height,
            self.config.max_skeleton,
        );
        log::debug!(
            "body {} {} position: {}, {} at {:.2}m",
            self.active.skeleton().map_or(0, |s| s.tracking_id),
            self.config.target_joint.label(),
            point.x,
            point.y,
            position.z
        );

        match self.config.detection {
            DetectionGate::Explicit => Some(point),
            DetectionGate::NonZeroCoordinates if point.x != 0.0 && point.y != 0.0 => Some(point),
            DetectionGate::NonZeroCoordinates => None,
        }
    }

    /// Handles frame sets in delivery order until the device closes the
    /// subscription. Failed frames are logged and skipped.
    pub fn run(mut self, frame_rx: Receiver<FrameSet>) -> RunSummary {
        let mut summary = RunSummary::default();

        while let Ok(frames) = frame_rx.recv() {
            summary.frames_seen += 1;
            match self.process(&frames) {
                Ok(FrameOutcome::Saved { .. }) => summary.images_written += 1,
                Ok(_) => {}
                Err(err) => {
                    summary.failures += 1;
                    log::warn!("frame {} failed: {err}", summary.frames_seen);
                }
            }
        }

        log::info!(
            "frame subscription closed: {} frames, {} images, {} failures, last image number {}",
            summary.frames_seen,
            summary.images_written,
            summary.failures,
            self.frames_written()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use crossbeam_channel::bounded;

    use super::*;
    use crate::{
        sensor::{self, CaptureDevice, ReplaySensor},
        types::{ColorFrame, ColorImageFormat, Skeleton, SkeletonFrame, SkeletonPoint},
    };

    fn stream() -> ColorStreamInfo {
        ColorStreamInfo::for_format(ColorImageFormat::RgbResolution640x480Fps30)
    }

    fn color_frame() -> ColorFrame {
        let info = stream();
        let mut pixels = vec![0u8; info.frame_pixel_data_length];
        for (idx, px) in pixels.chunks_exact_mut(4).enumerate() {
            let x = (idx as u32 % info.width) as u8;
            let y = (idx as u32 / info.width) as u8;
            px.copy_from_slice(&[0, y, x, 0]);
        }
        ColorFrame {
            width: info.width,
            height: info.height,
            pixels,
        }
    }

    fn hand(x: f32, y: f32) -> SkeletonFrame {
        SkeletonFrame::new(vec![
            Skeleton::untracked(),
            Skeleton::tracked(1, &[(JointType::HandRight, SkeletonPoint::new(x, y, 2.0))]),
        ])
    }

    fn extractor(config: ExtractorConfig, dir: &Path) -> HandImageExtractor {
        let config = ExtractorConfig {
            output: OutputNaming::in_directory(dir),
            ..config
        };
        HandImageExtractor::new(config, stream()).unwrap()
    }

    fn written(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn saves_crop_around_tracked_hand() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        let outcome = extractor
            .process(&FrameSet::new(Some(hand(0.0, 0.0)), Some(color_frame())))
            .unwrap();

        let expected = dir.path().join("test-image-1.jpg");
        assert_eq!(
            outcome,
            FrameOutcome::Saved {
                path: expected.clone(),
                counter: 1,
                rect: CropRect {
                    left: 245,
                    top: 140,
                    width: 150,
                    height: 150
                },
            }
        );

        let bytes = std::fs::read(&expected).unwrap();
        let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(image.dimensions(), (150, 150));
        // Red carries the frame column, green the row.
        assert_eq!(image.get_pixel(0, 0).0, [245, 140, 0]);
    }

    #[test]
    fn counter_increments_per_saved_crop() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        for _ in 0..3 {
            extractor
                .process(&FrameSet::new(Some(hand(0.1, 0.1)), Some(color_frame())))
                .unwrap();
        }
        assert_eq!(extractor.frames_written(), 3);
        assert!(dir.path().join("test-image-3.jpg").exists());
        assert_eq!(written(dir.path()), 3);
    }

    #[test]
    fn missing_color_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        let outcome = extractor.process(&FrameSet::new(Some(hand(0.0, 0.0)), None)).unwrap();
        assert_eq!(outcome, FrameOutcome::NoColorFrame);
        assert_eq!(extractor.frames_written(), 0);
        // The body is still picked up for later frames.
        assert!(extractor.active_body().skeleton().is_some());
    }

    #[test]
    fn missing_skeleton_frame_finds_no_joint() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        let outcome = extractor.process(&FrameSet::new(None, Some(color_frame()))).unwrap();
        assert_eq!(outcome, FrameOutcome::NoJoint);
        assert_eq!(written(dir.path()), 0);
    }

    #[test]
    fn legacy_gate_skips_joint_on_frame_origin() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::legacy(), dir.path());

        // x = -1, y = +1 projects onto pixel (0, 0).
        let outcome = extractor
            .process(&FrameSet::new(Some(hand(-1.0, 1.0)), Some(color_frame())))
            .unwrap();
        assert_eq!(outcome, FrameOutcome::NoJoint);
        assert_eq!(extractor.frames_written(), 0);
        assert_eq!(written(dir.path()), 0);
    }

    #[test]
    fn explicit_gate_still_crops_joint_on_frame_origin() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExtractorConfig {
            bounds: CropBounds::Clamp,
            ..ExtractorConfig::default()
        };
        let mut extractor = extractor(config, dir.path());

        let outcome = extractor
            .process(&FrameSet::new(Some(hand(-1.0, 1.0)), Some(color_frame())))
            .unwrap();
        match outcome {
            FrameOutcome::Saved { rect, .. } => {
                assert_eq!((rect.left, rect.top), (0, 0));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_window_is_reported_without_counting() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        let err = extractor
            .process(&FrameSet::new(Some(hand(-0.99, 0.0)), Some(color_frame())))
            .unwrap_err();
        assert!(matches!(err, ExtractError::CropOutOfBounds { .. }));
        assert_eq!(extractor.frames_written(), 0);
        assert_eq!(written(dir.path()), 0);
    }

    #[test]
    fn retain_last_reuses_stale_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::legacy(), dir.path());

        extractor
            .process(&FrameSet::new(Some(hand(0.1, 0.1)), Some(color_frame())))
            .unwrap();
        let retained = extractor.active_body().clone();

        let lost = SkeletonFrame::new(vec![Skeleton::untracked()]);
        let outcome = extractor
            .process(&FrameSet::new(Some(lost), Some(color_frame())))
            .unwrap();

        assert_eq!(extractor.active_body(), &retained);
        assert!(matches!(outcome, FrameOutcome::Saved { counter: 2, .. }));
    }

    #[test]
    fn empty_skeleton_array_reads_no_joint() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::legacy(), dir.path());

        extractor
            .process(&FrameSet::new(Some(hand(0.1, 0.1)), Some(color_frame())))
            .unwrap();
        let retained = extractor.active_body().clone();

        let outcome = extractor
            .process(&FrameSet::new(Some(SkeletonFrame::default()), Some(color_frame())))
            .unwrap();

        assert_eq!(outcome, FrameOutcome::NoJoint);
        assert_eq!(extractor.active_body(), &retained);
        assert_eq!(extractor.frames_written(), 1);
        assert!(!dir.path().join("test-image-2.jpg").exists());
        assert_eq!(written(dir.path()), 1);
    }

    #[test]
    fn clear_when_lost_stops_cropping() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());

        extractor
            .process(&FrameSet::new(Some(hand(0.1, 0.1)), Some(color_frame())))
            .unwrap();
        let lost = SkeletonFrame::new(vec![Skeleton::untracked()]);
        let outcome = extractor
            .process(&FrameSet::new(Some(lost), Some(color_frame())))
            .unwrap();

        assert_eq!(outcome, FrameOutcome::NoJoint);
        assert!(extractor.active_body().skeleton().is_none());
        assert_eq!(extractor.frames_written(), 1);
    }

    #[test]
    fn wrong_sized_color_frame_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default(), dir.path());
        let frame = ColorFrame {
            width: 2,
            height: 2,
            pixels: vec![0; 16],
        };

        let err = extractor
            .process(&FrameSet::new(Some(hand(0.0, 0.0)), Some(frame)))
            .unwrap_err();
        assert!(matches!(err, ExtractError::BufferSizeMismatch { .. }));
    }

    #[test]
    fn config_validation() {
        let bad = [
            ExtractorConfig::default().with_crop_size(0, 150),
            ExtractorConfig {
                vertical_bias_divisor: 0.0,
                ..ExtractorConfig::default()
            },
            ExtractorConfig {
                max_skeleton: f32::NAN,
                ..ExtractorConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                HandImageExtractor::new(config, stream()),
                Err(ExtractError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn custom_crop_size_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = extractor(ExtractorConfig::default().with_crop_size(64, 48), dir.path());

        let outcome = extractor
            .process(&FrameSet::new(Some(hand(0.0, 0.0)), Some(color_frame())))
            .unwrap();
        let FrameOutcome::Saved { path, .. } = outcome else {
            panic!("expected a saved crop");
        };
        let decoded = image::load_from_memory(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn run_processes_replayed_frames() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![
            FrameSet::new(Some(hand(0.0, 0.0)), Some(color_frame())),
            FrameSet::new(None, Some(color_frame())),
            FrameSet::new(Some(hand(-0.99, 0.0)), Some(color_frame())),
            FrameSet::new(Some(hand(0.2, -0.1)), None),
            FrameSet::new(Some(hand(0.2, -0.1)), Some(color_frame())),
        ];
        let mut device = ReplaySensor::new("replay", frames).with_frame_interval(Duration::ZERO);
        let (tx, rx) = bounded(1);
        let color = sensor::initialize(&mut device, tx).unwrap();

        let config = ExtractorConfig {
            output: OutputNaming::in_directory(dir.path()),
            ..ExtractorConfig::default()
        };
        let summary = HandImageExtractor::new(config, color).unwrap().run(rx);
        device.stop();

        assert_eq!(
            summary,
            RunSummary {
                frames_seen: 5,
                images_written: 2,
                failures: 1
            }
        );
        assert!(dir.path().join("test-image-1.jpg").exists());
        assert!(dir.path().join("test-image-2.jpg").exists());
        assert_eq!(written(dir.path()), 2);
    }
}
