pub mod replay;

use crossbeam_channel::Sender;

use crate::{
    error::{ExtractError, Result},
    types::{ColorImageFormat, ColorStreamInfo, DepthImageFormat, FrameSet},
};

pub use replay::ReplaySensor;

pub const DEFAULT_COLOR_FORMAT: ColorImageFormat = ColorImageFormat::RgbResolution640x480Fps30;
pub const DEFAULT_DEPTH_FORMAT: DepthImageFormat = DepthImageFormat::Resolution640x480Fps30;

/// A motion-sensing camera that delivers synchronized skeleton and color
/// frames. `start` both starts capture and subscribes `frame_tx` to the
/// device's "all frames ready" deliveries; the subscription lasts until the
/// device stops or is dropped.
pub trait CaptureDevice: Send {
    fn name(&self) -> &str;

    fn enable_skeleton_stream(&mut self);

    fn enable_color_stream(&mut self, format: ColorImageFormat);

    fn enable_depth_stream(&mut self, format: DepthImageFormat);

    /// `None` until the color stream is enabled.
    fn color_stream(&self) -> Option<ColorStreamInfo>;

    fn start(&mut self, frame_tx: Sender<FrameSet>) -> Result<()>;

    fn stop(&mut self);
}

/// Picks the first device in enumeration order. No fallback selection.
pub fn open_first<D, I>(devices: I) -> Result<D>
where
    D: CaptureDevice,
    I: IntoIterator<Item = D>,
{
    let device = devices
        .into_iter()
        .next()
        .ok_or(ExtractError::DeviceNotFound)?;
    log::info!("using capture device {}", device.name());
    Ok(device)
}

/// Enables the skeleton, color and depth streams and starts delivery into
/// `frame_tx`. Returns the color stream geometry the frame handler needs.
pub fn initialize<D: CaptureDevice + ?Sized>(
    device: &mut D,
    frame_tx: Sender<FrameSet>,
) -> Result<ColorStreamInfo> {
    device.enable_skeleton_stream();
    device.enable_color_stream(DEFAULT_COLOR_FORMAT);
    device.enable_depth_stream(DEFAULT_DEPTH_FORMAT);

    let color = device
        .color_stream()
        .ok_or(ExtractError::StreamNotEnabled("color"))?;

    if let Err(err) = device.start(frame_tx) {
        log::error!("error starting capture device {}: {err}", device.name());
        return Err(err);
    }

    log::info!(
        "capture device {} started: color {}x{}@{}fps",
        device.name(),
        color.width,
        color.height,
        color.format.fps()
    );
    Ok(color)
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    #[test]
    fn open_first_without_devices_fails() {
        let result = open_first(Vec::<ReplaySensor>::new());
        assert!(matches!(result, Err(ExtractError::DeviceNotFound)));
    }

    #[test]
    fn open_first_takes_enumeration_order() {
        let devices = vec![ReplaySensor::new("first", Vec::new()), ReplaySensor::new("second", Vec::new())];
        let device = open_first(devices).unwrap();
        assert_eq!(device.name(), "first");
    }

    #[test]
    fn initialize_enables_all_streams_and_starts() {
        let mut device = ReplaySensor::new("replay", Vec::new());
        let (tx, rx) = bounded(1);
        let color = initialize(&mut device, tx).unwrap();

        assert_eq!(color, ColorStreamInfo::for_format(DEFAULT_COLOR_FORMAT));
        assert!(device.skeleton_enabled());
        assert_eq!(device.depth_format(), Some(DEFAULT_DEPTH_FORMAT));
        assert!(device.is_started());

        // Empty replay closes the subscription straight away.
        assert!(rx.recv().is_err());
    }

    #[test]
    fn initialize_surfaces_start_failure() {
        let mut device = ReplaySensor::new("broken", Vec::new()).fail_on_start("usb reset");
        let (tx, _rx) = bounded(1);
        let err = initialize(&mut device, tx).unwrap_err();

        match err {
            ExtractError::DeviceStart { device: name, reason } => {
                assert_eq!(name, "broken");
                assert_eq!(reason, "usb reset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!device.is_started());
    }
}
