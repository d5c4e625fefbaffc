use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{SendTimeoutError, Sender};

use super::CaptureDevice;
use crate::{
    error::{ExtractError, Result},
    types::{ColorImageFormat, ColorStreamInfo, DepthImageFormat, FrameSet},
};

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(1_000 / 30);
// How long a blocked send waits before re-checking the stop flag.
const SEND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Replays a fixed sequence of frame sets as if a device produced them.
///
/// Delivery runs on its own thread, one frame set per interval, and the
/// subscription closes once the sequence is exhausted.
pub struct ReplaySensor {
    name: String,
    frames: Vec<FrameSet>,
    frame_interval: Duration,
    start_failure: Option<String>,
    skeleton_enabled: bool,
    color: Option<ColorStreamInfo>,
    depth: Option<DepthImageFormat>,
    stream: Option<ReplayStream>,
}

struct ReplayStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ReplayStream {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ReplaySensor {
    pub fn new(name: impl Into<String>, frames: Vec<FrameSet>) -> Self {
        Self {
            name: name.into(),
            frames,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            start_failure: None,
            skeleton_enabled: false,
            color: None,
            depth: None,
            stream: None,
        }
    }

    #[cfg(test)]
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Makes `start` fail with `reason`, the way an unplugged or busy
    /// device would.
    #[cfg(test)]
    pub fn fail_on_start(mut self, reason: impl Into<String>) -> Self {
        self.start_failure = Some(reason.into());
        self
    }

    #[cfg(test)]
    pub fn skeleton_enabled(&self) -> bool {
        self.skeleton_enabled
    }

    #[cfg(test)]
    pub fn depth_format(&self) -> Option<DepthImageFormat> {
        self.depth
    }

    #[cfg(test)]
    pub fn is_started(&self) -> bool {
        self.stream.is_some()
    }
}

impl CaptureDevice for ReplaySensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enable_skeleton_stream(&mut self) {
        self.skeleton_enabled = true;
    }

    fn enable_color_stream(&mut self, format: ColorImageFormat) {
        self.color = Some(ColorStreamInfo::for_format(format));
    }

    fn enable_depth_stream(&mut self, format: DepthImageFormat) {
        self.depth = Some(format);
    }

    fn color_stream(&self) -> Option<ColorStreamInfo> {
        self.color
    }

    fn start(&mut self, frame_tx: Sender<FrameSet>) -> Result<()> {
        if self.stream.is_some() {
            return Err(ExtractError::AlreadyStarted(self.name.clone()));
        }
        if let Some(reason) = &self.start_failure {
            return Err(ExtractError::device_start(&self.name, reason.as_str()));
        }
        if self.color.is_none() {
            return Err(ExtractError::StreamNotEnabled("color"));
        }

        log::debug!(
            "{}: starting replay (skeleton stream {}, depth {:?})",
            self.name,
            if self.skeleton_enabled { "on" } else { "off" },
            self.depth
        );

        let frames = std::mem::take(&mut self.frames);
        let interval = self.frame_interval;
        let name = self.name.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let total = frames.len();
            let mut delivered = 0usize;

            'frames: for frame in frames {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                if !interval.is_zero() {
                    thread::sleep(interval);
                }

                let mut pending = frame;
                loop {
                    match frame_tx.send_timeout(pending, SEND_POLL_INTERVAL) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(frame)) => {
                            if stop_flag.load(Ordering::Relaxed) {
                                break 'frames;
                            }
                            pending = frame;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => {
                            log::debug!("{name}: frame subscriber went away");
                            break 'frames;
                        }
                    }
                }
                delivered += 1;
            }

            log::debug!("{name}: replay finished after {delivered}/{total} frame sets");
        });

        self.stream = Some(ReplayStream {
            stop,
            handle: Some(handle),
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown();
        }
    }
}
