mod error;
mod pipeline;
mod sensor;
mod types;

use std::{path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::bounded;
use image::imageops::FilterType;

use pipeline::{
    ExtractorConfig, HandImageExtractor, crop::CropBounds, writer::OutputNaming,
};
use sensor::{CaptureDevice, DEFAULT_COLOR_FORMAT, ReplaySensor};
use types::{ColorFrame, FrameSet, Skeleton, SkeletonFrame, SkeletonPoint};

const USAGE: &str = "usage: hand-image-extractor [--legacy] [--clamp] [--out <dir>] \
<color-image> <joint-x> <joint-y> [frames] [crop-width crop-height]";
// The device reports a fixed number of body slots per skeleton frame.
const SKELETON_SLOTS: usize = 6;
const REPLAY_JOINT_DEPTH: f32 = 2.0;

fn main() -> Result<()> {
    env_logger::init();

    let mut legacy = false;
    let mut clamp = false;
    let mut output_dir = None;
    let mut positional = Vec::new();
    let mut raw = std::env::args().skip(1);
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--legacy" => legacy = true,
            "--clamp" => clamp = true,
            "--out" => {
                output_dir = Some(raw.next().ok_or_else(|| anyhow!("missing <dir>\n{USAGE}"))?)
            }
            flag if flag.starts_with("--") => return Err(anyhow!("unknown flag {flag}\n{USAGE}")),
            _ => positional.push(arg),
        }
    }

    let mut args = positional.into_iter();
    let input_image = args.next().ok_or_else(|| anyhow!(USAGE))?;
    let joint_x: f32 = parse_required(args.next(), "joint-x")?;
    let joint_y: f32 = parse_required(args.next(), "joint-y")?;
    let frame_count: usize = parse_optional(args.next(), "frames")?.unwrap_or(1);

    let mut config = if legacy {
        ExtractorConfig::legacy()
    } else {
        ExtractorConfig::default()
    };
    if clamp {
        config.bounds = CropBounds::Clamp;
    }
    if let Some(dir) = output_dir {
        config.output = OutputNaming::in_directory(dir);
    }
    if let Some(width) = parse_optional::<u32>(args.next(), "crop-width")? {
        let height = parse_required(args.next(), "crop-height")?;
        config = config.with_crop_size(width, height);
    }

    let color = load_color_frame(Path::new(&input_image))?;
    let hand = SkeletonPoint::new(joint_x, joint_y, REPLAY_JOINT_DEPTH);
    let frames = (0..frame_count)
        .map(|_| {
            let mut skeletons = vec![Skeleton::untracked(); SKELETON_SLOTS];
            skeletons[0] = Skeleton::tracked(1, &[(config.target_joint, hand)]);
            FrameSet::new(Some(SkeletonFrame::new(skeletons)), Some(color.clone()))
        })
        .collect();

    let mut device = sensor::open_first([ReplaySensor::new(input_image.clone(), frames)])?;
    let (frame_tx, frame_rx) = bounded(1);
    let color_stream =
        sensor::initialize(&mut device, frame_tx).context("failed to initialize capture device")?;

    let extractor = HandImageExtractor::new(config, color_stream)?;
    let settings = extractor.config();
    log::info!(
        "cropping {}x{} around {} ({:?}, {:?}, {:?}) into {}",
        settings.crop_width,
        settings.crop_height,
        settings.target_joint.label(),
        settings.staleness,
        settings.detection,
        settings.bounds,
        settings.output.directory.display()
    );
    let summary = extractor.run(frame_rx);
    device.stop();

    println!(
        "{} frames, {} images written, {} failures",
        summary.frames_seen, summary.images_written, summary.failures
    );
    Ok(())
}

fn parse_required<T: FromStr>(arg: Option<String>, name: &str) -> Result<T> {
    parse_optional(arg, name)?.ok_or_else(|| anyhow!("missing <{name}>\n{USAGE}"))
}

fn parse_optional<T: FromStr>(arg: Option<String>, name: &str) -> Result<Option<T>> {
    arg.map(|value| {
        value
            .parse::<T>()
            .map_err(|_| anyhow!("invalid <{name}>: {value}"))
    })
    .transpose()
}

/// Loads a still image as a BGR32 frame at the color stream resolution.
fn load_color_frame(path: &Path) -> Result<ColorFrame> {
    let mut image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();

    let (width, height) = (DEFAULT_COLOR_FORMAT.width(), DEFAULT_COLOR_FORMAT.height());
    if image.dimensions() != (width, height) {
        log::info!(
            "resizing {} from {:?} to {width}x{height}",
            path.display(),
            image.dimensions()
        );
        image = image::imageops::resize(&image, width, height, FilterType::CatmullRom);
    }

    let mut pixels = image.into_raw();
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    Ok(ColorFrame {
        width,
        height,
        pixels,
    })
}
