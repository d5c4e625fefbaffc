use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use image::RgbImage;
use png::{BitDepth, ColorType, Encoder, PixelDimensions, Unit};

use crate::error::Result;

const DEFAULT_PREFIX: &str = "test-image-";
// Label only; the payload is always PNG.
const DEFAULT_EXTENSION: &str = "jpg";
/// Crops are tagged as 96 DPI, expressed in pixels per metre for pHYs.
pub const OUTPUT_DPI: u32 = 96;
const INCH_IN_METRES: f64 = 0.0254;

/// How crops are named on disk: `<directory>/<prefix><counter>.<extension>`.
///
/// The extension is only a label. Crops are always PNG-encoded, so the
/// default `.jpg` name does not match the file contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputNaming {
    pub directory: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl OutputNaming {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn path_for(&self, counter: u64) -> PathBuf {
        self.directory
            .join(format!("{}{counter}.{}", self.prefix, self.extension))
    }
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

fn pixels_per_metre(dpi: u32) -> u32 {
    (dpi as f64 / INCH_IN_METRES).round() as u32
}

/// PNG-encodes `image` into `path` at [`OUTPUT_DPI`], replacing any existing
/// file. An empty path is a no-op. Parent directories are not created.
pub fn save_image(path: &Path, image: &RgbImage) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }

    let mut file = BufWriter::new(File::create(path)?);
    let mut encoder = Encoder::new(&mut file, image.width(), image.height());
    encoder.set_color(ColorType::Rgb);
    encoder.set_depth(BitDepth::Eight);
    let ppm = pixels_per_metre(OUTPUT_DPI);
    encoder.set_pixel_dims(Some(PixelDimensions {
        xppu: ppm,
        yppu: ppm,
        unit: Unit::Meter,
    }));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use image::ImageFormat;

    use super::*;
    use crate::error::ExtractError;

    #[test]
    fn default_naming_matches_capture_sets() {
        let naming = OutputNaming::default();
        assert_eq!(naming.path_for(1), Path::new(".").join("test-image-1.jpg"));
        assert_eq!(naming.path_for(42), Path::new(".").join("test-image-42.jpg"));
    }

    #[test]
    fn empty_path_is_a_no_op() {
        assert!(save_image(Path::new(""), &RgbImage::new(4, 4)).is_ok());
    }

    #[test]
    fn crops_carry_96_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.png");
        save_image(&path, &RgbImage::new(5, 5)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let reader = png::Decoder::new(std::io::Cursor::new(bytes))
            .read_info()
            .unwrap();
        let dims = reader.info().pixel_dims.expect("pHYs chunk");
        assert_eq!(dims.xppu, 3780);
        assert_eq!(dims.yppu, 3780);
        assert_eq!(dims.unit, Unit::Meter);
    }

    #[test]
    fn writes_png_with_crop_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = OutputNaming::in_directory(dir.path()).path_for(1);
        let image = RgbImage::from_pixel(150, 150, image::Rgb([200, 10, 30]));

        save_image(&path, &image).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgb8();
        assert_eq!(decoded.dimensions(), (150, 150));
        assert_eq!(decoded.get_pixel(75, 75).0, [200, 10, 30]);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.png");
        std::fs::write(&path, b"stale").unwrap();

        save_image(&path, &RgbImage::new(3, 2)).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("crop.png");
        let err = save_image(&path, &RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }
}
