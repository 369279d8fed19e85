//! HEIC to JPEG conversion
//!
//! PDF has no HEIC filter, so HEIC photos are decoded, scaled to half their
//! linear size and written as JPEG into a `converted/` folder next to the
//! originals. The JPEG is what ends up embedded in the document.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::scan::SourceKind;

/// JPEG quality used for converted photos
pub const JPEG_QUALITY: u8 = 80;

/// Linear scale applied to converted photos
pub const SCALE: f64 = 0.5;

/// Target size for a downscaled image: `floor(dim * SCALE)`, at least 1px
pub fn half_scale(width: u32, height: u32) -> (u32, u32) {
    let w = ((width as f64) * SCALE).floor() as u32;
    let h = ((height as f64) * SCALE).floor() as u32;
    (w.max(1), h.max(1))
}

/// Encode an image as JPEG at the given quality
pub fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(&rgb)?;
    writer.flush()?;

    Ok(())
}

/// Path of the converted JPEG for a source file: `<dir>/<file name>.jpg`
pub fn converted_path(src: &Path, converted_dir: &Path) -> PathBuf {
    let mut name = src
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".jpg");
    converted_dir.join(name)
}

/// Decode `src`, halve its dimensions and write it as a quality-80 JPEG
///
/// The converted directory is created if needed. Returns the path of the
/// written JPEG.
pub fn convert_to_jpeg(src: &Path, converted_dir: &Path) -> Result<PathBuf> {
    if !src.exists() {
        return Err(Error::FileNotFound(src.to_path_buf()));
    }

    if !converted_dir.is_dir() {
        debug!("Creating {}", converted_dir.display());
        fs::create_dir_all(converted_dir)?;
    }

    let image = decode(src)?;
    let (width, height) = half_scale(image.width(), image.height());
    let scaled = image.resize_exact(width, height, FilterType::Triangle);

    let output = converted_path(src, converted_dir);
    write_jpeg(&scaled, &output, JPEG_QUALITY)?;

    info!(
        "Converted {} ({}x{}) -> {} ({}x{})",
        src.display(),
        image.width(),
        image.height(),
        output.display(),
        width,
        height
    );

    Ok(output)
}

/// Decode any supported source image into memory
fn decode(src: &Path) -> Result<DynamicImage> {
    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    match SourceKind::from_name(name) {
        SourceKind::Heic => decode_heic(src),
        _ => Ok(image::open(src)?),
    }
}

#[cfg(feature = "heic")]
fn decode_heic(src: &Path) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let path = src
        .to_str()
        .ok_or_else(|| Error::Heic(format!("path is not UTF-8: {}", src.display())))?;

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_file(path).map_err(|e| Error::Heic(e.to_string()))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| Error::Heic(e.to_string()))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| Error::Heic(e.to_string()))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| Error::Heic(format!("no interleaved RGB plane in {}", src.display())))?;

    // Rows may be padded past width * 3
    let row_len = plane.width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    let rgb = image::RgbImage::from_raw(plane.width, plane.height, pixels)
        .ok_or_else(|| Error::Heic(format!("short pixel buffer in {}", src.display())))?;

    Ok(DynamicImage::ImageRgb8(rgb))
}

#[cfg(not(feature = "heic"))]
fn decode_heic(src: &Path) -> Result<DynamicImage> {
    Err(Error::HeicUnsupported(src.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_half_scale_floors() {
        assert_eq!(half_scale(4032, 3024), (2016, 1512));
        assert_eq!(half_scale(101, 51), (50, 25));
        assert_eq!(half_scale(1, 1), (1, 1));
    }

    #[test]
    fn test_converted_path_appends_jpg() {
        let path = converted_path(Path::new("/r/IMG_0001.HEIC"), Path::new("/r/converted"));
        assert_eq!(path, PathBuf::from("/r/converted/IMG_0001.HEIC.jpg"));
    }

    #[test]
    fn test_convert_halves_dimensions() {
        let dir = TempDir::new().expect("temp dir");
        let src = dir.path().join("photo.png");
        RgbImage::from_pixel(121, 80, Rgb([200, 30, 30]))
            .save(&src)
            .expect("write png");

        let converted_dir = dir.path().join("converted");
        let output = convert_to_jpeg(&src, &converted_dir).expect("convert");

        assert_eq!(output, converted_dir.join("photo.png.jpg"));
        assert_eq!(image::image_dimensions(&output).expect("read jpeg"), (60, 40));
    }

    #[test]
    fn test_convert_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let result = convert_to_jpeg(&dir.path().join("gone.heic"), dir.path());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn test_heic_without_feature() {
        let dir = TempDir::new().expect("temp dir");
        let src = dir.path().join("IMG_0001.HEIC");
        std::fs::write(&src, b"not really heic").expect("write");

        let result = convert_to_jpeg(&src, &dir.path().join("converted"));
        assert!(matches!(result, Err(Error::HeicUnsupported(_))));
    }

    #[cfg(feature = "heic")]
    #[test]
    fn test_heic_corrupt_file() {
        let dir = TempDir::new().expect("temp dir");
        let src = dir.path().join("IMG_0001.HEIC");
        std::fs::write(&src, b"not really heic").expect("write");

        let result = convert_to_jpeg(&src, &dir.path().join("converted"));
        assert!(matches!(result, Err(Error::Heic(_))));
    }

    #[cfg(feature = "heic")]
    #[test]
    fn test_heic_halved_to_jpeg() {
        use libheif_rs::{
            Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
            RgbChroma,
        };

        let lib_heif = LibHeif::new();
        let mut encoder = match lib_heif.encoder_for_format(CompressionFormat::Hevc) {
            Ok(encoder) => encoder,
            Err(_) => {
                eprintln!("Skipping HEIC conversion test: libheif has no HEVC encoder");
                return;
            }
        };
        encoder.set_quality(EncoderQuality::Lossy(90)).expect("quality");

        let mut photo = Image::new(64, 48, ColorSpace::Rgb(RgbChroma::Rgb)).expect("image");
        photo.create_plane(Channel::Interleaved, 64, 48, 8).expect("plane");
        {
            let planes = photo.planes_mut();
            let mut plane = planes.interleaved.expect("interleaved plane");
            plane.data.fill(128);
        }

        let dir = TempDir::new().expect("temp dir");
        let src = dir.path().join("IMG_0002.HEIC");
        let src_str = src.to_str().expect("utf-8 path");

        let mut ctx = HeifContext::new().expect("context");
        ctx.encode_image(&photo, &mut encoder, None).expect("encode");
        ctx.write_to_file(src_str).expect("write heic");

        let jpeg = convert_to_jpeg(&src, &dir.path().join("converted")).expect("convert");
        assert_eq!(jpeg, dir.path().join("converted").join("IMG_0002.HEIC.jpg"));
        assert_eq!(image::image_dimensions(&jpeg).expect("dimensions"), (32, 24));
    }
}
