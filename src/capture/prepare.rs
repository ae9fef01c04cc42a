use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;

// Mild lift applied before upload; tiny date print is often low-contrast
// against glossy packaging.
const CONTRAST_BOOST: f32 = 15.0;
const BRIGHTNESS_BOOST: i32 = 8;

/// Shrink and re-encode a frame before sending it to the recognizer.
///
/// Images wider than `max_width` are scaled down proportionally; narrower
/// ones are left at their native size. The output is always JPEG at
/// `jpeg_quality`.
pub fn prepare_image(bytes: &[u8], max_width: u32, jpeg_quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("failed to decode captured frame")?;

    let img = if img.width() > max_width {
        let scale = max_width as f32 / img.width() as f32;
        let height = (img.height() as f32 * scale).round().max(1.0) as u32;
        img.resize_exact(max_width, height, FilterType::Triangle)
    } else {
        img
    };

    let img = img.adjust_contrast(CONTRAST_BOOST).brighten(BRIGHTNESS_BOOST);

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), jpeg_quality);
    img.write_with_encoder(encoder)
        .context("failed to encode prepared frame as JPEG")?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn wide_frames_are_scaled_to_max_width() {
        let prepared = prepare_image(&png_bytes(64, 32), 32, 80).unwrap();
        let round_trip = image::load_from_memory(&prepared).unwrap();
        assert_eq!(round_trip.width(), 32);
        assert_eq!(round_trip.height(), 16);
    }

    #[test]
    fn narrow_frames_keep_their_size() {
        let prepared = prepare_image(&png_bytes(20, 40), 640, 80).unwrap();
        let round_trip = image::load_from_memory(&prepared).unwrap();
        assert_eq!((round_trip.width(), round_trip.height()), (20, 40));
    }

    #[test]
    fn output_is_jpeg() {
        let prepared = prepare_image(&png_bytes(16, 16), 640, 50).unwrap();
        assert_eq!(
            image::guess_format(&prepared).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn garbage_input_is_an_error() {
        assert!(prepare_image(b"not an image", 640, 80).is_err());
    }
}
