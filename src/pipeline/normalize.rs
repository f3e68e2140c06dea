//! Image normalisation: downloaded slide bytes → page payload for assembly.
//!
//! Two tiers, selected by [`crate::config::DownloadConfig::reencode`]:
//!
//! * **Re-encode** (default): decode, flatten any alpha channel onto white
//!   and re-encode as JPEG at the configured quality. The payload size is
//!   bounded by pixel count and quality.
//! * **Passthrough**: read only the dimensions and keep the original bytes;
//!   the worker decodes them itself when embedding.
//!
//! Decoding is CPU-bound, so the async entry point runs in `spawn_blocking`.

use crate::error::PageError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Encoding of a [`NormalizedPage`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    /// Baseline JPEG, embedded as-is with `DCTDecode`.
    Jpeg,
    /// PNG, decoded by the worker and embedded with `FlateDecode`.
    Png,
}

impl PageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageFormat::Jpeg => "JPEG",
            PageFormat::Png => "PNG",
        }
    }
}

/// One page ready for the assembly worker.
///
/// Ownership of `buffer` moves into the worker with the message that carries
/// it; nothing on the orchestrating side keeps a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPage {
    pub buffer: Vec<u8>,
    pub format: PageFormat,
    pub page_num: usize,
    pub width_px: u32,
    pub height_px: u32,
}

/// Normalise a downloaded slide off the async executor.
pub async fn normalize_page(
    raw: Vec<u8>,
    page_num: usize,
    reencode: bool,
    jpeg_quality: u8,
) -> Result<NormalizedPage, PageError> {
    tokio::task::spawn_blocking(move || {
        if reencode {
            reencode_page(&raw, page_num, jpeg_quality)
        } else {
            passthrough_page(raw, page_num, jpeg_quality)
        }
    })
    .await
    .map_err(|e| PageError::DecodeFailed {
        page: page_num,
        detail: format!("normalise task panicked: {}", e),
    })?
}

/// Full tier: decode, flatten, re-encode as JPEG.
pub fn reencode_page(raw: &[u8], page_num: usize, quality: u8) -> Result<NormalizedPage, PageError> {
    let img = image::load_from_memory(raw).map_err(|e| PageError::DecodeFailed {
        page: page_num,
        detail: e.to_string(),
    })?;
    let rgb = flatten_onto_white(&img);
    let (width, height) = rgb.dimensions();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| PageError::EncodeFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    debug!(
        "Page {}: {}x{} px, {} → {} bytes as JPEG q{}",
        page_num,
        width,
        height,
        raw.len(),
        buffer.len(),
        quality
    );

    Ok(NormalizedPage {
        buffer,
        format: PageFormat::Jpeg,
        page_num,
        width_px: width,
        height_px: height,
    })
}

/// Minimal tier: probe the PNG's dimensions, keep the original bytes.
///
/// Input that is not PNG falls back to [`reencode_page`] at
/// `fallback_quality`.
pub fn passthrough_page(
    raw: Vec<u8>,
    page_num: usize,
    fallback_quality: u8,
) -> Result<NormalizedPage, PageError> {
    let decode_failed = |detail: String| PageError::DecodeFailed {
        page: page_num,
        detail,
    };

    let reader = ImageReader::new(Cursor::new(raw.as_slice()))
        .with_guessed_format()
        .map_err(|e| decode_failed(e.to_string()))?;
    if reader.format() != Some(ImageFormat::Png) {
        debug!(
            "Page {}: {:?} input, re-encoding instead of passing through",
            page_num,
            reader.format()
        );
        return reencode_page(&raw, page_num, fallback_quality);
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| decode_failed(e.to_string()))?;

    Ok(NormalizedPage {
        buffer: raw,
        format: PageFormat::Png,
        page_num,
        width_px: width,
        height_px: height,
    })
}

/// Drop the alpha channel by compositing onto a white background.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let alpha = u16::from(src[3]);
        for c in 0..3 {
            let blended = (u16::from(src[c]) * alpha + 255 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn reencode_produces_jpeg_with_source_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([10, 120, 200])));
        let page = reencode_page(&png_bytes(&img), 4, 80).expect("reencode");

        assert_eq!(page.format, PageFormat::Jpeg);
        assert_eq!(page.format.as_str(), "JPEG");
        assert_eq!((page.width_px, page.height_px), (40, 30));
        assert_eq!(page.page_num, 4);
        // JPEG SOI marker
        assert_eq!(&page.buffer[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&page.buffer).expect("decodable jpeg");
        assert_eq!((decoded.width(), decoded.height()), (40, 30));
    }

    #[test]
    fn passthrough_keeps_bytes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 9, Rgb([0, 0, 0])));
        let raw = png_bytes(&img);
        let page = passthrough_page(raw.clone(), 2, 80).expect("passthrough");

        assert_eq!(page.format, PageFormat::Png);
        assert_eq!(page.format.as_str(), "PNG");
        assert_eq!((page.width_px, page.height_px), (16, 9));
        assert_eq!(page.buffer, raw);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = reencode_page(b"<html>404</html>", 9, 80).unwrap_err();
        assert!(matches!(err, PageError::DecodeFailed { page: 9, .. }));

        let err = passthrough_page(b"not an image".to_vec(), 3, 80).unwrap_err();
        assert!(matches!(err, PageError::DecodeFailed { page: 3, .. }));
    }

    #[test]
    fn passthrough_reencodes_non_png_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 12, Rgb([90, 90, 90])));
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .expect("jpeg encode");

        let page = passthrough_page(jpeg, 5, 70).expect("fallback to re-encode");
        assert_eq!(page.format, PageFormat::Jpeg);
        assert_eq!((page.width_px, page.height_px), (24, 12));
        assert_eq!(page.page_num, 5);
        assert!(image::load_from_memory(&page.buffer).is_ok());
    }

    #[test]
    fn transparent_pixels_become_white() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let flat = flatten_onto_white(&DynamicImage::ImageRgba8(rgba));

        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[tokio::test]
    async fn async_entry_point_selects_tier() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));
        let raw = png_bytes(&img);

        let full = normalize_page(raw.clone(), 1, true, 60).await.unwrap();
        assert_eq!(full.format, PageFormat::Jpeg);

        let minimal = normalize_page(raw, 1, false, 60).await.unwrap();
        assert_eq!(minimal.format, PageFormat::Png);
    }
}
