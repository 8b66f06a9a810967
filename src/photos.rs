//! Listing photo fetch + recompression for MCP image content.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use tracing::warn;

pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Fetch an image, downscale it to at most `max_width`, re-encode as JPEG
/// at `quality` and return `(base64_data, mime_type)`.
///
/// Any failure along the way logs a warning and yields `None`; the caller
/// simply omits that image from the response.
pub async fn fetch_image_as_base64(
    client: &reqwest::Client,
    url: &str,
    max_width: u32,
    quality: u8,
) -> Option<(String, &'static str)> {
    let response = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            warn!(%url, status = %response.status(), "failed to fetch image");
            return None;
        }
        Err(err) => {
            warn!(%url, %err, "failed to fetch image");
            return None;
        }
    };
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%url, %err, "failed to read image body");
            return None;
        }
    };

    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(err) => {
            warn!(%url, %err, "failed to decode image");
            return None;
        }
    };

    // JPEG carries no alpha; composite transparent images onto white first.
    let img = flatten_alpha(img);
    let img = if img.width() > max_width {
        let height = scaled_height(img.width(), img.height(), max_width);
        img.resize_exact(max_width, height, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if let Err(err) = encoder.encode_image(&rgb) {
        warn!(%url, %err, "failed to encode image");
        return None;
    }

    Some((BASE64.encode(out.into_inner()), "image/jpeg"))
}

fn scaled_height(width: u32, height: u32, max_width: u32) -> u32 {
    let scaled = u64::from(height) * u64::from(max_width) / u64::from(width);
    (scaled as u32).max(1)
}

fn flatten_alpha(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let rgba = img.to_rgba8();
    let mut flat = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = f32::from(px[3]) / 255.0;
        let blend = |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        flat.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    DynamicImage::ImageRgb8(flat)
}
