//! Image utility functions

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// Encode image to PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buffer.into_inner())
}

/// Encode image to JPEG bytes (alpha is dropped)
pub fn encode_jpeg(image: &RgbaImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)
        .context("Failed to encode JPEG")?;
    Ok(buffer.into_inner())
}

/// Build a `data:<mime>;base64,` URL
pub fn to_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
}

/// Split a base64 data URL into its mime type and decoded bytes
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .context("Not a data URL")?;
    let (header, payload) = rest
        .split_once(',')
        .context("Data URL has no payload")?;
    let mime_type = header
        .strip_suffix(";base64")
        .context("Only base64 data URLs are supported")?;

    let bytes = STANDARD
        .decode(payload.trim())
        .context("Invalid base64 payload in data URL")?;
    Ok((mime_type.to_string(), bytes))
}

/// Mime type for a detected image format
pub fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_round_trip() {
        let url = to_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, bytes) = parse_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn test_parse_rejects_plain_urls() {
        assert!(parse_data_url("https://example.com/a.png").is_err());
        assert!(parse_data_url("data:image/png,rawtext").is_err());
    }

    #[test]
    fn test_encode_png_decodes() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }
}
