//! Upload validation and decoding

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::debug;

use crate::error::{EditorError, EditorResult};
use crate::utils::image::parse_data_url;

/// Default upload limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Formats accepted for upload
pub const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

/// Validate an uploaded file before any processing happens.
///
/// The format is sniffed from the content, never trusted from a file name.
pub fn validate_upload(data: &[u8], max_bytes: usize) -> EditorResult<ImageFormat> {
    if data.is_empty() {
        return Err(EditorError::invalid("Uploaded file is empty"));
    }
    if data.len() > max_bytes {
        return Err(EditorError::TooLarge {
            size: data.len(),
            max: max_bytes,
        });
    }

    let format = image::guess_format(data).map_err(|_| EditorError::UnsupportedFormat)?;
    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(EditorError::UnsupportedFormat);
    }
    Ok(format)
}

/// Validate and decode an upload into an RGBA buffer
pub fn decode_upload(data: &[u8], max_bytes: usize) -> EditorResult<RgbaImage> {
    let format = validate_upload(data, max_bytes)?;
    let image = decode_image(data, format)?;
    debug!(
        "Decoded {:?} upload: {}x{}",
        format,
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Decode an image URL that carries its pixels inline (`data:image/...;base64,`)
pub fn decode_data_url(url: &str, max_bytes: usize) -> EditorResult<RgbaImage> {
    let (_, bytes) = parse_data_url(url).map_err(|e| EditorError::invalid(e.to_string()))?;
    decode_upload(&bytes, max_bytes)
}

/// Decode image bytes with EXIF orientation handling
pub fn decode_image(data: &[u8], format: ImageFormat) -> EditorResult<RgbaImage> {
    let image = image::load_from_memory_with_format(data, format)?;
    Ok(apply_exif_orientation(data, image).to_rgba8())
}

/// Decode bytes returned by the model (format sniffed, no size limit)
pub fn decode_model_image(data: &[u8]) -> EditorResult<RgbaImage> {
    let image = image::load_from_memory(data)?;
    Ok(image.to_rgba8())
}

/// Rotate/flip camera uploads so pixels match how they were shot
fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif_data) => exif_data
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1),
        Err(_) => 1,
    };

    // See https://exiftool.org/TagNames/EXIF.html (Orientation)
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::image::{encode_png, to_data_url};
    use image::Rgba;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))).unwrap()
    }

    #[test]
    fn test_decode_png_upload() {
        let img = decode_upload(&png_bytes(8, 6), DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_rejects_non_image() {
        let err = decode_upload(b"just some text", DEFAULT_MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFormat));
    }

    #[test]
    fn test_rejects_unsupported_format() {
        // BMP signature is recognised by `image` but not accepted for upload
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        let err = validate_upload(&bmp, DEFAULT_MAX_UPLOAD_BYTES).unwrap_err();
        assert!(matches!(err, EditorError::UnsupportedFormat));
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let data = png_bytes(4, 4);
        let err = validate_upload(&data, 10).unwrap_err();
        assert!(matches!(err, EditorError::TooLarge { max: 10, .. }));
    }

    #[test]
    fn test_rejects_empty_upload() {
        assert!(matches!(
            validate_upload(&[], DEFAULT_MAX_UPLOAD_BYTES),
            Err(EditorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_decode_data_url() {
        let url = to_data_url("image/png", &png_bytes(2, 3));
        let img = decode_data_url(&url, DEFAULT_MAX_UPLOAD_BYTES).unwrap();
        assert_eq!(img.dimensions(), (2, 3));
    }
}
