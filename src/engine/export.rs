//! Resolution-aware export

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::utils::image::encode_png;

/// Width of saved-image thumbnails
pub const THUMBNAIL_WIDTH: u32 = 200;

/// Export target sizes offered by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "hd")]
    Hd,
    #[serde(rename = "fhd")]
    Fhd,
    #[serde(rename = "4k")]
    UltraHd,
    #[serde(rename = "thumbnail")]
    Thumbnail,
    #[serde(rename = "square")]
    Square,
}

impl Resolution {
    pub const ALL: [Resolution; 6] = [
        Resolution::Original,
        Resolution::Hd,
        Resolution::Fhd,
        Resolution::UltraHd,
        Resolution::Thumbnail,
        Resolution::Square,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Resolution::Original => "original",
            Resolution::Hd => "hd",
            Resolution::Fhd => "fhd",
            Resolution::UltraHd => "4k",
            Resolution::Thumbnail => "thumbnail",
            Resolution::Square => "square",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Original => "Original Size",
            Resolution::Hd => "HD (1280x720)",
            Resolution::Fhd => "Full HD (1920x1080)",
            Resolution::UltraHd => "4K (3840x2160)",
            Resolution::Thumbnail => "Thumbnail (400x300)",
            Resolution::Square => "Square (1080x1080)",
        }
    }

    /// Fixed target size, `None` for the current size
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self {
            Resolution::Original => None,
            Resolution::Hd => Some((1280, 720)),
            Resolution::Fhd => Some((1920, 1080)),
            Resolution::UltraHd => Some((3840, 2160)),
            Resolution::Thumbnail => Some((400, 300)),
            Resolution::Square => Some((1080, 1080)),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Resolution {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.id() == s)
            .ok_or_else(|| EditorError::invalid(format!("Unknown resolution: {}", s)))
    }
}

#[derive(Debug, Clone)]
pub struct ExportedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

/// Render the buffer at the requested resolution as PNG.
///
/// Fixed resolutions stretch to exactly the target size without keeping the
/// aspect ratio.
pub fn export(src: &RgbaImage, resolution: Resolution) -> EditorResult<ExportedImage> {
    let rendered = match resolution.dimensions() {
        Some((w, h)) if (w, h) != src.dimensions() => {
            imageops::resize(src, w, h, FilterType::Triangle)
        }
        _ => src.clone(),
    };

    let bytes = encode_png(&rendered)?;
    Ok(ExportedImage {
        bytes,
        width: rendered.width(),
        height: rendered.height(),
        file_name: export_file_name(resolution, chrono::Utc::now().timestamp_millis()),
    })
}

pub fn export_file_name(resolution: Resolution, unix_ms: i64) -> String {
    format!("retouch-edited-{}-{}.png", resolution.id(), unix_ms)
}

/// Proportional thumbnail, `THUMBNAIL_WIDTH` pixels wide
pub fn thumbnail(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }
    let height = ((h as u64 * THUMBNAIL_WIDTH as u64) / w as u64).max(1) as u32;
    imageops::resize(src, THUMBNAIL_WIDTH, height, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_parse_resolution_ids() {
        assert_eq!("4k".parse::<Resolution>().unwrap(), Resolution::UltraHd);
        assert_eq!("square".parse::<Resolution>().unwrap(), Resolution::Square);
        assert!("8k".parse::<Resolution>().is_err());
        assert_eq!(
            serde_json::to_string(&Resolution::Fhd).unwrap(),
            "\"fhd\""
        );
    }

    #[test]
    fn test_export_hd_stretches() {
        let src = RgbaImage::from_pixel(300, 300, Rgba([5, 6, 7, 255]));
        let out = export(&src, Resolution::Hd).unwrap();
        assert_eq!((out.width, out.height), (1280, 720));
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1280, 720));
        assert!(out.file_name.starts_with("retouch-edited-hd-"));
        assert!(out.file_name.ends_with(".png"));
    }

    #[test]
    fn test_export_original_keeps_size() {
        let src = RgbaImage::from_pixel(37, 21, Rgba([5, 6, 7, 255]));
        let out = export(&src, Resolution::Original).unwrap();
        assert_eq!((out.width, out.height), (37, 21));
    }

    #[test]
    fn test_file_name_format() {
        assert_eq!(
            export_file_name(Resolution::UltraHd, 1700000000000),
            "retouch-edited-4k-1700000000000.png"
        );
    }

    #[test]
    fn test_thumbnail_is_proportional() {
        let src = RgbaImage::from_pixel(800, 600, Rgba([0, 0, 0, 255]));
        assert_eq!(thumbnail(&src).dimensions(), (200, 150));

        let wide = RgbaImage::from_pixel(2000, 4, Rgba([0, 0, 0, 255]));
        assert_eq!(thumbnail(&wide).dimensions(), (200, 1));
    }
}
