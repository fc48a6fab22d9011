//! Crop and rotate

use image::{imageops, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Rectangle selected for cropping, in image pixels.
///
/// Negative extents describe a drag that went up/left from its start point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl CropRegion {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    /// Same rectangle with non-negative extents.
    ///
    /// Arithmetic saturates, so extreme request values stay far off-canvas.
    pub fn normalized(&self) -> Self {
        let (x, width) = flip_extent(self.x, self.width);
        let (y, height) = flip_extent(self.y, self.height);
        Self { x, y, width, height }
    }

    /// Intersection with a `width` x `height` image, `None` when empty
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let r = self.normalized();
        if r.width == 0 || r.height == 0 {
            return None;
        }

        let x0 = r.x.max(0);
        let y0 = r.y.max(0);
        let x1 = r.x.saturating_add(r.width).min(width as i64);
        let y1 = r.y.saturating_add(r.height).min(height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

fn flip_extent(start: i64, extent: i64) -> (i64, i64) {
    if extent < 0 {
        (start.saturating_add(extent), extent.saturating_neg())
    } else {
        (start, extent)
    }
}

/// Copy the selected sub-region into a new buffer.
///
/// Returns `None` for zero-area regions and regions entirely outside the image;
/// callers keep their buffer unchanged in that case.
pub fn crop(src: &RgbaImage, region: CropRegion) -> Option<RgbaImage> {
    let (x, y, w, h) = region.clamp_to(src.width(), src.height())?;
    Some(imageops::crop_imm(src, x, y, w, h).to_image())
}

/// Normalize a degree value into `[0, 360)`
pub fn normalize_degrees(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let d = degrees % 360.0;
    let d = if d < 0.0 { d + 360.0 } else { d };
    // -0.0001 % 360 + 360 can round up to exactly 360
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Sine and cosine with exact values on quarter turns
fn sin_cos(degrees: f32) -> (f32, f32) {
    match degrees {
        d if d == 90.0 => (1.0, 0.0),
        d if d == 180.0 => (0.0, -1.0),
        d if d == 270.0 => (-1.0, 0.0),
        d => d.to_radians().sin_cos(),
    }
}

/// Rotate about the canvas centre, keeping the original canvas size.
///
/// Content rotated past the edges is cut off and uncovered pixels become
/// transparent; the canvas is not grown to the rotated bounding box.
pub fn rotate(src: &RgbaImage, degrees: f32) -> RgbaImage {
    let degrees = normalize_degrees(degrees);
    if degrees == 0.0 {
        return src.clone();
    }

    let (width, height) = src.dimensions();
    let (sin, cos) = sin_cos(degrees);
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;

    let mut output = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    for y in 0..height {
        for x in 0..width {
            // Backward mapping from the destination pixel centre
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let src_x = cos * dx + sin * dy + cx - 0.5;
            let src_y = -sin * dx + cos * dy + cy - 0.5;

            if let Some(pixel) = sample_bilinear(src, src_x, src_y) {
                output.put_pixel(x, y, pixel);
            }
        }
    }

    output
}

/// Bilinear sample treating everything outside the image as transparent
fn sample_bilinear(src: &RgbaImage, x: f32, y: f32) -> Option<Rgba<u8>> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    if x <= -1.0 || y <= -1.0 || x >= w as f32 || y >= h as f32 {
        return None;
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    // Interpolate premultiplied so transparent neighbours don't darken edges
    let mut acc = [0.0f32; 4];
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    for (tx, ty, weight) in taps {
        if weight == 0.0 || tx < 0 || ty < 0 || tx >= w || ty >= h {
            continue;
        }
        let p = src.get_pixel(tx as u32, ty as u32);
        let a = p[3] as f32 / 255.0;
        acc[0] += p[0] as f32 * a * weight;
        acc[1] += p[1] as f32 * a * weight;
        acc[2] += p[2] as f32 * a * weight;
        acc[3] += p[3] as f32 * weight;
    }

    if acc[3] <= 0.0 {
        return None;
    }
    let a = acc[3] / 255.0;
    Some(Rgba([
        (acc[0] / a).round().clamp(0.0, 255.0) as u8,
        (acc[1] / a).round().clamp(0.0, 255.0) as u8,
        (acc[2] / a).round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 7, 255]))
    }

    #[test]
    fn test_crop_sub_region() {
        let src = numbered(10, 8);
        let out = crop(&src, CropRegion::new(2, 3, 4, 2)).unwrap();
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(2, 3));
        assert_eq!(out.get_pixel(3, 1), src.get_pixel(5, 4));
    }

    #[test]
    fn test_crop_zero_area_is_noop() {
        let src = numbered(10, 8);
        assert!(crop(&src, CropRegion::new(0, 0, 0, 0)).is_none());
        assert!(crop(&src, CropRegion::new(3, 3, 5, 0)).is_none());
    }

    #[test]
    fn test_crop_outside_is_noop() {
        let src = numbered(10, 8);
        assert!(crop(&src, CropRegion::new(20, 20, 5, 5)).is_none());
        assert!(crop(&src, CropRegion::new(-10, 0, 5, 5)).is_none());
    }

    #[test]
    fn test_crop_clamps_to_bounds() {
        let src = numbered(10, 8);
        let out = crop(&src, CropRegion::new(7, -2, 10, 5)).unwrap();
        assert_eq!(out.dimensions(), (3, 3));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(7, 0));
    }

    #[test]
    fn test_crop_negative_drag() {
        let src = numbered(10, 8);
        let out = crop(&src, CropRegion::new(6, 5, -4, -3)).unwrap();
        assert_eq!(out.dimensions(), (4, 3));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(2, 2));
    }

    #[test]
    fn test_crop_extreme_extents_are_noop() {
        let src = numbered(10, 10);
        assert!(crop(&src, CropRegion::new(0, 0, i64::MIN, 5)).is_none());
        assert!(crop(&src, CropRegion::new(-5, 0, i64::MIN + 1, 5)).is_none());
        assert!(crop(&src, CropRegion::new(0, i64::MIN, 5, i64::MIN)).is_none());
        assert!(crop(&src, CropRegion::new(i64::MAX, 0, i64::MAX, 5)).is_none());

        let r = CropRegion::new(3, 0, i64::MIN, 1).normalized();
        assert_eq!((r.x, r.width), (i64::MIN + 3, i64::MAX));
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(450.0), 90.0);
        assert_eq!(normalize_degrees(f32::NAN), 0.0);
    }

    #[test]
    fn test_rotate_full_turn_is_noop() {
        let src = numbered(6, 4);
        assert_eq!(rotate(&src, 0.0), src);
        assert_eq!(rotate(&src, 360.0), src);
        assert_eq!(rotate(&src, -720.0), src);
    }

    #[test]
    fn test_rotate_180_keeps_size_and_flips() {
        let src = numbered(5, 3);
        let out = rotate(&src, 180.0);
        assert_eq!(out.dimensions(), (5, 3));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(4, 2));
        assert_eq!(rotate(&out, 180.0), src);
    }

    #[test]
    fn test_rotate_90_non_square_keeps_canvas() {
        let src = numbered(4, 2);
        let out = rotate(&src, 90.0);
        assert_eq!(out.dimensions(), (4, 2));
        // Corners fall outside the rotated content
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(3, 1)[3], 0);
        // Centre column is covered
        assert_eq!(out.get_pixel(1, 0), src.get_pixel(1, 1));
    }
}
