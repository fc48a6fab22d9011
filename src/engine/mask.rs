//! Mask capture for generative fill
//!
//! The mask is a same-size RGBA overlay. Painting composites translucent red
//! circles source-over; erasing removes coverage destination-out with the same
//! brush opacity.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::utils::image::encode_png;

/// Brush colour channels
pub const MASK_COLOR: [u8; 3] = [255, 0, 0];

/// Brush opacity for both paint and erase
pub const BRUSH_ALPHA: f32 = 0.5;

pub const DEFAULT_BRUSH_RADIUS: f32 = 20.0;
pub const MAX_BRUSH_RADIUS: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskMode {
    #[default]
    Paint,
    Erase,
}

fn default_radius() -> f32 {
    DEFAULT_BRUSH_RADIUS
}

/// Pointer path captured while a paint gesture was active
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrushStroke {
    #[serde(default)]
    pub mode: MaskMode,
    #[serde(default = "default_radius")]
    pub radius: f32,
    pub points: Vec<(f32, f32)>,
}

impl BrushStroke {
    pub fn validate(&self) -> EditorResult<()> {
        if !self.radius.is_finite() || self.radius < 1.0 || self.radius > MAX_BRUSH_RADIUS {
            return Err(EditorError::invalid(format!(
                "Brush radius must be between 1 and {}",
                MAX_BRUSH_RADIUS
            )));
        }
        if self
            .points
            .iter()
            .any(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(EditorError::invalid("Stroke points must be finite"));
        }
        Ok(())
    }

    /// Stamp centres on a `width` x `height` canvas: captured points plus
    /// interpolated points in between.
    ///
    /// Each segment is first clipped to the canvas grown by the radius, so the
    /// count is bounded by the canvas size no matter how far the points lie.
    pub fn stamps_within(&self, width: u32, height: u32) -> Vec<(f32, f32)> {
        let spacing = (self.radius / 4.0).max(1.0) as f64;
        let r = self.radius as f64;
        let bounds = (-r, -r, width as f64 + r, height as f64 + r);
        let mut out: Vec<(f32, f32)> = Vec::new();

        fn push(out: &mut Vec<(f32, f32)>, p: (f64, f64)) {
            let p = (p.0 as f32, p.1 as f32);
            if out.last() != Some(&p) {
                out.push(p);
            }
        }

        if let [only] = self.points.as_slice() {
            let p = (only.0 as f64, only.1 as f64);
            if clip_segment(p, p, bounds).is_some() {
                push(&mut out, p);
            }
            return out;
        }

        for pair in self.points.windows(2) {
            let a = (pair[0].0 as f64, pair[0].1 as f64);
            let b = (pair[1].0 as f64, pair[1].1 as f64);
            let Some((a, b)) = clip_segment(a, b, bounds) else {
                continue;
            };

            push(&mut out, a);
            let (dx, dy) = (b.0 - a.0, b.1 - a.1);
            let steps = ((dx * dx + dy * dy).sqrt() / spacing).ceil() as usize;
            for i in 1..=steps {
                let t = i as f64 / steps as f64;
                push(&mut out, (a.0 + dx * t, a.1 + dy * t));
            }
        }
        out
    }
}

/// Liang-Barsky clip of the segment `a`-`b` to `(min_x, min_y, max_x, max_y)`
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    (min_x, min_y, max_x, max_y): (f64, f64, f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);

    for (p, q) in [
        (-dx, a.0 - min_x),
        (dx, max_x - a.0),
        (-dy, a.1 - min_y),
        (dy, max_y - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    // Huge coordinates lose precision in `a + d * t`; keep the result inside
    let clamp = |x: f64, y: f64| (x.clamp(min_x, max_x), y.clamp(min_y, max_y));
    Some((
        clamp(a.0 + dx * t0, a.1 + dy * t0),
        clamp(a.0 + dx * t1, a.1 + dy * t1),
    ))
}

#[derive(Debug, Clone)]
pub struct Mask {
    pixels: RgbaImage,
}

impl Mask {
    /// Fully transparent mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
        }
    }

    /// Accept a client-rendered mask; it must match the edited image size
    pub fn from_image(image: RgbaImage, expected: (u32, u32)) -> EditorResult<Self> {
        if image.dimensions() != expected {
            return Err(EditorError::invalid(format!(
                "Mask is {}x{} but the image is {}x{}",
                image.width(),
                image.height(),
                expected.0,
                expected.1
            )));
        }
        Ok(Self { pixels: image })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when no pixel carries any alpha
    pub fn is_empty(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    /// Number of pixels with non-zero alpha
    pub fn coverage(&self) -> usize {
        self.pixels.pixels().filter(|p| p[3] != 0).count()
    }

    pub fn clear(&mut self) {
        for p in self.pixels.pixels_mut() {
            *p = Rgba([0, 0, 0, 0]);
        }
    }

    pub fn apply_stroke(&mut self, stroke: &BrushStroke) -> EditorResult<()> {
        stroke.validate()?;
        let (w, h) = self.pixels.dimensions();
        for (x, y) in stroke.stamps_within(w, h) {
            self.stamp(x, y, stroke.radius, stroke.mode);
        }
        Ok(())
    }

    /// One filled circle; a pixel is covered when its centre lies inside
    pub fn stamp(&mut self, cx: f32, cy: f32, radius: f32, mode: MaskMode) {
        let (w, h) = self.pixels.dimensions();
        if w == 0 || h == 0 {
            return;
        }

        let x_min = (cx - radius).floor().max(0.0) as i64;
        let y_min = (cy - radius).floor().max(0.0) as i64;
        let x_max = ((cx + radius).ceil() as i64).min(w as i64 - 1);
        let y_max = ((cy + radius).ceil() as i64).min(h as i64 - 1);
        let r2 = radius * radius;

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let p = self.pixels.get_pixel_mut(x as u32, y as u32);
                *p = match mode {
                    MaskMode::Paint => paint_over(*p),
                    MaskMode::Erase => erase(*p),
                };
            }
        }
    }

    pub fn to_png(&self) -> anyhow::Result<Vec<u8>> {
        encode_png(&self.pixels)
    }
}

fn paint_over(p: Rgba<u8>) -> Rgba<u8> {
    // Source-over in 8-bit alpha units: a' = 255*s + a*(1 - s)
    let out = 255.0 * BRUSH_ALPHA + p[3] as f32 * (1.0 - BRUSH_ALPHA);
    Rgba([
        MASK_COLOR[0],
        MASK_COLOR[1],
        MASK_COLOR[2],
        out.round().min(255.0) as u8,
    ])
}

fn erase(p: Rgba<u8>) -> Rgba<u8> {
    let a = (p[3] as f32 * (1.0 - BRUSH_ALPHA)).floor() as u8;
    if a == 0 {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([p[0], p[1], p[2], a])
    }
}
