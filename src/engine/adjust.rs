//! Basic adjustments: brightness, contrast, saturation and blur as one composed filter
//!
//! The three colour adjustments are folded into a single colour matrix
//! (brightness → contrast → saturate) and evaluated in floating point. The blur
//! then runs on that unclamped result and quantization happens exactly once, so
//! the output is not the same as four sequential 8-bit passes.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::utils::math::{gaussian_kernel, to_u8, ColorMatrix};

pub const PERCENT_RANGE: (f32, f32) = (0.0, 200.0);
pub const BLUR_RANGE: (f32, f32) = (0.0, 100.0);

/// Slider units per pixel of blur standard deviation
pub const BLUR_DIVISOR: f32 = 10.0;

/// Adjustment parameters in slider units.
///
/// Percentages are 100 for "unchanged"; blur is tenths of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Adjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub blur: f32,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
        }
    }
}

impl Adjustments {
    pub fn validate(&self) -> EditorResult<()> {
        check_range("brightness", self.brightness, PERCENT_RANGE)?;
        check_range("contrast", self.contrast, PERCENT_RANGE)?;
        check_range("saturation", self.saturation, PERCENT_RANGE)?;
        check_range("blur", self.blur, BLUR_RANGE)?;
        Ok(())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Colour part of the filter as one matrix
    pub fn color_matrix(&self) -> ColorMatrix {
        ColorMatrix::brightness(self.brightness / 100.0)
            .then(&ColorMatrix::contrast(self.contrast / 100.0))
            .then(&ColorMatrix::saturate(self.saturation / 100.0))
    }

    /// Blur standard deviation in pixels
    pub fn blur_sigma(&self) -> f32 {
        self.blur / BLUR_DIVISOR
    }
}

fn check_range(name: &str, value: f32, (min, max): (f32, f32)) -> EditorResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(EditorError::invalid(format!(
            "{} must be between {} and {} (got {})",
            name, min, max, value
        )));
    }
    Ok(())
}

/// Apply the composed filter, returning a new buffer of the same size
pub fn apply_adjustments(src: &RgbaImage, adjustments: &Adjustments) -> EditorResult<RgbaImage> {
    adjustments.validate()?;

    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return Ok(src.clone());
    }

    let matrix = adjustments.color_matrix();
    let mut pixels: Vec<f32> = Vec::with_capacity(src.as_raw().len());
    for px in src.pixels() {
        let [r, g, b] = matrix.apply([px[0] as f32, px[1] as f32, px[2] as f32]);
        pixels.extend_from_slice(&[r, g, b, px[3] as f32]);
    }

    let sigma = adjustments.blur_sigma();
    if sigma > 0.0 {
        premultiply(&mut pixels);
        let kernel = gaussian_kernel(sigma);
        let mut tmp = vec![0.0f32; pixels.len()];
        horizontal_pass(&pixels, &mut tmp, width as usize, height as usize, &kernel);
        vertical_pass(&tmp, &mut pixels, width as usize, height as usize, &kernel);
        unpremultiply(&mut pixels);
    }

    let raw: Vec<u8> = pixels.into_iter().map(to_u8).collect();
    RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| EditorError::Internal(anyhow::anyhow!("adjusted buffer size mismatch")))
}

fn premultiply(pixels: &mut [f32]) {
    for px in pixels.chunks_exact_mut(4) {
        let a = px[3] / 255.0;
        px[0] *= a;
        px[1] *= a;
        px[2] *= a;
    }
}

fn unpremultiply(pixels: &mut [f32]) {
    for px in pixels.chunks_exact_mut(4) {
        if px[3] > 0.0 {
            let a = px[3] / 255.0;
            px[0] /= a;
            px[1] /= a;
            px[2] /= a;
        } else {
            px[0] = 0.0;
            px[1] = 0.0;
            px[2] = 0.0;
        }
    }
}

// Edges are clamped: samples past the border repeat the border pixel.
fn horizontal_pass(src: &[f32], dst: &mut [f32], width: usize, height: usize, kernel: &[f32]) {
    let radius = (kernel.len() / 2) as isize;
    let max_x = width as isize - 1;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius).clamp(0, max_x) as usize;
                let idx = (y * width + sx) * 4;
                for c in 0..4 {
                    acc[c] += kw * src[idx + c];
                }
            }
            let out = (y * width + x) * 4;
            dst[out..out + 4].copy_from_slice(&acc);
        }
    }
}

fn vertical_pass(src: &[f32], dst: &mut [f32], width: usize, height: usize, kernel: &[f32]) {
    let radius = (kernel.len() / 2) as isize;
    let max_y = height as isize - 1;
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius).clamp(0, max_y) as usize;
                let idx = (sy * width + x) * 4;
                for c in 0..4 {
                    acc[c] += kw * src[idx + c];
                }
            }
            let out = (y * width + x) * 4;
            dst[out..out + 4].copy_from_slice(&acc);
        }
    }
}
