//! Math utility functions

/// Affine colour transform on normalized-to-255 RGB values.
///
/// Rows are output channels; the fourth column is a constant offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [[f32; 4]; 3]);

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ]);

    /// CSS `brightness()`: linear slope with no intercept
    pub fn brightness(amount: f32) -> Self {
        Self::scale_offset(amount, 0.0)
    }

    /// CSS `contrast()`: slope around mid grey
    pub fn contrast(amount: f32) -> Self {
        Self::scale_offset(amount, 127.5 * (1.0 - amount))
    }

    /// CSS `saturate()` with Rec. 709 luma weights
    pub fn saturate(s: f32) -> Self {
        ColorMatrix([
            [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0],
            [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0],
            [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0],
        ])
    }

    fn scale_offset(slope: f32, offset: f32) -> Self {
        ColorMatrix([
            [slope, 0.0, 0.0, offset],
            [0.0, slope, 0.0, offset],
            [0.0, 0.0, slope, offset],
        ])
    }

    /// Compose so that `self` is applied first and `next` second
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let a = &self.0;
        let b = &next.0;
        let mut out = [[0.0f32; 4]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for c in 0..3 {
                row[c] = (0..3).map(|k| b[r][k] * a[k][c]).sum();
            }
            row[3] = (0..3).map(|k| b[r][k] * a[k][3]).sum::<f32>() + b[r][3];
        }
        ColorMatrix(out)
    }

    #[inline]
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [
            m[0][0] * rgb[0] + m[0][1] * rgb[1] + m[0][2] * rgb[2] + m[0][3],
            m[1][0] * rgb[0] + m[1][1] * rgb[1] + m[1][2] * rgb[2] + m[1][3],
            m[2][0] * rgb[0] + m[2][1] * rgb[1] + m[2][2] * rgb[2] + m[2][3],
        ]
    }
}

/// Normalized 1D Gaussian kernel covering three standard deviations
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (sigma * 3.0).ceil() as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-radius..=radius)
        .map(|i| {
            let x = i as f32;
            (-x * x / denom).exp()
        })
        .collect();

    let sum: f32 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= sum;
    }
    weights
}

/// Round and clamp a float channel value into a byte
#[inline]
pub fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    #[test]
    fn test_identity_parameters() {
        let m = ColorMatrix::brightness(1.0)
            .then(&ColorMatrix::contrast(1.0))
            .then(&ColorMatrix::saturate(1.0));
        assert!(approx(m.apply([10.0, 128.0, 250.0]), [10.0, 128.0, 250.0]));
    }

    #[test]
    fn test_brightness_scales() {
        let m = ColorMatrix::brightness(1.5);
        assert!(approx(m.apply([100.0, 20.0, 0.0]), [150.0, 30.0, 0.0]));
    }

    #[test]
    fn test_contrast_pivots_on_mid_grey() {
        let m = ColorMatrix::contrast(2.0);
        assert!(approx(m.apply([127.5, 127.5, 127.5]), [127.5, 127.5, 127.5]));
        assert!(approx(m.apply([137.5, 117.5, 127.5]), [147.5, 107.5, 127.5]));
    }

    #[test]
    fn test_zero_saturation_is_grey() {
        let out = ColorMatrix::saturate(0.0).apply([255.0, 0.0, 0.0]);
        assert!((out[0] - out[1]).abs() < 1e-3 && (out[1] - out[2]).abs() < 1e-3);
    }

    #[test]
    fn test_composition_order() {
        // brightness then contrast differs from contrast then brightness
        let bc = ColorMatrix::brightness(2.0).then(&ColorMatrix::contrast(0.5));
        let cb = ColorMatrix::contrast(0.5).then(&ColorMatrix::brightness(2.0));
        assert!(approx(bc.apply([50.0, 50.0, 50.0]), [113.75, 113.75, 113.75]));
        assert!(approx(cb.apply([50.0, 50.0, 50.0]), [177.5, 177.5, 177.5]));
    }

    #[test]
    fn test_gaussian_kernel_normalized() {
        let k = gaussian_kernel(1.5);
        assert_eq!(k.len(), 11);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(gaussian_kernel(0.0), vec![1.0]);
    }
}
