//! Color space transforms and illuminant correction.

use ndarray::{Array2, Array3};

use super::RenderError;

/// A 3x3 linear (optionally affine, 3x4-equivalent) color transform.
#[derive(Debug, Clone)]
pub struct ColorTransform {
    matrix: Array2<f64>,
    offset: Option<[f64; 3]>,
}

impl ColorTransform {
    pub fn new(matrix: Array2<f64>) -> Result<Self, RenderError> {
        if matrix.dim() != (3, 3) {
            return Err(RenderError::BadMatrixShape {
                rows: matrix.dim().0,
                cols: matrix.dim().1,
            });
        }
        Ok(Self {
            matrix,
            offset: None,
        })
    }

    /// Affine form: `out = M * in + offset`.
    pub fn with_offset(mut self, offset: [f64; 3]) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn identity() -> Self {
        Self {
            matrix: Array2::eye(3),
            offset: None,
        }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Apply to a `rows x cols x 3` image.
    pub fn apply(&self, image: &Array3<f64>) -> Result<Array3<f64>, RenderError> {
        let (rows, cols, channels) = image.dim();
        if channels != 3 {
            return Err(RenderError::NotRgb { channels });
        }
        let offset = self.offset.unwrap_or([0.0; 3]);
        let mut out = Array3::zeros((rows, cols, 3));
        for i in 0..rows {
            for j in 0..cols {
                for r in 0..3 {
                    let mut v = offset[r];
                    for c in 0..3 {
                        v += self.matrix[[r, c]] * image[[i, j, c]];
                    }
                    out[[i, j, r]] = v;
                }
            }
        }
        Ok(out)
    }
}

/// Illuminant correction heuristics. The diagonal methods scale each
/// channel so a reference statistic matches channel 0's; manual correction
/// carries its matrix with it, so a missing matrix is unrepresentable.
#[derive(Debug, Clone)]
pub enum IlluminantCorrection {
    None,
    /// Scale channel means to match channel 0, optionally re-aimed at a
    /// target white's channel ratios.
    GrayWorld { target: Option<[f64; 3]> },
    /// Like gray-world, but statistics come from the brightest pixels only.
    WhiteWorld { target: Option<[f64; 3]> },
    Manual(Array2<f64>),
}

/// Pixels at or above this fraction of the per-channel maximum count as
/// "white" for the white-world statistic.
pub const WHITE_WORLD_FRACTION: f64 = 0.7;

fn channel_means(image: &Array3<f64>) -> [f64; 3] {
    let (rows, cols, _) = image.dim();
    let n = (rows * cols) as f64;
    let mut means = [0.0; 3];
    for i in 0..rows {
        for j in 0..cols {
            for c in 0..3 {
                means[c] += image[[i, j, c]];
            }
        }
    }
    for m in &mut means {
        *m /= n;
    }
    means
}

/// Mean of each channel over its pixels at or above
/// `WHITE_WORLD_FRACTION` of that channel's maximum.
fn bright_means(image: &Array3<f64>) -> [f64; 3] {
    let (rows, cols, _) = image.dim();
    let mut maxes = [f64::NEG_INFINITY; 3];
    for i in 0..rows {
        for j in 0..cols {
            for c in 0..3 {
                maxes[c] = maxes[c].max(image[[i, j, c]]);
            }
        }
    }
    let mut sums = [0.0; 3];
    let mut counts = [0usize; 3];
    for i in 0..rows {
        for j in 0..cols {
            for c in 0..3 {
                if image[[i, j, c]] >= WHITE_WORLD_FRACTION * maxes[c] {
                    sums[c] += image[[i, j, c]];
                    counts[c] += 1;
                }
            }
        }
    }
    let mut means = [0.0; 3];
    for c in 0..3 {
        if counts[c] > 0 {
            means[c] = sums[c] / counts[c] as f64;
        }
    }
    means
}

fn diagonal_from(means: [f64; 3], target: &Option<[f64; 3]>) -> Array2<f64> {
    let mut matrix = Array2::eye(3);
    for c in 0..3 {
        let mut scale = if means[c] > 0.0 { means[0] / means[c] } else { 1.0 };
        if let Some(white) = target {
            if white[0] > 0.0 {
                scale *= white[c] / white[0];
            }
        }
        matrix[[c, c]] = scale;
    }
    matrix
}

/// Apply an illuminant correction, returning the corrected image and the
/// correction matrix actually used.
pub fn illuminant_correct(
    image: &Array3<f64>,
    method: &IlluminantCorrection,
) -> Result<(Array3<f64>, Array2<f64>), RenderError> {
    let (_, _, channels) = image.dim();
    if channels != 3 {
        return Err(RenderError::NotRgb { channels });
    }

    let matrix = match method {
        IlluminantCorrection::None => Array2::eye(3),
        IlluminantCorrection::GrayWorld { target } => diagonal_from(channel_means(image), target),
        IlluminantCorrection::WhiteWorld { target } => diagonal_from(bright_means(image), target),
        IlluminantCorrection::Manual(matrix) => {
            if matrix.dim() != (3, 3) {
                return Err(RenderError::BadMatrixShape {
                    rows: matrix.dim().0,
                    cols: matrix.dim().1,
                });
            }
            matrix.clone()
        }
    };

    let corrected = ColorTransform::new(matrix.clone())?.apply(image)?;
    Ok((corrected, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::s;

    fn two_tone_image() -> Array3<f64> {
        // A dim region and a bright region with a color cast
        let mut image = Array3::zeros((4, 4, 3));
        for i in 0..4 {
            for j in 0..4 {
                let bright = i < 2;
                let scale = if bright { 1.0 } else { 0.2 };
                image[[i, j, 0]] = 0.9 * scale;
                image[[i, j, 1]] = 0.6 * scale;
                image[[i, j, 2]] = 0.3 * scale;
            }
        }
        image
    }

    #[test]
    fn identity_transform_is_noop() {
        let image = two_tone_image();
        let out = ColorTransform::identity().apply(&image).unwrap();
        for (a, b) in out.iter().zip(image.iter()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn affine_offset_is_added() {
        let image = two_tone_image();
        let out = ColorTransform::identity()
            .with_offset([0.1, 0.0, -0.1])
            .apply(&image)
            .unwrap();
        assert_relative_eq!(out[[0, 0, 0]], image[[0, 0, 0]] + 0.1);
        assert_relative_eq!(out[[0, 0, 2]], image[[0, 0, 2]] - 0.1);
    }

    #[test]
    fn transform_requires_3x3() {
        assert!(matches!(
            ColorTransform::new(Array2::zeros((3, 4))),
            Err(RenderError::BadMatrixShape { .. })
        ));
    }

    #[test]
    fn gray_world_matrix_is_diagonal_and_balances_means() {
        let image = two_tone_image();
        let (corrected, matrix) =
            illuminant_correct(&image, &IlluminantCorrection::GrayWorld { target: None })
                .unwrap();

        for r in 0..3 {
            for c in 0..3 {
                if r != c {
                    assert_relative_eq!(matrix[[r, c]], 0.0);
                }
            }
        }

        let mean = |ch: usize| corrected.slice(s![.., .., ch]).mean().unwrap();
        let reference = mean(0);
        assert_relative_eq!(mean(1), reference, epsilon = 1e-12);
        assert_relative_eq!(mean(2), reference, epsilon = 1e-12);
    }

    #[test]
    fn white_world_uses_bright_pixels_only() {
        let image = two_tone_image();
        let (_, matrix) =
            illuminant_correct(&image, &IlluminantCorrection::WhiteWorld { target: None })
                .unwrap();
        // Bright region has ratios 0.9 : 0.6 : 0.3
        assert_relative_eq!(matrix[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(matrix[[1, 1]], 0.9 / 0.6, epsilon = 1e-12);
        assert_relative_eq!(matrix[[2, 2]], 0.9 / 0.3, epsilon = 1e-12);
    }

    #[test]
    fn gray_world_target_reaims_the_ratios() {
        let image = two_tone_image();
        let target = [1.0, 0.5, 0.25];
        let (corrected, matrix) = illuminant_correct(
            &image,
            &IlluminantCorrection::GrayWorld {
                target: Some(target),
            },
        )
        .unwrap();
        let mean = |img: &Array3<f64>, ch: usize| img.slice(s![.., .., ch]).mean().unwrap();
        let reference = mean(&corrected, 0);
        assert_relative_eq!(mean(&corrected, 1), reference * 0.5, epsilon = 1e-12);
        assert_relative_eq!(mean(&corrected, 2), reference * 0.25, epsilon = 1e-12);
        assert!(matrix[[1, 1]] > 0.0);
    }

    #[test]
    fn manual_matrix_is_used_verbatim() {
        let image = two_tone_image();
        let mut manual = Array2::eye(3);
        manual[[1, 1]] = 2.0;
        let (corrected, matrix) =
            illuminant_correct(&image, &IlluminantCorrection::Manual(manual.clone())).unwrap();
        assert_eq!(matrix, manual);
        assert_relative_eq!(corrected[[0, 0, 1]], image[[0, 0, 1]] * 2.0);
    }

    #[test]
    fn manual_matrix_shape_is_checked() {
        let image = two_tone_image();
        assert!(matches!(
            illuminant_correct(&image, &IlluminantCorrection::Manual(Array2::eye(4))),
            Err(RenderError::BadMatrixShape { .. })
        ));
    }
}
