//! 2D convolution used to apply point spread functions to image planes.

use ndarray::{Array2, ArrayView2};

/// Edge handling for [`convolve2d`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvolveMode {
    /// Only compute output where the kernel fully overlaps the input.
    Valid,
    /// Zero-pad so the output has the same shape as the input.
    Same,
}

/// Convolve an image plane with a kernel.
///
/// The kernel is treated as centered on `(ker_rows / 2, ker_cols / 2)`, which
/// is the convention used by the PSF generator: DC-centered kernels produce
/// no spatial shift.
///
/// # Arguments
/// * `image` - Input plane
/// * `kernel` - Convolution kernel (typically a normalized PSF)
/// * `mode` - Edge handling
pub fn convolve2d(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>, mode: ConvolveMode) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();

    let (out_rows, out_cols) = match mode {
        ConvolveMode::Valid => (
            img_rows.saturating_sub(ker_rows) + 1,
            img_cols.saturating_sub(ker_cols) + 1,
        ),
        ConvolveMode::Same => (img_rows, img_cols),
    };

    if out_rows == 0 || out_cols == 0 {
        return Array2::zeros((0, 0));
    }

    let mut output = Array2::zeros((out_rows, out_cols));

    match mode {
        ConvolveMode::Valid => {
            for i in 0..out_rows {
                for j in 0..out_cols {
                    let mut sum = 0.0;
                    for ki in 0..ker_rows {
                        for kj in 0..ker_cols {
                            sum += image[[i + ki, j + kj]] * kernel[[ki, kj]];
                        }
                    }
                    output[[i, j]] = sum;
                }
            }
        }
        ConvolveMode::Same => {
            let pad_rows = ker_rows / 2;
            let pad_cols = ker_cols / 2;

            for i in 0..out_rows {
                for j in 0..out_cols {
                    let mut sum = 0.0;
                    for ki in 0..ker_rows {
                        for kj in 0..ker_cols {
                            let img_row = i as isize + ki as isize - pad_rows as isize;
                            let img_col = j as isize + kj as isize - pad_cols as isize;
                            if img_row >= 0
                                && img_row < img_rows as isize
                                && img_col >= 0
                                && img_col < img_cols as isize
                            {
                                sum += image[[img_row as usize, img_col as usize]]
                                    * kernel[[ki, kj]];
                            }
                        }
                    }
                    output[[i, j]] = sum;
                }
            }
        }
    }

    output
}
