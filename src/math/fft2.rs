//! 2-D FFT helpers built from row/column 1-D passes.
//!
//! Used to move between optical transfer functions (frequency domain) and
//! point spread functions (spatial domain).

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

fn transform2(input: &Array2<Complex<f64>>, inverse: bool) -> Array2<Complex<f64>> {
    let (rows, cols) = input.dim();
    let mut planner = FftPlanner::new();
    let row_fft = if inverse {
        planner.plan_fft_inverse(cols)
    } else {
        planner.plan_fft_forward(cols)
    };
    let col_fft = if inverse {
        planner.plan_fft_inverse(rows)
    } else {
        planner.plan_fft_forward(rows)
    };

    let mut work = input.clone();

    let mut row_buf = vec![Complex::new(0.0, 0.0); cols];
    for i in 0..rows {
        for j in 0..cols {
            row_buf[j] = work[[i, j]];
        }
        row_fft.process(&mut row_buf);
        for j in 0..cols {
            work[[i, j]] = row_buf[j];
        }
    }

    let mut col_buf = vec![Complex::new(0.0, 0.0); rows];
    for j in 0..cols {
        for i in 0..rows {
            col_buf[i] = work[[i, j]];
        }
        col_fft.process(&mut col_buf);
        for i in 0..rows {
            work[[i, j]] = col_buf[i];
        }
    }

    if inverse {
        // rustfft leaves the inverse unscaled
        let scale = 1.0 / (rows * cols) as f64;
        work.mapv_inplace(|v| v * scale);
    }

    work
}

/// Forward 2-D FFT.
pub fn fft2(input: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform2(input, false)
}

/// Inverse 2-D FFT, scaled by `1 / (rows * cols)`.
pub fn ifft2(input: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform2(input, true)
}

/// Move the DC sample from index 0 to the center of each axis.
pub fn fftshift<T: Clone>(input: &Array2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    let (dr, dc) = (rows - rows / 2, cols - cols / 2);
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        input[[(i + dr) % rows, (j + dc) % cols]].clone()
    })
}

/// Inverse of [`fftshift`]: move the centered DC sample back to index 0.
pub fn ifftshift<T: Clone>(input: &Array2<T>) -> Array2<T> {
    let (rows, cols) = input.dim();
    let (dr, dc) = (rows / 2, cols / 2);
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        input[[(i + dr) % rows, (j + dc) % cols]].clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fft_roundtrip_recovers_input() {
        let input = Array2::from_shape_fn((8, 8), |(i, j)| {
            Complex::new((i * 13 + j * 7) as f64 % 5.0, 0.0)
        });
        let back = ifft2(&fft2(&input));
        for (a, b) in back.iter().zip(input.iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-10);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn impulse_transforms_flat() {
        let mut input = Array2::from_elem((4, 4), Complex::new(0.0, 0.0));
        input[[0, 0]] = Complex::new(1.0, 0.0);
        let out = fft2(&input);
        for v in out.iter() {
            assert_relative_eq!(v.re, 1.0, epsilon = 1e-12);
            assert_relative_eq!(v.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn shift_roundtrip_even_and_odd() {
        for n in [4usize, 5] {
            let input = Array2::from_shape_fn((n, n), |(i, j)| (i * n + j) as f64);
            let back = ifftshift(&fftshift(&input));
            assert_eq!(back, input);
        }
    }

    #[test]
    fn fftshift_centers_dc() {
        let mut input = Array2::zeros((5, 5));
        input[[0, 0]] = 1.0;
        let shifted = fftshift(&input);
        assert_relative_eq!(shifted[[2, 2]], 1.0);
    }
}
