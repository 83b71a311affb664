//! Conversions between optical transfer functions and point spread
//! functions.

use ndarray::Array2;
use rustfft::num_complex::Complex;

use crate::math::fft2::{fft2, fftshift, ifft2, ifftshift};

/// Convert a DC-centered OTF plane into an energy-normalized PSF.
///
/// The returned kernel is DC-centered (peak at the middle for a
/// non-pathological OTF) and rescaled to sum to 1 so that applying it
/// conserves image energy.
pub fn otf_to_psf(otf: &Array2<f64>) -> Array2<f64> {
    let unshifted = ifftshift(otf);
    let complex = unshifted.mapv(|v| Complex::new(v, 0.0));
    let spatial = ifft2(&complex);
    let real = spatial.mapv(|c| c.re);
    let mut centered = fftshift(&real);

    let total = centered.sum();
    if total != 0.0 {
        centered.mapv_inplace(|v| v / total);
    }
    centered
}

/// Convert a DC-centered PSF back into a DC-centered OTF plane.
///
/// The imaginary part of the transform is dropped; PSFs produced by
/// [`otf_to_psf`] from real symmetric OTFs transform back to real planes.
pub fn psf_to_otf(psf: &Array2<f64>) -> Array2<f64> {
    let unshifted = ifftshift(psf);
    let complex = unshifted.mapv(|v| Complex::new(v, 0.0));
    let freq = fft2(&complex);
    fftshift(&freq.mapv(|c| c.re))
}
