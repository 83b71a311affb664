//! Wavelength sampling utilities.
//!
//! Every stage of the pipeline carries a wavelength vector (nanometers,
//! strictly increasing). These helpers validate grids and resample spectral
//! curves when a stage boundary introduces a new sampling.

use thiserror::Error;

use crate::math::interp::{interp_linear, InterpError};

/// Errors raised by wavelength grid validation and resampling.
#[derive(Debug, Error)]
pub enum SpectralError {
    #[error("wavelength vector must be strictly increasing")]
    NotAscending,

    #[error("wavelength vector needs at least one sample")]
    Empty,

    #[error("curve has {curve} samples but the wavelength vector has {wavelengths}")]
    LengthMismatch { curve: usize, wavelengths: usize },

    #[error(transparent)]
    Interp(#[from] InterpError),
}

/// Check that a wavelength vector is non-empty and strictly increasing.
pub fn validate_wavelengths(wavelengths: &[f64]) -> Result<(), SpectralError> {
    if wavelengths.is_empty() {
        return Err(SpectralError::Empty);
    }
    for pair in wavelengths.windows(2) {
        if pair[1] <= pair[0] {
            return Err(SpectralError::NotAscending);
        }
    }
    Ok(())
}

/// True when two wavelength grids sample the same points.
pub fn grids_match(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-9)
}

/// Resample a spectral curve onto a new wavelength grid.
///
/// Linear interpolation between samples; queries outside the source grid
/// clamp to the nearest endpoint, so a curve resampled onto a wider grid
/// holds its edge values rather than inventing zeros.
pub fn resample(
    src_wavelengths: &[f64],
    src_values: &[f64],
    dst_wavelengths: &[f64],
) -> Result<Vec<f64>, SpectralError> {
    validate_wavelengths(src_wavelengths)?;
    validate_wavelengths(dst_wavelengths)?;
    if src_wavelengths.len() != src_values.len() {
        return Err(SpectralError::LengthMismatch {
            curve: src_values.len(),
            wavelengths: src_wavelengths.len(),
        });
    }
    if src_wavelengths.len() == 1 {
        return Ok(vec![src_values[0]; dst_wavelengths.len()]);
    }
    Ok(interp_linear(src_wavelengths, src_values, dst_wavelengths)?)
}
