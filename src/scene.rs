//! Scene radiance cubes: the input end of the simulation chain.

use ndarray::Array3;
use thiserror::Error;

use crate::spectral::{self, SpectralError};

/// Errors raised when constructing a [`Scene`].
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("radiance cube has {cube} wavelength planes but the wavelength vector has {wavelengths}")]
    WavelengthMismatch { cube: usize, wavelengths: usize },

    #[error("radiance must be non-negative, found {0}")]
    NegativeRadiance(f64),

    #[error(transparent)]
    Spectral(#[from] SpectralError),
}

/// A scene described by spectral radiance leaving each surface point.
///
/// The cube is `(rows, cols, n_wavelengths)` in photons/s/nm per pixel, and
/// is immutable once built: downstream stages produce new arrays rather than
/// writing back into the scene.
#[derive(Debug, Clone)]
pub struct Scene {
    radiance: Array3<f64>,
    wavelengths: Vec<f64>,
    /// Horizontal field of view in degrees, when known.
    pub fov_degrees: Option<f64>,
    /// Distance from the lens to the scene in meters, when known.
    pub distance_m: Option<f64>,
}

impl Scene {
    /// Build a scene from a radiance cube and its wavelength sampling.
    pub fn new(radiance: Array3<f64>, wavelengths: Vec<f64>) -> Result<Self, SceneError> {
        spectral::validate_wavelengths(&wavelengths)?;
        let n_planes = radiance.dim().2;
        if n_planes != wavelengths.len() {
            return Err(SceneError::WavelengthMismatch {
                cube: n_planes,
                wavelengths: wavelengths.len(),
            });
        }
        if let Some(&bad) = radiance.iter().find(|v| **v < 0.0) {
            return Err(SceneError::NegativeRadiance(bad));
        }
        Ok(Self {
            radiance,
            wavelengths,
            fov_degrees: None,
            distance_m: None,
        })
    }

    /// Spatially uniform scene with the same radiance at every pixel and
    /// wavelength. Useful for calibration and testing.
    pub fn uniform(
        rows: usize,
        cols: usize,
        wavelengths: Vec<f64>,
        radiance: f64,
    ) -> Result<Self, SceneError> {
        let cube = Array3::from_elem((rows, cols, wavelengths.len()), radiance);
        Self::new(cube, wavelengths)
    }

    pub fn with_fov(mut self, fov_degrees: f64) -> Self {
        self.fov_degrees = Some(fov_degrees);
        self
    }

    pub fn with_distance(mut self, distance_m: f64) -> Self {
        self.distance_m = Some(distance_m);
        self
    }

    pub fn radiance(&self) -> &Array3<f64> {
        &self.radiance
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    /// Spatial shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        let (r, c, _) = self.radiance.dim();
        (r, c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_scene_has_expected_shape() {
        let scene = Scene::uniform(4, 6, vec![450.0, 550.0, 650.0], 100.0).unwrap();
        assert_eq!(scene.shape(), (4, 6));
        assert_eq!(scene.wavelengths().len(), 3);
        assert_eq!(scene.radiance()[[2, 3, 1]], 100.0);
    }

    #[test]
    fn rejects_wavelength_mismatch() {
        let cube = Array3::zeros((2, 2, 3));
        assert!(matches!(
            Scene::new(cube, vec![500.0, 600.0]),
            Err(SceneError::WavelengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_negative_radiance() {
        let mut cube = Array3::zeros((2, 2, 1));
        cube[[0, 1, 0]] = -1.0;
        assert!(matches!(
            Scene::new(cube, vec![550.0]),
            Err(SceneError::NegativeRadiance(_))
        ));
    }

    #[test]
    fn rejects_unsorted_wavelengths() {
        let cube = Array3::zeros((2, 2, 2));
        assert!(Scene::new(cube, vec![600.0, 500.0]).is_err());
    }
}
