//! Lens modeling: optical transfer functions, point spread functions, and
//! radiometric propagation from scene radiance to sensor-plane irradiance.

pub mod falloff;
pub mod otf;
pub mod propagate;
pub mod psf;

use ndarray::Array3;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::math::interp::InterpError;
use crate::spectral::{self, SpectralError};

pub use falloff::{off_axis_falloff, COS4TH_EXACT_RATIO};
pub use otf::{compute_otf, diffraction_mtf, mtf_slice};
pub use propagate::{propagate, PropagateOptions, DEFAULT_FOV_DEGREES};
pub use psf::{otf_to_psf, psf_to_otf};

/// Errors raised by the optics stage.
#[derive(Debug, Error)]
pub enum OpticsError {
    #[error("f-number must be positive, got {0}")]
    InvalidFNumber(f64),

    #[error("focal length must be positive, got {0}")]
    InvalidFocalLength(f64),

    #[error("transmittance has {transmittance} samples but the wavelength vector has {wavelengths}")]
    TransmittanceMismatch {
        transmittance: usize,
        wavelengths: usize,
    },

    #[error("defocus has {defocus} samples but the wavelength vector has {wavelengths}")]
    DefocusMismatch { defocus: usize, wavelengths: usize },

    #[error("frequency support must contain at least one sample per axis")]
    EmptySupport,

    #[error("custom OTF has no wavelength planes")]
    EmptyCustomOtf,

    #[error(transparent)]
    Spectral(#[from] SpectralError),

    #[error(transparent)]
    Interp(#[from] InterpError),
}

/// Unit of a spatial frequency axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyUnit {
    CyclesPerDegree,
    CyclesPerMillimeter,
}

/// Externally measured shift-invariant OTF samples.
///
/// `data` is `(fy.len(), fx.len(), wavelengths.len())`; the axes are in
/// `units` and converted to a cycles/degree basis at evaluation time.
#[derive(Debug, Clone)]
pub struct CustomOtf {
    pub data: Array3<f64>,
    pub fx: Vec<f64>,
    pub fy: Vec<f64>,
    pub wavelengths: Vec<f64>,
    pub units: FrequencyUnit,
}

/// Which transfer-function model the lens uses.
#[derive(Debug, Clone)]
pub enum OpticsModel {
    /// Circular-aperture diffraction, optionally defocused per wavelength.
    DiffractionLimited,
    /// Externally supplied shift-invariant OTF samples.
    ShiftInvariant(CustomOtf),
}

/// Lens configuration.
#[derive(Debug, Clone)]
pub struct Optics {
    /// f-number (focal length over aperture diameter), > 0.
    pub f_number: f64,
    /// Focal length in meters, > 0.
    pub focal_length_m: f64,
    /// Spectral transmittance, one sample per wavelength; `None` means unity.
    pub transmittance: Option<Vec<f64>>,
    /// Defocus in diopters, one sample per wavelength; `None` means in focus.
    pub defocus_diopters: Option<Vec<f64>>,
    pub model: OpticsModel,
}

impl Optics {
    pub fn new(f_number: f64, focal_length_m: f64) -> Result<Self, OpticsError> {
        if f_number <= 0.0 || !f_number.is_finite() {
            return Err(OpticsError::InvalidFNumber(f_number));
        }
        if focal_length_m <= 0.0 || !focal_length_m.is_finite() {
            return Err(OpticsError::InvalidFocalLength(focal_length_m));
        }
        Ok(Self {
            f_number,
            focal_length_m,
            transmittance: None,
            defocus_diopters: None,
            model: OpticsModel::DiffractionLimited,
        })
    }

    pub fn with_transmittance(mut self, transmittance: Vec<f64>) -> Self {
        self.transmittance = Some(transmittance);
        self
    }

    pub fn with_defocus(mut self, defocus_diopters: Vec<f64>) -> Self {
        self.defocus_diopters = Some(defocus_diopters);
        self
    }

    pub fn with_model(mut self, model: OpticsModel) -> Self {
        self.model = model;
        self
    }

    /// Aperture (pupil) radius in meters.
    pub fn pupil_radius_m(&self) -> f64 {
        self.focal_length_m / (2.0 * self.f_number)
    }

    /// Incoherent diffraction cutoff in cycles/meter at the image plane.
    pub fn cutoff_frequency(&self, wavelength_nm: f64) -> f64 {
        1.0 / (wavelength_nm * 1e-9 * self.f_number)
    }

    /// Image-plane distance for a scene at `distance_m` (thin lens), or the
    /// focal length for a scene at infinity.
    pub fn image_distance_m(&self, scene_distance_m: Option<f64>) -> f64 {
        match scene_distance_m {
            Some(d) if d > self.focal_length_m => {
                1.0 / (1.0 / self.focal_length_m - 1.0 / d)
            }
            _ => self.focal_length_m,
        }
    }

    /// Thin-lens magnification magnitude for a scene at `distance_m`;
    /// 0 for a scene at infinity.
    pub fn magnification(&self, scene_distance_m: Option<f64>) -> f64 {
        match scene_distance_m {
            Some(d) if d > self.focal_length_m => self.focal_length_m / (d - self.focal_length_m),
            _ => 0.0,
        }
    }

    /// Convert a cycles/meter image-plane frequency to cycles/degree.
    pub fn to_cycles_per_degree(&self, cycles_per_meter: f64) -> f64 {
        cycles_per_meter * self.meters_per_degree()
    }

    /// Image-plane extent subtended by one degree of field angle.
    pub fn meters_per_degree(&self) -> f64 {
        self.focal_length_m * (std::f64::consts::PI / 180.0).tan()
    }

    fn validate_against(&self, wavelengths: &[f64]) -> Result<(), OpticsError> {
        spectral::validate_wavelengths(wavelengths)?;
        if let Some(t) = &self.transmittance {
            if t.len() != wavelengths.len() {
                return Err(OpticsError::TransmittanceMismatch {
                    transmittance: t.len(),
                    wavelengths: wavelengths.len(),
                });
            }
        }
        if let Some(d) = &self.defocus_diopters {
            if d.len() != wavelengths.len() {
                return Err(OpticsError::DefocusMismatch {
                    defocus: d.len(),
                    wavelengths: wavelengths.len(),
                });
            }
        }
        Ok(())
    }
}

/// A DC-centered rectangular grid of spatial frequencies (cycles/meter).
///
/// Both axes are strictly increasing with the zero-frequency sample at
/// index `len / 2`, matching the layout [`compute_otf`] produces and the
/// FFT shift helpers expect.
#[derive(Debug, Clone)]
pub struct FrequencySupport {
    pub fx: Vec<f64>,
    pub fy: Vec<f64>,
}

impl FrequencySupport {
    /// Support for an `rows x cols` grid sampled every `spacing_m` meters.
    pub fn centered(rows: usize, cols: usize, spacing_m: f64) -> Self {
        let axis = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|i| (i as isize - (n / 2) as isize) as f64 / (n as f64 * spacing_m))
                .collect()
        };
        Self {
            fx: axis(cols),
            fy: axis(rows),
        }
    }

    /// Index of the zero-frequency sample on each axis `(row, col)`.
    pub fn dc_index(&self) -> (usize, usize) {
        (self.fy.len() / 2, self.fx.len() / 2)
    }
}

/// The irradiance image formed at the sensor plane.
#[derive(Debug, Clone)]
pub struct OpticalImage {
    pub irradiance: Array3<f64>,
    pub wavelengths: Vec<f64>,
    /// Physical pixel pitch at the image plane, meters.
    pub sample_spacing_m: Option<f64>,
    pub fov_degrees: Option<f64>,
}

impl OpticalImage {
    pub fn new(irradiance: Array3<f64>, wavelengths: Vec<f64>) -> Result<Self, OpticsError> {
        spectral::validate_wavelengths(&wavelengths)?;
        if irradiance.dim().2 != wavelengths.len() {
            return Err(OpticsError::Spectral(SpectralError::LengthMismatch {
                curve: irradiance.dim().2,
                wavelengths: wavelengths.len(),
            }));
        }
        Ok(Self {
            irradiance,
            wavelengths,
            sample_spacing_m: None,
            fov_degrees: None,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        let (r, c, _) = self.irradiance.dim();
        (r, c)
    }
}

/// Reference lens models.
pub mod models {
    use super::*;

    /// Diffraction-limited f/4, 50 mm lens with unity transmittance.
    pub static DIFFRACTION_F4: Lazy<Optics> =
        Lazy::new(|| Optics::new(4.0, 0.050).expect("reference lens parameters are valid"));
}
