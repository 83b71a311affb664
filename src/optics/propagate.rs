//! Propagation of scene radiance through the lens to the image plane.

use ndarray::{s, Array2, Array3};
use rayon::prelude::*;

use crate::math::{convolve2d, ConvolveMode};
use crate::scene::Scene;

use super::{
    compute_otf, off_axis_falloff, otf_to_psf, FrequencySupport, OpticalImage, Optics,
    OpticsError, COS4TH_EXACT_RATIO,
};

/// Assumed horizontal field of view when the scene does not carry one.
pub const DEFAULT_FOV_DEGREES: f64 = 10.0;

/// Tunables for [`propagate`].
#[derive(Debug, Clone)]
pub struct PropagateOptions {
    /// Side length of the synthesized PSF kernel; forced odd so the kernel
    /// has a center sample.
    pub psf_support: usize,
    /// Ratio of image distance to image diagonal above which the cos^4
    /// falloff approximation is used instead of the exact pupil integral.
    pub exact_falloff_ratio: f64,
}

impl Default for PropagateOptions {
    fn default() -> Self {
        Self {
            psf_support: 33,
            exact_falloff_ratio: COS4TH_EXACT_RATIO,
        }
    }
}

/// Form the irradiance image of a scene through a lens.
///
/// Converts radiance to image-plane irradiance, applies the lens spectral
/// transmittance, blurs each wavelength plane with the lens PSF (same-size
/// convolution, planes processed in parallel), and applies the off-axis
/// relative illumination falloff.
pub fn propagate(
    scene: &Scene,
    optics: &Optics,
    options: &PropagateOptions,
) -> Result<OpticalImage, OpticsError> {
    let wavelengths = scene.wavelengths();
    optics.validate_against(wavelengths)?;

    let (rows, cols) = scene.shape();
    let fov = scene.fov_degrees.unwrap_or(DEFAULT_FOV_DEGREES);
    let image_distance = optics.image_distance_m(scene.distance_m);

    // Pixel pitch at the image plane from the field of view
    let width_m = 2.0 * image_distance * (fov.to_radians() / 2.0).tan();
    let spacing = width_m / cols as f64;

    // Radiance to irradiance through a circular aperture
    let m = optics.magnification(scene.distance_m);
    let irr_scale =
        std::f64::consts::PI / (1.0 + 4.0 * optics.f_number.powi(2) * (1.0 + m).powi(2));

    // One OTF stack for all wavelength planes on a kernel-sized support
    let support_n = options.psf_support | 1;
    let support = FrequencySupport::centered(support_n, support_n, spacing);
    let otf = compute_otf(optics, &support, wavelengths)?;

    let planes: Vec<Array2<f64>> = (0..wavelengths.len())
        .into_par_iter()
        .map(|k| {
            let transmittance = optics
                .transmittance
                .as_ref()
                .map(|t| t[k])
                .unwrap_or(1.0);
            let scale = irr_scale * transmittance;
            let plane = scene.radiance().slice(s![.., .., k]).mapv(|v| v * scale);

            let psf = otf_to_psf(&otf.slice(s![.., .., k]).to_owned());
            convolve2d(&plane.view(), &psf.view(), ConvolveMode::Same)
        })
        .collect();

    let falloff = off_axis_falloff(
        rows,
        cols,
        spacing,
        image_distance,
        optics.f_number,
        options.exact_falloff_ratio,
    );

    let mut irradiance = Array3::zeros((rows, cols, wavelengths.len()));
    for (k, plane) in planes.into_iter().enumerate() {
        let shaded = &plane * &falloff;
        irradiance.slice_mut(s![.., .., k]).assign(&shaded);
    }

    Ok(OpticalImage {
        irradiance,
        wavelengths: wavelengths.to_vec(),
        sample_spacing_m: Some(spacing),
        fov_degrees: Some(fov),
    })
}
