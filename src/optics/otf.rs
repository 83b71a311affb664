//! Optical transfer function evaluation.
//!
//! Diffraction-limited MTF for a circular aperture, the Hopkins defocus
//! series over Bessel terms J0..J6, and bilinear resampling of externally
//! measured shift-invariant OTF data.

use ndarray::{s, Array2, Array3};
use scilib::math::bessel;

use crate::math::interp::GridInterpolator;

use super::{CustomOtf, FrequencyUnit, FrequencySupport, Optics, OpticsError, OpticsModel};

/// Diffraction-limited MTF of a circular aperture at normalized frequency
/// `u` (1.0 = incoherent cutoff).
///
/// Frequencies at or beyond cutoff return 0 rather than erroring; |u| > 1
/// is a physical boundary, not a usage error.
pub fn diffraction_mtf(u: f64) -> f64 {
    let u = u.abs();
    if u >= 1.0 {
        return 0.0;
    }
    (2.0 / std::f64::consts::PI) * (u.acos() - u * (1.0 - u * u).sqrt())
}

/// Hopkins defocused MTF at normalized frequency `u` with defocus phase
/// parameter `alpha = 4*pi/lambda * w20 * u`.
///
/// Series truncated at J6; the alpha -> 0 limit reduces to the
/// diffraction-limited formula, which is evaluated directly for stability.
fn defocused_mtf(u: f64, alpha: f64) -> f64 {
    let u = u.abs();
    if u >= 1.0 {
        return 0.0;
    }
    if alpha.abs() < 1e-9 {
        return diffraction_mtf(u);
    }

    let beta = u.acos();
    let j = |n| bessel::j_n(n, alpha);

    let h1 = beta * j(1) + (2.0 * beta).sin() / 2.0 * (j(1) - j(3))
        - (4.0 * beta).sin() / 4.0 * (j(3) - j(5));
    let h2 = beta.sin() * (j(0) - j(2)) + (3.0 * beta).sin() / 3.0 * (j(2) - j(4))
        - (5.0 * beta).sin() / 5.0 * (j(4) - j(6));

    (4.0 / (std::f64::consts::PI * alpha)) * ((alpha * u).cos() * h1 - (alpha * u).sin() * h2)
}

/// Defocus wavefront coefficient w20 (meters) for a lens of pupil radius
/// `p` and base power `d0` diopters, defocused by `d` diopters.
fn w20(pupil_radius_m: f64, base_power: f64, defocus_diopters: f64) -> f64 {
    pupil_radius_m * pupil_radius_m / 2.0 * (base_power * defocus_diopters)
        / (base_power + defocus_diopters)
}

/// Evaluate the lens MTF at a single wavelength and defocus over a list of
/// image-plane frequencies (cycles/meter). Diagnostic helper for MTF plots.
pub fn mtf_slice(
    optics: &Optics,
    frequencies: &[f64],
    wavelength_nm: f64,
    defocus_diopters: f64,
) -> Vec<f64> {
    let cutoff = optics.cutoff_frequency(wavelength_nm);
    let lambda_m = wavelength_nm * 1e-9;
    let w = w20(
        optics.pupil_radius_m(),
        1.0 / optics.focal_length_m,
        defocus_diopters,
    );
    frequencies
        .iter()
        .map(|&f| {
            let u = f.abs() / cutoff;
            if defocus_diopters == 0.0 {
                diffraction_mtf(u)
            } else {
                let alpha = 4.0 * std::f64::consts::PI / lambda_m * w * u;
                defocused_mtf(u, alpha)
            }
        })
        .collect()
}

fn diffraction_plane(
    optics: &Optics,
    support: &FrequencySupport,
    wavelength_nm: f64,
    defocus_diopters: f64,
) -> Array2<f64> {
    let cutoff = optics.cutoff_frequency(wavelength_nm);
    let lambda_m = wavelength_nm * 1e-9;
    let w = w20(
        optics.pupil_radius_m(),
        1.0 / optics.focal_length_m,
        defocus_diopters,
    );

    Array2::from_shape_fn((support.fy.len(), support.fx.len()), |(i, j)| {
        let nu = (support.fx[j] * support.fx[j] + support.fy[i] * support.fy[i]).sqrt();
        let u = nu / cutoff;
        if defocus_diopters == 0.0 {
            diffraction_mtf(u)
        } else {
            let alpha = 4.0 * std::f64::consts::PI / lambda_m * w * u;
            defocused_mtf(u, alpha)
        }
    })
}

fn custom_plane(
    optics: &Optics,
    custom: &CustomOtf,
    support: &FrequencySupport,
    wavelength_nm: f64,
) -> Result<Array2<f64>, OpticsError> {
    if custom.wavelengths.is_empty() {
        return Err(OpticsError::EmptyCustomOtf);
    }

    // Nearest available wavelength plane
    let plane_idx = custom
        .wavelengths
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = (*a - wavelength_nm).abs();
            let db = (*b - wavelength_nm).abs();
            da.partial_cmp(&db).expect("wavelengths are finite")
        })
        .map(|(i, _)| i)
        .expect("custom OTF has at least one plane");

    // Everything is compared on a cycles/degree basis
    let to_deg = match custom.units {
        FrequencyUnit::CyclesPerDegree => 1.0,
        FrequencyUnit::CyclesPerMillimeter => optics.meters_per_degree() * 1e3,
    };
    let fx_deg: Vec<f64> = custom.fx.iter().map(|f| f * to_deg).collect();
    let fy_deg: Vec<f64> = custom.fy.iter().map(|f| f * to_deg).collect();

    let data = custom.data.slice(s![.., .., plane_idx]).to_owned();
    let interp = GridInterpolator::new(fx_deg, fy_deg, data)?;

    Ok(Array2::from_shape_fn(
        (support.fy.len(), support.fx.len()),
        |(i, j)| {
            let x = optics.to_cycles_per_degree(support.fx[j]);
            let y = optics.to_cycles_per_degree(support.fy[i]);
            interp.at(x, y)
        },
    ))
}

/// Compute the OTF over a frequency support for each wavelength.
///
/// Output is `(fy.len(), fx.len(), wavelengths.len())` with the
/// zero-frequency sample at the support's DC index, normalized to 1 there
/// whenever the raw DC value is non-zero.
pub fn compute_otf(
    optics: &Optics,
    support: &FrequencySupport,
    wavelengths: &[f64],
) -> Result<Array3<f64>, OpticsError> {
    crate::spectral::validate_wavelengths(wavelengths)?;
    if support.fx.is_empty() || support.fy.is_empty() {
        return Err(OpticsError::EmptySupport);
    }
    if let Some(d) = &optics.defocus_diopters {
        if d.len() != wavelengths.len() {
            return Err(OpticsError::DefocusMismatch {
                defocus: d.len(),
                wavelengths: wavelengths.len(),
            });
        }
    }

    let (di, dj) = support.dc_index();
    let mut otf = Array3::zeros((support.fy.len(), support.fx.len(), wavelengths.len()));

    for (k, &wavelength_nm) in wavelengths.iter().enumerate() {
        let defocus = optics
            .defocus_diopters
            .as_ref()
            .map(|d| d[k])
            .unwrap_or(0.0);

        let mut plane = match &optics.model {
            OpticsModel::DiffractionLimited => {
                diffraction_plane(optics, support, wavelength_nm, defocus)
            }
            OpticsModel::ShiftInvariant(custom) => {
                custom_plane(optics, custom, support, wavelength_nm)?
            }
        };

        let dc = plane[[di, dj]];
        if dc != 0.0 && (dc - 1.0).abs() > 1e-12 {
            plane.mapv_inplace(|v| v / dc);
        }

        otf.slice_mut(s![.., .., k]).assign(&plane);
    }

    Ok(otf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn support_and_optics() -> (FrequencySupport, Optics) {
        let optics = Optics::new(4.0, 0.05).unwrap();
        // 3 micron pitch, 17x17 support
        let support = FrequencySupport::centered(17, 17, 3e-6);
        (support, optics)
    }

    #[test]
    fn diffraction_mtf_endpoints() {
        assert_relative_eq!(diffraction_mtf(0.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(diffraction_mtf(1.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(diffraction_mtf(2.5), 0.0);
        // Monotone decreasing inside the passband
        assert!(diffraction_mtf(0.2) > diffraction_mtf(0.4));
        assert!(diffraction_mtf(0.4) > diffraction_mtf(0.8));
    }

    #[test]
    fn defocused_mtf_matches_diffraction_at_small_alpha() {
        for u in [0.1, 0.3, 0.6, 0.9] {
            assert_relative_eq!(defocused_mtf(u, 1e-12), diffraction_mtf(u), epsilon = 1e-9);
        }
    }

    #[test]
    fn defocus_lowers_midband_contrast() {
        let optics = Optics::new(4.0, 0.05).unwrap();
        let cutoff = optics.cutoff_frequency(550.0);
        let freqs: Vec<f64> = (1..10).map(|i| i as f64 * 0.1 * cutoff).collect();
        let sharp = mtf_slice(&optics, &freqs, 550.0, 0.0);
        let blurred = mtf_slice(&optics, &freqs, 550.0, 2.0);
        // Defocus cannot raise contrast in the midband
        for (s, b) in sharp.iter().zip(blurred.iter()).take(5) {
            assert!(b <= s, "defocused {b} exceeds in-focus {s}");
        }
    }

    #[test]
    fn compute_otf_dc_is_unity() {
        let (support, optics) = support_and_optics();
        let otf = compute_otf(&optics, &support, &[450.0, 550.0, 650.0]).unwrap();
        let (di, dj) = support.dc_index();
        for k in 0..3 {
            assert_relative_eq!(otf[[di, dj, k]], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn compute_otf_defocus_length_checked() {
        let (support, optics) = support_and_optics();
        let optics = optics.with_defocus(vec![0.0, 0.5]);
        assert!(matches!(
            compute_otf(&optics, &support, &[450.0, 550.0, 650.0]),
            Err(OpticsError::DefocusMismatch { .. })
        ));
    }

    #[test]
    fn custom_otf_resamples_onto_support() {
        let optics = Optics::new(4.0, 0.05).unwrap();
        // Flat unity OTF over a broad frequency range, one wavelength plane
        let n = 5;
        let data = Array3::from_elem((n, n, 1), 1.0);
        let axis: Vec<f64> = (0..n).map(|i| (i as f64 - 2.0) * 500.0).collect();
        let custom = CustomOtf {
            data,
            fx: axis.clone(),
            fy: axis,
            wavelengths: vec![550.0],
            units: FrequencyUnit::CyclesPerDegree,
        };
        let optics = optics.with_model(OpticsModel::ShiftInvariant(custom));
        let support = FrequencySupport::centered(9, 9, 3e-6);
        let otf = compute_otf(&optics, &support, &[500.0, 600.0]).unwrap();
        // Unity data stays unity after interpolation and DC normalization
        for v in otf.iter() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-9);
        }
    }
}
