//! Off-axis relative illumination at the image plane.

use ndarray::Array2;

/// When the image distance exceeds the image diagonal by this ratio, the
/// cos^4 approximation replaces the exact pupil integral. Cross-validation
/// data depends on the exact value; override through
/// [`PropagateOptions::exact_falloff_ratio`](super::PropagateOptions).
pub const COS4TH_EXACT_RATIO: f64 = 10.0;

/// Relative irradiance falloff across an `rows x cols` image sampled every
/// `spacing_m` meters, for a lens of the given f-number focused at
/// `image_distance_m`.
///
/// Uses the exact circular-pupil formula when
/// `image_distance / image_diagonal < exact_ratio`, otherwise the cos^4
/// approximation. On-axis response is 1 in both branches.
pub fn off_axis_falloff(
    rows: usize,
    cols: usize,
    spacing_m: f64,
    image_distance_m: f64,
    f_number: f64,
    exact_ratio: f64,
) -> Array2<f64> {
    let cy = (rows as f64 - 1.0) / 2.0;
    let cx = (cols as f64 - 1.0) / 2.0;
    let diagonal =
        ((rows as f64 * spacing_m).powi(2) + (cols as f64 * spacing_m).powi(2)).sqrt();

    let use_exact = diagonal > 0.0 && image_distance_m / diagonal < exact_ratio;

    if use_exact {
        // Irradiance from a circular exit pupil seen from an off-axis image
        // point, normalized to the on-axis value.
        let a = 1.0 / (2.0 * f_number);
        let a2 = a * a;
        let on_axis = 2.0 * a2 / (1.0 + a2);
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            let x = (j as f64 - cx) * spacing_m;
            let y = (i as f64 - cy) * spacing_m;
            let rho2 = (x * x + y * y) / (image_distance_m * image_distance_m);
            let denom = (rho2 * rho2 + 2.0 * rho2 * (1.0 - a2) + (1.0 + a2).powi(2)).sqrt();
            let value = 1.0 - (1.0 + rho2 - a2) / denom;
            value / on_axis
        })
    } else {
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            let x = (j as f64 - cx) * spacing_m;
            let y = (i as f64 - cy) * spacing_m;
            let cos_theta =
                image_distance_m / (x * x + y * y + image_distance_m * image_distance_m).sqrt();
            cos_theta.powi(4)
        })
    }
}
