//! Sensor noise injection.
//!
//! All draws come from one explicit generator threaded through the calls,
//! so tests can fix seeds and concurrent workers can run independent
//! streams.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};

/// Mean signal (electrons) at which shot noise switches from an exact
/// Poisson redraw to the Gaussian approximation. Cross-validation data
/// depends on the exact value; override through
/// [`NoiseParams::gaussian_shot_threshold`](super::NoiseParams) if needed.
pub const DEFAULT_GAUSSIAN_SHOT_THRESHOLD: f64 = 15.0;

/// Apply photon shot noise to a mean electron image, in place.
///
/// Pixels at or above `threshold` get additive Gaussian noise with standard
/// deviation `sqrt(mean)`; below it the value is redrawn from a Poisson
/// distribution with that mean, where the Gaussian approximation breaks
/// down.
pub fn apply_shot_noise(electrons: &mut Array2<f64>, threshold: f64, rng: &mut StdRng) {
    electrons.mapv_inplace(|mean| {
        if mean <= 0.0 {
            0.0
        } else if mean >= threshold {
            let normal = Normal::new(mean, mean.sqrt())
                .expect("shot noise parameters must be valid (mean > 0)");
            normal.sample(rng).max(0.0)
        } else {
            let poisson =
                Poisson::new(mean).expect("Poisson parameter must be valid (mean > 0)");
            poisson.sample(rng)
        }
    });
}

/// Multiplicative photo-response non-uniformity: each pixel's gain is drawn
/// from `N(1, sd)`. A zero `sd` leaves the image untouched.
pub fn apply_prnu(electrons: &mut Array2<f64>, sd: f64, rng: &mut StdRng) {
    if sd == 0.0 {
        return;
    }
    let gain = Normal::new(1.0, sd).expect("PRNU parameters must be valid (sd > 0)");
    electrons.mapv_inplace(|v| v * gain.sample(rng));
}

/// Additive dark-signal non-uniformity: each pixel gets an offset drawn
/// from `N(0, sd)` volts. A zero `sd` leaves the frame untouched.
pub fn apply_dsnu(volts: &mut Array2<f64>, sd: f64, rng: &mut StdRng) {
    if sd == 0.0 {
        return;
    }
    let offset = Normal::new(0.0, sd).expect("DSNU parameters must be valid (sd > 0)");
    volts.mapv_inplace(|v| v + offset.sample(rng));
}

/// Add read noise in electrons, drawn from `N(0, read_noise_e)`.
pub fn apply_read_noise(electrons: &mut Array2<f64>, read_noise_e: f64, rng: &mut StdRng) {
    if read_noise_e == 0.0 {
        return;
    }
    let dist =
        Normal::new(0.0, read_noise_e).expect("read noise parameters must be valid (sd > 0)");
    electrons.mapv_inplace(|v| v + dist.sample(rng));
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn shot_noise_preserves_mean() {
        // Bright field: Gaussian branch
        let mut bright = Array2::from_elem((200, 200), 1000.0);
        apply_shot_noise(&mut bright, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(1));
        assert_relative_eq!(bright.mean().unwrap(), 1000.0, max_relative = 0.01);
        // Variance tracks the mean
        let var = bright.mapv(|v| (v - 1000.0) * (v - 1000.0)).mean().unwrap();
        assert_relative_eq!(var, 1000.0, max_relative = 0.1);

        // Dim field: Poisson branch
        let mut dim = Array2::from_elem((200, 200), 3.0);
        apply_shot_noise(&mut dim, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(2));
        assert_relative_eq!(dim.mean().unwrap(), 3.0, max_relative = 0.05);
    }

    #[test]
    fn poisson_branch_yields_integer_counts() {
        let mut dim = Array2::from_elem((32, 32), 2.0);
        apply_shot_noise(&mut dim, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(3));
        for v in dim.iter() {
            assert_relative_eq!(v.fract(), 0.0);
            assert!(*v >= 0.0);
        }
    }

    #[test]
    fn zero_signal_stays_zero() {
        let mut image = Array2::zeros((8, 8));
        apply_shot_noise(&mut image, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(4));
        assert!(image.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn disabled_nonuniformity_is_identity() {
        let mut image = Array2::from_elem((8, 8), 5.0);
        let reference = image.clone();
        apply_prnu(&mut image, 0.0, &mut rng(5));
        apply_dsnu(&mut image, 0.0, &mut rng(5));
        assert_eq!(image, reference);
    }

    #[test]
    fn prnu_is_multiplicative_and_dsnu_additive() {
        let mut gained = Array2::from_elem((100, 100), 10.0);
        apply_prnu(&mut gained, 0.05, &mut rng(6));
        assert_relative_eq!(gained.mean().unwrap(), 10.0, max_relative = 0.01);
        // PRNU scales with the signal
        let sd = gained.std(0.0);
        assert_relative_eq!(sd, 0.5, max_relative = 0.2);

        let mut offset = Array2::zeros((100, 100));
        apply_dsnu(&mut offset, 0.01, &mut rng(7));
        assert_relative_eq!(offset.mean().unwrap(), 0.0, epsilon = 1e-3);
        assert_relative_eq!(offset.std(0.0), 0.01, max_relative = 0.2);
    }

    #[test]
    fn deterministic_with_fixed_seed() {
        let mut a = Array2::from_elem((16, 16), 100.0);
        let mut b = Array2::from_elem((16, 16), 100.0);
        apply_shot_noise(&mut a, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(42));
        apply_shot_noise(&mut b, DEFAULT_GAUSSIAN_SHOT_THRESHOLD, &mut rng(42));
        assert_eq!(a, b);
    }
}
