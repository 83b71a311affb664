//! Detector characterization: dynamic range, SNR sweep, ISO speed.
//!
//! These operate on the configured noise model only; no frame needs to be
//! computed.

use super::{SensorConfig, SensorError};

/// SNR criterion (linear ratio) defining the ISO speed point.
pub const SNR_ISO_CRITERION: f64 = 10.0;

/// Noise floor in volts: dark-shot, read, DSNU and PRNU-on-dark variances
/// combined in quadrature.
fn noise_floor_v(sensor: &SensorConfig) -> f64 {
    let n = &sensor.noise;
    let cg = n.conversion_gain_v_per_e;
    let dark_e = n.dark_current_e_per_s * sensor.exposure_time_s;
    let dark_v = dark_e * cg;

    let dark_shot_var = dark_e * cg * cg;
    let read_var = (n.read_noise_e * cg).powi(2);
    let dsnu_var = n.dsnu_sd_v * n.dsnu_sd_v;
    let prnu_var = (n.prnu_sd * dark_v).powi(2);

    (dark_shot_var + read_var + dsnu_var + prnu_var).sqrt()
}

/// Total noise variance (volts^2) at a given mean signal voltage.
fn noise_var_at(sensor: &SensorConfig, volts: f64) -> f64 {
    let n = &sensor.noise;
    let cg = n.conversion_gain_v_per_e;
    let dark_e = n.dark_current_e_per_s * sensor.exposure_time_s;

    // Shot noise on signal plus dark electrons
    let shot_var = (volts / cg + dark_e) * cg * cg;
    let read_var = (n.read_noise_e * cg).powi(2);
    let dsnu_var = n.dsnu_sd_v * n.dsnu_sd_v;
    let prnu_var = (n.prnu_sd * volts).powi(2);

    shot_var + read_var + dsnu_var + prnu_var
}

/// Dynamic range in dB: `20 log10(voltage_swing / noise_floor)`.
///
/// Infinite for an ideal noiseless sensor.
pub fn dynamic_range_db(sensor: &SensorConfig) -> f64 {
    let floor = noise_floor_v(sensor);
    if floor == 0.0 {
        return f64::INFINITY;
    }
    20.0 * (sensor.noise.voltage_swing_v / floor).log10()
}

/// SNR in dB over a logarithmic voltage sweep up to the swing.
///
/// Returns `(volts, snr_db)` with `n_points` samples; SNR is
/// `10 log10(v^2 / sigma^2)`.
pub fn snr_curve(sensor: &SensorConfig, n_points: usize) -> (Vec<f64>, Vec<f64>) {
    let swing = sensor.noise.voltage_swing_v;
    let lo = swing * 1.0e-4;
    let mut volts = Vec::with_capacity(n_points);
    let mut snr = Vec::with_capacity(n_points);
    for i in 0..n_points {
        let t = i as f64 / (n_points.max(2) - 1) as f64;
        let v = lo * (swing / lo).powf(t);
        let var = noise_var_at(sensor, v);
        volts.push(v);
        snr.push(if var > 0.0 {
            10.0 * (v * v / var).log10()
        } else {
            f64::INFINITY
        });
    }
    (volts, snr)
}

/// Electron count at which the sensor reaches SNR = 10, solved from the
/// quadratic `e^2 (1 - g^2 p^2) - g^2 e - g^2 sigma_o^2 = 0` with `g` the
/// SNR criterion and `p` the PRNU fraction.
///
/// Fails when the PRNU alone caps SNR below the criterion.
pub fn iso_speed_electrons(sensor: &SensorConfig) -> Result<f64, SensorError> {
    let n = &sensor.noise;
    let g2 = SNR_ISO_CRITERION * SNR_ISO_CRITERION;
    let a = 1.0 - g2 * n.prnu_sd * n.prnu_sd;
    if a <= 0.0 {
        return Err(SensorError::SnrUnreachable {
            target: SNR_ISO_CRITERION,
            prnu_sd: n.prnu_sd,
        });
    }

    let cg = n.conversion_gain_v_per_e;
    let dark_e = n.dark_current_e_per_s * sensor.exposure_time_s;
    let sigma_o2 = n.read_noise_e * n.read_noise_e
        + (n.dsnu_sd_v / cg).powi(2)
        + dark_e;

    Ok((g2 + (g2 * g2 + 4.0 * a * g2 * sigma_o2).sqrt()) / (2.0 * a))
}
