//! Quantum-catch integration, auto-exposure and frame computation.

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{thread_rng, RngCore, SeedableRng};

use crate::optics::OpticalImage;

use super::noise::{apply_dsnu, apply_prnu, apply_read_noise, apply_shot_noise};
use super::{SensorConfig, SensorError, SensorFrame};

/// Per-pixel electron collection rate (electrons/second).
///
/// For a monochrome sensor this is one plane; for a mosaic sensor one plane
/// per entry of the channel table, each weighted by that channel's filter
/// spectrum.
enum ElectronRate {
    Monochrome(Array2<f64>),
    PerChannel(Array3<f64>),
}

fn electron_rate(
    sensor: &SensorConfig,
    image: &OpticalImage,
) -> Result<ElectronRate, SensorError> {
    if sensor.wavelengths.len() != image.wavelengths.len() {
        return Err(SensorError::WavelengthMismatch {
            sensor: sensor.wavelengths.len(),
            image: image.wavelengths.len(),
        });
    }
    if (sensor.rows, sensor.cols) != image.shape() {
        return Err(SensorError::SpatialMismatch {
            sensor: (sensor.rows, sensor.cols),
            image: image.shape(),
        });
    }

    let (rows, cols) = image.shape();
    let n_wave = image.wavelengths.len();

    match &sensor.cfa {
        None => {
            let mut rate = Array2::zeros((rows, cols));
            for i in 0..rows {
                for j in 0..cols {
                    let mut sum = 0.0;
                    for k in 0..n_wave {
                        sum += image.irradiance[[i, j, k]] * sensor.quantum_efficiency[k];
                    }
                    rate[[i, j]] = sum;
                }
            }
            Ok(ElectronRate::Monochrome(rate))
        }
        Some(_) => {
            let n_channels = sensor.channel_names.len();
            let mut rate = Array3::zeros((rows, cols, n_channels));
            for i in 0..rows {
                for j in 0..cols {
                    for c in 0..n_channels {
                        let mut sum = 0.0;
                        for k in 0..n_wave {
                            sum += image.irradiance[[i, j, k]]
                                * sensor.quantum_efficiency[k]
                                * sensor.channel_filters[[k, c]];
                        }
                        rate[[i, j, c]] = sum;
                    }
                }
            }
            Ok(ElectronRate::PerChannel(rate))
        }
    }
}

/// Solve for the exposure time putting the peak quantum catch at
/// `target_level` of the voltage swing.
///
/// Returns 0 when the image catches no signal at all.
pub fn auto_exposure(
    sensor: &SensorConfig,
    image: &OpticalImage,
    target_level: f64,
) -> Result<f64, SensorError> {
    let swing = sensor.noise.voltage_swing_v;
    if swing <= 0.0 {
        return Err(SensorError::NonPositiveSwing(swing));
    }

    let volts_per_electron = sensor.noise.conversion_gain_v_per_e * sensor.noise.analog_gain;
    let peak = match electron_rate(sensor, image)? {
        ElectronRate::Monochrome(rate) => rate.iter().cloned().fold(0.0, f64::max),
        ElectronRate::PerChannel(rate) => rate.iter().cloned().fold(0.0, f64::max),
    } * volts_per_electron;

    if peak == 0.0 {
        return Ok(0.0);
    }
    Ok(target_level * swing / peak)
}

/// Expose the sensor to an optical image and produce a voltage frame.
///
/// The quantum catch is mosaiced through the CFA when one is configured,
/// then noise is injected in a fixed order: dark current and shot noise on
/// the electron image, pixel non-uniformities, the deterministic analog
/// gain/offset, and finally clipping to the voltage swing.
pub fn compute(
    sensor: &SensorConfig,
    image: &OpticalImage,
    seed: Option<u64>,
) -> Result<SensorFrame, SensorError> {
    let t = sensor.exposure_time_s;
    if t <= 0.0 {
        return Err(SensorError::NonPositiveExposure(t));
    }
    let swing = sensor.noise.voltage_swing_v;
    if swing <= 0.0 {
        return Err(SensorError::NonPositiveSwing(swing));
    }

    let (rows, cols) = image.shape();

    // Mean collected electrons per pixel over the exposure
    let mut electrons = match electron_rate(sensor, image)? {
        ElectronRate::Monochrome(rate) => rate.mapv(|r| r * t),
        ElectronRate::PerChannel(rate) => {
            let cfa = sensor.cfa.as_ref().expect("per-channel rate implies a CFA");
            if !cfa.tiles_evenly(rows, cols) {
                return Err(SensorError::CfaTileMismatch {
                    tile: cfa.size(),
                    rows,
                    cols,
                });
            }
            Array2::from_shape_fn((rows, cols), |(i, j)| {
                let channel = cfa.channel_at(i, j);
                let c = sensor
                    .channel_index(channel)
                    .expect("CFA channels validated against the channel table");
                rate[[i, j, c]] * t
            })
        }
    };

    let mut volts;
    if sensor.noise.enabled {
        let seed = seed.unwrap_or_else(|| thread_rng().next_u64());
        let mut rng = StdRng::seed_from_u64(seed);

        let dark = sensor.noise.dark_current_e_per_s * t;
        if dark > 0.0 {
            electrons.mapv_inplace(|v| v + dark);
        }

        apply_shot_noise(&mut electrons, sensor.noise.gaussian_shot_threshold, &mut rng);
        apply_read_noise(&mut electrons, sensor.noise.read_noise_e, &mut rng);
        apply_prnu(&mut electrons, sensor.noise.prnu_sd, &mut rng);

        volts = electrons.mapv(|e| e * sensor.noise.conversion_gain_v_per_e);
        apply_dsnu(&mut volts, sensor.noise.dsnu_sd_v, &mut rng);
    } else {
        volts = electrons.mapv(|e| e * sensor.noise.conversion_gain_v_per_e);
    }

    // Deterministic analog chain, then saturation
    let gain = sensor.noise.analog_gain;
    let offset = sensor.noise.analog_offset_v;
    volts.mapv_inplace(|v| (v * gain + offset).clamp(0.0, swing));

    Ok(SensorFrame {
        voltage: volts,
        exposure_time_s: t,
    })
}
