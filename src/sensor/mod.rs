//! Sensor modeling: quantum catch through a color filter mosaic, exposure
//! control, electronic noise, and detector characterization.

pub mod cfa;
pub mod characterize;
pub mod compute;
pub mod noise;

use ndarray::Array2;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spectral::{self, SpectralError};

pub use cfa::{CfaChannel, CfaError, CfaPattern};
pub use characterize::{dynamic_range_db, iso_speed_electrons, snr_curve, SNR_ISO_CRITERION};
pub use compute::{auto_exposure, compute};
pub use noise::DEFAULT_GAUSSIAN_SHOT_THRESHOLD;

/// Errors raised by the sensor stage.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor samples {sensor} wavelengths but the optical image has {image}")]
    WavelengthMismatch { sensor: usize, image: usize },

    #[error("sensor is {sensor:?} pixels but the optical image is {image:?}")]
    SpatialMismatch {
        sensor: (usize, usize),
        image: (usize, usize),
    },

    #[error("quantum efficiency has {qe} samples but the wavelength vector has {wavelengths}")]
    QeLengthMismatch { qe: usize, wavelengths: usize },

    #[error(
        "channel filters are {filters:?} but {wavelengths} wavelengths and {channels} channels were given"
    )]
    FilterShapeMismatch {
        filters: (usize, usize),
        wavelengths: usize,
        channels: usize,
    },

    #[error("CFA tile of {tile} does not evenly divide the {rows}x{cols} pixel array")]
    CfaTileMismatch {
        tile: usize,
        rows: usize,
        cols: usize,
    },

    #[error("CFA references channel '{0}' missing from the sensor channel table")]
    UnknownCfaChannel(CfaChannel),

    #[error("exposure time must be positive, got {0} s")]
    NonPositiveExposure(f64),

    #[error("voltage swing must be positive, got {0} V")]
    NonPositiveSwing(f64),

    #[error("SNR target of {target} dB-equivalent is unreachable with PRNU of {prnu_sd}")]
    SnrUnreachable { target: f64, prnu_sd: f64 },

    #[error(transparent)]
    Cfa(#[from] CfaError),

    #[error(transparent)]
    Spectral(#[from] SpectralError),
}

/// Electronic noise and conversion parameters of a sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseParams {
    /// Master switch; when false the frame is the pure quantum catch plus
    /// the deterministic analog chain.
    pub enabled: bool,
    /// Volts per collected electron.
    pub conversion_gain_v_per_e: f64,
    /// Read noise RMS in electrons.
    pub read_noise_e: f64,
    /// Photo-response non-uniformity standard deviation (fraction of signal).
    pub prnu_sd: f64,
    /// Dark-signal non-uniformity standard deviation in volts.
    pub dsnu_sd_v: f64,
    /// Dark current in electrons per pixel per second.
    pub dark_current_e_per_s: f64,
    /// Saturation voltage.
    pub voltage_swing_v: f64,
    /// Deterministic analog gain applied to the whole frame.
    pub analog_gain: f64,
    /// Deterministic analog offset in volts.
    pub analog_offset_v: f64,
    /// Mean signal (electrons) at which shot noise switches from an exact
    /// Poisson redraw to the Gaussian approximation.
    pub gaussian_shot_threshold: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            enabled: true,
            conversion_gain_v_per_e: 1.0e-4,
            read_noise_e: 2.0,
            prnu_sd: 0.0,
            dsnu_sd_v: 0.0,
            dark_current_e_per_s: 0.0,
            voltage_swing_v: 1.0,
            analog_gain: 1.0,
            analog_offset_v: 0.0,
            gaussian_shot_threshold: noise::DEFAULT_GAUSSIAN_SHOT_THRESHOLD,
        }
    }
}

impl NoiseParams {
    /// Noise-free parameters for deterministic pipeline tests.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            read_noise_e: 0.0,
            ..Self::default()
        }
    }
}

/// Sensor configuration: geometry, spectral response, mosaic and noise.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub rows: usize,
    pub cols: usize,
    pub exposure_time_s: f64,
    /// Mosaic tile; `None` means a monochrome sensor without filters.
    pub cfa: Option<CfaPattern>,
    /// Channel table; column `i` of `channel_filters` belongs to
    /// `channel_names[i]`.
    pub channel_names: Vec<CfaChannel>,
    /// Filter transmission spectra, `(n_wavelengths, n_channels)`.
    pub channel_filters: Array2<f64>,
    /// Detector quantum efficiency per wavelength.
    pub quantum_efficiency: Vec<f64>,
    pub wavelengths: Vec<f64>,
    pub noise: NoiseParams,
}

impl SensorConfig {
    /// Monochrome sensor without a mosaic.
    pub fn monochrome(
        rows: usize,
        cols: usize,
        wavelengths: Vec<f64>,
        quantum_efficiency: Vec<f64>,
        noise: NoiseParams,
    ) -> Result<Self, SensorError> {
        spectral::validate_wavelengths(&wavelengths)?;
        if quantum_efficiency.len() != wavelengths.len() {
            return Err(SensorError::QeLengthMismatch {
                qe: quantum_efficiency.len(),
                wavelengths: wavelengths.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            exposure_time_s: 0.01,
            cfa: None,
            channel_names: Vec::new(),
            channel_filters: Array2::zeros((wavelengths.len(), 0)),
            quantum_efficiency,
            wavelengths,
            noise,
        })
    }

    /// Attach a mosaic and its per-channel filter spectra.
    pub fn with_cfa(
        mut self,
        cfa: CfaPattern,
        channel_names: Vec<CfaChannel>,
        channel_filters: Array2<f64>,
    ) -> Result<Self, SensorError> {
        if channel_filters.dim() != (self.wavelengths.len(), channel_names.len()) {
            return Err(SensorError::FilterShapeMismatch {
                filters: channel_filters.dim(),
                wavelengths: self.wavelengths.len(),
                channels: channel_names.len(),
            });
        }
        if !cfa.tiles_evenly(self.rows, self.cols) {
            return Err(SensorError::CfaTileMismatch {
                tile: cfa.size(),
                rows: self.rows,
                cols: self.cols,
            });
        }
        for ch in cfa.channels() {
            if !channel_names.contains(&ch) {
                return Err(SensorError::UnknownCfaChannel(ch));
            }
        }
        self.cfa = Some(cfa);
        self.channel_names = channel_names;
        self.channel_filters = channel_filters;
        Ok(self)
    }

    pub fn with_exposure(mut self, exposure_time_s: f64) -> Self {
        self.exposure_time_s = exposure_time_s;
        self
    }

    /// Index of a channel in the channel table.
    pub fn channel_index(&self, channel: CfaChannel) -> Option<usize> {
        self.channel_names.iter().position(|&c| c == channel)
    }

    /// Resample the quantum efficiency and filter spectra onto a new
    /// wavelength grid, replacing the sensor's own sampling.
    pub fn resample_to(&mut self, wavelengths: &[f64]) -> Result<(), SensorError> {
        if spectral::grids_match(&self.wavelengths, wavelengths) {
            return Ok(());
        }
        let qe = spectral::resample(&self.wavelengths, &self.quantum_efficiency, wavelengths)?;

        let n_channels = self.channel_filters.dim().1;
        let mut filters = Array2::zeros((wavelengths.len(), n_channels));
        for c in 0..n_channels {
            let column: Vec<f64> = self.channel_filters.column(c).to_vec();
            let resampled = spectral::resample(&self.wavelengths, &column, wavelengths)?;
            for (i, v) in resampled.into_iter().enumerate() {
                filters[[i, c]] = v;
            }
        }

        self.quantum_efficiency = qe;
        self.channel_filters = filters;
        self.wavelengths = wavelengths.to_vec();
        Ok(())
    }
}

/// The realized voltage frame produced by one exposure.
///
/// Replaced wholesale by each [`compute`] call; never mutated in place.
#[derive(Debug, Clone)]
pub struct SensorFrame {
    pub voltage: Array2<f64>,
    pub exposure_time_s: f64,
}

impl SensorFrame {
    /// Pixels at or above the saturation voltage.
    pub fn saturation_mask(&self, voltage_swing_v: f64) -> Array2<bool> {
        self.voltage.mapv(|v| v >= voltage_swing_v)
    }
}

/// Reference sensor models.
pub mod models {
    use super::*;
    use ndarray::Array2;

    fn gaussian_bump(wavelength: f64, center: f64, width: f64) -> f64 {
        (-((wavelength - center) / width).powi(2)).exp()
    }

    /// 64x64 Bayer RGGB reference sensor: 400-700 nm sampled every 10 nm,
    /// smooth Gaussian channel filters, flat 60% QE.
    pub static BAYER_REFERENCE: Lazy<SensorConfig> = Lazy::new(|| {
        let wavelengths: Vec<f64> = (0..31).map(|i| 400.0 + 10.0 * i as f64).collect();
        let qe = vec![0.6; wavelengths.len()];

        let centers = [(620.0, 60.0), (530.0, 50.0), (460.0, 40.0)];
        let mut filters = Array2::zeros((wavelengths.len(), 3));
        for (i, &w) in wavelengths.iter().enumerate() {
            for (c, &(center, width)) in centers.iter().enumerate() {
                filters[[i, c]] = gaussian_bump(w, center, width);
            }
        }

        SensorConfig::monochrome(64, 64, wavelengths, qe, NoiseParams::default())
            .expect("reference sensor parameters are valid")
            .with_cfa(
                CfaPattern::rggb(),
                vec![CfaChannel::Red, CfaChannel::Green, CfaChannel::Blue],
                filters,
            )
            .expect("reference CFA tiles a 64x64 array")
    });

    /// 64x64 monochrome reference sensor with flat 80% QE.
    pub static MONOCHROME_REFERENCE: Lazy<SensorConfig> = Lazy::new(|| {
        let wavelengths: Vec<f64> = (0..31).map(|i| 400.0 + 10.0 * i as f64).collect();
        let qe = vec![0.8; wavelengths.len()];
        SensorConfig::monochrome(64, 64, wavelengths, qe, NoiseParams::default())
            .expect("reference sensor parameters are valid")
    });
}
