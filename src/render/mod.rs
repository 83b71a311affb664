//! Image reconstruction: demosaic, color transform, illuminant correction
//! and display encoding.

pub mod color;
pub mod demosaic;
pub mod gamma;

use ndarray::{Array2, Array3};
use thiserror::Error;

use crate::sensor::{CfaChannel, SensorConfig, SensorFrame};

pub use color::{
    illuminant_correct, ColorTransform, IlluminantCorrection, WHITE_WORLD_FRACTION,
};
pub use demosaic::{demosaic, DemosaicMethod, POCS_ITERATIONS};
pub use gamma::{GammaCurve, GammaTable};

/// Errors raised by the reconstruction stage.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("CFA tile of {tile} does not evenly divide the {rows}x{cols} frame")]
    CfaTileMismatch {
        tile: usize,
        rows: usize,
        cols: usize,
    },

    #[error("channel '{0}' has no place in an RGB reconstruction")]
    UnsupportedChannel(CfaChannel),

    #[error("{0} demosaicing needs a 2x2 Bayer tile")]
    BayerRequired(&'static str),

    #[error("expected an RGB image, got {channels} channels")]
    NotRgb { channels: usize },

    #[error("color matrix must be 3x3, got {rows}x{cols}")]
    BadMatrixShape { rows: usize, cols: usize },

    #[error("gamma table needs at least two increasing entries, got {0}")]
    GammaTableTooSmall(usize),
}

/// A device-encoded RGB image plus the transforms that produced it.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    /// Device RGB in [0, 1].
    pub rgb: Array3<f64>,
    /// Sensor-to-working color matrix used.
    pub color_matrix: Array2<f64>,
    /// Illuminant correction matrix used.
    pub illuminant_matrix: Array2<f64>,
}

/// Configuration of the reconstruction chain.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    pub demosaic: DemosaicMethod,
    /// Sensor RGB into the working colorimetric space.
    pub sensor_to_working: ColorTransform,
    /// Working space back to device-linear RGB.
    pub working_to_device: ColorTransform,
    pub illuminant: IlluminantCorrection,
    pub gamma: GammaCurve,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self {
            demosaic: DemosaicMethod::Bilinear,
            sensor_to_working: ColorTransform::identity(),
            working_to_device: ColorTransform::identity(),
            illuminant: IlluminantCorrection::None,
            gamma: GammaCurve::Exponent(2.2),
        }
    }
}

impl RenderPipeline {
    /// Reconstruct a displayable image from a sensor frame.
    ///
    /// Mosaic frames are demosaiced through the sensor's CFA; monochrome
    /// frames are replicated across the three channels. Voltages are
    /// normalized by the voltage swing before the color chain runs.
    pub fn render(
        &self,
        frame: &SensorFrame,
        sensor: &SensorConfig,
    ) -> Result<RenderedImage, RenderError> {
        let rgb = match &sensor.cfa {
            Some(cfa) => demosaic(&frame.voltage, cfa, self.demosaic)?,
            None => {
                let (rows, cols) = frame.voltage.dim();
                Array3::from_shape_fn((rows, cols, 3), |(i, j, _)| frame.voltage[[i, j]])
            }
        };
        let swing = sensor.noise.voltage_swing_v;
        let normalized = rgb.mapv(|v| v / swing);
        self.render_rgb(&normalized)
    }

    /// Run the color chain on an already-demosaiced linear RGB image.
    pub fn render_rgb(&self, rgb: &Array3<f64>) -> Result<RenderedImage, RenderError> {
        let working = self.sensor_to_working.apply(rgb)?;
        let (corrected, illuminant_matrix) = illuminant_correct(&working, &self.illuminant)?;
        let device = self.working_to_device.apply(&corrected)?;
        let encoded = device.mapv(|v| self.gamma.encode(v.clamp(0.0, 1.0)));
        Ok(RenderedImage {
            rgb: encoded,
            color_matrix: self.sensor_to_working.matrix().clone(),
            illuminant_matrix,
        })
    }
}
