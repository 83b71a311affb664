//! End-to-end camera orchestration.
//!
//! Composes lens propagation, sensor exposure and reconstruction for a
//! given starting point, keeping the wavelength sampling consistent across
//! stage boundaries, and sequences multi-frame (burst/HDR) captures.

use ndarray::Array2;
use thiserror::Error;

use crate::optics::{propagate, OpticalImage, Optics, OpticsError, PropagateOptions};
use crate::render::{RenderError, RenderPipeline, RenderedImage};
use crate::scene::Scene;
use crate::sensor::{self, SensorConfig, SensorError, SensorFrame};

/// Errors raised by the orchestrator.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error(transparent)]
    Optics(#[from] OpticsError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("camera holds no {0:?} to resume from")]
    MissingStage(Stage),

    #[error("burst needs sources and exposures of matching length (or length 1), got {sources} and {exposures}")]
    BurstLengthMismatch { sources: usize, exposures: usize },

    #[error("burst needs at least one capture")]
    EmptyBurst,
}

/// A pipeline stage whose held result can be resumed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    OpticalImage,
    SensorFrame,
}

/// Where a [`Camera::compute`] run starts.
pub enum CameraInput<'a> {
    /// Run the full chain from a scene.
    Scene(&'a Scene),
    /// Skip the lens; start from an irradiance image.
    OpticalImage(OpticalImage),
    /// Skip lens and sensor; reconstruct a raw frame.
    SensorFrame(SensorFrame),
    /// Re-run the stages downstream of a result the camera already holds.
    Current(Stage),
}

/// How a burst combines its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstMode {
    /// Accumulate the voltage of every frame.
    Sum,
    /// Per pixel, keep the longest-exposure frame that did not saturate.
    Longest,
}

/// One capture source of a burst.
pub enum BurstSource<'a> {
    Scene(&'a Scene),
    OpticalImage(&'a OpticalImage),
}

/// A configured camera holding the latest result of each stage.
pub struct Camera {
    pub optics: Optics,
    pub sensor: SensorConfig,
    pub pipeline: RenderPipeline,
    pub propagate_options: PropagateOptions,
    optical_image: Option<OpticalImage>,
    frame: Option<SensorFrame>,
    rendered: Option<RenderedImage>,
}

impl Camera {
    pub fn new(optics: Optics, sensor: SensorConfig, pipeline: RenderPipeline) -> Self {
        Self {
            optics,
            sensor,
            pipeline,
            propagate_options: PropagateOptions::default(),
            optical_image: None,
            frame: None,
            rendered: None,
        }
    }

    pub fn optical_image(&self) -> Option<&OpticalImage> {
        self.optical_image.as_ref()
    }

    pub fn sensor_frame(&self) -> Option<&SensorFrame> {
        self.frame.as_ref()
    }

    pub fn rendered(&self) -> Option<&RenderedImage> {
        self.rendered.as_ref()
    }

    /// Execute the stages downstream of `input` and return the rendering.
    ///
    /// Whenever a stage boundary introduces a new wavelength vector, the
    /// sensor's quantum efficiency and filter spectra are resampled onto it
    /// before the exposure runs.
    pub fn compute(
        &mut self,
        input: CameraInput<'_>,
        seed: Option<u64>,
    ) -> Result<&RenderedImage, CameraError> {
        match input {
            CameraInput::Scene(scene) => {
                let oi = propagate(scene, &self.optics, &self.propagate_options)?;
                self.optical_image = Some(oi);
                self.expose(seed)?;
            }
            CameraInput::OpticalImage(oi) => {
                self.optical_image = Some(oi);
                self.expose(seed)?;
            }
            CameraInput::SensorFrame(frame) => {
                self.frame = Some(frame);
                self.reconstruct()?;
            }
            CameraInput::Current(Stage::OpticalImage) => {
                if self.optical_image.is_none() {
                    return Err(CameraError::MissingStage(Stage::OpticalImage));
                }
                self.expose(seed)?;
            }
            CameraInput::Current(Stage::SensorFrame) => {
                if self.frame.is_none() {
                    return Err(CameraError::MissingStage(Stage::SensorFrame));
                }
                self.reconstruct()?;
            }
        }
        Ok(self.rendered.as_ref().expect("reconstruct stores a rendering"))
    }

    fn expose(&mut self, seed: Option<u64>) -> Result<(), CameraError> {
        let oi = self
            .optical_image
            .as_ref()
            .expect("expose requires a held optical image");
        self.sensor.resample_to(&oi.wavelengths)?;
        let frame = sensor::compute(&self.sensor, oi, seed)?;
        self.frame = Some(frame);
        self.reconstruct()
    }

    fn reconstruct(&mut self) -> Result<(), CameraError> {
        let frame = self
            .frame
            .as_ref()
            .expect("reconstruct requires a held frame");
        let rendered = self.pipeline.render(frame, &self.sensor)?;
        self.rendered = Some(rendered);
        Ok(())
    }

    /// Capture a burst and combine it into one frame, then reconstruct.
    ///
    /// `sources` and `exposures` must have matching lengths; either may be
    /// a single entry broadcast against the other. Each capture draws from
    /// an independently derived random stream.
    pub fn compute_burst(
        &mut self,
        sources: &[BurstSource<'_>],
        exposures: &[f64],
        mode: BurstMode,
        seed: Option<u64>,
    ) -> Result<&RenderedImage, CameraError> {
        if sources.is_empty() || exposures.is_empty() {
            return Err(CameraError::EmptyBurst);
        }
        let count = sources.len().max(exposures.len());
        let broadcastable = |len: usize| len == 1 || len == count;
        if !broadcastable(sources.len()) || !broadcastable(exposures.len()) {
            return Err(CameraError::BurstLengthMismatch {
                sources: sources.len(),
                exposures: exposures.len(),
            });
        }

        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            let source = &sources[i % sources.len()];
            let exposure = exposures[i % exposures.len()];

            let oi = match source {
                BurstSource::Scene(scene) => {
                    propagate(*scene, &self.optics, &self.propagate_options)?
                }
                BurstSource::OpticalImage(oi) => (*oi).clone(),
            };
            self.sensor.resample_to(&oi.wavelengths)?;
            self.sensor.exposure_time_s = exposure;

            let frame_seed = seed.map(|s| s.wrapping_add(i as u64));
            frames.push(sensor::compute(&self.sensor, &oi, frame_seed)?);
        }

        let combined = match mode {
            BurstMode::Sum => combine_sum(&frames),
            BurstMode::Longest => combine_longest(&frames, self.sensor.noise.voltage_swing_v),
        };
        self.frame = Some(combined);
        self.reconstruct()?;
        Ok(self.rendered.as_ref().expect("reconstruct stores a rendering"))
    }
}

fn combine_sum(frames: &[SensorFrame]) -> SensorFrame {
    let mut voltage = Array2::zeros(frames[0].voltage.dim());
    let mut exposure = 0.0;
    for frame in frames {
        voltage += &frame.voltage;
        exposure += frame.exposure_time_s;
    }
    SensorFrame {
        voltage,
        exposure_time_s: exposure,
    }
}

/// Per pixel, the value of the longest-exposure frame below saturation;
/// pixels saturated everywhere fall back to the shortest exposure.
fn combine_longest(frames: &[SensorFrame], voltage_swing_v: f64) -> SensorFrame {
    let mut order: Vec<usize> = (0..frames.len()).collect();
    order.sort_by(|&a, &b| {
        frames[b]
            .exposure_time_s
            .partial_cmp(&frames[a].exposure_time_s)
            .expect("exposure times are finite")
    });

    let shortest = *order.last().expect("burst has at least one frame");
    let voltage = Array2::from_shape_fn(frames[0].voltage.dim(), |(i, j)| {
        order
            .iter()
            .map(|&idx| frames[idx].voltage[[i, j]])
            .find(|&v| v < voltage_swing_v)
            .unwrap_or(frames[shortest].voltage[[i, j]])
    });

    SensorFrame {
        voltage,
        exposure_time_s: frames[order[0]].exposure_time_s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    use crate::render::DemosaicMethod;
    use crate::sensor::{CfaChannel, CfaPattern, NoiseParams};

    fn test_camera(rows: usize, cols: usize) -> Camera {
        let wavelengths: Vec<f64> = vec![450.0, 550.0, 650.0];
        let mut noise = NoiseParams::disabled();
        noise.conversion_gain_v_per_e = 1.0e-4;
        noise.voltage_swing_v = 1.0;
        let sensor = SensorConfig::monochrome(
            rows,
            cols,
            wavelengths.clone(),
            vec![1.0; wavelengths.len()],
            noise,
        )
        .unwrap()
        .with_cfa(
            CfaPattern::rggb(),
            vec![CfaChannel::Red, CfaChannel::Green, CfaChannel::Blue],
            Array2::from_elem((wavelengths.len(), 3), 1.0),
        )
        .unwrap()
        .with_exposure(0.01);

        let optics = Optics::new(4.0, 0.05).unwrap();
        let mut pipeline = RenderPipeline::default();
        pipeline.demosaic = DemosaicMethod::Bilinear;
        Camera::new(optics, sensor, pipeline)
    }

    fn flat_scene(rows: usize, cols: usize, level: f64) -> Scene {
        Scene::uniform(rows, cols, vec![450.0, 550.0, 650.0], level)
            .unwrap()
            .with_fov(5.0)
    }

    #[test]
    fn uniform_scene_renders_neutral() {
        // Equal per-wavelength radiance, unity transmittance, zero defocus,
        // noise disabled: R, G and B agree at every pixel.
        let mut camera = test_camera(8, 8);
        let scene = flat_scene(8, 8, 1000.0);
        let rendered = camera.compute(CameraInput::Scene(&scene), None).unwrap();

        // The off-axis falloff leaves a gentle spatial gradient that the
        // demosaic interpolates across, so neutrality holds to a fraction
        // of a percent rather than machine precision.
        let (rows, cols, _) = rendered.rgb.dim();
        for i in 0..rows {
            for j in 0..cols {
                let r = rendered.rgb[[i, j, 0]];
                assert_relative_eq!(rendered.rgb[[i, j, 1]], r, max_relative = 1e-2);
                assert_relative_eq!(rendered.rgb[[i, j, 2]], r, max_relative = 1e-2);
            }
        }
    }

    #[test]
    fn stages_are_reachable_and_held() {
        let mut camera = test_camera(8, 8);
        let scene = flat_scene(8, 8, 1000.0);
        camera.compute(CameraInput::Scene(&scene), None).unwrap();

        assert!(camera.optical_image().is_some());
        assert!(camera.sensor_frame().is_some());

        // Resume from the held optical image: same sensor settings, same frame
        let first = camera.sensor_frame().unwrap().voltage.clone();
        camera
            .compute(CameraInput::Current(Stage::OpticalImage), None)
            .unwrap();
        let second = &camera.sensor_frame().unwrap().voltage;
        for (a, b) in first.iter().zip(second.iter()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn resuming_an_empty_stage_fails() {
        let mut camera = test_camera(8, 8);
        assert!(matches!(
            camera.compute(CameraInput::Current(Stage::OpticalImage), None),
            Err(CameraError::MissingStage(Stage::OpticalImage))
        ));
        assert!(matches!(
            camera.compute(CameraInput::Current(Stage::SensorFrame), None),
            Err(CameraError::MissingStage(Stage::SensorFrame))
        ));
    }

    #[test]
    fn sensor_wavelengths_resync_to_the_input() {
        let mut camera = test_camera(8, 8);
        // Sensor starts on a 3-sample grid; feed a 5-sample optical image
        let wavelengths = vec![440.0, 480.0, 540.0, 600.0, 660.0];
        let oi = OpticalImage::new(
            ndarray::Array3::from_elem((8, 8, 5), 100.0),
            wavelengths.clone(),
        )
        .unwrap();
        camera.compute(CameraInput::OpticalImage(oi), None).unwrap();
        assert_eq!(camera.sensor.wavelengths, wavelengths);
        assert_eq!(camera.sensor.quantum_efficiency.len(), 5);
        assert_eq!(camera.sensor.channel_filters.dim(), (5, 3));
    }

    #[test]
    fn burst_sum_accumulates_frames() {
        let mut camera = test_camera(8, 8);
        let oi = OpticalImage::new(
            ndarray::Array3::from_elem((8, 8, 3), 100.0),
            vec![450.0, 550.0, 650.0],
        )
        .unwrap();

        camera
            .compute_burst(
                &[BurstSource::OpticalImage(&oi)],
                &[0.01, 0.01],
                BurstMode::Sum,
                None,
            )
            .unwrap();
        let summed = camera.sensor_frame().unwrap();
        assert_relative_eq!(summed.exposure_time_s, 0.02, epsilon = 1e-12);

        camera.sensor.exposure_time_s = 0.01;
        let single = sensor::compute(&camera.sensor, &oi, None).unwrap();
        for (s, v) in summed.voltage.iter().zip(single.voltage.iter()) {
            assert_relative_eq!(s, &(2.0 * v), epsilon = 1e-12);
        }
    }

    #[test]
    fn burst_longest_avoids_saturated_pixels() {
        let mut camera = test_camera(8, 8);
        // Bright enough that the long exposure saturates
        let oi = OpticalImage::new(
            ndarray::Array3::from_elem((8, 8, 3), 2000.0),
            vec![450.0, 550.0, 650.0],
        )
        .unwrap();

        camera
            .compute_burst(
                &[BurstSource::OpticalImage(&oi)],
                &[0.001, 10.0],
                BurstMode::Longest,
                None,
            )
            .unwrap();
        let frame = camera.sensor_frame().unwrap();
        let swing = camera.sensor.noise.voltage_swing_v;
        // Long exposure saturates every pixel; the short one wins
        let expected = 2000.0 * 3.0 * 0.001 * 1.0e-4;
        for v in frame.voltage.iter() {
            assert!(*v < swing);
            assert_relative_eq!(*v, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn burst_length_mismatch_is_rejected() {
        let mut camera = test_camera(8, 8);
        let oi = OpticalImage::new(
            ndarray::Array3::from_elem((8, 8, 3), 100.0),
            vec![450.0, 550.0, 650.0],
        )
        .unwrap();
        let result = camera.compute_burst(
            &[
                BurstSource::OpticalImage(&oi),
                BurstSource::OpticalImage(&oi),
            ],
            &[0.01, 0.02, 0.03],
            BurstMode::Sum,
            None,
        );
        assert!(matches!(
            result,
            Err(CameraError::BurstLengthMismatch { .. })
        ));
    }
}
