//! Radiometric camera simulation.
//!
//! This crate models the image-formation chain of a digital camera: scene
//! radiance passes through a lens (OTF/PSF blur plus off-axis falloff), is
//! transduced by a sensor with a color-filter mosaic and electronic noise,
//! and is reconstructed into a displayable RGB image.
//!
//! Stages are pure functions over in-memory arrays and can be run
//! individually or composed through [`camera::Camera`]:
//!
//! Scene (radiance) -> [`optics::propagate`] -> OpticalImage (irradiance)
//! -> [`sensor::compute`] -> SensorFrame (voltage)
//! -> [`render::RenderPipeline`] -> RenderedImage (device RGB).

pub mod camera;
pub mod math;
pub mod optics;
pub mod render;
pub mod scene;
pub mod sensor;
pub mod spectral;

// Re-exports for easier access
pub use camera::{BurstMode, BurstSource, Camera, CameraError, CameraInput, Stage};
pub use optics::{
    compute_otf, otf_to_psf, propagate, psf_to_otf, FrequencySupport, OpticalImage, Optics,
    OpticsError, OpticsModel, PropagateOptions,
};
pub use render::{
    demosaic, illuminant_correct, ColorTransform, DemosaicMethod, GammaCurve, GammaTable,
    IlluminantCorrection, RenderError, RenderPipeline, RenderedImage,
};
pub use scene::{Scene, SceneError};
pub use sensor::{
    auto_exposure, CfaChannel, CfaPattern, NoiseParams, SensorConfig, SensorError, SensorFrame,
};
