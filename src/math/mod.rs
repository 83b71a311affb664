//! Numeric building blocks shared by the pipeline stages.

pub mod convolve2d;
pub mod fft2;
pub mod interp;

pub use convolve2d::{convolve2d, ConvolveMode};
pub use interp::{interp_linear, GridInterpolator};
