//! DSP building blocks for the spatializer.
//!
//! Everything here is single-threaded, allocation-free once constructed, and knows nothing about where its parameters
//! come from.  Coefficients are designed in `f64`; audio flows through as `f32`.
pub mod biquad;
#[cfg(test)]
mod close_floats;
pub mod convolution;
pub mod crossover;
mod db;
pub mod smoother;
pub mod svf;

pub use biquad::{BiquadCoefficients, MonoBiquad};
pub use convolution::{convolve_direct, ConvolutionError, FftFir, PartitionedConvolver};
pub use crossover::Crossover;
pub use db::DbExt;
pub use smoother::ParameterSmoother;
pub use svf::{SvfCoefficients, SvfMode, SvfParameters, SvfState};
