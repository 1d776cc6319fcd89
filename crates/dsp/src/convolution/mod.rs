//! Convolution kernels.
//!
//! - [convolve_direct] evaluates the sum directly.  It is the reference the FFT kernels are tested against.
//! - [FftFir] is an overlap-add FFT convolver for short impulses with zero latency, used for HRIRs.
//! - [PartitionedConvolver] is a uniformly partitioned overlap-save convolver for long impulses, used for reverb.
mod direct;
mod fir;
mod partitioned;

pub use direct::convolve_direct;
pub use fir::FftFir;
pub use partitioned::PartitionedConvolver;

#[derive(Debug, thiserror::Error)]
pub enum ConvolutionError {
    #[error("Impulse of {got} samples is longer than the maximum of {max}")]
    ImpulseTooLong { got: usize, max: usize },
}

/// Zero the imaginary parts of the DC and nyquist bins, which a real inverse transform requires.
///
/// The products of two real spectra already satisfy this up to rounding; realfft rejects anything else.
fn fix_real_bins(spectrum: &mut [realfft::num_complex::Complex<f32>]) {
    if let Some(first) = spectrum.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = spectrum.last_mut() {
        last.im = 0.0;
    }
}
