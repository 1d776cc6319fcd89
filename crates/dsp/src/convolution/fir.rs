use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::{fix_real_bins, ConvolutionError};

/// An overlap-add FFT convolver for a short impulse that changes often.
///
/// The transform is the smallest power of two holding one block convolved with the impulse, so every block is
/// processed on its own and output is never delayed.  Blocks may be any length up to the maximum given at
/// construction.  The tail of each block is carried in an overlap buffer and added into the blocks that follow.
///
/// [FftFir::set_impulse] transforms into preallocated storage and may be called between any two blocks.
pub struct FftFir {
    max_block: usize,
    max_impulse: usize,
    fft_len: usize,

    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,

    /// Spectrum of the current impulse, pre-scaled by `1 / fft_len`.
    impulse_spectrum: Vec<Complex<f32>>,

    time: Vec<f32>,
    freq: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    /// Pending tails of earlier blocks, aligned so that index 0 is the next output sample.
    overlap: Vec<f32>,
}

impl std::fmt::Debug for FftFir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftFir")
            .field("max_block", &self.max_block)
            .field("max_impulse", &self.max_impulse)
            .field("fft_len", &self.fft_len)
            .finish_non_exhaustive()
    }
}

impl FftFir {
    /// Build a convolver whose impulse is silence.
    ///
    /// # Panics
    ///
    /// If either size is zero.
    pub fn new(max_block: usize, max_impulse: usize) -> FftFir {
        assert!(max_block > 0);
        assert!(max_impulse > 0);

        let fft_len = (max_block + max_impulse - 1).next_power_of_two().max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);

        let scratch_len = forward
            .get_scratch_len()
            .max(inverse.get_scratch_len());

        FftFir {
            max_block,
            max_impulse,
            fft_len,
            impulse_spectrum: forward.make_output_vec(),
            time: forward.make_input_vec(),
            freq: forward.make_output_vec(),
            scratch: vec![Complex::default(); scratch_len],
            overlap: vec![0.0; fft_len],
            forward,
            inverse,
        }
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Replace the impulse.  Does not allocate.
    ///
    /// Tails already in flight keep ringing with the old impulse.
    pub fn set_impulse(&mut self, impulse: &[f32]) -> Result<(), ConvolutionError> {
        if impulse.len() > self.max_impulse {
            return Err(ConvolutionError::ImpulseTooLong {
                got: impulse.len(),
                max: self.max_impulse,
            });
        }

        let scale = 1.0 / self.fft_len as f32;
        self.time.fill(0.0);
        for (d, s) in self.time.iter_mut().zip(impulse.iter()) {
            *d = s * scale;
        }

        self.forward
            .process_with_scratch(&mut self.time, &mut self.impulse_spectrum, &mut self.scratch)
            .expect("Buffers come from the plan and are always the right length");
        Ok(())
    }

    /// Forget all pending tails.
    pub fn reset(&mut self) {
        self.overlap.fill(0.0);
    }

    /// Convolve `block` in place.
    ///
    /// # Panics
    ///
    /// If the block is longer than the maximum given at construction.
    pub fn process(&mut self, block: &mut [f32]) {
        let n = block.len();
        assert!(
            n <= self.max_block,
            "Block of {n} frames is longer than the maximum of {}",
            self.max_block
        );
        if n == 0 {
            return;
        }

        self.time[..n].copy_from_slice(block);
        self.time[n..].fill(0.0);

        self.forward
            .process_with_scratch(&mut self.time, &mut self.freq, &mut self.scratch)
            .expect("Buffers come from the plan and are always the right length");

        for (x, h) in self.freq.iter_mut().zip(self.impulse_spectrum.iter()) {
            *x *= *h;
        }
        fix_real_bins(&mut self.freq);

        self.inverse
            .process_with_scratch(&mut self.freq, &mut self.time, &mut self.scratch)
            .expect("Buffers come from the plan and are always the right length");

        // Only the first `n + max_impulse - 1` samples can be nonzero, and that always fits in the transform.
        let used = (n + self.max_impulse - 1).min(self.fft_len);
        for (o, t) in self.overlap[..used].iter_mut().zip(self.time[..used].iter()) {
            *o += t;
        }

        block.copy_from_slice(&self.overlap[..n]);
        self.overlap.copy_within(n.., 0);
        let len = self.overlap.len();
        self.overlap[len - n..].fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::close_floats::close_slices32;
    use crate::convolution::convolve_direct;

    fn signal(len: usize, seed: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (((i + seed) * 7919 % 1000) as f32 / 500.0) - 1.0)
            .collect()
    }

    /// Run `input` through the convolver in blocks of the given sizes, cycling through them.
    fn run_blocks(fir: &mut FftFir, input: &[f32], sizes: &[usize]) -> Vec<f32> {
        let mut out = input.to_vec();
        let mut pos = 0;
        let mut which = 0;
        while pos < out.len() {
            let n = sizes[which % sizes.len()].min(out.len() - pos);
            fir.process(&mut out[pos..pos + n]);
            pos += n;
            which += 1;
        }
        out
    }

    #[test]
    fn test_identity_impulse() {
        let mut fir = FftFir::new(128, 200);
        fir.set_impulse(&[1.0]).unwrap();
        let input = signal(1024, 3);
        let out = run_blocks(&mut fir, &input, &[128]);
        close_slices32(&out, &input, 1e-5);
    }

    #[test]
    fn test_silent_by_default() {
        let mut fir = FftFir::new(64, 16);
        let mut block = signal(64, 0);
        fir.process(&mut block);
        assert!(block.iter().all(|x| x.abs() < 1e-7));
    }

    #[test]
    fn test_rejects_long_impulse() {
        let mut fir = FftFir::new(64, 16);
        assert!(matches!(
            fir.set_impulse(&[0.0; 17]),
            Err(ConvolutionError::ImpulseTooLong { got: 17, max: 16 })
        ));
    }

    #[test]
    fn test_impulse_swap_keeps_tail() {
        let mut fir = FftFir::new(4, 4);
        fir.set_impulse(&[0.0, 0.0, 0.0, 1.0]).unwrap();
        let mut block = [0.0, 0.0, 0.0, 1.0];
        fir.process(&mut block);
        close_slices32(&block, &[0.0; 4], 1e-6);

        // The old impulse's delayed copy is already in flight and still comes out.
        fir.set_impulse(&[0.0; 4]).unwrap();
        let mut block = [0.0; 4];
        fir.process(&mut block);
        close_slices32(&block, &[0.0, 0.0, 1.0, 0.0], 1e-6);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_matches_direct(
            impulse_len in 1usize..=200,
            max_block in 1usize..=256,
            seed in 0usize..1000,
            sizes in proptest::collection::vec(1usize..=256, 1..4),
        ) {
            let impulse = signal(impulse_len, seed);
            let input = signal(1000, seed + 17);
            let sizes = sizes.into_iter().map(|s| s.min(max_block)).collect::<Vec<_>>();

            let mut fir = FftFir::new(max_block, 200);
            fir.set_impulse(&impulse).unwrap();
            let got = run_blocks(&mut fir, &input, &sizes);
            let expected = convolve_direct(&input, &impulse);

            for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
                prop_assert!((g - e).abs() < 1e-3, "index {i}: {g} vs {e}");
            }
        }
    }
}
