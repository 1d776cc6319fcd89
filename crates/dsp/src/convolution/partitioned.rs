use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::fix_real_bins;

/// A uniformly partitioned overlap-save convolver for long impulses.
///
/// The impulse is cut into `K` partitions of `P` samples, each transformed once at construction with a `2P` point FFT.
/// Input is gathered `P` samples at a time; each full partition is transformed, pushed onto a frequency-domain delay
/// line, and multiplied against the impulse partitions, so one inverse transform yields `P` output samples.
///
/// Input and output are decoupled.  Callers [add](Self::add) a block, ask how much output is [available](Self::avail),
/// read it from [output](Self::output), and [advance](Self::advance) past what they used.
///
/// The output starts with [latency](Self::latency) samples of silence, `P - gcd(max_block, P)`.  That is the smallest
/// head start for which every block of `max_block` samples finds a full block of output waiting, so the wet signal never
/// has gaps.  Blocks of exactly `P` samples have no latency at all.
///
/// Construction allocates everything.  After that, nothing does.
pub struct PartitionedConvolver {
    partition: usize,
    max_block: usize,
    latency: usize,

    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,

    /// Impulse partitions in the frequency domain, pre-scaled by `1 / 2P`.
    segments: Vec<Vec<Complex<f32>>>,

    /// Spectra of past input windows.  `delay_line[head]` is the newest.
    delay_line: Vec<Vec<Complex<f32>>>,
    head: usize,

    /// `2P` samples: the previous partition of input, then the one being filled.
    window: Vec<f32>,
    filled: usize,

    fft_input: Vec<f32>,
    accumulator: Vec<Complex<f32>>,
    fft_output: Vec<f32>,
    scratch: Vec<Complex<f32>>,

    /// Computed output not yet consumed.  The first `ready` samples are valid.
    output: Vec<f32>,
    ready: usize,
}

impl std::fmt::Debug for PartitionedConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedConvolver")
            .field("partition", &self.partition)
            .field("partitions", &self.segments.len())
            .field("ready", &self.ready)
            .finish_non_exhaustive()
    }
}

impl PartitionedConvolver {
    /// Build a convolver for `impulse` with a planner private to this convolver.
    pub fn new(impulse: &[f32], partition: usize, max_block: usize) -> PartitionedConvolver {
        Self::with_planner(&mut RealFftPlanner::new(), impulse, partition, max_block)
    }

    /// Build a convolver, sharing FFT plans through `planner`.
    ///
    /// An empty impulse convolves to silence.
    ///
    /// # Panics
    ///
    /// If `partition` is not a power of two, or `max_block` is zero.
    pub fn with_planner(
        planner: &mut RealFftPlanner<f32>,
        impulse: &[f32],
        partition: usize,
        max_block: usize,
    ) -> PartitionedConvolver {
        assert!(partition.is_power_of_two());
        assert!(max_block > 0);

        let fft_len = partition * 2;
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_scratch_len()
            .max(inverse.get_scratch_len());
        let mut scratch = vec![Complex::default(); scratch_len];

        let partitions = impulse.len().div_ceil(partition).max(1);
        let scale = 1.0 / fft_len as f32;
        let mut time = forward.make_input_vec();
        let segments = (0..partitions)
            .map(|k| {
                time.fill(0.0);
                let start = (k * partition).min(impulse.len());
                let end = ((k + 1) * partition).min(impulse.len());
                for (d, s) in time.iter_mut().zip(impulse[start..end].iter()) {
                    *d = s * scale;
                }
                let mut spectrum = forward.make_output_vec();
                forward
                    .process_with_scratch(&mut time, &mut spectrum, &mut scratch)
                    .expect("Buffers come from the plan and are always the right length");
                spectrum
            })
            .collect::<Vec<_>>();

        // For a power of two, the gcd is the largest power of two dividing the other side.
        let gcd = (1usize << max_block.trailing_zeros()).min(partition);
        let latency = partition - gcd;

        let delay_line = (0..partitions)
            .map(|_| forward.make_output_vec())
            .collect();

        PartitionedConvolver {
            partition,
            max_block,
            latency,
            segments,
            delay_line,
            head: 0,
            window: vec![0.0; fft_len],
            filled: 0,
            fft_input: forward.make_input_vec(),
            accumulator: forward.make_output_vec(),
            fft_output: inverse.make_output_vec(),
            scratch,
            // Consumed a block at a time, the output never holds more than `latency + max_block` samples.  Twice that
            // leaves room for callers which consume less.
            output: vec![0.0; 2 * (max_block + partition)],
            ready: latency,
            forward,
            inverse,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Samples of silence before the first output sample.
    pub fn latency(&self) -> usize {
        self.latency
    }

    /// Feed a block of input.
    ///
    /// # Panics
    ///
    /// If the block is longer than the maximum given at construction.
    pub fn add(&mut self, input: &[f32]) {
        assert!(input.len() <= self.max_block);

        let mut remaining = input;
        while !remaining.is_empty() {
            let space = self.partition - self.filled;
            let take = space.min(remaining.len());
            let start = self.partition + self.filled;
            self.window[start..start + take].copy_from_slice(&remaining[..take]);
            self.filled += take;
            remaining = &remaining[take..];

            if self.filled == self.partition {
                self.process_partition();
            }
        }
    }

    fn process_partition(&mut self) {
        let partitions = self.segments.len();
        let p = self.partition;

        self.fft_input.copy_from_slice(&self.window);
        self.head = (self.head + partitions - 1) % partitions;
        self.forward
            .process_with_scratch(
                &mut self.fft_input,
                &mut self.delay_line[self.head],
                &mut self.scratch,
            )
            .expect("Buffers come from the plan and are always the right length");

        self.accumulator.fill(Complex::default());
        for (k, segment) in self.segments.iter().enumerate() {
            let past = &self.delay_line[(self.head + k) % partitions];
            for ((acc, x), h) in self
                .accumulator
                .iter_mut()
                .zip(past.iter())
                .zip(segment.iter())
            {
                *acc += x * h;
            }
        }
        fix_real_bins(&mut self.accumulator);

        self.inverse
            .process_with_scratch(
                &mut self.accumulator,
                &mut self.fft_output,
                &mut self.scratch,
            )
            .expect("Buffers come from the plan and are always the right length");

        // Overlap-save: only the second half is free of circular wraparound.
        assert!(
            self.ready + p <= self.output.len(),
            "Output was not consumed between blocks"
        );
        self.output[self.ready..self.ready + p].copy_from_slice(&self.fft_output[p..]);
        self.ready += p;

        self.window.copy_within(p.., 0);
        self.filled = 0;
    }

    /// How many of the next `wanted` output samples are ready.
    pub fn avail(&self, wanted: usize) -> usize {
        self.ready.min(wanted)
    }

    /// All output computed so far and not yet consumed.
    pub fn output(&self) -> &[f32] {
        &self.output[..self.ready]
    }

    /// Consume `count` samples of output.
    pub fn advance(&mut self, count: usize) {
        let count = count.min(self.ready);
        self.output.copy_within(count..self.ready, 0);
        self.ready -= count;
    }

    /// Clear all input history and pending output.
    pub fn reset(&mut self) {
        for spectrum in self.delay_line.iter_mut() {
            spectrum.fill(Complex::default());
        }
        self.window.fill(0.0);
        self.filled = 0;
        self.output[..self.latency].fill(0.0);
        self.ready = self.latency;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::convolution::convolve_direct;

    fn signal(len: usize, seed: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (((i + seed) * 104729 % 997) as f32 / 498.5) - 1.0)
            .collect()
    }

    /// Stream `input` through in blocks of `block`, consuming output the way the reverb does, and return the wet signal.
    ///
    /// Also checks that every block found a full block of output waiting.
    fn stream(conv: &mut PartitionedConvolver, input: &[f32], block: usize) -> Vec<f32> {
        let mut out = vec![];
        for chunk in input.chunks(block) {
            conv.add(chunk);
            let avail = conv.avail(chunk.len());
            assert_eq!(avail, chunk.len(), "Output ran dry");
            out.extend_from_slice(&conv.output()[..avail]);
            conv.advance(avail);
        }
        out
    }

    #[test]
    fn test_zero_latency_at_partition_size() {
        let impulse = signal(1000, 1);
        let input = signal(4096, 2);
        let mut conv = PartitionedConvolver::new(&impulse, 256, 256);
        assert_eq!(conv.latency(), 0);
        let out = stream(&mut conv, &input, 256);

        let expected = convolve_direct(&input, &impulse);
        for (i, (g, e)) in out.iter().zip(expected.iter()).enumerate() {
            assert!((g - e).abs() < 1e-3, "index {i}: {g} vs {e}");
        }
    }

    #[test]
    fn test_latency() {
        assert_eq!(PartitionedConvolver::new(&[1.0], 64, 32).latency(), 32);
        assert_eq!(PartitionedConvolver::new(&[1.0], 128, 100).latency(), 124);
        assert_eq!(PartitionedConvolver::new(&[1.0], 64, 64).latency(), 0);
    }

    #[test]
    fn test_empty_impulse_is_silent() {
        let mut conv = PartitionedConvolver::new(&[], 64, 64);
        conv.add(&signal(64, 0));
        assert_eq!(conv.avail(64), 64);
        assert!(conv.output().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_reset() {
        let mut conv = PartitionedConvolver::new(&[1.0; 10], 64, 64);
        conv.add(&signal(64, 0));
        conv.reset();
        assert_eq!(conv.avail(64), 0);
        conv.add(&[0.0; 64]);
        assert!(conv.output().iter().all(|x| *x == 0.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// For any block size the output is the linear convolution, delayed by the reported latency, without gaps.
        #[test]
        fn test_matches_direct(
            impulse_len in 0usize..3000,
            block in 1usize..300,
            seed in 0usize..1000,
        ) {
            let partition = block.next_power_of_two().max(64);
            let impulse = signal(impulse_len, seed);
            let input = signal(5000, seed + 3);

            let mut conv = PartitionedConvolver::new(&impulse, partition, block);
            let latency = conv.latency();
            prop_assert!(latency < partition);
            let out = stream(&mut conv, &input, block);

            let expected = convolve_direct(&input, &impulse);
            for (i, g) in out.iter().enumerate() {
                let e = if i < latency {
                    0.0
                } else {
                    expected.get(i - latency).copied().unwrap_or(0.0)
                };
                prop_assert!((g - e).abs() < 2e-3, "index {}: {} vs {}", i, g, e);
            }
        }
    }
}
