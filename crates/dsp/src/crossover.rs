//! A two-band Linkwitz-Riley crossover.
//!
//! The high band is negated on the way out, so `low + high` reconstructs the input as an all-pass.  The binaural
//! panner depends on this: it filters only the high band and adds the low band back untouched.
use crate::biquad::{BiquadCoefficients, MonoBiquad};

pub const MIN_CROSSOVER_FREQUENCY: f64 = 10.0;
pub const MAX_CROSSOVER_FREQUENCY: f64 = 20000.0;

/// A mono crossover.  Use one per channel.
#[derive(Debug, Clone)]
pub struct Crossover {
    sample_rate: f64,
    frequency: f64,
    low: MonoBiquad,
    high: MonoBiquad,
}

/// Clamp a crossover frequency to the supported range, and below nyquist for low sample rates.
fn clamp_frequency(frequency: f64, sample_rate: f64) -> f64 {
    let upper = MAX_CROSSOVER_FREQUENCY.min(sample_rate * 0.49);
    frequency.clamp(MIN_CROSSOVER_FREQUENCY, upper)
}

impl Crossover {
    pub fn new(sample_rate: f64, frequency: f64) -> Crossover {
        let frequency = clamp_frequency(frequency, sample_rate);
        Crossover {
            sample_rate,
            frequency,
            low: MonoBiquad::new(BiquadCoefficients::linkwitz_riley_lowpass(
                frequency,
                sample_rate,
            )),
            high: MonoBiquad::new(BiquadCoefficients::linkwitz_riley_highpass(
                frequency,
                sample_rate,
            )),
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn redesign(&mut self) {
        self.low
            .set_coefficients(BiquadCoefficients::linkwitz_riley_lowpass(
                self.frequency,
                self.sample_rate,
            ));
        self.high
            .set_coefficients(BiquadCoefficients::linkwitz_riley_highpass(
                self.frequency,
                self.sample_rate,
            ));
    }

    /// Move the cutoff.  Filter memory is kept, so this may be called between blocks.
    pub fn set_frequency(&mut self, frequency: f64) {
        let frequency = clamp_frequency(frequency, self.sample_rate);
        if frequency == self.frequency {
            return;
        }

        self.frequency = frequency;
        self.redesign();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.frequency = clamp_frequency(self.frequency, sample_rate);
        self.redesign();
    }

    pub fn flush(&mut self) {
        self.low.flush();
        self.high.flush();
    }

    /// Split one sample, returning `(low, high)` with the high band already negated.
    #[inline(always)]
    pub fn tick(&mut self, input: f32) -> (f32, f32) {
        (self.low.tick(input), -self.high.tick(input))
    }

    /// Split a block.  All three slices must be the same length.
    pub fn process_block(&mut self, input: &[f32], low: &mut [f32], high: &mut [f32]) {
        assert_eq!(input.len(), low.len());
        assert_eq!(input.len(), high.len());

        for ((x, l), h) in input.iter().zip(low.iter_mut()).zip(high.iter_mut()) {
            (*l, *h) = self.tick(*x);
        }
    }
}
