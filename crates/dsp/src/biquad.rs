//! Second-order sections for the band-splitting crossover.
//!
//! The designs are the 2nd-order Linkwitz-Riley pair from Pirkle's *Designing Audio Effect Plugins in C++*, obtained
//! from the analog prototypes `ωc² / (s + ωc)²` and `s² / (s + ωc)²` by the bilinear transform with the cutoff
//! pre-warped.  The two share a denominator, so their outputs differ by a sign-flipped all-pass once summed.
//!
//! Filters run in direct form 1 with separate input and output histories, in `f64`.  Low cutoffs put a double pole very
//! close to `z = 1`, where `f32` coefficients noticeably move the poles.
use std::f64::consts::PI;

use num::complex::Complex64;

/// Coefficients for `y[n] = a0 x[n] + a1 x[n-1] + a2 x[n-2] - b1 y[n-1] - b2 y[n-2]`.
///
/// Note that this follows the convention where `a` is the numerator.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BiquadCoefficients {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub b1: f64,
    pub b2: f64,
}

/// Intermediate values shared by both halves of the Linkwitz-Riley pair.
struct LrShared {
    k: f64,
    omega_c: f64,
    denominator: f64,
    b1: f64,
    b2: f64,
}

fn lr_shared(frequency: f64, sample_rate: f64) -> LrShared {
    let omega_c = PI * frequency;
    let theta_c = PI * frequency / sample_rate;
    let k = omega_c / theta_c.tan();
    let k2 = k * k;
    let omega_c2 = omega_c * omega_c;
    let denominator = k2 + omega_c2 + 2.0 * k * omega_c;

    LrShared {
        k,
        omega_c,
        denominator,
        b1: (-2.0 * k2 + 2.0 * omega_c2) / denominator,
        b2: (-2.0 * k * omega_c + k2 + omega_c2) / denominator,
    }
}

impl BiquadCoefficients {
    /// A filter which outputs its input.
    pub const IDENTITY: BiquadCoefficients = BiquadCoefficients {
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
        b1: 0.0,
        b2: 0.0,
    };

    /// The low half of a 2nd-order Linkwitz-Riley crossover at `frequency` hz.
    pub fn linkwitz_riley_lowpass(frequency: f64, sample_rate: f64) -> Self {
        let s = lr_shared(frequency, sample_rate);
        let a0 = s.omega_c * s.omega_c / s.denominator;
        BiquadCoefficients {
            a0,
            a1: 2.0 * a0,
            a2: a0,
            b1: s.b1,
            b2: s.b2,
        }
    }

    /// The high half of a 2nd-order Linkwitz-Riley crossover at `frequency` hz.
    ///
    /// The output of this filter is in phase opposition to [Self::linkwitz_riley_lowpass]; negate it before summing.
    pub fn linkwitz_riley_highpass(frequency: f64, sample_rate: f64) -> Self {
        let s = lr_shared(frequency, sample_rate);
        let a0 = s.k * s.k / s.denominator;
        BiquadCoefficients {
            a0,
            a1: -2.0 * s.k * s.k / s.denominator,
            a2: a0,
            b1: s.b1,
            b2: s.b2,
        }
    }

    /// Get the frequency response of this filter as a complex number, given a frequency in hz.
    pub fn frequency_response(&self, frequency: f64, sample_rate: f64) -> Complex64 {
        let omega = 2.0 * PI * frequency / sample_rate;
        let z_inv = (-Complex64::i() * omega).exp();
        let z_inv2 = z_inv * z_inv;

        (self.a0 + self.a1 * z_inv + self.a2 * z_inv2) / (1.0 + self.b1 * z_inv + self.b2 * z_inv2)
    }
}

/// A 1-channel biquad filter.
#[derive(Debug, Clone)]
pub struct MonoBiquad {
    coefficients: BiquadCoefficients,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl MonoBiquad {
    pub fn new(coefficients: BiquadCoefficients) -> MonoBiquad {
        MonoBiquad {
            coefficients,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coefficients
    }

    /// Replace the coefficients, keeping the filter's memory.
    pub fn set_coefficients(&mut self, coefficients: BiquadCoefficients) {
        self.coefficients = coefficients;
    }

    /// Zero the filter's memory.
    pub fn flush(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Tick this filter by 1 sample.
    ///
    /// Outputs smaller in magnitude than the smallest normal `f32` are flushed to zero, both in the output and in the
    /// filter's memory, so that a decaying tail never becomes a stream of denormals.
    #[inline(always)]
    pub fn tick(&mut self, input: f32) -> f32 {
        let c = &self.coefficients;
        let x = input as f64;
        let mut y = c.a0 * x + c.a1 * self.x1 + c.a2 * self.x2 - c.b1 * self.y1 - c.b2 * self.y2;
        if y.abs() < f32::MIN_POSITIVE as f64 {
            y = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{close_floats::*, DbExt};

    const SR: f64 = 48000.0;

    #[test]
    fn test_lowpass_design() {
        let filt = BiquadCoefficients::linkwitz_riley_lowpass(1000.0, SR);
        // Linkwitz-Riley sections are -6 dB at the cutoff, not -3.
        close_floats64(filt.frequency_response(1000.0, SR).norm().gain_to_db(), -6.02, 0.01);
        close_floats64(filt.frequency_response(20.0, SR).norm().gain_to_db(), 0.0, 0.01);
        assert!(filt.frequency_response(16000.0, SR).norm().gain_to_db() < -40.0);
    }

    #[test]
    fn test_highpass_design() {
        let filt = BiquadCoefficients::linkwitz_riley_highpass(1000.0, SR);
        close_floats64(filt.frequency_response(1000.0, SR).norm().gain_to_db(), -6.02, 0.01);
        close_floats64(filt.frequency_response(20000.0, SR).norm().gain_to_db(), 0.0, 0.05);
        assert!(filt.frequency_response(50.0, SR).norm().gain_to_db() < -40.0);
    }

    /// Low minus high is an all-pass at every frequency.
    #[test]
    fn test_pair_sums_flat() {
        for cutoff in [10.0, 150.0, 1000.0, 12000.0, 20000.0] {
            let lp = BiquadCoefficients::linkwitz_riley_lowpass(cutoff, SR);
            let hp = BiquadCoefficients::linkwitz_riley_highpass(cutoff, SR);
            for probe in [20.0, 100.0, 1000.0, 5000.0, 15000.0, 23000.0] {
                let sum = lp.frequency_response(probe, SR) - hp.frequency_response(probe, SR);
                close_floats64(sum.norm(), 1.0, 1e-9);
            }
        }
    }

    #[test]
    fn test_identity() {
        let mut filt = MonoBiquad::new(BiquadCoefficients::IDENTITY);
        for x in [1.0f32, -0.5, 0.25, 0.0] {
            assert_eq!(filt.tick(x), x);
        }
    }

    #[test]
    fn test_denormals_flushed() {
        let mut filt = MonoBiquad::new(BiquadCoefficients::linkwitz_riley_lowpass(100.0, SR));
        filt.tick(1.0);
        // Long enough for the impulse response to decay well past the normal range.
        let mut last = 1.0f32;
        for _ in 0..100_000 {
            last = filt.tick(0.0);
            assert!(last == 0.0 || last.abs() >= f32::MIN_POSITIVE);
        }
        assert_eq!(last, 0.0);
    }

    #[test]
    fn test_flush() {
        let mut filt = MonoBiquad::new(BiquadCoefficients::linkwitz_riley_lowpass(100.0, SR));
        filt.tick(1.0);
        filt.flush();
        assert_eq!(filt.tick(0.0), 0.0);
    }
}
