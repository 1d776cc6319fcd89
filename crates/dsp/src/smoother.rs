//! One-pole smoothing for control values.
//!
//! `y[n] = b·x + a·y[n-1]` with `a = exp(-1 / (time · sr))` and `b = 1 - a`.  After `time` seconds the output has covered
//! about 63% of a step.

/// A one-pole low-pass for removing zipper noise from parameter changes.
#[derive(Debug, Clone)]
pub struct ParameterSmoother {
    a: f32,
    b: f32,
    state: f32,
}

impl ParameterSmoother {
    /// Build a smoother which starts settled at `initial`.
    pub fn new(time_ms: f64, sample_rate: f64, initial: f32) -> ParameterSmoother {
        let mut ret = ParameterSmoother {
            a: 0.0,
            b: 1.0,
            state: initial,
        };
        ret.set_time(time_ms, sample_rate);
        ret
    }

    pub fn set_time(&mut self, time_ms: f64, sample_rate: f64) {
        let samples = time_ms / 1000.0 * sample_rate;
        if samples <= 0.0 {
            // No smoothing: follow the input immediately.
            self.a = 0.0;
            self.b = 1.0;
            return;
        }

        self.a = (-1.0 / samples).exp() as f32;
        self.b = 1.0 - self.a;
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f32) {
        self.state = value;
    }

    pub fn current(&self) -> f32 {
        self.state
    }

    /// Advance by one sample toward `target`.
    #[inline(always)]
    pub fn process(&mut self, target: f32) -> f32 {
        // Once settled, stay bit-exact rather than wobbling in the last place.
        if self.state != target {
            self.state = target * self.b + self.state * self.a;
        }
        self.state
    }
}
