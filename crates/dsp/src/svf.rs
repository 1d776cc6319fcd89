//! A trapezoidal-integrated state variable filter, after Andrew Simper's "Solving the continuous SVF equations using
//! trapezoidal integration and equivalent currents".
//!
//! One topology gives every response we need: the modes differ only in how the three internal signals are mixed.  Each
//! mode is therefore a pure function from parameters to [SvfCoefficients], and [SvfState] runs whichever set it is
//! handed.
use std::f64::consts::PI;

pub const MIN_FREQUENCY: f64 = 10.0;
pub const MAX_FREQUENCY: f64 = 20000.0;
pub const MIN_Q: f64 = 0.1;
pub const MAX_Q: f64 = 10.0;
pub const MIN_GAIN_DB: f64 = -36.0;
pub const MAX_GAIN_DB: f64 = 36.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SvfMode {
    #[default]
    LowPass,
    BandPass,
    HighPass,
    Notch,
    Peak,
    Bell,
    LowShelf,
    HighShelf,
}

impl SvfMode {
    pub const ALL: [SvfMode; 8] = [
        SvfMode::LowPass,
        SvfMode::BandPass,
        SvfMode::HighPass,
        SvfMode::Notch,
        SvfMode::Peak,
        SvfMode::Bell,
        SvfMode::LowShelf,
        SvfMode::HighShelf,
    ];

    /// Inverse of `mode as u8`, for storing modes in atomics.
    pub fn from_u8(value: u8) -> Option<SvfMode> {
        Self::ALL.get(value as usize).copied()
    }

    /// Does this mode use the gain parameter?
    pub fn uses_gain(&self) -> bool {
        matches!(self, SvfMode::Bell | SvfMode::LowShelf | SvfMode::HighShelf)
    }
}

/// Everything which determines a set of coefficients, save the sample rate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SvfParameters {
    pub mode: SvfMode,
    pub frequency: f64,
    pub q: f64,
    pub gain_db: f64,
}

impl Default for SvfParameters {
    fn default() -> Self {
        SvfParameters {
            mode: SvfMode::LowPass,
            frequency: 1000.0,
            q: std::f64::consts::FRAC_1_SQRT_2,
            gain_db: 0.0,
        }
    }
}

impl SvfParameters {
    /// Clamp every field to its supported range.
    pub fn clamped(self) -> SvfParameters {
        SvfParameters {
            mode: self.mode,
            frequency: self.frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY),
            q: self.q.clamp(MIN_Q, MAX_Q),
            gain_db: self.gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB),
        }
    }
}

/// Integrator and mix coefficients for one mode at one setting.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SvfCoefficients {
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    pub m0: f64,
    pub m1: f64,
    pub m2: f64,
}

impl SvfCoefficients {
    /// Design coefficients.  Parameters are clamped first.
    pub fn design(parameters: &SvfParameters, sample_rate: f64) -> SvfCoefficients {
        let p = parameters.clamped();
        // Keep the cutoff below nyquist, where tan blows up.
        let frequency = p.frequency.min(sample_rate * 0.49);
        let mut g = (PI * frequency / sample_rate).tan();
        let k = 1.0 / p.q;
        let a = if p.mode.uses_gain() {
            10.0f64.powf(p.gain_db / 40.0)
        } else {
            1.0
        };

        let (m0, m1, m2) = match p.mode {
            SvfMode::LowPass => (0.0, 0.0, 1.0),
            SvfMode::BandPass => (0.0, 1.0, 0.0),
            SvfMode::HighPass => (1.0, -k, -1.0),
            SvfMode::Notch => (1.0, -k, -2.0),
            SvfMode::Peak => (1.0, -k, 0.0),
            SvfMode::Bell => (1.0, k * (a * a - 1.0), 0.0),
            SvfMode::LowShelf => {
                g /= a.sqrt();
                (1.0, k * (a - 1.0), a * a - 1.0)
            }
            SvfMode::HighShelf => {
                g /= a.sqrt();
                (a * a, k * (1.0 - a) * a, 1.0 - a * a)
            }
        };

        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;

        SvfCoefficients {
            a1,
            a2,
            a3,
            m0,
            m1,
            m2,
        }
    }
}

/// The two integrator states of one channel.
#[derive(Debug, Copy, Clone, Default)]
pub struct SvfState {
    ic1eq: f64,
    ic2eq: f64,
}

impl SvfState {
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline(always)]
    pub fn tick(&mut self, c: &SvfCoefficients, input: f32) -> f32 {
        let v0 = input as f64;
        let v3 = v0 - self.ic2eq;
        let v1 = c.a1 * self.ic1eq + c.a2 * v3;
        let v2 = self.ic2eq + c.a2 * self.ic1eq + c.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        (c.m0 * v0 + c.m1 * v1 + c.m2 * v2) as f32
    }
}
