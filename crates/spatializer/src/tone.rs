use spatializer_dsp::{ParameterSmoother, SvfCoefficients, SvfMode, SvfParameters, SvfState};

use crate::config::*;

/// The distance filter: a state variable filter crossfaded against the dry signal.
///
/// Output is `(1 - mix) * dry + mix * filtered`, with the mix smoothed.  Coefficients are only redesigned when a
/// parameter or the sample rate actually changes.
#[derive(Debug)]
pub struct ToneFilter {
    parameters: SvfParameters,
    sample_rate: f64,
    /// Coefficients and what they were designed for.
    cache: Option<(SvfParameters, f64, SvfCoefficients)>,
    mix: f32,
    mix_smoother: ParameterSmoother,
    states: [SvfState; MAX_CHANNELS],
}

impl ToneFilter {
    pub fn new(sample_rate: f64) -> ToneFilter {
        ToneFilter {
            parameters: SvfParameters::default(),
            sample_rate,
            cache: None,
            mix: 0.0,
            mix_smoother: ParameterSmoother::new(SMOOTHING_TIME_MS, sample_rate, 0.0),
            states: Default::default(),
        }
    }

    /// Move to a new sample rate, clearing filter memory.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.mix_smoother.set_time(SMOOTHING_TIME_MS, sample_rate);
        self.mix_smoother.reset(self.mix);
        self.states.iter_mut().for_each(SvfState::reset);
    }

    pub fn set_parameters(&mut self, parameters: SvfParameters) {
        self.parameters = parameters.clamped();
    }

    pub fn parameters(&self) -> SvfParameters {
        self.parameters
    }

    pub fn set_mode(&mut self, mode: SvfMode) {
        self.set_parameters(SvfParameters {
            mode,
            ..self.parameters
        });
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.set_parameters(SvfParameters {
            frequency,
            ..self.parameters
        });
    }

    pub fn set_q(&mut self, q: f64) {
        self.set_parameters(SvfParameters { q, ..self.parameters });
    }

    pub fn set_gain(&mut self, gain_db: f64) {
        self.set_parameters(SvfParameters {
            gain_db,
            ..self.parameters
        });
    }

    /// Set the wet proportion, clamped to `[0, 1]`.
    pub fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    fn cache_is_current(&self) -> bool {
        matches!(&self.cache, Some((p, sr, _)) if *p == self.parameters && *sr == self.sample_rate)
    }

    /// Coefficients for the current parameters, from the cache when it is current.
    pub fn coefficients(&self) -> SvfCoefficients {
        match &self.cache {
            Some((_, _, c)) if self.cache_is_current() => *c,
            _ => SvfCoefficients::design(&self.parameters, self.sample_rate),
        }
    }

    fn refresh_coefficients(&mut self) -> SvfCoefficients {
        if !self.cache_is_current() {
            let designed = SvfCoefficients::design(&self.parameters, self.sample_rate);
            self.cache = Some((self.parameters, self.sample_rate, designed));
        }
        self.coefficients()
    }

    /// Filter up to [MAX_CHANNELS] equal-length channels in place.
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        assert!(channels.len() <= MAX_CHANNELS);
        let Some(frames) = channels.first().map(|c| c.len()) else {
            return;
        };
        assert!(channels.iter().all(|c| c.len() == frames));

        let coefficients = self.refresh_coefficients();

        for i in 0..frames {
            let mix = self.mix_smoother.process(self.mix);
            for (channel, state) in channels.iter_mut().zip(self.states.iter_mut()) {
                let dry = channel[i];
                let wet = state.tick(&coefficients, dry);
                channel[i] = (1.0 - mix) * dry + mix * wet;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mix_is_exact() {
        let mut filter = ToneFilter::new(48000.0);
        filter.set_mode(SvfMode::HighPass);
        filter.set_frequency(5000.0);

        let input = (0..256).map(|i| (i as f32 * 0.1).sin()).collect::<Vec<_>>();
        let mut channel = input.clone();
        filter.process(&mut [&mut channel[..]]);
        assert_eq!(channel, input);
    }

    #[test]
    fn test_full_mix_is_filtered() {
        let mut filter = ToneFilter::new(48000.0);
        filter.set_parameters(SvfParameters {
            mode: SvfMode::LowPass,
            frequency: 100.0,
            q: 0.7,
            gain_db: 0.0,
        });
        filter.set_mix(1.0);

        // Alternating signs are nyquist, which a 100 Hz low-pass all but removes once the mix has settled.
        let mut left = (0..4800).map(|i| if i % 2 == 0 { 1.0f32 } else { -1.0 }).collect::<Vec<_>>();
        let mut right = left.clone();
        filter.process(&mut [&mut left[..], &mut right[..]]);
        assert!(left[4000..].iter().all(|x| x.abs() < 1e-3));
        assert_eq!(left, right);
    }

    #[test]
    fn test_cache() {
        let mut filter = ToneFilter::new(48000.0);
        filter.set_frequency(500.0);
        assert!(!filter.cache_is_current());
        filter.process(&mut [&mut [0.0f32; 4][..]]);
        assert!(filter.cache_is_current());

        // Setting the same value again doesn't invalidate.
        filter.set_frequency(500.0);
        assert!(filter.cache_is_current());

        filter.prepare(44100.0);
        assert!(!filter.cache_is_current());
        assert_eq!(
            filter.coefficients(),
            SvfCoefficients::design(&filter.parameters(), 44100.0)
        );
    }

    #[test]
    fn test_clamping() {
        let mut filter = ToneFilter::new(48000.0);
        filter.set_frequency(1.0);
        filter.set_q(100.0);
        filter.set_gain(-100.0);
        filter.set_mix(3.0);
        let p = filter.parameters();
        assert_eq!((p.frequency, p.q, p.gain_db), (10.0, 10.0, -36.0));
        assert_eq!(filter.mix(), 1.0);
    }
}
