use spatializer_dsp::ParameterSmoother;

use crate::config::*;

/// A square-root panner, for placing sources without any head modelling.
///
/// The azimuth maps linearly onto a pan position `p` in `[0, 1]`: -180 is hard left, 180 hard right.  The left gain is
/// `sqrt(1 - p)` and the right `sqrt(p)`, so the total power stays constant.  The position is smoothed per sample.
#[derive(Debug, Clone)]
pub struct ConstantPowerPanner {
    target: f32,
    smoother: ParameterSmoother,
}

fn pan_position(azimuth: f64) -> f32 {
    ((azimuth.clamp(MIN_AZIMUTH, MAX_AZIMUTH) - MIN_AZIMUTH) / (MAX_AZIMUTH - MIN_AZIMUTH)) as f32
}

#[inline(always)]
fn gains(p: f32) -> (f32, f32) {
    ((1.0 - p).max(0.0).sqrt(), p.max(0.0).sqrt())
}

impl ConstantPowerPanner {
    pub fn new(sample_rate: f64) -> ConstantPowerPanner {
        let target = pan_position(0.0);
        ConstantPowerPanner {
            target,
            smoother: ParameterSmoother::new(SMOOTHING_TIME_MS, sample_rate, target),
        }
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.smoother.set_time(SMOOTHING_TIME_MS, sample_rate);
    }

    pub fn set_azimuth(&mut self, azimuth: f64) {
        self.target = pan_position(azimuth);
    }

    /// The pan position being moved toward.
    pub fn pan_position(&self) -> f32 {
        self.target
    }

    /// Pan the mono signal in `left` across both channels.
    pub fn process_mono(&mut self, left: &mut [f32], right: &mut [f32]) {
        assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (gl, gr) = gains(self.smoother.process(self.target));
            let x = *l;
            *l = x * gl;
            *r = x * gr;
        }
    }

    /// Balance a stereo signal: each channel is scaled by its own gain.
    pub fn process_balance(&mut self, left: &mut [f32], right: &mut [f32]) {
        assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (gl, gr) = gains(self.smoother.process(self.target));
            *l *= gl;
            *r *= gr;
        }
    }
}
