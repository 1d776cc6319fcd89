use std::sync::Arc;

use crate::config::*;
use crate::hrtf::Hrtf;

use super::BinauralPanner;

/// Spreads a stereo signal around the head: each input channel gets its own [BinauralPanner], mirrored about straight
/// ahead, and the two outputs are summed.
#[derive(Debug)]
pub struct StereoBinauralPanner {
    left: BinauralPanner,
    right: BinauralPanner,
    width: f64,
    input: Vec<f32>,
    sum_left: Vec<f32>,
    sum_right: Vec<f32>,
}

impl StereoBinauralPanner {
    pub fn new(hrtf: Arc<Hrtf>) -> StereoBinauralPanner {
        StereoBinauralPanner {
            left: BinauralPanner::new(hrtf.clone()),
            right: BinauralPanner::new(hrtf),
            width: 0.0,
            input: vec![],
            sum_left: vec![],
            sum_right: vec![],
        }
    }

    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> bool {
        let enabled = self.left.prepare(sample_rate, block_size) & self.right.prepare(sample_rate, block_size);
        self.input = vec![0.0; block_size];
        self.sum_left = vec![0.0; block_size];
        self.sum_right = vec![0.0; block_size];
        enabled
    }

    pub fn is_enabled(&self) -> bool {
        self.left.is_enabled() && self.right.is_enabled()
    }

    /// Set the angle between the two channels, clamped to `[0, 180]`.
    pub fn set_width(&mut self, width: f64) {
        self.width = width.clamp(0.0, MAX_WIDTH);
        self.left.set_azimuth(-self.width / 2.0);
        self.right.set_azimuth(self.width / 2.0);
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_elevation(&mut self, elevation: f64) {
        self.left.set_elevation(elevation);
        self.right.set_elevation(elevation);
    }

    pub fn set_crossover_frequency(&mut self, frequency: f64) {
        self.left.set_crossover_frequency(frequency);
        self.right.set_crossover_frequency(frequency);
    }

    pub fn left(&self) -> &BinauralPanner {
        &self.left
    }

    pub fn right(&self) -> &BinauralPanner {
        &self.right
    }

    /// Pan a stereo block in place.  Returns false, leaving the block untouched, if disabled.
    ///
    /// # Panics
    ///
    /// If the channels differ in length or are longer than the prepared block size.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let n = left.len();
        assert_eq!(right.len(), n);
        assert!(n <= self.input.len());

        let input = &mut self.input[..n];
        let sum_left = &mut self.sum_left[..n];
        let sum_right = &mut self.sum_right[..n];

        input.copy_from_slice(left);
        self.right.process(right, sum_left, sum_right);
        // The right input has been consumed, so both channels are free to receive the left panner's output.
        self.left.process(input, left, right);

        for (o, s) in left.iter_mut().zip(sum_left.iter()) {
            *o += s;
        }
        for (o, s) in right.iter_mut().zip(sum_right.iter()) {
            *o += s;
        }

        true
    }
}
