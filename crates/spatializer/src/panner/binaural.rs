use std::sync::Arc;

use spatializer_dsp::{Crossover, FftFir};

use crate::config::*;
use crate::hrtf::{HrirPair, Hrtf, HrtfContainer, SphericalPosition};

/// Per-format state, allocated by [BinauralPanner::prepare].
#[derive(Debug)]
struct Prepared {
    block_size: usize,
    crossover: Crossover,
    left: FftFir,
    right: FftFir,
    low: Vec<f32>,
    high_left: Vec<f32>,
    high_right: Vec<f32>,
}

/// Places a mono signal around the listener's head.
///
/// The input is split by a crossover and only the high band goes through the HRIR pair; the low band is added back
/// untouched, then both ears are halved.  The pair is only re-interpolated on blocks where the position changed.
///
/// Until [BinauralPanner::prepare] has been given a power-of-two block size the panner is disabled and
/// [BinauralPanner::process] does nothing.
#[derive(Debug)]
pub struct BinauralPanner {
    container: HrtfContainer,
    position: SphericalPosition,
    /// The position the installed pair was computed for.
    applied: Option<SphericalPosition>,
    crossover_frequency: f64,
    prepared: Option<Prepared>,
}

impl BinauralPanner {
    pub fn new(hrtf: Arc<Hrtf>) -> BinauralPanner {
        BinauralPanner {
            container: HrtfContainer::new(hrtf),
            position: SphericalPosition::default(),
            applied: None,
            crossover_frequency: DEFAULT_CROSSOVER_FREQUENCY,
            prepared: None,
        }
    }

    /// Allocate for a format.  Returns whether the panner is enabled.
    ///
    /// Block sizes which are not a power of two disable the panner.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> bool {
        if !block_size.is_power_of_two() {
            log::warn!("Binaural panning is disabled: block size {block_size} is not a power of two");
            self.prepared = None;
            return false;
        }

        self.prepared = Some(Prepared {
            block_size,
            crossover: Crossover::new(sample_rate, self.crossover_frequency),
            left: FftFir::new(block_size, HRIR_LENGTH),
            right: FftFir::new(block_size, HRIR_LENGTH),
            low: vec![0.0; block_size],
            high_left: vec![0.0; block_size],
            high_right: vec![0.0; block_size],
        });
        // The new filters start silent, so the pair has to be installed again.
        self.applied = None;
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn set_azimuth(&mut self, azimuth: f64) {
        self.position.azimuth = azimuth.clamp(MIN_AZIMUTH, MAX_AZIMUTH);
    }

    pub fn set_elevation(&mut self, elevation: f64) {
        self.position.elevation = elevation.clamp(MIN_ELEVATION, MAX_ELEVATION);
    }

    pub fn set_crossover_frequency(&mut self, frequency: f64) {
        self.crossover_frequency = frequency;
        if let Some(p) = self.prepared.as_mut() {
            p.crossover.set_frequency(frequency);
        }
    }

    pub fn position(&self) -> SphericalPosition {
        self.position
    }

    /// The pair currently in the filters.
    pub fn hrir(&self) -> &HrirPair {
        self.container.hrir()
    }

    fn refresh_hrir(&mut self) {
        let Some(p) = self.prepared.as_mut() else {
            return;
        };
        if self.applied == Some(self.position) {
            return;
        }

        if !self.container.update_hrir(self.position.into()) {
            rt_debug!(
                "No triangle contains azimuth {} elevation {}; keeping the previous HRIR",
                self.position.azimuth,
                self.position.elevation
            );
        }

        let hrir = self.container.hrir();
        p.left
            .set_impulse(&hrir.left)
            .expect("HRIRs always fit the filter");
        p.right
            .set_impulse(&hrir.right)
            .expect("HRIRs always fit the filter");
        self.applied = Some(self.position);
    }

    /// Pan `input` into `left` and `right`.  Returns false, leaving the outputs untouched, if the panner is disabled.
    ///
    /// # Panics
    ///
    /// If the slices differ in length or are longer than the prepared block size.
    pub fn process(&mut self, input: &[f32], left: &mut [f32], right: &mut [f32]) -> bool {
        self.refresh_hrir();
        let Some(p) = self.prepared.as_mut() else {
            return false;
        };

        let n = input.len();
        assert!(n <= p.block_size);
        assert_eq!(left.len(), n);
        assert_eq!(right.len(), n);

        let low = &mut p.low[..n];
        let high_left = &mut p.high_left[..n];
        let high_right = &mut p.high_right[..n];

        p.crossover.process_block(input, low, high_left);
        high_right.copy_from_slice(high_left);
        p.left.process(high_left);
        p.right.process(high_right);

        for i in 0..n {
            left[i] = 0.5 * (low[i] + high_left[i]);
            right[i] = 0.5 * (low[i] + high_right[i]);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::hrtf::HrtfDataset;

    /// A dataset whose left ear is a unit impulse and whose right ear is silent everywhere.
    fn left_only() -> Arc<Hrtf> {
        let dataset = HrtfDataset::from_fn(|_, _| {
            let mut pair = HrirPair::default();
            pair.left[0] = 1.0;
            pair
        });
        Arc::new(Hrtf::from_dataset(dataset).unwrap())
    }

    #[test]
    fn test_disabled_for_odd_blocks() {
        let mut panner = BinauralPanner::new(left_only());
        assert!(!panner.prepare(48000.0, 100));
        let input = [1.0f32; 100];
        let mut left = [0.25f32; 100];
        let mut right = [0.5f32; 100];
        assert!(!panner.process(&input, &mut left, &mut right));
        assert!(left.iter().all(|x| *x == 0.25));
        assert!(right.iter().all(|x| *x == 0.5));
    }

    #[test]
    fn test_clamping() {
        let mut panner = BinauralPanner::new(left_only());
        panner.set_azimuth(200.0);
        panner.set_elevation(-100.0);
        assert_eq!(
            panner.position(),
            SphericalPosition {
                azimuth: 180.0,
                elevation: -90.0
            }
        );
    }

    /// With a unit left ear, the left output reconstructs the input (halved) through the all-pass crossover, and the
    /// right output carries only the low band.
    #[test]
    fn test_band_routing() {
        let mut panner = BinauralPanner::new(left_only());
        assert!(panner.prepare(48000.0, 256));
        panner.set_crossover_frequency(1000.0);

        let mut input = [0.0f32; 256];
        input[0] = 1.0;
        let mut left = [0.0f32; 256];
        let mut right = [0.0f32; 256];
        assert!(panner.process(&input, &mut left, &mut right));
        assert_eq!(panner.hrir().left[0], 1.0);

        let mut crossover = Crossover::new(48000.0, 1000.0);
        for i in 0..256 {
            let (low, high) = crossover.tick(input[i]);
            assert!((left[i] - 0.5 * (low + high)).abs() < 1e-5, "{i}");
            assert!((right[i] - 0.5 * low).abs() < 1e-5, "{i}");
        }
    }

    #[test]
    fn test_recomputes_only_on_change() {
        let mut panner = BinauralPanner::new(left_only());
        assert!(panner.prepare(48000.0, 64));
        let input = [0.0f32; 64];
        let (mut l, mut r) = ([0.0f32; 64], [0.0f32; 64]);

        panner.process(&input, &mut l, &mut r);
        let applied = panner.applied;
        assert_eq!(applied, Some(SphericalPosition::default()));

        panner.set_azimuth(30.0);
        panner.process(&input, &mut l, &mut r);
        assert_eq!(panner.applied.map(|p| p.azimuth), Some(30.0));
    }
}
