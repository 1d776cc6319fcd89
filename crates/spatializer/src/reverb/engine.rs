use realfft::RealFftPlanner;
use spatializer_dsp::PartitionedConvolver;

use crate::config::*;

/// One partitioned convolver per render channel, all sharing a partition size and so a latency.
///
/// Render channel `c` convolves with impulse channel `c % impulse_channels`, so a mono impulse feeds every channel.
pub struct ConvolutionEngine {
    convolvers: Vec<PartitionedConvolver>,
    impulse_len: usize,
    impulse_channels: usize,
}

impl std::fmt::Debug for ConvolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvolutionEngine")
            .field("impulse_len", &self.impulse_len)
            .field("impulse_channels", &self.impulse_channels)
            .field("latency", &self.latency())
            .finish_non_exhaustive()
    }
}

/// The partition size for a block size.
pub fn partition_for_block(block_size: usize) -> usize {
    block_size.next_power_of_two().max(MIN_PARTITION)
}

impl ConvolutionEngine {
    /// Build an engine for [MAX_CHANNELS] render channels.
    ///
    /// # Panics
    ///
    /// If there are no impulse channels or the block size is zero.
    pub fn new(impulse: &[Vec<f32>], block_size: usize) -> ConvolutionEngine {
        assert!(!impulse.is_empty());

        let partition = partition_for_block(block_size);
        let mut planner = RealFftPlanner::new();
        let convolvers = (0..MAX_CHANNELS)
            .map(|c| {
                PartitionedConvolver::with_planner(
                    &mut planner,
                    &impulse[c % impulse.len()],
                    partition,
                    block_size,
                )
            })
            .collect();

        ConvolutionEngine {
            convolvers,
            impulse_len: impulse.iter().map(|c| c.len()).max().unwrap_or(0),
            impulse_channels: impulse.len(),
        }
    }

    pub fn impulse_len(&self) -> usize {
        self.impulse_len
    }

    pub fn impulse_channels(&self) -> usize {
        self.impulse_channels
    }

    pub fn latency(&self) -> usize {
        self.convolvers[0].latency()
    }

    /// Feed one block to render channel `channel`.
    pub fn add(&mut self, channel: usize, input: &[f32]) {
        self.convolvers[channel].add(input);
    }

    /// How many of the next `wanted` samples every channel has ready.
    pub fn avail(&self, wanted: usize) -> usize {
        self.convolvers
            .iter()
            .map(|c| c.avail(wanted))
            .min()
            .unwrap_or(0)
    }

    /// Pending wet output of a render channel.
    pub fn output(&self, channel: usize) -> &[f32] {
        self.convolvers[channel].output()
    }

    pub fn advance(&mut self, count: usize) {
        for c in self.convolvers.iter_mut() {
            c.advance(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        assert_eq!(partition_for_block(1), 64);
        assert_eq!(partition_for_block(64), 64);
        assert_eq!(partition_for_block(100), 128);
        assert_eq!(partition_for_block(512), 512);
    }

    #[test]
    fn test_channel_mapping() {
        // A mono impulse which is a two sample delay.
        let mut engine = ConvolutionEngine::new(&[vec![0.0, 0.0, 1.0]], 64);
        assert_eq!(engine.impulse_channels(), 1);
        assert_eq!(engine.latency(), 0);

        let mut input = [0.0f32; 64];
        input[0] = 1.0;
        engine.add(0, &input);
        engine.add(1, &input);
        assert_eq!(engine.avail(64), 64);
        for c in 0..MAX_CHANNELS {
            let out = engine.output(c);
            assert!((out[2] - 1.0).abs() < 1e-5);
            assert!(out[0].abs() < 1e-5);
        }
        engine.advance(64);
        assert_eq!(engine.avail(64), 0);
    }

    #[test]
    fn test_stereo_impulse() {
        let mut engine = ConvolutionEngine::new(&[vec![1.0], vec![-1.0]], 64);
        let input = [1.0f32; 64];
        engine.add(0, &input);
        engine.add(1, &input);
        assert!((engine.output(0)[10] - 1.0).abs() < 1e-5);
        assert!((engine.output(1)[10] + 1.0).abs() < 1e-5);
    }
}
