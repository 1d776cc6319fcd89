//! Sample rate conversion of impulse responses, which happens once per load on the loader thread.
use rubato::{Resampler, SincFixedIn, SincInterpolationParameters};

use crate::config::*;

const SINC_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ResamplingError {
    #[error("Failed to create Rubato resampler: {0}")]
    RubatoError(#[from] rubato::ResamplerConstructionError),

    #[error("Failed to process samples: {0}")]
    ProcessError(#[from] rubato::ResampleError),

    #[error("Cannot resample from {from} Hz to {to} Hz")]
    InvalidRate { from: u32, to: u32 },
}

/// Resample one channel from `from` to `to` Hz.
///
/// The output is `round(len * to / from)` frames, aligned with the input (the resampler's delay is removed), and scaled
/// by `from / to` so that the impulse's energy per second of signal is preserved.  Equal rates and empty input are
/// copied straight through.
pub fn resample(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>, ResamplingError> {
    if from == 0 || to == 0 {
        return Err(ResamplingError::InvalidRate { from, to });
    }

    if from == to || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = to as f64 / from as f64;
    let out_len = (input.len() as f64 * ratio).round() as usize;
    let delay = (SINC_LEN as f64 / 2.0 * ratio).round() as usize;
    let scale = from as f64 / to as f64;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: rubato::SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: rubato::WindowFunction::Blackman,
    };
    let mut resampler = SincFixedIn::<f64>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)?;

    let mut chunk = [vec![0.0f64; RESAMPLE_CHUNK]];
    let mut chunk_out = [vec![0.0f64; resampler.output_frames_max()]];
    let mut output = Vec::with_capacity(delay + out_len + chunk_out[0].len());
    let mut consumed = 0;

    // Past the end of the input, zeros flush the resampler's tail.
    while output.len() < delay + out_len {
        let take = (input.len() - consumed).min(RESAMPLE_CHUNK);
        for (i, d) in chunk[0].iter_mut().enumerate() {
            *d = if i < take {
                input[consumed + i] as f64
            } else {
                0.0
            };
        }
        consumed += take;

        let (_, produced) = resampler.process_into_buffer(&chunk, &mut chunk_out, None)?;
        output.extend_from_slice(&chunk_out[0][..produced]);
    }

    Ok(output[delay..delay + out_len]
        .iter()
        .map(|x| (x * scale) as f32)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_equal_rates_copy() {
        let input = vec![1.0, -2.0, 3.0];
        assert_eq!(resample(&input, 44100, 44100).unwrap(), input);
        assert_eq!(resample(&[], 44100, 48000).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn test_zero_rate() {
        assert!(matches!(
            resample(&[1.0], 0, 48000),
            Err(ResamplingError::InvalidRate { from: 0, to: 48000 })
        ));
    }

    #[test]
    fn test_length() {
        let input = vec![0.0f32; 1000];
        assert_eq!(resample(&input, 44100, 48000).unwrap().len(), 1088);
        assert_eq!(resample(&input, 48000, 24000).unwrap().len(), 500);
        assert_eq!(resample(&input, 22050, 96000).unwrap().len(), 4354);
    }

    /// A low sine comes out as the same sine at the new rate, scaled by `from / to`, and in phase.
    #[test]
    fn test_sine() {
        let (from, to) = (44100u32, 48000u32);
        let freq = 100.0;
        let input = (0..4410)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / from as f64).sin() as f32)
            .collect::<Vec<_>>();
        let output = resample(&input, from, to).unwrap();
        let scale = from as f64 / to as f64;

        // Skip the edges, where the window runs off the signal.
        for (i, got) in output.iter().enumerate().take(output.len() - 300).skip(300) {
            let expected = (2.0 * std::f64::consts::PI * freq * i as f64 / to as f64).sin() * scale;
            assert!((*got as f64 - expected).abs() < 1e-2, "{i}: {got} vs {expected}");
        }
    }
}
