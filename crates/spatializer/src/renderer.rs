use std::path::Path;
use std::sync::Arc;

use arrayvec::ArrayVec;
use spatializer_dsp::{SvfCoefficients, SvfMode};

use crate::config::*;
use crate::controls::{ControlSnapshot, Controls};
use crate::hrtf::{HrirPair, Hrtf, SphericalPosition};
use crate::panner::{BinauralPanner, ConstantPowerPanner, InputLayout, PannerMode, StereoBinauralPanner};
use crate::presets::ContentType;
use crate::reverb::{ConvolutionReverb, ImpulseSource, ReverbStatus};
use crate::tone::ToneFilter;

#[derive(Debug, Copy, Clone)]
struct Format {
    sample_rate: f64,
    block_size: usize,
}

/// The whole render graph: panner, then tone filter, then reverb, in place on the host's buffer.
///
/// Controls may be changed from any thread through a [Controls] handle (see [Renderer::controls]); the setters here
/// are the same thing.  Changes are picked up at the start of the next block.
///
/// Call [Renderer::configure] before rendering, and again whenever the sample rate or block size changes.
/// Configuration allocates and so must not happen on the render thread; rendering never allocates, locks, or frees.
#[derive(Debug)]
pub struct Renderer {
    controls: Controls,
    applied: Option<ControlSnapshot>,

    mono: BinauralPanner,
    stereo: StereoBinauralPanner,
    constant_power: ConstantPowerPanner,
    tone: ToneFilter,
    reverb: ConvolutionReverb,

    format: Option<Format>,
    /// Copy of the mono source, which the binaural panner reads while writing both channels.
    input: Vec<f32>,
    /// Deinterleaving space.
    planar: [Vec<f32>; MAX_CHANNELS],
}

impl Renderer {
    pub fn new(hrtf: Arc<Hrtf>) -> crate::Result<Renderer> {
        let reverb = ConvolutionReverb::new()?;
        let controls = Controls::new(reverb.loader().clone());

        Ok(Renderer {
            controls,
            applied: None,
            mono: BinauralPanner::new(hrtf.clone()),
            stereo: StereoBinauralPanner::new(hrtf),
            constant_power: ConstantPowerPanner::new(44100.0),
            tone: ToneFilter::new(44100.0),
            reverb,
            format: None,
            input: vec![],
            planar: Default::default(),
        })
    }

    /// Build a renderer from an HRTF resource in the packed dataset format.
    pub fn from_hrtf_bytes(bytes: &[u8]) -> crate::Result<Renderer> {
        Self::new(Arc::new(Hrtf::build(bytes)?))
    }

    pub fn from_hrtf_file(path: impl AsRef<Path>) -> crate::Result<Renderer> {
        Self::new(Arc::new(Hrtf::from_file(path)?))
    }

    /// Prepare for a sample rate and block size.
    ///
    /// Block sizes which are not a power of two disable binaural panning; audio then passes through the panner
    /// untouched.  The reverb goes dry until the current impulse response has been rebuilt for the new format.
    ///
    /// # Panics
    ///
    /// If the block size is zero.
    pub fn configure(&mut self, sample_rate: f64, block_size: usize) {
        assert!(block_size > 0, "Block size must not be zero");

        let binaural = self.mono.prepare(sample_rate, block_size);
        self.stereo.prepare(sample_rate, block_size);
        self.constant_power.prepare(sample_rate);
        self.tone.prepare(sample_rate);
        self.reverb.configure(sample_rate, block_size);

        self.input = vec![0.0; block_size];
        self.planar = std::array::from_fn(|_| vec![0.0; block_size]);
        self.applied = None;
        self.format = Some(Format {
            sample_rate,
            block_size,
        });

        log::info!(
            "Configured for {sample_rate} Hz, {block_size} frames per block, binaural panning {}",
            if binaural { "on" } else { "off" }
        );
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.format.map(|f| f.sample_rate)
    }

    pub fn block_size(&self) -> Option<usize> {
        self.format.map(|f| f.block_size)
    }

    pub fn is_binaural_enabled(&self) -> bool {
        self.mono.is_enabled()
    }

    /// Render planar channels in place.
    ///
    /// Blocks longer than the configured size are processed a configured block at a time.  Before [Renderer::configure]
    /// the buffer is left untouched.
    ///
    /// # Panics
    ///
    /// If there are more than 2 channels, or channels differ in length.
    pub fn render(&mut self, channels: &mut [&mut [f32]]) {
        crate::is_audio_thread::mark_audio_thread();

        let Some(format) = self.format else {
            rt_warn!("Rendering before configure; leaving the buffer untouched");
            return;
        };
        assert!(channels.len() <= MAX_CHANNELS);
        let Some(frames) = channels.first().map(|c| c.len()) else {
            return;
        };
        assert!(
            channels.iter().all(|c| c.len() == frames),
            "Channels must be the same length"
        );

        if frames <= format.block_size {
            self.render_block(channels);
            return;
        }

        rt_debug!(
            "Block of {} frames is over the configured {}; splitting",
            frames,
            format.block_size
        );
        let mut start = 0;
        while start < frames {
            let end = (start + format.block_size).min(frames);
            let mut chunk = channels
                .iter_mut()
                .map(|c| &mut c[start..end])
                .collect::<ArrayVec<&mut [f32], MAX_CHANNELS>>();
            self.render_block(&mut chunk);
            start = end;
        }
    }

    /// Render interleaved frames of `num_channels` channels in place.
    ///
    /// # Panics
    ///
    /// If `num_channels` is not 1 or 2, or the buffer isn't a whole number of frames.
    pub fn render_interleaved(&mut self, samples: &mut [f32], num_channels: usize) {
        crate::is_audio_thread::mark_audio_thread();

        assert!((1..=MAX_CHANNELS).contains(&num_channels));
        assert_eq!(samples.len() % num_channels, 0, "Partial frame");
        let Some(format) = self.format else {
            rt_warn!("Rendering before configure; leaving the buffer untouched");
            return;
        };

        // Moved out for the duration so that rendering can borrow self.  Taking leaves empty arrays, which don't
        // allocate.
        let mut planar = std::mem::take(&mut self.planar);

        for frames in samples.chunks_mut(format.block_size * num_channels) {
            let n = frames.len() / num_channels;
            for (i, frame) in frames.chunks_exact(num_channels).enumerate() {
                for (c, s) in frame.iter().enumerate() {
                    planar[c][i] = *s;
                }
            }

            let mut chunk = planar[..num_channels]
                .iter_mut()
                .map(|c| &mut c[..n])
                .collect::<ArrayVec<&mut [f32], MAX_CHANNELS>>();
            self.render_block(&mut chunk);
            drop(chunk);

            for (i, frame) in frames.chunks_exact_mut(num_channels).enumerate() {
                for (c, s) in frame.iter_mut().enumerate() {
                    *s = planar[c][i];
                }
            }
        }

        self.planar = planar;
    }

    fn apply_controls(&mut self) {
        let s = self.controls.snapshot();
        let previous = self.applied.replace(s);
        if previous == Some(s) {
            return;
        }

        self.mono.set_azimuth(s.azimuth);
        self.mono.set_elevation(s.elevation);
        self.stereo.set_width(s.width);
        self.stereo.set_elevation(s.elevation);
        // Redesigning the crossover is the only expensive part, so only do it on an actual change.
        if previous.map(|p| p.crossover_frequency) != Some(s.crossover_frequency) {
            self.mono.set_crossover_frequency(s.crossover_frequency);
            self.stereo.set_crossover_frequency(s.crossover_frequency);
        }
        self.constant_power.set_azimuth(s.azimuth);
        self.tone.set_parameters(s.tone);
        self.tone.set_mix(s.tone_mix);
        self.reverb.set_gains(s.dry_gain, s.wet_gain);
    }

    fn pan(&mut self, channels: &mut [&mut [f32]]) {
        let Some(s) = self.applied else {
            return;
        };
        if !s.spatialize || s.panner_mode == PannerMode::Bypass {
            return;
        }

        // Every panner produces two channels.
        let [left, right] = channels else {
            return;
        };
        let (left, right) = (&mut **left, &mut **right);

        match (s.panner_mode, s.input_layout) {
            (PannerMode::Binaural, InputLayout::Mono) => {
                let input = &mut self.input[..left.len()];
                input.copy_from_slice(left);
                self.mono.process(input, left, right);
            }
            (PannerMode::Binaural, InputLayout::Stereo) => {
                self.stereo.process(left, right);
            }
            (PannerMode::ConstantPower, InputLayout::Mono) => {
                self.constant_power.process_mono(left, right);
            }
            (PannerMode::ConstantPower, InputLayout::Stereo) => {
                self.constant_power.process_balance(left, right);
            }
            (PannerMode::Bypass, _) => {}
        }
    }

    /// One block no longer than the configured size.
    fn render_block(&mut self, channels: &mut [&mut [f32]]) {
        self.apply_controls();
        self.pan(channels);
        self.tone.process(channels);
        self.reverb.process(channels);
    }

    /// A handle for changing controls from other threads.
    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn set_azimuth(&self, azimuth: f64) {
        self.controls.set_azimuth(azimuth);
    }

    pub fn set_elevation(&self, elevation: f64) {
        self.controls.set_elevation(elevation);
    }

    pub fn set_width(&self, width: f64) {
        self.controls.set_width(width);
    }

    pub fn set_crossover_frequency(&self, frequency: f64) {
        self.controls.set_crossover_frequency(frequency);
    }

    pub fn set_tone_frequency(&self, frequency: f64) {
        self.controls.set_tone_frequency(frequency);
    }

    pub fn set_tone_q(&self, q: f64) {
        self.controls.set_tone_q(q);
    }

    pub fn set_tone_gain(&self, gain_db: f64) {
        self.controls.set_tone_gain(gain_db);
    }

    pub fn set_tone_type(&self, mode: SvfMode) {
        self.controls.set_tone_type(mode);
    }

    pub fn set_tone_mix(&self, mix: f32) {
        self.controls.set_tone_mix(mix);
    }

    pub fn set_dry_level(&self, db: f32) {
        self.controls.set_dry_level(db);
    }

    pub fn set_wet_level(&self, db: f32) {
        self.controls.set_wet_level(db);
    }

    pub fn set_mix(&self, mix: f32) {
        self.controls.set_mix(mix);
    }

    pub fn set_distance(&self, distance: f64) {
        self.controls.set_distance(distance);
    }

    pub fn set_panner_mode(&self, mode: PannerMode) {
        self.controls.set_panner_mode(mode);
    }

    pub fn set_input_layout(&self, layout: InputLayout) {
        self.controls.set_input_layout(layout);
    }

    pub fn set_content_type(&self, content_type: ContentType, impulse: Option<ImpulseSource>) {
        self.controls.set_content_type(content_type, impulse);
    }

    /// Start loading an impulse response in the background.
    ///
    /// Returns immediately.  Until loading finishes the previous impulse response (or none) stays in use; a later call
    /// supersedes any load still in flight.  Failures are logged and leave the previous impulse response in place.
    pub fn load_impulse_response(&self, source: ImpulseSource) {
        self.controls.load_impulse_response(source);
    }

    /// Where the mono panner is pointing, after clamping.  Updated by rendering.
    pub fn position(&self) -> SphericalPosition {
        self.mono.position()
    }

    /// The HRIR pair the mono panner is using.
    pub fn current_hrir(&self) -> &HrirPair {
        self.mono.hrir()
    }

    pub fn tone_coefficients(&self) -> SvfCoefficients {
        self.tone.coefficients()
    }

    pub fn reverb_status(&self) -> ReverbStatus {
        self.reverb.status()
    }
}
