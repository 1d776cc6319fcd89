//! Convolution reverb.
//!
//! Rendering runs a [ConvolutionEngine] which is swapped wholesale when a new impulse response finishes loading.  All
//! of the work of getting there (decoding, resampling, transforming) happens on the loader thread; see [loader].
mod decode;
mod engine;
pub(crate) mod loader;
mod resample;

use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::Ordering;

use audio_synchronization::{mailbox, MailboxReceiver};
use spatializer_dsp::{DbExt, ParameterSmoother};

pub use decode::*;
pub use engine::*;
pub use resample::*;

use crate::background_drop::BackgroundDrop;
use crate::config::*;
use loader::{LoaderHandle, StagedEngine};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to decode impulse response: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("Unable to read impulse response: {0}")]
    Io(#[from] std::io::Error),

    #[error("The impulse response has no audio")]
    NoAudioTrack,

    #[error("The impulse response does not say what its sample rate is")]
    UnknownSampleRate,

    #[error(transparent)]
    Resampling(#[from] ResamplingError),
}

/// What the reverb is currently running, for display.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ReverbStatus {
    /// Generation of the request the running engine answers, 0 if none.
    pub installed_generation: u64,
    /// How many engines have been installed.
    pub installs: u64,
    /// Frames of the running impulse response, at the render rate.
    pub impulse_len: usize,
    pub channels: usize,
}

#[derive(Debug)]
struct Format {
    sample_rate: f64,
    block_size: usize,
    dry_gains: Vec<f32>,
    wet_gains: Vec<f32>,
    silence: Vec<f32>,
}

/// Mixes a dry signal with its convolution against an impulse response.
///
/// Until an engine is installed the output is the dry signal at the dry gain.  When an engine has less output ready
/// than the block needs, the start of the block is dry only.
#[derive(Debug)]
pub struct ConvolutionReverb {
    loader: LoaderHandle,
    incoming: MailboxReceiver<StagedEngine>,
    engine: Option<BackgroundDrop<StagedEngine>>,
    installs: u64,

    dry_gain: f32,
    wet_gain: f32,
    dry_smoother: ParameterSmoother,
    wet_smoother: ParameterSmoother,

    format: Option<Format>,
}

impl ConvolutionReverb {
    /// Build a reverb and start its loader thread.
    pub fn new() -> crate::Result<ConvolutionReverb> {
        crate::background_drop::ensure_background_drop_thread_started();
        crate::logging::ensure_log_ctx();

        let (sender, incoming) = mailbox();
        let loader = LoaderHandle::spawn(sender)?;

        Ok(ConvolutionReverb {
            loader,
            incoming,
            engine: None,
            installs: 0,
            dry_gain: 1.0,
            wet_gain: 0.0,
            dry_smoother: ParameterSmoother::new(SMOOTHING_TIME_MS, 44100.0, 1.0),
            wet_smoother: ParameterSmoother::new(SMOOTHING_TIME_MS, 44100.0, 0.0),
            format: None,
        })
    }

    pub(crate) fn loader(&self) -> &LoaderHandle {
        &self.loader
    }

    /// Prepare for a format, and have the loader rebuild the current impulse response for it.
    ///
    /// A new format drops the running engine, so the reverb is dry until the rebuild lands.  The same format again only
    /// settles the gain smoothers.  Not for the render thread.
    pub fn configure(&mut self, sample_rate: f64, block_size: usize) {
        assert!(block_size > 0);

        self.dry_smoother.reset(self.dry_gain);
        self.wet_smoother.reset(self.wet_gain);
        if self
            .format
            .as_ref()
            .is_some_and(|f| f.sample_rate == sample_rate && f.block_size == block_size)
        {
            return;
        }

        self.engine = None;
        self.loader
            .shared()
            .installed_generation
            .store(0, Ordering::Release);
        self.dry_smoother.set_time(SMOOTHING_TIME_MS, sample_rate);
        self.wet_smoother.set_time(SMOOTHING_TIME_MS, sample_rate);
        self.format = Some(Format {
            sample_rate,
            block_size,
            dry_gains: vec![0.0; block_size],
            wet_gains: vec![0.0; block_size],
            silence: vec![0.0; block_size],
        });

        self.loader.reconfigure(sample_rate, block_size);
    }

    /// Start loading an impulse response.  Returns immediately; the new reverb is heard once loading finishes.
    pub fn load_impulse_response(&self, source: ImpulseSource) {
        self.loader.request(Some(source));
    }

    /// Set the dry level in dB.  Negative infinity is silence.
    pub fn set_dry_level(&mut self, db: f32) {
        self.dry_gain = db.db_to_gain();
    }

    /// Set the wet level in dB.  Negative infinity is silence.
    pub fn set_wet_level(&mut self, db: f32) {
        self.wet_gain = db.db_to_gain();
    }

    /// Equal-power crossfade: 0 is all dry, 1 all wet.
    pub fn set_mix(&mut self, mix: f32) {
        let angle = mix.clamp(0.0, 1.0) * FRAC_PI_2;
        self.dry_gain = angle.cos();
        self.wet_gain = angle.sin();
    }

    /// Set both linear gains at once.
    pub fn set_gains(&mut self, dry: f32, wet: f32) {
        self.dry_gain = dry;
        self.wet_gain = wet;
    }

    pub fn gains(&self) -> (f32, f32) {
        (self.dry_gain, self.wet_gain)
    }

    pub fn status(&self) -> ReverbStatus {
        ReverbStatus {
            installed_generation: self.engine.as_ref().map(|e| e.generation).unwrap_or(0),
            installs: self.installs,
            impulse_len: self
                .engine
                .as_ref()
                .map(|e| e.engine.impulse_len())
                .unwrap_or(0),
            channels: self
                .engine
                .as_ref()
                .map(|e| e.engine.impulse_channels())
                .unwrap_or(0),
        }
    }

    /// Pick up a finished engine, if there is one and it answers the newest request.
    fn install_pending(&mut self) {
        let Some(staged) = self.incoming.recv() else {
            return;
        };

        let staged = BackgroundDrop::new(staged);
        let shared = self.loader.shared();
        let latest = shared.latest_generation.load(Ordering::Acquire);
        if staged.generation != latest {
            rt_debug!(
                "Discarding engine for request {}; {} is newer",
                staged.generation,
                latest
            );
            return;
        }

        rt_info!(
            "Installing impulse response from request {}",
            staged.generation
        );
        shared
            .installed_generation
            .store(staged.generation, Ordering::Release);
        // The previous engine goes to the background drop thread.
        self.engine = Some(staged);
        self.installs += 1;
    }

    /// Process up to [MAX_CHANNELS] equal-length channels in place.
    ///
    /// # Panics
    ///
    /// If called before [ConvolutionReverb::configure], with more channels than supported, or with a block longer than
    /// the configured size.
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        self.install_pending();

        let format = self
            .format
            .as_mut()
            .expect("The reverb must be configured before processing");
        assert!(channels.len() <= MAX_CHANNELS);
        let Some(n) = channels.first().map(|c| c.len()) else {
            return;
        };
        assert!(n <= format.block_size);
        assert!(channels.iter().all(|c| c.len() == n));

        let dry_gains = &mut format.dry_gains[..n];
        for d in dry_gains.iter_mut() {
            *d = self.dry_smoother.process(self.dry_gain);
        }

        let Some(staged) = self.engine.as_mut() else {
            for channel in channels.iter_mut() {
                for (x, g) in channel.iter_mut().zip(dry_gains.iter()) {
                    *x *= g;
                }
            }
            return;
        };
        let engine = &mut staged.engine;

        // Channels the buffer doesn't have still get silence, so that every convolver stays in step.
        for c in 0..MAX_CHANNELS {
            match channels.get(c) {
                Some(input) => engine.add(c, input),
                None => engine.add(c, &format.silence[..n]),
            }
        }

        // The wet gain only moves where there is wet output.
        let avail = engine.avail(n);
        let dry_only = n - avail;
        let wet_gains = &mut format.wet_gains[..avail];
        for w in wet_gains.iter_mut() {
            *w = self.wet_smoother.process(self.wet_gain);
        }

        for (c, channel) in channels.iter_mut().enumerate() {
            let wet = &engine.output(c)[..avail];
            for (x, g) in channel[..dry_only].iter_mut().zip(dry_gains.iter()) {
                *x *= g;
            }
            for (((x, w), dg), wg) in channel[dry_only..]
                .iter_mut()
                .zip(wet.iter())
                .zip(dry_gains[dry_only..].iter())
                .zip(wet_gains.iter())
            {
                *x = *x * dg + w * wg;
            }
        }
        engine.advance(avail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};

    use crate::reverb::decode::tests::wav_bytes;

    fn signal(len: usize) -> Vec<f32> {
        (0..len).map(|i| ((i * 7919) % 1000) as f32 / 500.0 - 1.0).collect()
    }

    /// Render silence until an engine is installed.
    fn wait_for_install(reverb: &mut ConvolutionReverb, block: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while reverb.status().installs == 0 {
            assert!(Instant::now() < deadline, "Nothing was ever installed");
            let mut left = vec![0.0f32; block];
            reverb.process(&mut [&mut left[..]]);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_dry_without_impulse_is_exact() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 128);
        let input = signal(128);
        let mut left = input.clone();
        let mut right = input.clone();
        for _ in 0..4 {
            reverb.process(&mut [&mut left[..], &mut right[..]]);
            assert_eq!(left, input);
            assert_eq!(right, input);
        }
    }

    #[test]
    fn test_mix_gains() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.set_mix(0.0);
        assert_eq!(reverb.gains(), (1.0, 0.0));
        reverb.set_mix(0.5);
        let (d, w) = reverb.gains();
        assert!((d - w).abs() < 1e-6);
        assert!((d * d + w * w - 1.0).abs() < 1e-6);
        reverb.set_wet_level(f32::NEG_INFINITY);
        assert_eq!(reverb.gains().1, 0.0);
    }

    #[test]
    fn test_wet_path() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 64);
        reverb.set_dry_level(f32::NEG_INFINITY);
        reverb.set_wet_level(0.0);

        // A one-sample delay, mono, at the render rate.
        reverb.load_impulse_response(ImpulseSource::Memory(wav_bytes(48000, &[vec![0.0, 1.0]])));
        wait_for_install(&mut reverb, 64);

        let status = reverb.status();
        assert_eq!(status.installs, 1);
        assert_eq!(status.impulse_len, 2);
        assert_eq!(status.channels, 1);

        // Let the gain smoothers settle.
        for _ in 0..100 {
            let mut left = vec![0.0f32; 64];
            reverb.process(&mut [&mut left[..]]);
        }

        let input = signal(64);
        let mut left = input.clone();
        reverb.process(&mut [&mut left[..]]);
        for i in 1..64 {
            assert!((left[i] - input[i - 1]).abs() < 1e-4, "{i}");
        }
    }

    /// Requests are only honored in order: a newer request makes an older result stale.
    #[test]
    fn test_two_loads_install_once() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 64);

        reverb.load_impulse_response(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 3]])));
        reverb.load_impulse_response(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 5]])));
        wait_for_install(&mut reverb, 64);

        // Give a stale result every chance to show up.
        for _ in 0..20 {
            let mut left = vec![0.0f32; 64];
            reverb.process(&mut [&mut left[..]]);
            std::thread::sleep(Duration::from_millis(5));
        }

        let status = reverb.status();
        assert_eq!(status.installs, 1);
        assert_eq!(status.installed_generation, 3);
        assert_eq!(status.impulse_len, 5);
    }

    /// A bad load arriving while a good engine waits to be picked up must not strand the reverb dry.
    #[test]
    fn test_failed_load_behind_pending_engine() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 64);
        reverb.load_impulse_response(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 7]])));
        // Usually long enough for the good engine to be sent; either way it is never received before the bad load.
        std::thread::sleep(Duration::from_millis(100));
        reverb.load_impulse_response(ImpulseSource::Memory(vec![0u8; 64].into()));
        wait_for_install(&mut reverb, 64);

        let status = reverb.status();
        assert_eq!(status.impulse_len, 7);
        assert_eq!(status.installed_generation, 3);
    }

    /// The same format again keeps the running engine.
    #[test]
    fn test_configure_same_format_keeps_engine() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 64);
        reverb.load_impulse_response(ImpulseSource::Memory(wav_bytes(48000, &[vec![1.0; 4]])));
        wait_for_install(&mut reverb, 64);
        let before = reverb.status();

        reverb.configure(48000.0, 64);
        assert_eq!(reverb.status(), before);
    }

    #[test]
    fn test_wet_gain_holds_without_wet_output() {
        let mut reverb = ConvolutionReverb::new().unwrap();
        reverb.configure(48000.0, 64);
        reverb.set_gains(0.5, 1.0);
        for _ in 0..10 {
            let mut left = vec![0.0f32; 64];
            reverb.process(&mut [&mut left[..]]);
        }
        assert_eq!(reverb.wet_smoother.current(), 0.0);
        assert!(reverb.dry_smoother.current() < 1.0);
    }
}
