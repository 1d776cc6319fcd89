//! Control values shared between the host's threads and the renderer.
//!
//! Every value is its own atomic, written with relaxed ordering: a block may see some of a burst of changes and the
//! rest on the next block, which is inaudible.  The active preset is behind an [ArcSwap] for readers off the render
//! thread; what the render thread needs from it is copied into atomics, so that it never holds the last reference to a
//! preset.
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use atomic_float::{AtomicF32, AtomicF64};
use spatializer_dsp::{DbExt, SvfMode, SvfParameters};

use crate::panner::{InputLayout, PannerMode};
use crate::presets::{ContentPreset, ContentType};
use crate::reverb::loader::LoaderHandle;
use crate::reverb::ImpulseSource;

/// Everything the renderer reads at the top of a block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub azimuth: f64,
    pub elevation: f64,
    pub width: f64,
    pub crossover_frequency: f64,
    pub tone: SvfParameters,
    pub tone_mix: f32,
    /// Linear.
    pub dry_gain: f32,
    /// Linear.
    pub wet_gain: f32,
    pub panner_mode: PannerMode,
    pub input_layout: InputLayout,
    pub spatialize: bool,
}

#[derive(Debug)]
struct ControlsInner {
    azimuth: AtomicF64,
    elevation: AtomicF64,
    width: AtomicF64,
    crossover_frequency: AtomicF64,
    tone_mode: AtomicU8,
    tone_frequency: AtomicF64,
    tone_q: AtomicF64,
    tone_gain: AtomicF64,
    tone_mix: AtomicF32,
    dry_gain: AtomicF32,
    wet_gain: AtomicF32,
    distance: AtomicF64,
    panner_mode: AtomicU8,
    input_layout: AtomicU8,
    spatialize: AtomicBool,
    preset: ArcSwap<ContentPreset>,
    loader: LoaderHandle,
}

/// A handle to a renderer's controls.  Clones share the same values and may be used from any thread.
#[derive(Debug, Clone)]
pub struct Controls {
    inner: Arc<ControlsInner>,
}

macro_rules! store {
    ($name: ident, $field: ident, $t: ty) => {
        pub fn $name(&self, value: $t) {
            self.inner.$field.store(value, Ordering::Relaxed);
        }
    };
}

impl Controls {
    /// Levels and tone mix start where the default preset puts them at distance 0.
    pub(crate) fn new(loader: LoaderHandle) -> Controls {
        let preset = ContentPreset::default();
        let (dry_db, wet_db, mix) = preset.distance_levels(0.0);
        let inner = ControlsInner {
            azimuth: AtomicF64::new(0.0),
            elevation: AtomicF64::new(0.0),
            width: AtomicF64::new(0.0),
            crossover_frequency: AtomicF64::new(preset.crossover_frequency),
            tone_mode: AtomicU8::new(preset.tone.mode as u8),
            tone_frequency: AtomicF64::new(preset.tone.frequency),
            tone_q: AtomicF64::new(preset.tone.q),
            tone_gain: AtomicF64::new(preset.tone.gain_db),
            tone_mix: AtomicF32::new((mix as f32).clamp(0.0, 1.0)),
            dry_gain: AtomicF32::new((dry_db as f32).db_to_gain()),
            wet_gain: AtomicF32::new((wet_db as f32).db_to_gain()),
            distance: AtomicF64::new(0.0),
            panner_mode: AtomicU8::new(PannerMode::default() as u8),
            input_layout: AtomicU8::new(InputLayout::default() as u8),
            spatialize: AtomicBool::new(preset.spatialize),
            preset: ArcSwap::from_pointee(preset),
            loader,
        };

        Controls {
            inner: Arc::new(inner),
        }
    }

    store!(set_azimuth, azimuth, f64);
    store!(set_elevation, elevation, f64);
    store!(set_width, width, f64);
    store!(set_crossover_frequency, crossover_frequency, f64);
    store!(set_tone_frequency, tone_frequency, f64);
    store!(set_tone_q, tone_q, f64);
    store!(set_tone_gain, tone_gain, f64);

    pub fn set_tone_type(&self, mode: SvfMode) {
        self.inner.tone_mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn set_tone_mix(&self, mix: f32) {
        self.inner
            .tone_mix
            .store(mix.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    /// In dB.
    pub fn set_dry_level(&self, db: f32) {
        self.inner
            .dry_gain
            .store(db.db_to_gain(), Ordering::Relaxed);
    }

    /// In dB.
    pub fn set_wet_level(&self, db: f32) {
        self.inner
            .wet_gain
            .store(db.db_to_gain(), Ordering::Relaxed);
    }

    /// Equal-power crossfade between dry and wet: 0 is all dry, 1 all wet.
    pub fn set_mix(&self, mix: f32) {
        let angle = mix.clamp(0.0, 1.0) * std::f32::consts::FRAC_PI_2;
        self.inner.dry_gain.store(angle.cos(), Ordering::Relaxed);
        self.inner.wet_gain.store(angle.sin(), Ordering::Relaxed);
    }

    /// Set dry level, wet level and tone mix from the active preset's distance curves.
    ///
    /// Distance is clamped to `[0, 1]`.
    pub fn set_distance(&self, distance: f64) {
        let distance = distance.clamp(0.0, 1.0);
        self.inner.distance.store(distance, Ordering::Relaxed);
        self.apply_distance(&self.inner.preset.load(), distance);
    }

    fn apply_distance(&self, preset: &ContentPreset, distance: f64) {
        let (dry_db, wet_db, mix) = preset.distance_levels(distance);
        self.set_dry_level(dry_db as f32);
        self.set_wet_level(wet_db as f32);
        self.set_tone_mix(mix as f32);
    }

    pub fn set_panner_mode(&self, mode: PannerMode) {
        self.inner.panner_mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn set_input_layout(&self, layout: InputLayout) {
        self.inner.input_layout.store(layout as u8, Ordering::Relaxed);
    }

    /// Switch to a content type's preset, optionally starting to load its impulse response.
    ///
    /// The preset's tone filter and crossover replace the current ones, and the current distance is re-applied through
    /// the new curves.
    pub fn set_content_type(&self, content_type: ContentType, impulse: Option<ImpulseSource>) {
        let preset = ContentPreset::new(content_type);

        self.set_tone_type(preset.tone.mode);
        self.set_tone_frequency(preset.tone.frequency);
        self.set_tone_q(preset.tone.q);
        self.set_tone_gain(preset.tone.gain_db);
        self.set_crossover_frequency(preset.crossover_frequency);
        self.apply_distance(&preset, self.inner.distance.load(Ordering::Relaxed));

        log::debug!("Content type is now {content_type:?}");
        self.inner
            .spatialize
            .store(preset.spatialize, Ordering::Relaxed);
        self.inner.preset.store(Arc::new(preset));

        if let Some(source) = impulse {
            self.load_impulse_response(source);
        }
    }

    /// Start loading an impulse response.  Returns at once; see [crate::Renderer::load_impulse_response].
    pub fn load_impulse_response(&self, source: ImpulseSource) {
        self.inner.loader.request(Some(source));
    }

    /// The active preset.
    pub fn preset(&self) -> Arc<ContentPreset> {
        self.inner.preset.load_full()
    }

    /// The generation of the newest load or rebuild request.
    pub fn latest_load_generation(&self) -> u64 {
        self.inner
            .loader
            .shared()
            .latest_generation
            .load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let i = &self.inner;
        let relaxed = Ordering::Relaxed;

        ControlSnapshot {
            azimuth: i.azimuth.load(relaxed),
            elevation: i.elevation.load(relaxed),
            width: i.width.load(relaxed),
            crossover_frequency: i.crossover_frequency.load(relaxed),
            tone: SvfParameters {
                mode: SvfMode::from_u8(i.tone_mode.load(relaxed)).unwrap_or_default(),
                frequency: i.tone_frequency.load(relaxed),
                q: i.tone_q.load(relaxed),
                gain_db: i.tone_gain.load(relaxed),
            },
            tone_mix: i.tone_mix.load(relaxed),
            dry_gain: i.dry_gain.load(relaxed),
            wet_gain: i.wet_gain.load(relaxed),
            panner_mode: PannerMode::from_u8(i.panner_mode.load(relaxed)),
            input_layout: InputLayout::from_u8(i.input_layout.load(relaxed)),
            spatialize: i.spatialize.load(relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use audio_synchronization::mailbox;

    fn controls() -> Controls {
        let (tx, _rx) = mailbox();
        Controls::new(LoaderHandle::spawn(tx).unwrap())
    }

    #[test]
    fn test_defaults() {
        let c = controls();
        let s = c.snapshot();
        assert_eq!(s.dry_gain, 1.0);
        assert_eq!(s.wet_gain, (-70.0f32).db_to_gain());
        assert_eq!(s.tone_mix, 0.0);
        assert_eq!(s.panner_mode, PannerMode::Binaural);
        assert_eq!(s.input_layout, InputLayout::Mono);
        assert!(s.spatialize);
        assert_eq!(s.tone, ContentPreset::default().tone);
    }

    /// The first distance change moves from where the defaults already are.
    #[test]
    fn test_defaults_match_distance_zero() {
        let c = controls();
        let before = c.snapshot();
        c.set_distance(0.0);
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn test_clones_share() {
        let a = controls();
        let b = a.clone();
        b.set_azimuth(30.0);
        b.set_tone_type(SvfMode::Bell);
        b.set_panner_mode(PannerMode::Bypass);
        let s = a.snapshot();
        assert_eq!(s.azimuth, 30.0);
        assert_eq!(s.tone.mode, SvfMode::Bell);
        assert_eq!(s.panner_mode, PannerMode::Bypass);
    }

    #[test]
    fn test_distance_follows_curves() {
        let c = controls();
        let preset = c.preset();

        c.set_distance(0.3);
        let (dry, wet, mix) = preset.distance_levels(0.3);
        let s = c.snapshot();
        assert!((s.dry_gain - (dry as f32).db_to_gain()).abs() < 1e-6);
        assert!((s.wet_gain - (wet as f32).db_to_gain()).abs() < 1e-6);
        assert!((s.tone_mix - mix as f32).abs() < 1e-6);

        // Out of range clamps.
        c.set_distance(7.0);
        let (dry, _, _) = preset.distance_levels(1.0);
        assert!((c.snapshot().dry_gain - (dry as f32).db_to_gain()).abs() < 1e-6);
    }

    #[test]
    fn test_content_type() {
        let c = controls();
        c.set_distance(0.5);
        c.set_content_type(ContentType::Music, None);

        let music = ContentPreset::new(ContentType::Music);
        let s = c.snapshot();
        assert!(!s.spatialize);
        assert_eq!(s.tone, music.tone);
        assert_eq!(s.crossover_frequency, music.crossover_frequency);
        let (_, _, mix) = music.distance_levels(0.5);
        assert!((s.tone_mix - mix as f32).abs() < 1e-6);
        assert_eq!(c.preset().content_type, ContentType::Music);
        c.set_content_type(ContentType::Dialogue, None);
        assert!(c.snapshot().spatialize);
        assert_eq!(c.latest_load_generation(), 0);
    }

    #[test]
    fn test_content_type_loads() {
        let c = controls();
        c.set_content_type(
            ContentType::Sfx,
            Some(ImpulseSource::Memory(vec![0u8; 4].into())),
        );
        assert_eq!(c.latest_load_generation(), 1);
    }

    #[test]
    fn test_mix() {
        let c = controls();
        c.set_mix(1.0);
        let s = c.snapshot();
        assert!(s.dry_gain.abs() < 1e-6);
        assert!((s.wet_gain - 1.0).abs() < 1e-6);
    }
}
