//! Real-time binaural panning and convolution reverb.
//!
//! A [Renderer] takes a mono or stereo block from the host and, in place:
//!
//! 1. places it around the listener's head with an interpolated HRTF (or a constant-power panner),
//! 2. runs it through a state variable tone filter crossfaded against the dry signal,
//! 3. mixes in its convolution with an impulse response, which loads in the background.
//!
//! Controls can be changed from any thread through [Controls].  Rendering never blocks, allocates, or frees memory
//! once [Renderer::configure] has been called.
#[macro_use]
#[allow(unused_macros)]
mod logging;

mod background_drop;
mod config;
mod controls;
mod error;
pub mod hrtf;
mod is_audio_thread;
mod option_recycler;
pub mod panner;
pub mod presets;
mod renderer;
pub mod reverb;
mod tone;

pub use config::{AZIMUTHS, ELEVATION_SLOTS, HRIR_LENGTH, MAX_CHANNELS};
pub use controls::*;
pub use error::*;
pub use hrtf::{HrirPair, Hrtf, HrtfDataset, SphericalPosition};
pub use panner::{InputLayout, PannerMode};
pub use presets::{BreakpointCurve, ContentPreset, ContentType};
pub use renderer::*;
pub use reverb::{ImpulseSource, ReverbStatus};
pub use spatializer_dsp::{SvfCoefficients, SvfMode, SvfParameters};
pub use tone::*;
