//! Placing the source around the listener.
mod binaural;
mod constant_power;
mod stereo;

pub use binaural::*;
pub use constant_power::*;
pub use stereo::*;

/// Which panner the renderer runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PannerMode {
    /// HRTF panning.
    #[default]
    Binaural,

    /// Square-root amplitude panning.
    ConstantPower,

    /// No panning at all.
    Bypass,
}

/// How the renderer interprets a stereo buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum InputLayout {
    /// Channel 0 is the source.  Whatever is in channel 1 is overwritten.
    #[default]
    Mono,

    /// Both channels are the source, panned as a pair.
    Stereo,
}

impl PannerMode {
    pub(crate) fn from_u8(value: u8) -> PannerMode {
        match value {
            1 => PannerMode::ConstantPower,
            2 => PannerMode::Bypass,
            _ => PannerMode::Binaural,
        }
    }
}

impl InputLayout {
    pub(crate) fn from_u8(value: u8) -> InputLayout {
        match value {
            1 => InputLayout::Stereo,
            _ => InputLayout::Mono,
        }
    }
}
