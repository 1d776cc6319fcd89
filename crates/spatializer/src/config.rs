//! Fixed parameters of the renderer.

/// Samples in each ear's impulse response.
pub const HRIR_LENGTH: usize = 200;

/// Measured azimuths, in the order the dataset stores them.
pub const AZIMUTHS: [i32; 27] = [
    -90, -80, -65, -55, -45, -40, -35, -30, -25, -20, -15, -10, -5, 0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 55, 65,
    80, 90,
];

/// Elevation slots per azimuth: the two poles plus 50 evenly spaced elevations.
pub const ELEVATION_SLOTS: usize = 52;

/// Spacing of the non-pole elevations, in degrees.
pub const ELEVATION_STEP: f64 = 5.625;

/// Barycentric weights within this distance of 0 or 1 are snapped.
pub const BARYCENTRIC_EPSILON: f64 = 1e-6;

/// The renderer handles mono and stereo buffers.
pub const MAX_CHANNELS: usize = 2;

/// Time constant of every parameter smoother.
pub const SMOOTHING_TIME_MS: f64 = 1.0;

/// Impulse responses are resampled this many frames at a time.
pub const RESAMPLE_CHUNK: usize = 64;

/// Smallest partition the reverb's convolver uses.
pub const MIN_PARTITION: usize = 64;

pub const DEFAULT_CROSSOVER_FREQUENCY: f64 = 150.0;

pub const MIN_AZIMUTH: f64 = -180.0;
pub const MAX_AZIMUTH: f64 = 180.0;
pub const MIN_ELEVATION: f64 = -90.0;
pub const MAX_ELEVATION: f64 = 90.0;
pub const MAX_WIDTH: f64 = 180.0;
