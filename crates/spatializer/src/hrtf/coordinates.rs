/// A direction in the listener's frame: azimuth clockwise from straight ahead, elevation up from the horizontal plane.
/// Degrees.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct SphericalPosition {
    pub azimuth: f64,
    pub elevation: f64,
}

/// The same direction in the interaural-polar frame the dataset is measured in.
///
/// `lateral` is the angle away from the median plane, in `[-90, 90]`.  `polar` is the angle around the interaural
/// axis, in `[-90, 270)`: 0 is ahead, 90 is above, 180 is behind.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct InterauralPosition {
    pub lateral: f64,
    pub polar: f64,
}

impl From<SphericalPosition> for InterauralPosition {
    fn from(value: SphericalPosition) -> Self {
        let theta = value.azimuth.to_radians();
        let phi = value.elevation.to_radians();

        let x = phi.cos() * theta.sin();
        let y = phi.cos() * theta.cos();
        let z = phi.sin();

        let lateral = x.clamp(-1.0, 1.0).asin().to_degrees();
        let mut polar = z.atan2(y).to_degrees();
        if polar < -90.0 {
            polar += 360.0;
        }

        InterauralPosition { lateral, polar }
    }
}
