//! Content types and what each one sets.
use smallvec::SmallVec;
use spatializer_dsp::{SvfMode, SvfParameters};

/// What kind of material is being rendered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ContentType {
    #[default]
    Narration,
    Dialogue,
    Sfx,
    Atmosphere,
    /// Music is never spatialized.
    Music,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Narration,
        ContentType::Dialogue,
        ContentType::Sfx,
        ContentType::Atmosphere,
        ContentType::Music,
    ];
}

/// A piecewise-linear function of `[0, 1]`.
///
/// Below the first point the curve holds the first value and above the last it holds the last.  An empty curve is 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BreakpointCurve {
    points: SmallVec<[(f64, f64); 8]>,
}

impl BreakpointCurve {
    /// Build a curve from `(x, y)` points, which are sorted by `x`.
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> BreakpointCurve {
        let mut points = points.into_iter().collect::<SmallVec<[(f64, f64); 8]>>();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        BreakpointCurve { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 0.0;
        };

        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        // There's a point at or past x, and it isn't the first.
        let upper = self.points.partition_point(|p| p.0 < x);
        let (x0, y0) = self.points[upper - 1];
        let (x1, y1) = self.points[upper];
        let width = x1 - x0;
        if width <= 0.0 {
            return y0;
        }
        y0 + (y1 - y0) * (x - x0) / width
    }
}

/// Everything a content type configures.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentPreset {
    pub content_type: ContentType,
    pub tone: SvfParameters,
    pub crossover_frequency: f64,
    /// Whether the panner runs at all.
    pub spatialize: bool,
    /// Distance to dry level, in dB.
    pub dry_curve: BreakpointCurve,
    /// Distance to wet level, in dB.
    pub wet_curve: BreakpointCurve,
    /// Distance to tone filter mix.
    pub filtered_curve: BreakpointCurve,
}

fn low_pass(frequency: f64, q: f64, gain_db: f64) -> SvfParameters {
    SvfParameters {
        mode: SvfMode::LowPass,
        frequency,
        q,
        gain_db,
    }
}

impl ContentPreset {
    pub fn new(content_type: ContentType) -> ContentPreset {
        use ContentType::*;

        let curve = |p: &[(f64, f64)]| BreakpointCurve::new(p.iter().copied());

        let (tone, crossover_frequency, dry, wet, filtered): (_, _, &[_], &[_], &[_]) = match content_type {
            Narration => (
                low_pass(100.0, 0.5, 1.0),
                150.0,
                &[(0.0, 0.0), (0.26, -16.6), (0.47, -38.3), (0.72, -70.0), (1.0, -70.0)],
                &[(0.0, -70.0), (0.34, -46.0), (0.60, -36.8), (0.85, -33.1), (1.0, -33.1)],
                &[(0.0, 0.0), (1.0, 1.0)],
            ),
            Dialogue => (
                low_pass(100.0, 0.46, 0.0),
                559.5,
                &[(0.0, 0.0), (0.2, -2.6), (0.56, -22.0), (0.75, -51.0), (1.0, -70.0)],
                &[(0.0, -70.0), (0.24, -53.05), (0.59, -35.36), (0.75, -32.79), (1.0, -30.9)],
                &[(0.0, 0.0), (1.0, 1.0)],
            ),
            Music => (
                low_pass(150.0, 0.5, 0.0),
                938.0,
                &[(0.0, 0.0), (0.36, -23.0), (0.57, -43.0), (0.72, -59.0), (0.87, -67.0), (1.0, -70.0)],
                &[(0.0, -70.0), (0.025, -70.0), (0.19, -56.0), (0.32, -48.0), (0.62, -41.0), (1.0, -41.0)],
                &[(0.0, 0.0), (0.37, 0.49), (0.59, 0.73), (0.89, 0.89), (1.0, 0.9)],
            ),
            Atmosphere => (
                low_pass(150.0, 0.98, 0.0),
                237.6,
                &[(0.0, 0.0), (0.2, -2.6), (0.56, -21.0), (0.75, -51.6), (0.9, -70.0), (1.0, -70.0)],
                &[(0.0, -70.0), (0.25, -53.0), (0.55, -27.7), (0.66, -24.0), (0.84, -21.0), (1.0, -21.4)],
                &[(0.0, 0.0), (1.0, 0.85)],
            ),
            Sfx => (
                low_pass(200.0, 0.7, 0.0),
                122.0,
                &[(0.0, 0.0), (0.2, -2.6), (0.66, -21.0), (0.81, -40.0), (0.96, -70.0), (1.0, -70.0)],
                &[(0.0, -70.0), (0.2, -48.0), (0.51, -30.0), (0.77, -25.0), (1.0, -27.0)],
                &[(0.0, 0.0), (1.0, 0.9)],
            ),
        };

        ContentPreset {
            content_type,
            tone,
            crossover_frequency,
            spatialize: content_type != Music,
            dry_curve: curve(dry),
            wet_curve: curve(wet),
            filtered_curve: curve(filtered),
        }
    }

    /// Dry level in dB, wet level in dB, and tone mix for a distance.
    pub fn distance_levels(&self, distance: f64) -> (f64, f64, f64) {
        let d = distance.clamp(0.0, 1.0);
        (
            self.dry_curve.evaluate(d),
            self.wet_curve.evaluate(d),
            self.filtered_curve.evaluate(d),
        )
    }
}

impl Default for ContentPreset {
    fn default() -> Self {
        ContentPreset::new(ContentType::default())
    }
}
