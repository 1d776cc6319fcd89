//! The measured impulse responses and their binary layout.
//!
//! The resource holds, for each azimuth in [AZIMUTHS] order and each of the [ELEVATION_SLOTS] elevation slots, 200
//! little-endian `f32` samples for the left ear followed by 200 for the right.  Slot 0 is -90°, slots 1 through 50
//! run from -45° in steps of [ELEVATION_STEP], and slot 51 is 270°.  The layout, ordering, and the slot lookup in
//! [elevation_index] must stay as they are to remain compatible with existing resources.
use std::path::Path;

use crate::config::*;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("HRTF data is {got} bytes, but at least {expected} are required")]
    Truncated { expected: usize, got: usize },

    #[error("HRTF triangulation has a degenerate triangle with vertices {vertices:?}")]
    DegenerateTriangle { vertices: [usize; 3] },

    #[error("Unable to read HRTF data: {0}")]
    Io(#[from] std::io::Error),
}

/// A left and right ear impulse response.
#[derive(Clone, PartialEq)]
pub struct HrirPair {
    pub left: [f32; HRIR_LENGTH],
    pub right: [f32; HRIR_LENGTH],
}

impl std::fmt::Debug for HrirPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (left, right) = self.energy();
        f.debug_struct("HrirPair")
            .field("left_energy", &left)
            .field("right_energy", &right)
            .finish()
    }
}

impl Default for HrirPair {
    fn default() -> Self {
        HrirPair {
            left: [0.0; HRIR_LENGTH],
            right: [0.0; HRIR_LENGTH],
        }
    }
}

impl HrirPair {
    /// Sum of squares of each ear's response, as `(left, right)`.
    pub fn energy(&self) -> (f64, f64) {
        let e = |x: &[f32]| x.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (e(&self.left), e(&self.right))
    }
}

/// Size in bytes of a complete resource.
pub const DATASET_BYTES: usize =
    AZIMUTHS.len() * ELEVATION_SLOTS * 2 * HRIR_LENGTH * std::mem::size_of::<f32>();

/// Elevation in degrees of an elevation slot.
pub fn slot_elevation(slot: usize) -> f64 {
    match slot {
        0 => -90.0,
        s if s == ELEVATION_SLOTS - 1 => 270.0,
        s => -45.0 + ELEVATION_STEP * (s - 1) as f64,
    }
}

/// The slot a whole-degree elevation resolves to.
///
/// -90 and 270 are the poles.  Everything else is `round((elevation + 45) / 5.625)`.  Note that this puts a vertex at
/// slot `i`'s elevation onto slot `i - 1`; resources are built against exactly this lookup.
pub fn elevation_index(elevation: i32) -> Option<usize> {
    match elevation {
        -90 => Some(0),
        270 => Some(ELEVATION_SLOTS - 1),
        e => {
            let index = ((e as f64 + 45.0) / ELEVATION_STEP).round();
            (0.0..ELEVATION_SLOTS as f64)
                .contains(&index)
                .then_some(index as usize)
        }
    }
}

/// The measured set, immutable once built.
#[derive(Debug, Clone)]
pub struct HrtfDataset {
    /// Azimuth-major, `AZIMUTHS.len() * ELEVATION_SLOTS` entries.
    measurements: Vec<HrirPair>,
}

impl HrtfDataset {
    /// Parse a resource.  Bytes past the end of the layout are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<HrtfDataset, DatasetError> {
        if bytes.len() < DATASET_BYTES {
            return Err(DatasetError::Truncated {
                expected: DATASET_BYTES,
                got: bytes.len(),
            });
        }

        if bytes.len() > DATASET_BYTES {
            log::warn!(
                "HRTF data has {} trailing bytes, which are ignored",
                bytes.len() - DATASET_BYTES
            );
        }

        let mut samples = bytes[..DATASET_BYTES]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));

        let measurements = (0..AZIMUTHS.len() * ELEVATION_SLOTS)
            .map(|_| {
                let mut pair = HrirPair::default();
                for (d, s) in pair.left.iter_mut().zip(samples.by_ref()) {
                    *d = s;
                }
                for (d, s) in pair.right.iter_mut().zip(samples.by_ref()) {
                    *d = s;
                }
                pair
            })
            .collect();

        Ok(HrtfDataset { measurements })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<HrtfDataset, DatasetError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Build a dataset from a function of `(azimuth, elevation slot)`.
    pub fn from_fn(mut measurement: impl FnMut(i32, usize) -> HrirPair) -> HrtfDataset {
        let measurements = AZIMUTHS
            .iter()
            .flat_map(|az| (0..ELEVATION_SLOTS).map(move |slot| (*az, slot)))
            .map(|(az, slot)| measurement(az, slot))
            .collect();
        HrtfDataset { measurements }
    }

    /// Serialize in the resource layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATASET_BYTES);
        for pair in self.measurements.iter() {
            for s in pair.left.iter().chain(pair.right.iter()) {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
        out
    }

    /// The measurement at an index into [AZIMUTHS] and an elevation slot.
    ///
    /// # Panics
    ///
    /// If either index is out of range.
    pub fn slot(&self, azimuth_index: usize, elevation_slot: usize) -> &HrirPair {
        assert!(azimuth_index < AZIMUTHS.len());
        assert!(elevation_slot < ELEVATION_SLOTS);
        &self.measurements[azimuth_index * ELEVATION_SLOTS + elevation_slot]
    }

    /// Look up a measurement by position, rounding the elevation to whole degrees and resolving it through
    /// [elevation_index].
    pub fn measurement(&self, azimuth: i32, elevation: f64) -> Option<&HrirPair> {
        let azimuth_index = AZIMUTHS.iter().position(|a| *a == azimuth)?;
        let slot = elevation_index(elevation.round() as i32)?;
        Some(self.slot(azimuth_index, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    /// Every sample encodes where it came from, so misplaced reads are obvious.
    fn tagged(az: i32, slot: usize) -> HrirPair {
        let mut pair = HrirPair::default();
        for i in 0..HRIR_LENGTH {
            pair.left[i] = az as f32 * 1000.0 + slot as f32 + i as f32 / 1000.0;
            pair.right[i] = -pair.left[i];
        }
        pair
    }

    #[test]
    fn test_layout() {
        assert_eq!(DATASET_BYTES, 2_246_400);

        let bytes = HrtfDataset::from_fn(tagged).to_bytes();
        assert_eq!(bytes.len(), DATASET_BYTES);

        // Azimuth -80 is the second azimuth; slot 3 of it starts this far in.
        let offset = (ELEVATION_SLOTS + 3) * 2 * HRIR_LENGTH * 4;
        let first = f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        assert_eq!(first, tagged(-80, 3).left[0]);

        let parsed = HrtfDataset::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.slot(1, 3), &tagged(-80, 3));
        assert_eq!(parsed.slot(26, 51), &tagged(90, 51));
    }

    #[test]
    fn test_truncated() {
        let bytes = vec![0u8; DATASET_BYTES - 1];
        assert!(matches!(
            HrtfDataset::from_bytes(&bytes),
            Err(DatasetError::Truncated { got, .. }) if got == DATASET_BYTES - 1
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = HrtfDataset::from_fn(tagged).to_bytes();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(HrtfDataset::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_elevation_index() {
        assert_eq!(elevation_index(-90), Some(0));
        assert_eq!(elevation_index(270), Some(51));
        assert_eq!(elevation_index(-45), Some(0));
        assert_eq!(elevation_index(0), Some(8));
        // 230.625 rounds to 231, and (231 + 45) / 5.625 is 49.07.
        assert_eq!(elevation_index(231), Some(49));
        assert_eq!(elevation_index(-60), None);
    }

    #[test]
    fn test_slot_elevations() {
        assert_eq!(slot_elevation(0), -90.0);
        assert_eq!(slot_elevation(1), -45.0);
        assert_eq!(slot_elevation(50), 230.625);
        assert_eq!(slot_elevation(51), 270.0);
    }

    #[test]
    fn test_measurement_lookup() {
        let dataset = HrtfDataset::from_fn(tagged);
        assert_eq!(dataset.measurement(0, 270.0), Some(&tagged(0, 51)));
        assert_eq!(dataset.measurement(0, 0.0), Some(&tagged(0, 8)));
        assert_eq!(dataset.measurement(7, 0.0), None);
    }
}
