use std::sync::Arc;

use audio_synchronization::DoubleBuffer;

use super::{HrirPair, Hrtf, InterauralPosition};

/// The impulse response pair for the current source position.
///
/// Updates interpolate into the inactive half of a [DoubleBuffer] and publish it, so the pair read by
/// [HrtfContainer::hrir] is always complete.
#[derive(Debug)]
pub struct HrtfContainer {
    hrtf: Arc<Hrtf>,
    buffer: DoubleBuffer<HrirPair>,
}

impl HrtfContainer {
    /// Build a container whose pair starts out as silence.
    pub fn new(hrtf: Arc<Hrtf>) -> HrtfContainer {
        HrtfContainer {
            hrtf,
            buffer: DoubleBuffer::from_value(HrirPair::default()),
        }
    }

    /// Interpolate the pair for a position.
    ///
    /// Returns false, keeping the previous pair, if the position is outside the measured domain.
    pub fn update_hrir(&mut self, position: InterauralPosition) -> bool {
        let Some(location) = self
            .hrtf
            .triangulation()
            .locate(position.lateral, position.polar)
        else {
            return false;
        };

        let [a, b, c] = location.vertices.map(|v| self.hrtf.vertex_hrir(v));
        let [w1, w2, w3] = location.weights.map(|w| w as f32);

        self.buffer.write_and_publish(|dest| {
            let ears = [
                (&mut dest.left, &a.left, &b.left, &c.left),
                (&mut dest.right, &a.right, &b.right, &c.right),
            ];
            for (dest, a, b, c) in ears {
                for (i, d) in dest.iter_mut().enumerate() {
                    *d = w1 * a[i] + w2 * b[i] + w3 * c[i];
                }
            }
        });

        true
    }

    pub fn hrir(&self) -> &HrirPair {
        self.buffer.current()
    }
}
