//! Head-related impulse responses: the measured dataset, the triangulation used to interpolate between measurements, and
//! the per-panner container holding the current interpolated pair.
mod container;
mod coordinates;
mod dataset;
mod triangulation;

use std::path::Path;

pub use container::*;
pub use coordinates::*;
pub use dataset::*;
pub use triangulation::*;

use crate::config::*;

/// A dataset together with its triangulation.  Built once and shared.
#[derive(Debug)]
pub struct Hrtf {
    dataset: HrtfDataset,
    triangulation: Triangulation,

    /// For each triangulation vertex, the azimuth index and elevation slot of its measurement.
    vertex_slots: Vec<(usize, usize)>,
}

impl Hrtf {
    /// Parse a resource and triangulate it.
    pub fn build(bytes: &[u8]) -> crate::Result<Hrtf> {
        Self::from_dataset(HrtfDataset::from_bytes(bytes)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Hrtf> {
        Self::from_dataset(HrtfDataset::from_file(path)?)
    }

    pub fn from_dataset(dataset: HrtfDataset) -> crate::Result<Hrtf> {
        let triangulation = Triangulation::grid()?;

        // Vertices resolve to measurements the same way positions do: through the whole-degree elevation lookup.
        let vertex_slots = triangulation
            .vertices()
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let slot = elevation_index(v.elevation.round() as i32)
                    .expect("Every grid elevation resolves to a slot");
                (i / ELEVATION_SLOTS, slot)
            })
            .collect();

        log::debug!(
            "Built HRTF with {} vertices and {} triangles",
            triangulation.vertices().len(),
            triangulation.triangles().len()
        );

        Ok(Hrtf {
            dataset,
            triangulation,
            vertex_slots,
        })
    }

    pub fn dataset(&self) -> &HrtfDataset {
        &self.dataset
    }

    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }

    /// The measurement a triangulation vertex stands for.
    pub fn vertex_hrir(&self, vertex: usize) -> &HrirPair {
        let (az, slot) = self.vertex_slots[vertex];
        self.dataset.slot(az, slot)
    }
}
