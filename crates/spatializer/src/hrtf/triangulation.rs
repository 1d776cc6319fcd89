//! Point location over the measurement grid.
use crate::config::*;

use super::dataset::{slot_elevation, DatasetError};

/// A measurement position in the interaural frame, in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub azimuth: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone)]
pub struct Triangle {
    /// Indices into the vertex list, as `[A, B, C]`.
    pub vertices: [usize; 3],

    /// Inverse of `[A - C, B - C]`, row-major.
    inverse: [[f64; 2]; 2],

    c: Vertex,
}

/// Where a query landed.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Index of the triangle, in enumeration order.
    pub triangle: usize,
    pub vertices: [usize; 3],
    /// Barycentric weights for `vertices`.  Non-negative and summing to 1.
    pub weights: [f64; 3],
}

/// A set of non-overlapping triangles over a vertex set.
#[derive(Debug, Clone)]
pub struct Triangulation {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

fn snap(w: f64) -> f64 {
    if w.abs() < BARYCENTRIC_EPSILON {
        0.0
    } else if (w - 1.0).abs() < BARYCENTRIC_EPSILON {
        1.0
    } else {
        w
    }
}

impl Triangle {
    fn new(all: &[Vertex], vertices: [usize; 3]) -> Result<Triangle, DatasetError> {
        let [a, b, c] = vertices.map(|i| all[i]);

        let t00 = a.azimuth - c.azimuth;
        let t01 = b.azimuth - c.azimuth;
        let t10 = a.elevation - c.elevation;
        let t11 = b.elevation - c.elevation;
        let det = t00 * t11 - t01 * t10;
        if det == 0.0 {
            return Err(DatasetError::DegenerateTriangle { vertices });
        }

        Ok(Triangle {
            vertices,
            inverse: [[t11 / det, -t01 / det], [-t10 / det, t00 / det]],
            c,
        })
    }

    /// Snapped weights, which may be negative if the point is outside.
    fn weights(&self, azimuth: f64, elevation: f64) -> [f64; 3] {
        let x0 = azimuth - self.c.azimuth;
        let x1 = elevation - self.c.elevation;
        let g1 = snap(self.inverse[0][0] * x0 + self.inverse[0][1] * x1);
        let g2 = snap(self.inverse[1][0] * x0 + self.inverse[1][1] * x1);
        let g3 = snap(1.0 - g1 - g2);
        [g1, g2, g3]
    }
}

impl Triangulation {
    /// Build from explicit triangles, failing if any has zero area.
    pub fn new(vertices: Vec<Vertex>, triangles: &[[usize; 3]]) -> Result<Triangulation, DatasetError> {
        let triangles = triangles
            .iter()
            .map(|t| Triangle::new(&vertices, *t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Triangulation {
            vertices,
            triangles,
        })
    }

    /// Triangulate the measurement grid.
    ///
    /// Vertex `az * ELEVATION_SLOTS + el` sits at `(AZIMUTHS[az], slot_elevation(el))`.  Each grid cell is cut along the
    /// diagonal from its lower-left to its upper-right corner, and the cells are enumerated azimuth-major with the lower
    /// triangle first.
    pub fn grid() -> Result<Triangulation, DatasetError> {
        let vertices = AZIMUTHS
            .iter()
            .flat_map(|az| {
                (0..ELEVATION_SLOTS).map(move |el| Vertex {
                    azimuth: *az as f64,
                    elevation: slot_elevation(el),
                })
            })
            .collect::<Vec<_>>();

        let index = |az: usize, el: usize| az * ELEVATION_SLOTS + el;
        let mut triangles = Vec::with_capacity((AZIMUTHS.len() - 1) * (ELEVATION_SLOTS - 1) * 2);
        for az in 0..AZIMUTHS.len() - 1 {
            for el in 0..ELEVATION_SLOTS - 1 {
                let v00 = index(az, el);
                let v10 = index(az + 1, el);
                let v11 = index(az + 1, el + 1);
                let v01 = index(az, el + 1);
                triangles.push([v00, v10, v11]);
                triangles.push([v00, v11, v01]);
            }
        }

        Self::new(vertices, &triangles)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Find the first triangle containing the point.
    ///
    /// A linear scan.  Points on shared edges go to whichever triangle comes first.
    pub fn locate(&self, azimuth: f64, elevation: f64) -> Option<Location> {
        self.triangles
            .iter()
            .enumerate()
            .find_map(|(index, t)| {
                let weights = t.weights(azimuth, elevation);
                weights.iter().all(|w| *w >= 0.0).then(|| Location {
                    triangle: index,
                    vertices: t.vertices,
                    weights,
                })
            })
    }
}
