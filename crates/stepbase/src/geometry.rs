//! Per-component geometric summary.

use serde::{Deserialize, Serialize};
use stepbase_kernel::{HoleFeature, PlanarFace, Primitives, TopologyCounts};
use stepbase_math::{relative_eq, Aabb3, Point3, Vec3};

/// Normalized geometry and topology of one component.
///
/// Parts copy their kernel primitives. Assemblies aggregate every child
/// instance, so their volume, surface and topology are sums over leaf
/// descendants; they carry no features of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySummary {
    /// Enclosed volume.
    pub volume: f64,
    /// Boundary surface area.
    pub surface_area: f64,
    /// Centroid (volume-weighted for assemblies).
    pub centroid: Point3,
    /// Axis-aligned bounds.
    pub bounding_box: Aabb3,
    /// Element counts per topology kind.
    pub topology_counts: TopologyCounts,
    /// Cylindrical features, in kernel order.
    #[serde(default)]
    pub holes: Vec<HoleFeature>,
    /// Planar faces, in kernel order.
    #[serde(default)]
    pub planar_faces: Vec<PlanarFace>,
}

impl GeometrySummary {
    /// Summary of a component without measurable geometry.
    pub fn empty() -> Self {
        Self::from_primitives(&Primitives::empty())
    }

    /// Summary of a part.
    pub fn from_primitives(p: &Primitives) -> Self {
        Self {
            volume: p.volume,
            surface_area: p.surface_area,
            centroid: p.centroid,
            bounding_box: p.bounding_box.or_zero(),
            topology_counts: p.topology,
            holes: p.holes.clone(),
            planar_faces: p.planar_faces.clone(),
        }
    }

    /// Aggregate child summaries into an assembly summary.
    ///
    /// Sums volume, area and topology; unions the boxes of children with
    /// geometry; weights centroids by volume.
    pub fn aggregate<'a>(children: impl IntoIterator<Item = &'a GeometrySummary>) -> Self {
        let mut volume = 0.0;
        let mut surface_area = 0.0;
        let mut topology = TopologyCounts::default();
        let mut bbox = Aabb3::empty();
        let mut weighted = Vec3::zeros();

        for child in children {
            volume += child.volume;
            surface_area += child.surface_area;
            topology.add(&child.topology_counts);
            weighted += child.centroid.coords * child.volume;
            if child.has_geometry() {
                bbox.include_box(&child.bounding_box);
            }
        }

        let bounding_box = bbox.or_zero();
        let centroid = if volume > f64::EPSILON {
            Point3::from(weighted / volume)
        } else {
            bounding_box.center()
        };
        Self {
            volume,
            surface_area,
            centroid,
            bounding_box,
            topology_counts: topology,
            holes: Vec::new(),
            planar_faces: Vec::new(),
        }
    }

    /// Whether anything was measured.
    pub fn has_geometry(&self) -> bool {
        self.volume > 0.0 || self.surface_area > 0.0
    }

    /// Length of the bounding box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.bounding_box.diagonal()
    }

    /// Whether two summaries describe the same shape up to placement:
    /// equal volume and box extents within `rel`.
    pub fn same_signature(&self, other: &GeometrySummary, rel: f64) -> bool {
        let (a, b) = (self.bounding_box.extents(), other.bounding_box.extents());
        relative_eq(self.volume, other.volume, rel)
            && (0..3).all(|i| relative_eq(a[i], b[i], rel))
    }
}

impl Default for GeometrySummary {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn block(min: [f64; 3], size: [f64; 3]) -> GeometrySummary {
        let min = Point3::from(min);
        let max = min + Vec3::from(size);
        let bounding_box = Aabb3::new(min, max);
        let p = Primitives {
            volume: size[0] * size[1] * size[2],
            surface_area: 2.0 * (size[0] * size[1] + size[1] * size[2] + size[0] * size[2]),
            centroid: bounding_box.center(),
            bounding_box,
            topology: TopologyCounts {
                solid: 1,
                shell: 1,
                face: 6,
                edge: 12,
                vertex: 8,
            },
            holes: Vec::new(),
            planar_faces: Vec::new(),
        };
        GeometrySummary::from_primitives(&p)
    }

    #[test]
    fn test_aggregate_sums_and_weights() {
        let a = block([0.0, 0.0, 0.0], [10.0, 10.0, 10.0]);
        let b = block([20.0, 0.0, 0.0], [10.0, 10.0, 30.0]);
        let sum = GeometrySummary::aggregate([&a, &b]);

        assert_relative_eq!(sum.volume, 4000.0);
        assert_relative_eq!(sum.surface_area, a.surface_area + b.surface_area);
        assert_eq!(sum.topology_counts.face, 12);
        assert_eq!(sum.bounding_box.max, Point3::new(30.0, 10.0, 30.0));
        // (5 * 1000 + 25 * 3000) / 4000
        assert_relative_eq!(sum.centroid.x, 20.0);
        assert!(sum.holes.is_empty());
    }

    #[test]
    fn test_aggregate_ignores_empty_boxes() {
        let a = block([50.0, 50.0, 50.0], [1.0, 1.0, 1.0]);
        let sum = GeometrySummary::aggregate([&a, &GeometrySummary::empty()]);
        assert_eq!(sum.bounding_box.min, Point3::new(50.0, 50.0, 50.0));

        let none = GeometrySummary::aggregate(std::iter::empty());
        assert_eq!(none.volume, 0.0);
        assert!(!none.bounding_box.is_empty());
    }

    #[test]
    fn test_signature_ignores_position() {
        let a = block([0.0, 0.0, 0.0], [10.0, 20.0, 5.0]);
        let b = block([100.0, -40.0, 3.0], [10.0, 20.0, 5.0]);
        let c = block([0.0, 0.0, 0.0], [20.0, 10.0, 5.0]);
        assert!(a.same_signature(&b, 1e-6));
        assert!(!a.same_signature(&c, 1e-6));
    }
}
