//! Per-shape measurements supplied by the kernel.

use serde::{Deserialize, Serialize};
use stepbase_math::{Aabb3, Point3, Transform, Vec3};

/// A cylindrical feature (hole, bore or pin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleFeature {
    /// Point on the axis at the start of the cylindrical extent.
    pub axis_point: Point3,
    /// Unit axis direction.
    pub axis_direction: Vec3,
    /// Cylinder radius.
    pub radius: f64,
    /// Axial length of the cylindrical face.
    pub depth: f64,
}

impl HoleFeature {
    /// Hole diameter.
    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }
}

/// A planar face descriptor used for contact detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarFace {
    /// Area centroid of the face.
    pub centroid: Point3,
    /// Outward unit normal.
    pub normal: Vec3,
    /// Face area.
    pub area: f64,
}

/// Kinds of B-rep topological elements that are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyKind {
    /// Solid bodies.
    Solid,
    /// Shells bounding the solids.
    Shell,
    /// Faces.
    Face,
    /// Edges.
    Edge,
    /// Vertices.
    Vertex,
}

impl TopologyKind {
    /// All kinds, in reporting order.
    pub const ALL: [TopologyKind; 5] = [
        TopologyKind::Solid,
        TopologyKind::Shell,
        TopologyKind::Face,
        TopologyKind::Edge,
        TopologyKind::Vertex,
    ];
}

/// Element counts per topology kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyCounts {
    /// Number of solids.
    pub solid: u64,
    /// Number of shells.
    pub shell: u64,
    /// Number of faces.
    pub face: u64,
    /// Number of edges.
    pub edge: u64,
    /// Number of vertices.
    pub vertex: u64,
}

impl TopologyCounts {
    /// Count for one kind.
    pub fn get(&self, kind: TopologyKind) -> u64 {
        match kind {
            TopologyKind::Solid => self.solid,
            TopologyKind::Shell => self.shell,
            TopologyKind::Face => self.face,
            TopologyKind::Edge => self.edge,
            TopologyKind::Vertex => self.vertex,
        }
    }

    /// Iterate `(kind, count)` pairs in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (TopologyKind, u64)> + '_ {
        TopologyKind::ALL.iter().map(move |&k| (k, self.get(k)))
    }

    /// Element-wise sum.
    pub fn add(&mut self, other: &TopologyCounts) {
        self.solid += other.solid;
        self.shell += other.shell;
        self.face += other.face;
        self.edge += other.edge;
        self.vertex += other.vertex;
    }
}

/// Measured properties of one part shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Primitives {
    /// Enclosed volume.
    pub volume: f64,
    /// Boundary surface area.
    pub surface_area: f64,
    /// Centroid.
    pub centroid: Point3,
    /// Axis-aligned bounds.
    pub bounding_box: Aabb3,
    /// Topological element counts.
    pub topology: TopologyCounts,
    /// Cylindrical features.
    pub holes: Vec<HoleFeature>,
    /// Planar faces.
    pub planar_faces: Vec<PlanarFace>,
}

impl Primitives {
    /// Primitives of a shape with no measurable geometry.
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            centroid: Point3::origin(),
            bounding_box: Aabb3::zero(),
            topology: TopologyCounts::default(),
            holes: Vec::new(),
            planar_faces: Vec::new(),
        }
    }

    /// Express these primitives in another frame through a rigid transform.
    ///
    /// Scalars are invariant; points, directions and the box are mapped.
    pub fn transformed(&self, t: &Transform) -> Self {
        let unit = |v: &Vec3| {
            let m = t.apply_vec(v);
            let n = m.norm();
            if n > f64::EPSILON {
                m / n
            } else {
                m
            }
        };
        Self {
            volume: self.volume,
            surface_area: self.surface_area,
            centroid: t.apply_point(&self.centroid),
            bounding_box: self.bounding_box.transformed(t),
            topology: self.topology,
            holes: self
                .holes
                .iter()
                .map(|h| HoleFeature {
                    axis_point: t.apply_point(&h.axis_point),
                    axis_direction: unit(&h.axis_direction),
                    radius: h.radius,
                    depth: h.depth,
                })
                .collect(),
            planar_faces: self
                .planar_faces
                .iter()
                .map(|f| PlanarFace {
                    centroid: t.apply_point(&f.centroid),
                    normal: unit(&f.normal),
                    area: f.area,
                })
                .collect(),
        }
    }
}

impl Default for Primitives {
    fn default() -> Self {
        Self::empty()
    }
}
