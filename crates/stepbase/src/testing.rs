//! Hand-built shapes shared by the unit tests.

use std::f64::consts::PI;

use stepbase_kernel::{
    AssemblyTree, FileMetadata, HoleFeature, PlanarFace, Primitives, ShapeNode, TopologyCounts,
};
use stepbase_math::{Aabb3, Point3, Vec3};

/// Axis-aligned block with its six planar faces.
pub fn block(min: [f64; 3], size: [f64; 3]) -> Primitives {
    let [lx, ly, lz] = size;
    let lo = Point3::from(min);
    let hi = lo + Vec3::from(size);
    let bbox = Aabb3::new(lo, hi);
    let c = bbox.center();

    let face = |axis: usize, positive: bool, area: f64| {
        let mut centroid = c;
        centroid[axis] = if positive { hi[axis] } else { lo[axis] };
        let mut normal = Vec3::zeros();
        normal[axis] = if positive { 1.0 } else { -1.0 };
        PlanarFace {
            centroid,
            normal,
            area,
        }
    };

    Primitives {
        volume: lx * ly * lz,
        surface_area: 2.0 * (lx * ly + ly * lz + lx * lz),
        centroid: c,
        bounding_box: bbox,
        topology: TopologyCounts {
            solid: 1,
            shell: 1,
            face: 6,
            edge: 12,
            vertex: 8,
        },
        holes: Vec::new(),
        planar_faces: vec![
            face(0, false, ly * lz),
            face(0, true, ly * lz),
            face(1, false, lx * lz),
            face(1, true, lx * lz),
            face(2, false, lx * ly),
            face(2, true, lx * ly),
        ],
    }
}

/// Drill vertical through holes `(x, y, radius)` into a block.
pub fn drilled(mut p: Primitives, holes: &[(f64, f64, f64)]) -> Primitives {
    let z0 = p.bounding_box.min.z;
    let depth = p.bounding_box.max.z - z0;
    for &(x, y, r) in holes {
        let disk = PI * r * r;
        p.volume -= disk * depth;
        p.surface_area += 2.0 * PI * r * depth - 2.0 * disk;
        p.topology.face += 1;
        p.topology.edge += 3;
        p.topology.vertex += 2;
        for face in p.planar_faces.iter_mut().filter(|f| f.normal.z.abs() > 0.5) {
            face.area -= disk;
        }
        p.holes.push(HoleFeature {
            axis_point: Point3::new(x, y, z0),
            axis_direction: Vec3::z(),
            radius: r,
            depth,
        });
    }
    p
}

/// Named part node.
pub fn part(name: &str, p: Primitives) -> ShapeNode {
    ShapeNode::part(name, Some(p))
}

pub const FOUR_HOLES: [(f64, f64, f64); 4] = [
    (15.0, 15.0, 3.0),
    (85.0, 15.0, 3.0),
    (15.0, 45.0, 3.0),
    (85.0, 45.0, 3.0),
];

/// Base plate, bolted cover, two feet and a sensor 0.5 away from the plates.
pub fn bracket_tree() -> AssemblyTree {
    bracket_with_cover(drilled(block([0.0, 0.0, 10.0], [100.0, 60.0, 5.0]), &FOUR_HOLES))
}

/// The bracket with a different cover.
pub fn bracket_with_cover(cover: Primitives) -> AssemblyTree {
    let root = ShapeNode::assembly(
        "bracket_assembly",
        vec![
            part(
                "base_plate",
                drilled(block([0.0, 0.0, 0.0], [100.0, 60.0, 10.0]), &FOUR_HOLES),
            ),
            part("cover_plate", cover),
            part("foot", block([20.0, 20.0, -5.0], [20.0, 20.0, 5.0])),
            part("foot", block([60.0, 20.0, -5.0], [20.0, 20.0, 5.0])),
            part("sensor", block([100.5, 0.0, 0.0], [10.0, 10.0, 10.0])),
        ],
    );
    AssemblyTree::new(root).with_metadata(FileMetadata {
        file_name: Some("bracket_assembly.step".into()),
        schema: Some("AUTOMOTIVE_DESIGN".into()),
        ..FileMetadata::default()
    })
}
