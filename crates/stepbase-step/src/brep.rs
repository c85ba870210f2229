//! Measurement of B-rep solids: volume, area, bounds, topology counts and
//! the cylindrical and planar face descriptors used for interface detection.
//!
//! Face boundaries are sampled from their edges (circles along the arc,
//! everything else at its vertices). Planes and cylinders are measured
//! analytically from those samples; other surfaces fall back to a fan
//! triangulation of their boundary. Volume follows from the divergence
//! theorem: `V = 1/3 ∮ p·n dA`.

use std::collections::{HashMap, HashSet};
use std::f64::consts::{PI, TAU};

use stepbase_kernel::{HoleFeature, PlanarFace, Primitives, TopologyCounts};
use stepbase_math::{Aabb3, Point3, Vec3};
use tracing::debug;

use crate::entities::{parse_axis2_placement, parse_cartesian_point, AxisPlacement, EntityArgs};
use crate::error::StepError;
use crate::parser::StepFile;

/// Circle sampling density.
const SEGMENTS_PER_TURN: usize = 64;

/// Cylindrical faces whose boundary leaves an angular gap below this are
/// treated as closed.
const FULL_TURN_GAP: f64 = PI / 8.0;

/// Sampled boundary loop of a face.
struct LoopSample {
    points: Vec<Point3>,
    /// FACE_OUTER_BOUND, as opposed to FACE_BOUND.
    outer: bool,
    /// Bound orientation flag.
    orientation: bool,
}

/// Per-face measurements accumulated into the part totals.
struct FaceMeasure {
    area: f64,
    centroid: Point3,
    /// `∫ p·n dA` over the face, with `n` pointing out of the solid.
    flux: f64,
}

struct CircleCurve {
    placement: AxisPlacement,
    radius: f64,
}

/// Measure a set of solids (MANIFOLD_SOLID_BREP or BREP_WITH_VOIDS ids)
/// as one part.
pub fn measure_solids(file: &StepFile, solid_ids: &[u64]) -> Result<Primitives, StepError> {
    let mut m = Measurer::new(file);
    let mut volume = 0.0;
    for &id in solid_ids {
        let solid = file.require(id)?;
        let (outer, voids) = match solid.type_name.as_str() {
            "MANIFOLD_SOLID_BREP" => (solid.entity_ref(1)?, Vec::new()),
            "BREP_WITH_VOIDS" => (solid.entity_ref(1)?, solid.entity_ref_list(2)?),
            other => return Err(StepError::type_mismatch("MANIFOLD_SOLID_BREP", other)),
        };
        m.topology.solid += 1;
        volume += m.shell_flux(outer)?.abs() / 3.0;
        for void in voids {
            volume -= m.shell_flux(void)?.abs() / 3.0;
        }
    }
    Ok(m.finish(volume))
}

struct Measurer<'a> {
    file: &'a StepFile,
    topology: TopologyCounts,
    faces: HashSet<u64>,
    edges: HashSet<u64>,
    vertices: HashSet<u64>,
    points: HashMap<u64, Point3>,
    area: f64,
    moment: Vec3,
    bbox: Aabb3,
    holes: Vec<HoleFeature>,
    planar_faces: Vec<PlanarFace>,
}

impl<'a> Measurer<'a> {
    fn new(file: &'a StepFile) -> Self {
        Self {
            file,
            topology: TopologyCounts::default(),
            faces: HashSet::new(),
            edges: HashSet::new(),
            vertices: HashSet::new(),
            points: HashMap::new(),
            area: 0.0,
            moment: Vec3::zeros(),
            bbox: Aabb3::empty(),
            holes: Vec::new(),
            planar_faces: Vec::new(),
        }
    }

    fn finish(self, volume: f64) -> Primitives {
        let bounding_box = self.bbox.or_zero();
        let centroid = if self.area > f64::EPSILON {
            Point3::from(self.moment / self.area)
        } else {
            bounding_box.center()
        };
        let topology = TopologyCounts {
            face: self.faces.len() as u64,
            edge: self.edges.len() as u64,
            vertex: self.vertices.len() as u64,
            ..self.topology
        };
        Primitives {
            volume: volume.max(0.0),
            surface_area: self.area,
            centroid,
            bounding_box,
            topology,
            holes: self.holes,
            planar_faces: self.planar_faces,
        }
    }

    /// Signed flux of a shell; void shells come out negative.
    fn shell_flux(&mut self, id: u64) -> Result<f64, StepError> {
        let file = self.file;
        let mut shell = file.require(id)?;
        let mut flip = false;
        if shell.type_name == "ORIENTED_CLOSED_SHELL" {
            flip = !shell.boolean(3)?;
            shell = file.require(shell.entity_ref(2)?)?;
        }
        match shell.type_name.as_str() {
            "CLOSED_SHELL" | "OPEN_SHELL" => {}
            other => return Err(StepError::type_mismatch("CLOSED_SHELL", other)),
        }
        self.topology.shell += 1;

        let mut flux = 0.0;
        for face_id in shell.entity_ref_list(1)? {
            if let Some(face) = self.measure_face(face_id, flip)? {
                self.area += face.area;
                self.moment += face.centroid.coords * face.area;
                flux += face.flux;
            }
        }
        Ok(if flip { -flux } else { flux })
    }

    fn measure_face(&mut self, id: u64, flip: bool) -> Result<Option<FaceMeasure>, StepError> {
        let file = self.file;
        let face = file.require(id)?;
        match face.type_name.as_str() {
            "ADVANCED_FACE" | "FACE_SURFACE" => {}
            other => return Err(StepError::type_mismatch("ADVANCED_FACE", other)),
        }
        self.faces.insert(id);

        let mut loops = Vec::new();
        for bound_id in face.entity_ref_list(1)? {
            let bound = file.require(bound_id)?;
            let outer = match bound.type_name.as_str() {
                "FACE_OUTER_BOUND" => true,
                "FACE_BOUND" => false,
                other => return Err(StepError::type_mismatch("FACE_BOUND", other)),
            };
            let points = self.sample_loop(bound.entity_ref(1)?)?;
            for p in &points {
                self.bbox.include_point(p);
            }
            loops.push(LoopSample {
                points,
                outer,
                orientation: bound.boolean(2)?,
            });
        }

        let surface = file.require(face.entity_ref(2)?)?;
        let outward = face.boolean(3)? != flip;
        let measure = match surface.type_name.as_str() {
            "PLANE" => {
                let placement = parse_axis2_placement(file, surface.entity_ref(1)?)?;
                self.plane_face(&placement, outward, &loops)
            }
            "CYLINDRICAL_SURFACE" => {
                let placement = parse_axis2_placement(file, surface.entity_ref(1)?)?;
                let radius = surface.real(2)?;
                self.cylinder_face(&placement, radius, outward, &loops)
            }
            other => {
                debug!(face = id, surface = other, "approximating face from its boundary");
                generic_face(&loops, flip)
            }
        };
        Ok(measure)
    }

    fn plane_face(
        &mut self,
        placement: &AxisPlacement,
        outward: bool,
        loops: &[LoopSample],
    ) -> Option<FaceMeasure> {
        let z = placement.z_axis().into_inner();
        let normal = if outward { z } else { -z };

        let measured: Vec<(bool, f64, Point3)> = loops
            .iter()
            .filter_map(|l| polygon_area(&l.points, &normal).map(|(a, c)| (l.outer, a.abs(), c)))
            .collect();
        let outer_idx = measured
            .iter()
            .position(|m| m.0)
            .or_else(|| {
                measured
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
                    .map(|(i, _)| i)
            })?;

        let (_, outer_area, outer_centroid) = measured[outer_idx];
        let mut area = outer_area;
        let mut moment = outer_centroid.coords * outer_area;
        for (i, (_, a, c)) in measured.iter().enumerate() {
            if i != outer_idx {
                area -= a;
                moment -= c.coords * *a;
            }
        }
        if area <= f64::EPSILON {
            return None;
        }
        let centroid = Point3::from(moment / area);
        self.planar_faces.push(PlanarFace {
            centroid,
            normal,
            area,
        });
        Some(FaceMeasure {
            area,
            centroid,
            flux: placement.location.coords.dot(&normal) * area,
        })
    }

    fn cylinder_face(
        &mut self,
        placement: &AxisPlacement,
        radius: f64,
        outward: bool,
        loops: &[LoopSample],
    ) -> Option<FaceMeasure> {
        let center = placement.location;
        let d = placement.z_axis().into_inner();
        let x = placement.x_axis().into_inner();
        let y = placement.y_axis().into_inner();

        let points: Vec<&Point3> = loops.iter().flat_map(|l| l.points.iter()).collect();
        if points.is_empty() || radius <= 0.0 {
            return None;
        }

        let mut h0 = f64::INFINITY;
        let mut h1 = f64::NEG_INFINITY;
        let mut angles = Vec::with_capacity(points.len());
        for p in &points {
            let rel = *p - center;
            let h = rel.dot(&d);
            h0 = h0.min(h);
            h1 = h1.max(h);
            angles.push(rel.dot(&y).atan2(rel.dot(&x)).rem_euclid(TAU));
        }
        let height = h1 - h0;
        let (theta0, span) = angular_span(&mut angles);
        let theta1 = theta0 + span;

        // ∫ u(θ) dθ over the span, u = cos θ x + sin θ y
        let radial_integral = x * (theta1.sin() - theta0.sin()) + y * (theta0.cos() - theta1.cos());
        let sign = if outward { 1.0 } else { -1.0 };
        let area = radius * span * height;
        let flux = sign * radius * height * (radius * span + center.coords.dot(&radial_integral));

        let mid = center + d * (h0 + h1) / 2.0;
        let centroid = if span > f64::EPSILON {
            mid + radial_integral * (radius / span)
        } else {
            mid
        };

        if span >= TAU - f64::EPSILON {
            for h in [h0, h1] {
                let c = center + d * h;
                let ext = Vec3::new(
                    radius * (1.0 - d.x * d.x).max(0.0).sqrt(),
                    radius * (1.0 - d.y * d.y).max(0.0).sqrt(),
                    radius * (1.0 - d.z * d.z).max(0.0).sqrt(),
                );
                self.bbox.include_point(&(c - ext));
                self.bbox.include_point(&(c + ext));
            }
        }

        // Half-cylinders and better are hole candidates; fillets are not.
        if span >= PI - 1e-6 && height > f64::EPSILON {
            self.holes.push(HoleFeature {
                axis_point: center + d * h0,
                axis_direction: d,
                radius,
                depth: height,
            });
        }

        (area > f64::EPSILON).then_some(FaceMeasure {
            area,
            centroid,
            flux,
        })
    }

    fn vertex_point(&mut self, vertex_id: u64) -> Result<Point3, StepError> {
        if let Some(p) = self.points.get(&vertex_id) {
            return Ok(*p);
        }
        let file = self.file;
        let vertex = file.require(vertex_id)?;
        if vertex.type_name != "VERTEX_POINT" {
            return Err(StepError::type_mismatch("VERTEX_POINT", &vertex.type_name));
        }
        let p = parse_cartesian_point(file, vertex.entity_ref(1)?)?;
        self.vertices.insert(vertex_id);
        self.points.insert(vertex_id, p);
        Ok(p)
    }

    fn sample_loop(&mut self, loop_id: u64) -> Result<Vec<Point3>, StepError> {
        let file = self.file;
        let lp = file.require(loop_id)?;
        match lp.type_name.as_str() {
            "EDGE_LOOP" => {
                let mut points = Vec::new();
                for oriented_id in lp.entity_ref_list(1)? {
                    self.sample_oriented_edge(oriented_id, &mut points)?;
                }
                Ok(points)
            }
            "POLY_LOOP" => lp
                .entity_ref_list(1)?
                .into_iter()
                .map(|id| parse_cartesian_point(file, id))
                .collect(),
            "VERTEX_LOOP" => Ok(vec![self.vertex_point(lp.entity_ref(1)?)?]),
            other => Err(StepError::type_mismatch("EDGE_LOOP", other)),
        }
    }

    /// Append samples from the edge start (inclusive) to its end (exclusive).
    fn sample_oriented_edge(&mut self, id: u64, out: &mut Vec<Point3>) -> Result<(), StepError> {
        let file = self.file;
        let oriented = file.require(id)?;
        if oriented.type_name != "ORIENTED_EDGE" {
            return Err(StepError::type_mismatch("ORIENTED_EDGE", &oriented.type_name));
        }
        let orientation = oriented.boolean(4)?;
        let edge_id = oriented.entity_ref(3)?;
        let edge = file.require(edge_id)?;
        if edge.type_name != "EDGE_CURVE" {
            return Err(StepError::type_mismatch("EDGE_CURVE", &edge.type_name));
        }
        self.edges.insert(edge_id);

        let v1 = self.vertex_point(edge.entity_ref(1)?)?;
        let v2 = self.vertex_point(edge.entity_ref(2)?)?;
        let (start, end) = if orientation { (v1, v2) } else { (v2, v1) };
        let forward = edge.boolean(4)? == orientation;

        match self.circle_of(edge.entity_ref(3)?)? {
            Some(circle) => sample_arc(&circle, &start, &end, forward, out),
            None => out.push(start),
        }
        Ok(())
    }

    /// The underlying circle of an edge curve, if it is one.
    fn circle_of(&self, curve_id: u64) -> Result<Option<CircleCurve>, StepError> {
        let mut curve = self.file.require(curve_id)?;
        if matches!(curve.type_name.as_str(), "SURFACE_CURVE" | "SEAM_CURVE") {
            curve = self.file.require(curve.entity_ref(1)?)?;
        }
        if curve.type_name != "CIRCLE" {
            return Ok(None);
        }
        Ok(Some(CircleCurve {
            placement: parse_axis2_placement(self.file, curve.entity_ref(1)?)?,
            radius: curve.real(2)?,
        }))
    }
}

fn sample_arc(circle: &CircleCurve, start: &Point3, end: &Point3, forward: bool, out: &mut Vec<Point3>) {
    let c = circle.placement.location;
    let x = circle.placement.x_axis().into_inner();
    let y = circle.placement.y_axis().into_inner();
    let angle = |p: &Point3| {
        let rel = p - c;
        rel.dot(&y).atan2(rel.dot(&x))
    };

    let a0 = angle(start);
    let closed = (start - end).norm() <= 1e-9 * circle.radius.max(1.0);
    let sweep = if closed {
        TAU
    } else if forward {
        (angle(end) - a0).rem_euclid(TAU)
    } else {
        (a0 - angle(end)).rem_euclid(TAU)
    };
    let sweep = if forward { sweep } else { -sweep };

    let steps = ((sweep.abs() / TAU) * SEGMENTS_PER_TURN as f64).ceil().max(1.0) as usize;
    for i in 0..steps {
        let t = a0 + sweep * i as f64 / steps as f64;
        out.push(c + circle.radius * (t.cos() * x + t.sin() * y));
    }
}

/// Start angle and angular extent covered by boundary samples.
fn angular_span(angles: &mut [f64]) -> (f64, f64) {
    if angles.len() < 2 {
        return (angles.first().copied().unwrap_or(0.0), 0.0);
    }
    angles.sort_by(f64::total_cmp);
    let mut gap = angles[0] + TAU - angles[angles.len() - 1];
    let mut start = angles[0];
    for w in angles.windows(2) {
        if w[1] - w[0] > gap {
            gap = w[1] - w[0];
            start = w[1];
        }
    }
    if gap < FULL_TURN_GAP {
        (0.0, TAU)
    } else {
        (start, TAU - gap)
    }
}

/// Signed area (relative to `normal`) and area centroid of a planar polygon.
fn polygon_area(points: &[Point3], normal: &Vec3) -> Option<(f64, Point3)> {
    if points.len() < 3 {
        return None;
    }
    let p0 = points[0];
    let mut area = 0.0;
    let mut moment = Vec3::zeros();
    for w in points[1..].windows(2) {
        let a = (w[0] - p0).cross(&(w[1] - p0)).dot(normal) / 2.0;
        let c = (p0.coords + w[0].coords + w[1].coords) / 3.0;
        area += a;
        moment += c * a;
    }
    if area.abs() <= f64::EPSILON {
        return None;
    }
    Some((area, Point3::from(moment / area)))
}

/// Boundary fan triangulation for surfaces without an analytic measure.
fn generic_face(loops: &[LoopSample], flip: bool) -> Option<FaceMeasure> {
    let mut vector_area = Vec3::zeros();
    let mut flux = 0.0;
    let mut sum = Vec3::zeros();
    let mut count = 0usize;
    for l in loops {
        if l.points.len() < 3 {
            continue;
        }
        let sign = if l.orientation != flip { 1.0 } else { -1.0 };
        let p0 = l.points[0];
        for w in l.points[1..].windows(2) {
            let a = (w[0] - p0).cross(&(w[1] - p0)) * (sign / 2.0);
            let c = (p0.coords + w[0].coords + w[1].coords) / 3.0;
            vector_area += a;
            flux += c.dot(&a);
        }
        sum += l.points.iter().map(|p| p.coords).sum::<Vec3>();
        count += l.points.len();
    }
    let area = vector_area.norm();
    if count == 0 || area <= f64::EPSILON {
        return None;
    }
    Some(FaceMeasure {
        area,
        centroid: Point3::from(sum / count as f64),
        flux,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polygon_area_square() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let (a, c) = polygon_area(&pts, &Vec3::z()).unwrap();
        assert_relative_eq!(a, 4.0);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 1.0);

        let (a, _) = polygon_area(&pts, &-Vec3::z()).unwrap();
        assert_relative_eq!(a, -4.0);
    }

    #[test]
    fn test_angular_span() {
        let mut full: Vec<f64> = (0..64).map(|i| i as f64 * TAU / 64.0).collect();
        assert_eq!(angular_span(&mut full), (0.0, TAU));

        let mut half: Vec<f64> = (0..=32).map(|i| i as f64 * PI / 32.0).collect();
        let (start, span) = angular_span(&mut half);
        assert_relative_eq!(start, 0.0);
        assert_relative_eq!(span, PI, epsilon = 1e-12);

        let mut quarter = vec![3.0 * PI / 2.0, 0.1, TAU - 0.1];
        let (start, span) = angular_span(&mut quarter);
        assert_relative_eq!(start, 3.0 * PI / 2.0);
        assert_relative_eq!(span, PI / 2.0 + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_full_circle() {
        let circle = CircleCurve {
            placement: AxisPlacement {
                location: Point3::origin(),
                axis: None,
                ref_direction: None,
            },
            radius: 2.0,
        };
        let p = Point3::new(2.0, 0.0, 0.0);
        let mut out = Vec::new();
        sample_arc(&circle, &p, &p, true, &mut out);
        assert_eq!(out.len(), SEGMENTS_PER_TURN);
        assert!(out.iter().all(|q| (q.coords.norm() - 2.0).abs() < 1e-12));
    }
}
