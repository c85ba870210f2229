//! Classification rules, evaluated in priority order.

use std::f64::consts::PI;

use stepbase_kernel::{HoleFeature, PlanarFace};
use stepbase_math::{angle_between, axis_angle, distance_to_line, relative_eq, Point3, Vec3};

use super::{AlignedAxis, Candidate, Evidence, InterfaceKind};
use crate::config::InterfaceConfig;

/// One classification rule.
///
/// `a` always has the smaller component id.
pub trait InterfaceRule: Send + Sync {
    /// Kind of interface this rule produces.
    fn kind(&self) -> InterfaceKind;

    /// Evidence for the pair, or `None` when the rule does not apply.
    fn evaluate(&self, a: &Candidate<'_>, b: &Candidate<'_>, config: &InterfaceConfig) -> Option<Evidence>;
}

/// Collinear holes of one component, counted once.
#[derive(Debug, Clone)]
pub(crate) struct HoleGroup {
    point: Point3,
    direction: Vec3,
    radius: f64,
}

impl HoleGroup {
    fn aligned_with(&self, point: &Point3, direction: &Vec3, radius: f64, config: &InterfaceConfig) -> bool {
        let max_offset = config.axis_distance_factor * 2.0 * self.radius.min(radius);
        axis_angle(&self.direction, direction) <= config.angular_tolerance()
            && distance_to_line(point, &self.point, &self.direction) <= max_offset
            && relative_eq(self.radius, radius, config.radius_tolerance)
    }
}

/// Merge collinear holes of equal radius, such as the two half-cylinder
/// faces of one bore.
pub(crate) fn group_holes(holes: &[HoleFeature], config: &InterfaceConfig) -> Vec<HoleGroup> {
    let mut groups: Vec<HoleGroup> = Vec::new();
    for hole in holes {
        let norm = hole.axis_direction.norm();
        if norm <= f64::EPSILON || hole.radius <= 0.0 {
            continue;
        }
        let direction = hole.axis_direction / norm;
        if groups
            .iter()
            .any(|g| g.aligned_with(&hole.axis_point, &direction, hole.radius, config))
        {
            continue;
        }
        groups.push(HoleGroup {
            point: hole.axis_point,
            direction,
            radius: hole.radius,
        });
    }
    groups
}

/// Holes of both components sharing an axis.
pub struct FasteningRule;

impl InterfaceRule for FasteningRule {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Fastening
    }

    fn evaluate(&self, a: &Candidate<'_>, b: &Candidate<'_>, config: &InterfaceConfig) -> Option<Evidence> {
        let mut used = vec![false; b.hole_groups.len()];
        let mut aligned_axes = Vec::new();
        for ga in &a.hole_groups {
            let matched = b.hole_groups.iter().enumerate().find(|(k, gb)| {
                !used[*k] && ga.aligned_with(&gb.point, &gb.direction, gb.radius, config)
            });
            if let Some((k, gb)) = matched {
                used[k] = true;
                aligned_axes.push(AlignedAxis {
                    axis_point: ga.point,
                    axis_direction: ga.direction,
                    diameter: 2.0 * ga.radius.max(gb.radius),
                });
            }
        }
        if aligned_axes.is_empty() {
            return None;
        }
        let fastener_diameter = aligned_axes.iter().map(|x| x.diameter).fold(0.0, f64::max);
        Some(Evidence::Fastening {
            fastener_count: aligned_axes.len(),
            fastener_diameter,
            aligned_axes,
        })
    }
}

/// Antiparallel planar faces lying on the same plane and overlapping.
pub struct ContactRule;

struct FaceContact {
    area: f64,
    offset: f64,
    normal_a: Vec3,
    normal_b: Vec3,
}

fn face_contact(fa: &PlanarFace, fb: &PlanarFace, config: &InterfaceConfig) -> Option<FaceContact> {
    let na = fa.normal.try_normalize(f64::EPSILON)?;
    let nb = fb.normal.try_normalize(f64::EPSILON)?;
    if angle_between(&na, &-nb) > config.contact_angular_tolerance() {
        return None;
    }
    let rel = fb.centroid - fa.centroid;
    let offset = rel.dot(&na).abs();
    if offset > config.contact_plane_tolerance {
        return None;
    }
    let in_plane = (rel - na * rel.dot(&na)).norm();
    let area = disk_overlap(
        (fa.area.max(0.0) / PI).sqrt(),
        (fb.area.max(0.0) / PI).sqrt(),
        in_plane,
    );
    (area >= config.contact_min_area).then_some(FaceContact {
        area,
        offset,
        normal_a: na,
        normal_b: nb,
    })
}

impl InterfaceRule for ContactRule {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Contact
    }

    fn evaluate(&self, a: &Candidate<'_>, b: &Candidate<'_>, config: &InterfaceConfig) -> Option<Evidence> {
        let mut best: Option<FaceContact> = None;
        let mut touching = 0;
        for fa in &a.summary.planar_faces {
            for fb in &b.summary.planar_faces {
                let Some(contact) = face_contact(fa, fb, config) else {
                    continue;
                };
                touching += 1;
                if best.as_ref().map_or(true, |c| contact.area > c.area) {
                    best = Some(contact);
                }
            }
        }
        best.map(|c| Evidence::Contact {
            contact_area: c.area,
            plane_offset: c.offset,
            normal_a: c.normal_a,
            normal_b: c.normal_b,
            touching_faces: touching,
        })
    }
}

/// Bounding boxes within a fraction of the smaller diagonal.
pub struct ProximityRule;

impl InterfaceRule for ProximityRule {
    fn kind(&self) -> InterfaceKind {
        InterfaceKind::Proximity
    }

    fn evaluate(&self, a: &Candidate<'_>, b: &Candidate<'_>, config: &InterfaceConfig) -> Option<Evidence> {
        let threshold = a.summary.diagonal().min(b.summary.diagonal()) * config.proximity_fraction;
        let gap = a.summary.bounding_box.gap(&b.summary.bounding_box);
        (gap <= threshold).then_some(Evidence::Proximity { gap, threshold })
    }
}

/// Intersection area of two coplanar disks with center distance `d`.
fn disk_overlap(r1: f64, r2: f64, d: f64) -> f64 {
    if r1 <= 0.0 || r2 <= 0.0 || d >= r1 + r2 {
        return 0.0;
    }
    if d <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return PI * r * r;
    }
    let a1 = ((d * d + r1 * r1 - r2 * r2) / (2.0 * d * r1)).clamp(-1.0, 1.0).acos();
    let a2 = ((d * d + r2 * r2 - r1 * r1) / (2.0 * d * r2)).clamp(-1.0, 1.0).acos();
    let k = ((-d + r1 + r2) * (d + r1 - r2) * (d - r1 + r2) * (d + r1 + r2)).max(0.0);
    r1 * r1 * a1 + r2 * r2 * a2 - 0.5 * k.sqrt()
}
