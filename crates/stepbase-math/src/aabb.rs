//! Axis-aligned bounding boxes.
//!
//! Used as the broadphase filter for interface detection: only component
//! pairs whose expanded boxes overlap reach the geometric rules.

use serde::{Deserialize, Serialize};

use crate::{Point3, Transform, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// A degenerate box at the origin.
    pub fn zero() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Replace an empty box by [`Aabb3::zero`] so it stays finite.
    pub fn or_zero(self) -> Self {
        if self.is_empty() {
            Self::zero()
        } else {
            self
        }
    }

    /// Expand this AABB to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this AABB to include another box.
    pub fn include_box(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test if two AABBs overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand the AABB by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// Copy of this box expanded by `tol`.
    pub fn expanded(mut self, tol: f64) -> Self {
        self.expand(tol);
        self
    }

    /// Edge lengths along X, Y and Z.
    pub fn extents(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::zeros();
        }
        self.max - self.min
    }

    /// Length of the main diagonal.
    pub fn diagonal(&self) -> f64 {
        self.extents().norm()
    }

    /// Box center.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Euclidean gap between two boxes, zero when they overlap or touch.
    pub fn gap(&self, other: &Aabb3) -> f64 {
        let dx = (other.min.x - self.max.x).max(self.min.x - other.max.x).max(0.0);
        let dy = (other.min.y - self.max.y).max(self.min.y - other.max.y).max(0.0);
        let dz = (other.min.z - self.max.z).max(self.min.z - other.max.z).max(0.0);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, t: &Transform) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb3::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.include_point(&t.apply_point(&corner));
        }
        out
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dir3;
    use approx::assert_relative_eq;

    fn cube(origin: f64, size: f64) -> Aabb3 {
        Aabb3::new(
            Point3::new(origin, origin, origin),
            Point3::new(origin + size, origin + size, origin + size),
        )
    }

    #[test]
    fn test_aabb_overlap() {
        let a = cube(0.0, 10.0);
        let b = cube(5.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = cube(20.0, 10.0);
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_aabb_touching() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let b = Aabb3::new(Point3::new(10.0, 0.0, 0.0), Point3::new(20.0, 10.0, 10.0));
        assert!(a.overlaps(&b)); // touching counts
        assert_eq!(a.gap(&b), 0.0);
    }

    #[test]
    fn test_gap_between_separated_boxes() {
        let a = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = Aabb3::new(Point3::new(4.0, 5.0, 0.0), Point3::new(5.0, 6.0, 1.0));
        assert_relative_eq!(a.gap(&b), 5.0, epsilon = 1e-12);
        assert_relative_eq!(b.gap(&a), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_expand_reaches_neighbor() {
        let a = cube(0.0, 10.0);
        let b = cube(10.5, 1.0);
        assert!(!a.overlaps(&b));
        assert!(a.expanded(0.25).overlaps(&b.expanded(0.25)));
    }

    #[test]
    fn test_empty_box() {
        let mut b = Aabb3::empty();
        assert!(b.is_empty());
        assert_eq!(b.extents(), Vec3::zeros());
        assert_eq!(b.or_zero(), Aabb3::zero());

        b.include_point(&Point3::new(1.0, 2.0, 3.0));
        b.include_point(&Point3::new(-1.0, 0.0, 5.0));
        assert!(!b.is_empty());
        assert_relative_eq!(b.diagonal(), (4.0f64 + 4.0 + 4.0).sqrt(), epsilon = 1e-12);
        assert_eq!(b.center(), Point3::new(0.0, 1.0, 4.0));
    }

    #[test]
    fn test_transformed_box() {
        let b = Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        // Quarter turn about Z.
        let t = Transform::from_frame(
            &Point3::origin(),
            &Dir3::new_normalize(Vec3::y()),
            &Dir3::new_normalize(-Vec3::x()),
            &Dir3::new_normalize(Vec3::z()),
        );
        let r = b.transformed(&Transform::translation(10.0, 0.0, 0.0).then(&t));
        assert_relative_eq!(r.min.x, 9.0, epsilon = 1e-12);
        assert_relative_eq!(r.max.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(r.min.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(r.max.y, 2.0, epsilon = 1e-12);
    }
}
