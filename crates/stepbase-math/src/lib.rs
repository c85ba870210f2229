#![warn(missing_docs)]

//! Math types for the stepbase crates.
//!
//! Thin wrappers around nalgebra providing the handful of geometric
//! types the STEP kernel and the baseline engine share: points, vectors,
//! directions, rigid placements, relative comparisons and bounding boxes.

mod aabb;

pub use aabb::Aabb3;

use nalgebra::{Matrix4, Unit, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Frame transform mapping local coordinates of an orthonormal frame
    /// (`x`, `y`, `z` axes at `origin`) into the enclosing coordinates.
    pub fn from_frame(origin: &Point3, x: &Dir3, y: &Dir3, z: &Dir3) -> Self {
        let mut m = Matrix4::identity();
        for row in 0..3 {
            m[(row, 0)] = x[row];
            m[(row, 1)] = y[row];
            m[(row, 2)] = z[row];
            m[(row, 3)] = origin[row];
        }
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Whether this is the identity within `eps` per matrix entry.
    pub fn is_identity(&self, eps: f64) -> bool {
        (self.matrix - Matrix4::identity()).amax() <= eps
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Angle in radians between two vectors, in `[0, π]`.
///
/// Returns `π / 2` when either vector has zero length.
pub fn angle_between(a: &Vec3, b: &Vec3) -> f64 {
    let denom = a.norm() * b.norm();
    if denom <= f64::EPSILON {
        return std::f64::consts::FRAC_PI_2;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// Angle in radians between two undirected axes, in `[0, π/2]`.
pub fn axis_angle(a: &Vec3, b: &Vec3) -> f64 {
    let theta = angle_between(a, b);
    theta.min(std::f64::consts::PI - theta)
}

/// Perpendicular distance from `p` to the infinite line through `origin`
/// along `dir`.
pub fn distance_to_line(p: &Point3, origin: &Point3, dir: &Vec3) -> f64 {
    let len = dir.norm();
    if len <= f64::EPSILON {
        return (p - origin).norm();
    }
    (p - origin).cross(dir).norm() / len
}

/// Relative change from `before` to `after`.
///
/// A zero `before` yields `0.0` when `after` is also zero and `1.0`
/// (a full relative change, signed) otherwise.
pub fn relative_delta(before: f64, after: f64) -> f64 {
    let delta = after - before;
    if before.abs() <= f64::EPSILON {
        if delta.abs() <= f64::EPSILON {
            0.0
        } else {
            delta.signum()
        }
    } else {
        delta / before.abs()
    }
}

/// Check whether `a` and `b` agree within a relative tolerance of the
/// larger magnitude.
pub fn relative_eq(a: f64, b: f64, rel: f64) -> bool {
    let scale = a.abs().max(b.abs());
    if scale <= f64::EPSILON {
        return true;
    }
    (a - b).abs() <= rel * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity_transform() {
        let t = Transform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert!((result - p).norm() < 1e-12);
        assert!(t.is_identity(0.0));
    }

    #[test]
    fn test_frame_transform_and_inverse() {
        // Frame rotated 90° about Z and moved to (10, 0, 0)
        let origin = Point3::new(10.0, 0.0, 0.0);
        let x = Dir3::new_normalize(Vec3::y());
        let y = Dir3::new_normalize(-Vec3::x());
        let z = Dir3::new_normalize(Vec3::z());
        let t = Transform::from_frame(&origin, &x, &y, &z);

        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);

        let back = t.inverse().unwrap().apply_point(&p);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(back.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let quarter_turn = Transform::from_frame(
            &Point3::origin(),
            &Dir3::new_normalize(Vec3::y()),
            &Dir3::new_normalize(-Vec3::x()),
            &Dir3::new_normalize(Vec3::z()),
        );
        let p = quarter_turn.then(&translate).apply_point(&Point3::origin());
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_apply_vec_ignores_translation() {
        let t = Transform::translation(5.0, 5.0, 5.0);
        let v = t.apply_vec(&Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(v, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_axis_angle_treats_antiparallel_as_collinear() {
        let a = Vec3::z();
        let b = -Vec3::z();
        assert_relative_eq!(angle_between(&a, &b), PI, epsilon = 1e-12);
        assert_relative_eq!(axis_angle(&a, &b), 0.0, epsilon = 1e-12);

        let tilted = Vec3::new(-(1f64.to_radians().sin()), 0.0, -(1f64.to_radians().cos()));
        assert_relative_eq!(axis_angle(&a, &tilted), 1f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(axis_angle(&a, &Vec3::x()), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_to_line() {
        let d = distance_to_line(
            &Point3::new(3.0, 4.0, 7.0),
            &Point3::origin(),
            &Vec3::new(0.0, 0.0, 2.0),
        );
        assert_relative_eq!(d, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_relative_helpers() {
        assert_relative_eq!(relative_delta(200.0, 210.0), 0.05, epsilon = 1e-12);
        assert_relative_eq!(relative_delta(200.0, 190.0), -0.05, epsilon = 1e-12);
        assert_eq!(relative_delta(0.0, 0.0), 0.0);
        assert_eq!(relative_delta(0.0, 3.0), 1.0);

        assert!(relative_eq(1000.0, 1000.0005, 1e-6));
        assert!(!relative_eq(1000.0, 1000.01, 1e-6));
        assert!(relative_eq(0.0, 0.0, 1e-6));
    }
}
