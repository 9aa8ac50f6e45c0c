//! Ray-triangle intersection (Moller-Trumbore).

use cadre_kernel_math::{Point3, Vec3};

use crate::Ray;

/// Determinant magnitude below which the ray counts as parallel to the triangle.
pub const PARALLEL_EPSILON: f64 = 1e-7;

/// Hits at or closer than this distance from the origin are rejected.
pub const MIN_HIT_DISTANCE: f64 = 1e-6;

/// Result of a ray-triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Parameter along the ray.
    pub t: f64,
    /// Unit geometric normal, `normalize(cross(v1 - v0, v2 - v0))`.
    pub normal: Vec3,
}

/// Intersect a ray with the triangle `(v0, v1, v2)`.
///
/// Returns `None` if the ray is (nearly) parallel to the triangle plane,
/// passes outside the triangle, or meets it at `t <= MIN_HIT_DISTANCE`.
/// Both faces are hit; the returned normal follows the winding, not the ray.
#[inline]
pub fn intersect_triangle(ray: &Ray, v0: &Point3, v1: &Point3, v2: &Point3) -> Option<TriangleHit> {
    let dir = ray.direction.as_ref();
    let e1 = v1 - v0;
    let e2 = v2 - v0;

    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - v0;
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&q) * inv_det;
    if t <= MIN_HIT_DISTANCE {
        return None;
    }

    Some(TriangleHit {
        t,
        normal: e1.cross(&e2).normalize(),
    })
}
