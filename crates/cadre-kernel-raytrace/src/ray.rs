//! Ray representation, slab test and hit payload.

use cadre_kernel_math::{Aabb3, Dir3, Point3, Vec3};
use cadre_scene::EntityId;

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Precomputed reciprocal of direction components for fast AABB tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let dir = Dir3::new_normalize(direction);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            if inv.x < 0.0 { 1 } else { 0 },
            if inv.y < 0.0 { 1 } else { 0 },
            if inv.z < 0.0 { 1 } else { 0 },
        ];
        Self {
            origin,
            direction: dir,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` if the ray intersects the box,
    /// where `t_min` and `t_max` are the entry and exit parameters.
    /// Returns `None` if no intersection.
    ///
    /// Handles infinite values correctly for axis-aligned rays.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}

/// Result of tracing one ray through the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitPayload {
    /// Distance along the ray; negative when nothing was hit.
    pub distance: f64,
    /// World-space hit position.
    pub position: Point3,
    /// World-space unit geometric normal.
    pub normal: Vec3,
    /// Entity owning the hit triangle, [`EntityId::INVALID`] on a miss.
    pub entity: EntityId,
}

impl HitPayload {
    /// Distance reported for a miss.
    pub const MISS_DISTANCE: f64 = -1.0;

    /// Payload for a ray that hit nothing.
    pub fn miss() -> Self {
        Self {
            distance: Self::MISS_DISTANCE,
            position: Point3::origin(),
            normal: Vec3::zeros(),
            entity: EntityId::INVALID,
        }
    }

    /// True if the ray hit geometry.
    #[inline]
    pub fn is_hit(&self) -> bool {
        self.distance >= 0.0
    }
}

impl Default for HitPayload {
    fn default() -> Self {
        Self::miss()
    }
}
