//! World-space triangle soup extracted from the scene.

use cadre_kernel_math::{Aabb3, Point3, Transform};
use cadre_scene::{EntityId, Scene};

/// A world-space triangle as consumed by the BVH builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First corner.
    pub v0: Point3,
    /// Second corner.
    pub v1: Point3,
    /// Third corner.
    pub v2: Point3,
    /// Average of the three corners.
    pub centroid: Point3,
    /// Position of this triangle in the extraction order.
    pub index: u32,
}

impl Triangle {
    /// Create a triangle and derive its centroid.
    pub fn new(v0: Point3, v1: Point3, v2: Point3, index: u32) -> Self {
        let centroid = Point3::from((v0.coords + v1.coords + v2.coords) / 3.0);
        Self {
            v0,
            v1,
            v2,
            centroid,
            index,
        }
    }

    /// Grow `aabb` to enclose this triangle's corners.
    #[inline]
    pub fn grow(&self, aabb: &mut Aabb3) {
        aabb.include_point(&self.v0);
        aabb.include_point(&self.v1);
        aabb.include_point(&self.v2);
    }

    /// Bounding box of the three corners.
    pub fn aabb(&self) -> Aabb3 {
        let mut aabb = Aabb3::empty();
        self.grow(&mut aabb);
        aabb
    }

    /// The corners as an array.
    #[inline]
    pub fn vertices(&self) -> [Point3; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Triangles in world space plus the entity each one came from.
#[derive(Debug, Clone, Default)]
pub struct ExtractedTriangles {
    /// Triangles; `triangles[i].index == i`.
    pub triangles: Vec<Triangle>,
    /// Owning entity, indexed by [`Triangle::index`].
    pub owners: Vec<EntityId>,
}

/// Corners of a local triangle moved into world space.
#[inline]
pub(crate) fn to_world(transform: &Transform, local: &[Point3; 3]) -> [Point3; 3] {
    [
        transform.apply_point(&local[0]),
        transform.apply_point(&local[1]),
        transform.apply_point(&local[2]),
    ]
}

/// Flatten every renderable entity into world-space triangles.
///
/// Entities with empty meshes contribute nothing; triangles whose indices
/// point outside their mesh are dropped.
pub fn extract_triangles(scene: &Scene) -> ExtractedTriangles {
    let capacity = scene.triangle_count();
    let mut out = ExtractedTriangles {
        triangles: Vec::with_capacity(capacity),
        owners: Vec::with_capacity(capacity),
    };

    for entity in scene.renderable() {
        for local in entity.mesh.triangles() {
            let [v0, v1, v2] = to_world(&entity.transform, &local);
            let index = out.triangles.len() as u32;
            out.triangles.push(Triangle::new(v0, v1, v2, index));
            out.owners.push(entity.id);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_mesh::{primitives, TriangleMesh};
    use std::sync::Arc;

    #[test]
    fn test_centroid() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 3.0, 3.0),
            7,
        );
        assert_eq!(tri.centroid, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(tri.index, 7);
        let aabb = tri.aabb();
        assert_eq!(aabb.min, Point3::origin());
        assert_eq!(aabb.max, Point3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_extract_applies_transforms() {
        let mut scene = Scene::new();
        let quad = Arc::new(primitives::plane(2.0, 2.0));
        let a = scene.add_entity("a", Transform::identity(), quad.clone());
        let b = scene.add_entity("b", Transform::translation(0.0, 0.0, -3.0), quad);

        let extracted = extract_triangles(&scene);
        assert_eq!(extracted.triangles.len(), 4);
        assert_eq!(extracted.owners, vec![a, a, b, b]);
        for (i, tri) in extracted.triangles.iter().enumerate() {
            assert_eq!(tri.index as usize, i);
        }
        assert!(extracted.triangles[2].vertices().iter().all(|p| p.z == -3.0));
    }

    #[test]
    fn test_extract_skips_empty_entities() {
        let mut scene = Scene::new();
        scene.add_entity("empty", Transform::identity(), Arc::new(TriangleMesh::new()));
        let extracted = extract_triangles(&scene);
        assert!(extracted.triangles.is_empty());
        assert!(extracted.owners.is_empty());
    }
}
