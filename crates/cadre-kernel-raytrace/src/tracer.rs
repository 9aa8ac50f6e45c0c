//! Closest-hit queries against a scene.
//!
//! Two implementations share the [`Tracer`] seam: [`SceneTracer`] walks every
//! triangle of every entity, and [`SceneAccel`] answers the same query from a
//! BVH. Both transform triangles into world space the same way and run the
//! same intersector, so they report the same closest hit.

use cadre_scene::{EntityId, Scene};

use crate::bvh::{Bvh, BvhConfig};
use crate::intersect::intersect_triangle;
use crate::triangle::{extract_triangles, to_world};
use crate::{HitPayload, Ray};

/// Something that can find the closest hit along a ray.
///
/// Implementations are shared read-only across render threads.
pub trait Tracer: Sync {
    /// Closest hit along `ray`, or [`HitPayload::miss`].
    fn trace(&self, ray: &Ray) -> HitPayload;
}

/// Brute-force closest hit over every renderable entity.
///
/// Each local triangle is moved into world space with its entity's model
/// matrix before testing. Ties keep the first triangle encountered.
pub fn trace_ray(ray: &Ray, scene: &Scene) -> HitPayload {
    let mut payload = HitPayload::miss();
    let mut closest_t = f64::INFINITY;

    for entity in scene.renderable() {
        for local in entity.mesh.triangles() {
            let [v0, v1, v2] = to_world(&entity.transform, &local);
            if let Some(hit) = intersect_triangle(ray, &v0, &v1, &v2) {
                if hit.t < closest_t {
                    closest_t = hit.t;
                    payload = HitPayload {
                        distance: hit.t,
                        position: ray.at(hit.t),
                        normal: hit.normal,
                        entity: entity.id,
                    };
                }
            }
        }
    }

    payload
}

/// [`Tracer`] that walks the scene directly on every query.
#[derive(Debug, Clone, Copy)]
pub struct SceneTracer<'a> {
    scene: &'a Scene,
}

impl<'a> SceneTracer<'a> {
    /// Wrap a scene.
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }
}

impl Tracer for SceneTracer<'_> {
    fn trace(&self, ray: &Ray) -> HitPayload {
        trace_ray(ray, self.scene)
    }
}

/// BVH over a scene's world-space triangles.
///
/// Records the scene revision it was built from; after any edit to the scene
/// [`is_stale`](Self::is_stale) reports that a rebuild is due.
#[derive(Debug, Clone, Default)]
pub struct SceneAccel {
    bvh: Bvh,
    owners: Vec<EntityId>,
    revision: u64,
}

impl SceneAccel {
    /// Extract the scene's triangles and build a BVH over them.
    #[tracing::instrument(skip_all, fields(entities = scene.len(), revision = scene.revision()))]
    pub fn build(scene: &Scene, config: &BvhConfig) -> Self {
        let extracted = extract_triangles(scene);
        let bvh = Bvh::build(extracted.triangles, config);
        Self {
            bvh,
            owners: extracted.owners,
            revision: scene.revision(),
        }
    }

    /// True if `scene` was edited since this structure was built.
    pub fn is_stale(&self, scene: &Scene) -> bool {
        self.revision != scene.revision()
    }

    /// Scene revision this structure reflects.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The underlying hierarchy.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Entity that contributed triangle `index` (extraction order).
    pub fn owner(&self, index: u32) -> Option<EntityId> {
        self.owners.get(index as usize).copied()
    }
}

impl Tracer for SceneAccel {
    fn trace(&self, ray: &Ray) -> HitPayload {
        let Some(hit) = self.bvh.intersect(ray) else {
            return HitPayload::miss();
        };
        // Owners are recorded alongside the triangles during extraction.
        let Some(entity) = self.owner(hit.triangle) else {
            debug_assert!(false, "triangle {} has no owner", hit.triangle);
            return HitPayload::miss();
        };
        HitPayload {
            distance: hit.hit.t,
            position: ray.at(hit.hit.t),
            normal: hit.hit.normal,
            entity,
        }
    }
}
