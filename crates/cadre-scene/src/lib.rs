#![warn(missing_docs)]

//! Render-facing view of the editor scene.
//!
//! The editor's entity-component graph lives elsewhere; this crate holds the
//! slice of it the preview renderer needs: each entity's identity, model
//! transform and tessellated mesh. A geometry revision counter lets
//! acceleration structures detect that they were built from stale geometry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cadre_kernel_math::Transform;
use cadre_mesh::TriangleMesh;
use thiserror::Error;

/// Stable identifier of a scene entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Marker carried by hit payloads that hit nothing.
    pub const INVALID: EntityId = EntityId(u32::MAX);

    /// False only for [`EntityId::INVALID`].
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}", self.0)
        } else {
            f.write_str("#invalid")
        }
    }
}

/// Errors from scene edits.
#[derive(Error, Debug, PartialEq)]
pub enum SceneError {
    /// No entity with this id exists.
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;

/// A placed part: mesh in local space plus its model matrix.
#[derive(Debug, Clone)]
pub struct Entity {
    /// Identity reported in hit payloads.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Local-to-world transform.
    pub transform: Transform,
    /// Tessellated geometry in local space. Shared between instances.
    pub mesh: Arc<TriangleMesh>,
}

impl Entity {
    /// True if the entity contributes geometry.
    pub fn is_renderable(&self) -> bool {
        !self.mesh.is_empty()
    }
}

/// Source of scene revisions, shared by every scene in the process.
static REVISIONS: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    REVISIONS.fetch_add(1, Ordering::Relaxed)
}

/// Ordered collection of entities.
#[derive(Debug, Clone)]
pub struct Scene {
    entities: Vec<Entity>,
    next_id: u32,
    revision: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            next_id: 0,
            revision: next_revision(),
        }
    }

    /// Add an entity and return its id.
    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        transform: Transform,
        mesh: Arc<TriangleMesh>,
    ) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.push(Entity {
            id,
            name: name.into(),
            transform,
            mesh,
        });
        self.revision = next_revision();
        id
    }

    /// Remove an entity, returning it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let pos = self
            .entities
            .iter()
            .position(|e| e.id == id)
            .ok_or(SceneError::UnknownEntity(id))?;
        self.revision = next_revision();
        Ok(self.entities.remove(pos))
    }

    /// Replace an entity's model transform.
    pub fn set_transform(&mut self, id: EntityId, transform: Transform) -> Result<()> {
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(SceneError::UnknownEntity(id))?;
        entity.transform = transform;
        self.revision = next_revision();
        Ok(())
    }

    /// Replace an entity's mesh (after re-tessellation).
    pub fn set_mesh(&mut self, id: EntityId, mesh: Arc<TriangleMesh>) -> Result<()> {
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(SceneError::UnknownEntity(id))?;
        entity.mesh = mesh;
        self.revision = next_revision();
        Ok(())
    }

    /// Look up an entity.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Entities with non-empty geometry.
    pub fn renderable(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.is_renderable())
    }

    /// Total triangle count over renderable entities.
    pub fn triangle_count(&self) -> usize {
        self.renderable().map(|e| e.mesh.num_triangles()).sum()
    }

    /// Geometry revision.
    ///
    /// Every new scene and every edit draws a fresh value from a
    /// process-wide counter, so two scenes only share a revision when one is
    /// an unedited clone of the other.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the scene has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
