//! TOML render jobs.
//!
//! A job names a camera, render settings and a list of primitive parts:
//!
//! ```toml
//! [camera]
//! eye = [3.0, 2.0, 5.0]
//! fov = 45.0
//!
//! [render]
//! width = 800
//! height = 600
//! normal_blend = 0.3
//!
//! [bvh]
//! max_leaf_size = 2
//!
//! [[entity]]
//! shape = "cube"
//! size = [1.0, 1.0, 1.0]
//! rotate = [0.0, 30.0, 0.0]
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cadre_kernel_math::{Point3, Transform, Vec3};
use cadre_kernel_raytrace::{BvhConfig, Camera, RenderSettings};
use cadre_mesh::{primitives, TriangleMesh};
use cadre_scene::Scene;
use serde::Deserialize;

/// A parsed render job.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Viewpoint for the render.
    pub camera: CameraSpec,
    /// Image size and shading settings.
    #[serde(default)]
    pub render: RenderSpec,
    /// BVH build parameters; overrides `render.bvh` when present.
    pub bvh: Option<BvhConfig>,
    /// Parts placed in the scene, in file order.
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntitySpec>,
}

/// Look-at camera in world coordinates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraSpec {
    /// Camera position.
    pub eye: [f64; 3],
    /// Point the camera looks at (default: origin).
    #[serde(default)]
    pub target: [f64; 3],
    /// Up hint (default: +Y).
    #[serde(default = "default_up")]
    pub up: [f64; 3],
    /// Vertical field of view in degrees.
    #[serde(default = "default_fov")]
    pub fov: f64,
    /// Near clip distance (default: 0.1).
    #[serde(default = "default_near")]
    pub near: f64,
    /// Far clip distance (default: 1000).
    #[serde(default = "default_far")]
    pub far: f64,
}

fn default_up() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov() -> f64 {
    45.0
}

fn default_near() -> f64 {
    0.1
}

fn default_far() -> f64 {
    1000.0
}

/// The `[render]` table: output size plus the renderer's settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSpec {
    /// Image width in pixels (default: 640).
    #[serde(default = "default_width")]
    pub width: u32,
    /// Image height in pixels (default: 480).
    #[serde(default = "default_height")]
    pub height: u32,
    /// Remaining keys, read as [`RenderSettings`].
    #[serde(flatten)]
    pub settings: RenderSettings,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

impl Default for RenderSpec {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            settings: RenderSettings::default(),
        }
    }
}

/// Primitive an entity is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned box centered at the origin.
    Cube,
    /// UV sphere centered at the origin.
    Sphere,
    /// Rectangle in the XY plane facing +Z.
    Plane,
}

/// One `[[entity]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySpec {
    /// Display name (default: `entity<index>`).
    pub name: Option<String>,
    /// Primitive to build.
    pub shape: Shape,
    /// Cube edge lengths, or plane width/height in the first two slots.
    pub size: Option<[f64; 3]>,
    /// Sphere radius (default: 0.5).
    pub radius: Option<f64>,
    /// Sphere segments around the axis (default: 32, minimum 3).
    pub segments: Option<u32>,
    /// Sphere rings pole to pole (default: 16, minimum 2).
    pub rings: Option<u32>,
    /// Offset applied last.
    #[serde(default)]
    pub translate: [f64; 3],
    /// Euler angles in degrees, applied X then Y then Z.
    #[serde(default)]
    pub rotate: [f64; 3],
    /// Per-axis scale applied first (default: 1).
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
}

fn default_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl EntitySpec {
    /// Model matrix: scale, then rotate X/Y/Z, then translate.
    pub fn transform(&self) -> Transform {
        let [tx, ty, tz] = self.translate;
        let [rx, ry, rz] = self.rotate.map(f64::to_radians);
        let [sx, sy, sz] = self.scale;
        Transform::translation(tx, ty, tz)
            .then(&Transform::rotation_z(rz))
            .then(&Transform::rotation_y(ry))
            .then(&Transform::rotation_x(rx))
            .then(&Transform::scale(sx, sy, sz))
    }

    /// Local-space mesh for this entity's shape.
    pub fn mesh(&self) -> Result<TriangleMesh> {
        let mesh = match self.shape {
            Shape::Cube => {
                let [x, y, z] = self.size.unwrap_or([1.0; 3]);
                primitives::cube(x as f32, y as f32, z as f32)
            }
            Shape::Plane => {
                let [w, h, _] = self.size.unwrap_or([1.0; 3]);
                primitives::plane(w as f32, h as f32)
            }
            Shape::Sphere => {
                let segments = self.segments.unwrap_or(32);
                let rings = self.rings.unwrap_or(16);
                if segments < 3 || rings < 2 {
                    anyhow::bail!("sphere needs at least 3 segments and 2 rings");
                }
                primitives::uv_sphere(self.radius.unwrap_or(0.5) as f32, segments, rings)
            }
        };
        Ok(mesh)
    }
}

impl Job {
    /// Read and parse a job file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    /// Parse a job from TOML text and validate its settings.
    pub fn from_toml(text: &str) -> Result<Self> {
        let job: Job = toml::from_str(text)?;
        job.settings().validate()?;
        Ok(job)
    }

    /// Render settings with the `[bvh]` section applied.
    pub fn settings(&self) -> RenderSettings {
        let mut settings = self.render.settings.clone();
        if let Some(bvh) = self.bvh {
            settings.bvh = bvh;
        }
        settings
    }

    /// Build a scene with one entity per `[[entity]]` table.
    pub fn build_scene(&self) -> Result<Scene> {
        let mut scene = Scene::new();
        for (i, entity) in self.entities.iter().enumerate() {
            let name = entity.name.clone().unwrap_or_else(|| format!("entity{i}"));
            let mesh = entity
                .mesh()
                .with_context(|| format!("building mesh for {name}"))?;
            scene.add_entity(name, entity.transform(), Arc::new(mesh));
        }
        Ok(scene)
    }

    /// Camera for a `width` x `height` image.
    pub fn camera(&self, width: u32, height: u32) -> Result<Camera> {
        let c = &self.camera;
        let camera = Camera::look_at(
            Point3::from(c.eye),
            Point3::from(c.target),
            Vec3::from(c.up),
            c.fov.to_radians(),
            width as f64 / height.max(1) as f64,
            c.near,
            c.far,
        )?;
        Ok(camera)
    }
}
