#![warn(missing_docs)]

//! CPU preview ray tracing for the cadre editor.
//!
//! Scenes arrive as tessellated meshes with model transforms; this crate
//! flattens them to world-space triangles, builds a bounding volume
//! hierarchy over them and traces one primary ray per pixel into a packed
//! RGBA8 image.
//!
//! # Architecture
//!
//! - [`Triangle`] and [`extract_triangles`] - world-space triangle soup
//! - [`Bvh`] - spatial-median BVH in a flat node arena
//! - [`intersect_triangle`] - Moller-Trumbore ray/triangle test
//! - [`SceneTracer`] / [`SceneAccel`] - brute-force and BVH closest-hit queries
//! - [`Renderer`] - row-parallel pixel sampler writing an [`ImageBuffer`]
//!
//! # Example
//!
//! ```ignore
//! use cadre_kernel_raytrace::{Camera, RenderSettings, Renderer, SceneAccel};
//!
//! let settings = RenderSettings::default();
//! let accel = SceneAccel::build(&scene, &settings.bvh);
//! let camera = Camera::look_at(eye, target, up, 0.8, 16.0 / 9.0, 0.1, 100.0)?;
//!
//! let mut renderer = Renderer::new(1280, 720, settings)?;
//! renderer.render(&accel, &camera);
//! upload(renderer.image().as_bytes());
//! ```

pub mod bvh;
mod camera;
mod error;
pub mod intersect;
mod ray;
mod render;
mod settings;
mod tracer;
mod triangle;

pub use bvh::{Bvh, BvhConfig, BvhHit, BvhNode, BvhNodeKind, BvhStats, PackedBvhNode};
pub use camera::Camera;
pub use error::{RenderError, Result};
pub use intersect::{intersect_triangle, TriangleHit};
pub use ray::{HitPayload, Ray};
pub use render::{pack_rgba, shade, ImageBuffer, Renderer};
pub use settings::RenderSettings;
pub use tracer::{trace_ray, SceneAccel, SceneTracer, Tracer};
pub use triangle::{extract_triangles, ExtractedTriangles, Triangle};
