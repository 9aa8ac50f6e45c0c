#![warn(missing_docs)]

//! Tessellated triangle meshes for the cadre renderer.
//!
//! The B-rep kernel tessellates faces into vertex records plus a flat
//! triangle index list (three indices per triangle). The renderer only reads
//! positions; the remaining attributes ride along for the raster path and for
//! mapping hits back to model faces.

pub mod primitives;

use cadre_kernel_math::Point3;

/// One tessellated vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    /// Local-space position.
    pub position: [f32; 3],
    /// Vertex normal.
    pub normal: [f32; 3],
    /// Linear RGBA color.
    pub color: [f32; 4],
    /// Texture coordinate.
    pub texcoord: [f32; 2],
    /// Index into the owning part's material table.
    pub material_index: u32,
    /// B-rep face the vertex was sampled from.
    pub face_id: u32,
}

impl MeshVertex {
    /// A white vertex with no face association beyond `face_id`.
    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2], face_id: u32) -> Self {
        Self {
            position,
            normal,
            color: [1.0, 1.0, 1.0, 1.0],
            texcoord,
            material_index: 0,
            face_id,
        }
    }

    /// Position widened to `f64`.
    #[inline]
    pub fn point(&self) -> Point3 {
        Point3::new(
            self.position[0] as f64,
            self.position[1] as f64,
            self.position[2] as f64,
        )
    }
}

/// Output triangle mesh from tessellation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex records.
    pub vertices: Vec<MeshVertex>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// True if the mesh has no complete triangle.
    pub fn is_empty(&self) -> bool {
        self.num_triangles() == 0
    }

    /// Local-space corners of triangle `i`.
    ///
    /// Returns `None` when `i` is out of range or an index points past the
    /// vertex array.
    pub fn triangle(&self, i: usize) -> Option<[Point3; 3]> {
        let idx = self.indices.get(i * 3..i * 3 + 3)?;
        let a = self.vertices.get(idx[0] as usize)?;
        let b = self.vertices.get(idx[1] as usize)?;
        let c = self.vertices.get(idx[2] as usize)?;
        Some([a.point(), b.point(), c.point()])
    }

    /// Iterate the local-space corners of every well-formed triangle.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        (0..self.num_triangles()).filter_map(move |i| self.triangle(i))
    }

    /// Merge another mesh into this one.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.num_vertices() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|&i| i + offset));
    }
}
