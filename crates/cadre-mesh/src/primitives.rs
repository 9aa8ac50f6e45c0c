//! Primitive meshes with outward, counter-clockwise winding.
//!
//! Used for previews of simple parts and as render fixtures. Every triangle
//! satisfies `cross(v1 - v0, v2 - v0)` pointing away from the solid.

use std::f32::consts::PI;

use crate::{MeshVertex, TriangleMesh};

/// Axis-aligned box centered at the origin with the given side lengths.
///
/// Each face gets its own four vertices so normals stay flat; `face_id`
/// numbers the faces `+X, -X, +Y, -Y, +Z, -Z`.
pub fn cube(sx: f32, sy: f32, sz: f32) -> TriangleMesh {
    let half = [sx * 0.5, sy * 0.5, sz * 0.5];
    // (normal, u, v) with u x v == normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut mesh = TriangleMesh::new();
    for (face_id, (n, u, v)) in faces.iter().enumerate() {
        let base = mesh.vertices.len() as u32;
        for &(su, sv) in &corners {
            let mut p = [0.0f32; 3];
            for axis in 0..3 {
                p[axis] = (n[axis] + su * u[axis] + sv * v[axis]) * half[axis];
            }
            let uv = [(su + 1.0) * 0.5, (sv + 1.0) * 0.5];
            mesh.vertices.push(MeshVertex::new(p, *n, uv, face_id as u32));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Rectangle in the XY plane centered at the origin, facing `+Z`.
pub fn plane(width: f32, height: f32) -> TriangleMesh {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let n = [0.0, 0.0, 1.0];
    TriangleMesh {
        vertices: vec![
            MeshVertex::new([-hw, -hh, 0.0], n, [0.0, 0.0], 0),
            MeshVertex::new([hw, -hh, 0.0], n, [1.0, 0.0], 0),
            MeshVertex::new([hw, hh, 0.0], n, [1.0, 1.0], 0),
            MeshVertex::new([-hw, hh, 0.0], n, [0.0, 1.0], 0),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}

/// Latitude/longitude sphere centered at the origin, poles on `Y`.
///
/// `segments` is clamped to at least 3 and `rings` to at least 2. The
/// zero-area triangles that would touch the poles are not emitted.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> TriangleMesh {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = TriangleMesh::new();

    for i in 0..=rings {
        let theta = PI * i as f32 / rings as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for j in 0..=segments {
            let phi = 2.0 * PI * j as f32 / segments as f32;
            let (sin_p, cos_p) = phi.sin_cos();
            let n = [sin_t * cos_p, cos_t, sin_t * sin_p];
            let p = [n[0] * radius, n[1] * radius, n[2] * radius];
            let uv = [j as f32 / segments as f32, i as f32 / rings as f32];
            mesh.vertices.push(MeshVertex::new(p, n, uv, 0));
        }
    }

    let stride = segments + 1;
    for i in 0..rings {
        for j in 0..segments {
            let a = i * stride + j;
            let b = (i + 1) * stride + j;
            let c = b + 1;
            let d = a + 1;
            if i + 1 < rings {
                mesh.indices.extend_from_slice(&[a, c, b]);
            }
            if i > 0 {
                mesh.indices.extend_from_slice(&[a, d, c]);
            }
        }
    }
    mesh
}
