//! Pinhole camera used to generate primary rays.

use cadre_kernel_math::{Mat4, Point3, Vec3};
use nalgebra::Vector4;

use crate::error::{RenderError, Result};
use crate::Ray;

/// A camera described by its world position and inverse matrices.
///
/// Rays are unprojected through `inv_projection` and then rotated into world
/// space by `inv_view`, so any external camera that can hand over those two
/// matrices can drive the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Point3,
    inv_projection: Mat4,
    inv_view: Mat4,
}

impl Camera {
    /// Build a camera from precomputed inverse projection and inverse view.
    pub fn from_matrices(position: Point3, inv_projection: Mat4, inv_view: Mat4) -> Result<Self> {
        if !position.coords.iter().all(|c| c.is_finite()) {
            return Err(RenderError::DegenerateCamera(
                "position must be finite".into(),
            ));
        }
        for (name, m) in [("inverse projection", &inv_projection), ("inverse view", &inv_view)] {
            if !m.iter().all(|c| c.is_finite()) || m.try_inverse().is_none() {
                return Err(RenderError::DegenerateCamera(format!(
                    "{name} is not invertible"
                )));
            }
        }
        Ok(Self {
            position,
            inv_projection,
            inv_view,
        })
    }

    /// Right-handed perspective camera at `eye` looking at `target`.
    ///
    /// `fov_y` is the vertical field of view in radians; `aspect` is
    /// width over height.
    pub fn look_at(
        eye: Point3,
        target: Point3,
        up: Vec3,
        fov_y: f64,
        aspect: f64,
        near: f64,
        far: f64,
    ) -> Result<Self> {
        let forward = target - eye;
        if !(forward.norm() > 1e-12) {
            return Err(RenderError::DegenerateCamera(
                "eye and target coincide".into(),
            ));
        }
        if !(up.norm() > 1e-12) || forward.normalize().cross(&up.normalize()).norm() < 1e-9 {
            return Err(RenderError::DegenerateCamera(
                "up is zero or parallel to the view direction".into(),
            ));
        }
        if !(fov_y > 0.0 && fov_y < std::f64::consts::PI) {
            return Err(RenderError::DegenerateCamera(format!(
                "fov {fov_y} outside (0, pi)"
            )));
        }
        if !(aspect > 0.0 && aspect.is_finite()) {
            return Err(RenderError::DegenerateCamera(format!(
                "aspect {aspect} must be positive"
            )));
        }
        if !(near > 0.0 && far > near && far.is_finite()) {
            return Err(RenderError::DegenerateCamera(format!(
                "clip range [{near}, {far}] must satisfy 0 < near < far"
            )));
        }

        let view = Mat4::look_at_rh(&eye, &target, &up);
        let projection = Mat4::new_perspective(aspect, fov_y, near, far);
        let inv_view = view.try_inverse().ok_or_else(|| {
            RenderError::DegenerateCamera("view matrix is not invertible".into())
        })?;
        let inv_projection = projection.try_inverse().ok_or_else(|| {
            RenderError::DegenerateCamera("projection matrix is not invertible".into())
        })?;

        Ok(Self {
            position: eye,
            inv_projection,
            inv_view,
        })
    }

    /// World-space eye position.
    pub fn position(&self) -> Point3 {
        self.position
    }

    /// Inverse projection matrix.
    pub fn inv_projection(&self) -> &Mat4 {
        &self.inv_projection
    }

    /// Inverse view matrix.
    pub fn inv_view(&self) -> &Mat4 {
        &self.inv_view
    }

    /// Primary ray through a point in normalized device coordinates.
    ///
    /// `(-1, -1)` is the bottom-left of the image, `(1, 1)` the top-right.
    pub fn ray_through_ndc(&self, ndc_x: f64, ndc_y: f64) -> Ray {
        let clip = self.inv_projection * Vector4::new(ndc_x, ndc_y, 1.0, 1.0);
        let target = Vec3::new(clip.x, clip.y, clip.z) / clip.w;
        let local = target.normalize();
        let world = self.inv_view * Vector4::new(local.x, local.y, local.z, 0.0);
        Ray::new(self.position, Vec3::new(world.x, world.y, world.z))
    }

    /// Primary ray through the center of pixel `(x, y)`; row 0 is the top.
    pub fn ray_for_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let ndc_x = (x as f64 + 0.5) / width as f64 * 2.0 - 1.0;
        let ndc_y = 1.0 - (y as f64 + 0.5) / height as f64 * 2.0;
        self.ray_through_ndc(ndc_x, ndc_y)
    }
}
