//! Row-parallel CPU renderer.
//!
//! Every pixel gets one primary ray through its center. Rows are independent:
//! each one is written through its own disjoint slice of the image, so the
//! rayon and serial paths produce identical bytes.

use cadre_scene::Scene;
use rayon::prelude::*;

use crate::error::Result;
use crate::tracer::{SceneAccel, SceneTracer, Tracer};
use crate::{Camera, HitPayload, RenderSettings};

/// Pack an RGBA8 color so that its in-memory bytes are `[r, g, b, a]`.
#[inline]
pub fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_ne_bytes([r, g, b, a])
}

fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Color for one traced ray, in linear `[0, 1]` RGB.
///
/// Misses get the background. Hits get a diffuse `N.L` term over an ambient
/// floor, mixed with the normal mapped into RGB.
pub fn shade(hit: &HitPayload, settings: &RenderSettings) -> [f32; 3] {
    if !hit.is_hit() {
        return settings.background;
    }
    let [lx, ly, lz] = settings.light_direction;
    let light = cadre_kernel_math::Vec3::new(lx, ly, lz).normalize();
    let n_dot_l = hit.normal.dot(&light).max(0.0) as f32;
    let diffuse = settings.ambient + (1.0 - settings.ambient) * n_dot_l;

    let blend = settings.normal_blend;
    let mut rgb = [0.0; 3];
    for (i, c) in rgb.iter_mut().enumerate() {
        let normal_c = hit.normal[i] as f32 * 0.5 + 0.5;
        *c = diffuse * (1.0 - blend) + normal_c * blend;
    }
    rgb
}

/// Row-major RGBA8 pixels, row 0 at the top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl ImageBuffer {
    /// Zero-filled image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed pixels; see [`pack_rgba`].
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// `width * height * 4` bytes in RGBA order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Owns the output image and renders scenes into it.
#[derive(Debug, Default)]
pub struct Renderer {
    image: ImageBuffer,
    settings: RenderSettings,
    accel: Option<SceneAccel>,
}

impl Renderer {
    /// Create a renderer with a `width x height` image.
    pub fn new(width: u32, height: u32, settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            image: ImageBuffer::new(width, height),
            settings,
            accel: None,
        })
    }

    /// The last rendered image.
    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    /// Current settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replace the settings. A changed BVH config drops the cached BVH.
    pub fn set_settings(&mut self, settings: RenderSettings) -> Result<()> {
        settings.validate()?;
        if settings.bvh != self.settings.bvh {
            self.accel = None;
        }
        self.settings = settings;
        Ok(())
    }

    /// Cached acceleration structure from the last [`render_scene`](Self::render_scene).
    pub fn accel(&self) -> Option<&SceneAccel> {
        self.accel.as_ref()
    }

    /// Reallocate the image for a new size.
    ///
    /// Returns `false` and does nothing if the size is unchanged or either
    /// dimension is zero.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 || (width == self.image.width && height == self.image.height) {
            return false;
        }
        tracing::trace!(width, height, "resizing image buffer");
        self.image = ImageBuffer::new(width, height);
        true
    }

    /// Render through any tracer.
    pub fn render<T: Tracer + ?Sized>(&mut self, tracer: &T, camera: &Camera) {
        fill(&mut self.image, &self.settings, tracer, camera);
    }

    /// Render a scene, building or refreshing the cached BVH when enabled.
    pub fn render_scene(&mut self, scene: &Scene, camera: &Camera) {
        if self.settings.use_bvh {
            self.refresh_accel(scene);
            if let Some(accel) = &self.accel {
                fill(&mut self.image, &self.settings, accel, camera);
            }
        } else {
            fill(&mut self.image, &self.settings, &SceneTracer::new(scene), camera);
        }
    }

    /// Trace the ray through pixel `(x, y)` of the current image size.
    ///
    /// Returns `None` for pixels outside the image.
    pub fn pick<T: Tracer + ?Sized>(
        &self,
        tracer: &T,
        camera: &Camera,
        x: u32,
        y: u32,
    ) -> Option<HitPayload> {
        let (w, h) = (self.image.width, self.image.height);
        if x >= w || y >= h {
            return None;
        }
        Some(tracer.trace(&camera.ray_for_pixel(x, y, w, h)))
    }

    /// [`pick`](Self::pick) against a scene, sharing the render BVH cache.
    pub fn pick_scene(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        x: u32,
        y: u32,
    ) -> Option<HitPayload> {
        if self.settings.use_bvh {
            self.refresh_accel(scene);
            let accel = self.accel.as_ref()?;
            self.pick(accel, camera, x, y)
        } else {
            self.pick(&SceneTracer::new(scene), camera, x, y)
        }
    }

    fn refresh_accel(&mut self, scene: &Scene) {
        if self.accel.as_ref().is_some_and(|a| !a.is_stale(scene)) {
            return;
        }
        self.accel = Some(SceneAccel::build(scene, &self.settings.bvh));
    }
}

#[tracing::instrument(
    skip_all,
    fields(width = image.width, height = image.height, parallel = settings.parallel)
)]
fn fill<T: Tracer + ?Sized>(
    image: &mut ImageBuffer,
    settings: &RenderSettings,
    tracer: &T,
    camera: &Camera,
) {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return;
    }

    let render_row = |(y, row): (usize, &mut [u32])| {
        for (x, px) in row.iter_mut().enumerate() {
            let ray = camera.ray_for_pixel(x as u32, y as u32, width, height);
            let [r, g, b] = shade(&tracer.trace(&ray), settings);
            *px = pack_rgba(to_u8(r), to_u8(g), to_u8(b), 255);
        }
    };

    if settings.parallel {
        image
            .pixels
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(render_row);
    } else {
        image
            .pixels
            .chunks_mut(width as usize)
            .enumerate()
            .for_each(render_row);
    }
}
