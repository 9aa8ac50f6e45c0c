//! Render configuration.

use serde::{Deserialize, Serialize};

use crate::bvh::BvhConfig;
use crate::error::{RenderError, Result};

/// Shading and scheduling options for [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Linear RGB written for rays that hit nothing.
    pub background: [f32; 3],
    /// Direction towards the light; normalized before use.
    pub light_direction: [f64; 3],
    /// Weight of the normal visualization in the final color (0 = pure N.L).
    pub normal_blend: f32,
    /// Floor added to the diffuse term.
    pub ambient: f32,
    /// Render rows on the rayon pool.
    pub parallel: bool,
    /// Trace through a BVH instead of walking every triangle.
    pub use_bvh: bool,
    /// Parameters for BVH builds.
    pub bvh: BvhConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            background: [0.1, 0.1, 0.12],
            light_direction: [1.0, 1.0, 1.0],
            normal_blend: 0.5,
            ambient: 0.1,
            parallel: true,
            use_bvh: true,
            bvh: BvhConfig::default(),
        }
    }
}

impl RenderSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.background.iter().any(|c| !c.is_finite()) {
            return Err(RenderError::InvalidSettings(
                "background must be finite".into(),
            ));
        }
        let l = self.light_direction;
        if l.iter().any(|c| !c.is_finite()) || l.iter().all(|&c| c == 0.0) {
            return Err(RenderError::InvalidSettings(
                "light_direction must be finite and non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.normal_blend) {
            return Err(RenderError::InvalidSettings(
                "normal_blend must be in [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ambient) {
            return Err(RenderError::InvalidSettings(
                "ambient must be in [0, 1]".into(),
            ));
        }
        self.bvh.validate()
    }
}
