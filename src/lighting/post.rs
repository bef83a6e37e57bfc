//! Per-pixel post-processing: brightness, tone mapping, contrast, gamma.

use crate::engine::types::RenderParams;
use crate::math::Vec3;

/// Apply the image post chain. Neutral settings (brightness, contrast and
/// gamma at 1, HDR off) pass colours in `[0, 1]` through unchanged.
pub fn post_process(colour: Vec3, params: &RenderParams) -> Vec3 {
    let mut c = colour;

    if params.image_brightness != 1.0 {
        c = c * params.image_brightness;
    }

    if params.hdr_enabled {
        c = reinhard(c);
    }

    c = c.clamp01();

    if params.image_contrast != 1.0 {
        c = ((c - Vec3::splat(0.5)) * params.image_contrast + Vec3::splat(0.5)).clamp01();
    }

    if params.image_gamma != 1.0 {
        let inv = 1.0 / params.image_gamma.max(1e-9);
        c = Vec3::new(c.x.powf(inv), c.y.powf(inv), c.z.powf(inv));
    }

    c
}

/// Reinhard tone map, compressing unbounded radiance into `[0, 1)`.
#[inline]
fn reinhard(c: Vec3) -> Vec3 {
    Vec3::new(c.x / (1.0 + c.x), c.y / (1.0 + c.y), c.z / (1.0 + c.z))
}
