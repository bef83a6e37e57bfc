//! Shading pipeline: surface lighting, along-ray volumetrics and image post.

pub mod post;
pub mod shade;
pub mod volumetric;

pub use post::post_process;
pub use shade::{shade_pixel, surface_normal, ShaderInput};
pub use volumetric::{apply_volumetrics, background};
