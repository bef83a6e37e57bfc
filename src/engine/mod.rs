//! Ray-marching engine: frame-constant tables, the sphere tracer and the
//! parallel frame driver.

pub mod raymarcher;
pub mod renderer;
pub mod types;

pub use raymarcher::{march, MarchConfig, StepState};
pub use renderer::{render_frame, render_frame_into, render_pixel, RenderError, DOF_SAMPLES};
pub use types::{
    AoSample, AoSampleTable, FrameTables, Light, LightTable, Palette, PerspectiveType, Pixel,
    RenderParams, AO_VECTORS_MAX, LIGHTS_MAX, PALETTE_SIZE, VOLUMETRIC_LIGHTS,
};
