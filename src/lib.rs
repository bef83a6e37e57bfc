//! Distance-estimated 3D fractal renderer.
//!
//! Renders escape-time fractals (generalized-power "Mandelbulb", Mandelbox
//! and multi-plane IFS families) by sphere tracing a distance-estimate field,
//! then shading each hit through a multi-stage pipeline: direct light with
//! soft shadows, ambient occlusion, auxiliary and orbit-trap lights,
//! reflections, volumetric effects and image post-processing.
//!
//! The crate is a pure rendering core. Build a [`RenderParams`] and
//! [`FractalParams`] pair, the input tables, and hand them to
//! [`render_frame`]:
//!
//! ```no_run
//! use mandelmarch::{
//!     render_frame, AoSampleTable, FractalParams, FrameTables, LightTable, Palette,
//!     RenderParams,
//! };
//!
//! let params = RenderParams { width: 320, height: 240, ..RenderParams::default() };
//! let fractal = FractalParams::default();
//! let palette = Palette::default();
//! let ao = AoSampleTable::generate(256, params.random_seed, &params);
//! let lights = LightTable::new();
//! let tables = FrameTables {
//!     params: &params,
//!     fractal: &fractal,
//!     palette: &palette,
//!     ao_samples: &ao,
//!     lights: &lights,
//! };
//! let pixels = render_frame(&tables, None).unwrap();
//! assert_eq!(pixels.len(), 320 * 240);
//! ```
//!
//! Frames are deterministic: identical parameters and tables produce
//! identical pixels, including the seeded depth-of-field jitter.

pub mod engine;
pub mod formulas;
pub mod lighting;
pub mod math;

pub use engine::{
    march, render_frame, render_frame_into, render_pixel, AoSample, AoSampleTable, FrameTables,
    Light, LightTable, MarchConfig, Palette, PerspectiveType, Pixel, RenderError, RenderParams,
    StepState, AO_VECTORS_MAX, DOF_SAMPLES, LIGHTS_MAX, PALETTE_SIZE, VOLUMETRIC_LIGHTS,
};
pub use formulas::{
    evaluate, CalcParams, EvalResult, Formula, FractalParams, IfsParams, IfsPlane,
    MandelboxParams, MandelboxRotation, IFS_PLANES, MANDELBOX_ROTATIONS,
};
pub use math::{Matrix3, Vec3};
