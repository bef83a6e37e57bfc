//! Frame driver: camera ray generation, depth of field, and the
//! scanline-parallel render loop.
//!
//! `render_pixel` is pure; all frame-level coordination (parallelism,
//! cancellation, buffer checks) lives in `render_frame` / `render_frame_into`.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

use crate::lighting::{apply_volumetrics, background, post_process, shade_pixel, ShaderInput};
use crate::math::{Matrix3, Vec3};

use super::raymarcher::{march, MarchConfig};
use super::types::{FrameTables, PerspectiveType, Pixel};

/// Aperture samples per pixel when depth of field is enabled.
pub const DOF_SAMPLES: u32 = 8;

/// Errors reported at the frame boundary. Per-pixel math never fails.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("frame has zero pixels ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },
    #[error("output buffer holds {got} pixels, frame needs {need}")]
    BufferSize { got: usize, need: usize },
    #[error("render cancelled")]
    Cancelled,
}

/// Render a full frame into a fresh buffer, row-major.
pub fn render_frame(
    tables: &FrameTables,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<Pixel>, RenderError> {
    let params = tables.params;
    if params.width == 0 || params.height == 0 {
        return Err(RenderError::EmptyFrame {
            width: params.width,
            height: params.height,
        });
    }
    let mut buffer = vec![Pixel::default(); params.width * params.height];
    render_frame_into(tables, &mut buffer, cancel)?;
    Ok(buffer)
}

/// Render into a caller-owned buffer of exactly `width * height` pixels.
/// Each pixel slot is written exactly once. Cancellation is polled once per
/// row; a cancelled frame returns `Err` and leaves unrendered rows untouched.
pub fn render_frame_into(
    tables: &FrameTables,
    out: &mut [Pixel],
    cancel: Option<&AtomicBool>,
) -> Result<(), RenderError> {
    let params = tables.params;
    if params.width == 0 || params.height == 0 {
        return Err(RenderError::EmptyFrame {
            width: params.width,
            height: params.height,
        });
    }
    let need = params.width * params.height;
    if out.len() != need {
        return Err(RenderError::BufferSize {
            got: out.len(),
            need,
        });
    }

    info!(
        "rendering {}x{} frame, dof={} shadows={}",
        params.width, params.height, params.dof_enabled, params.shadow
    );

    let stopped = AtomicBool::new(false);
    out.par_chunks_mut(params.width)
        .enumerate()
        .for_each(|(y, row)| {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    stopped.store(true, Ordering::Relaxed);
                    return;
                }
            }
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = render_pixel(x, y, tables);
            }
        });

    if stopped.load(Ordering::Relaxed) {
        debug!("frame cancelled");
        return Err(RenderError::Cancelled);
    }
    info!("frame complete");
    Ok(())
}

/// Render one pixel. Pure: identical inputs give identical output,
/// including the depth-of-field jitter, which is seeded from the frame seed
/// and the pixel coordinates.
pub fn render_pixel(x: usize, y: usize, tables: &FrameTables) -> Pixel {
    let params = tables.params;
    let rot = params.rotation();
    let eye = params.vp - rot.mul_vec(Vec3::new(0.0, 1.0, 0.0)) * params.zoom;
    let seed = pixel_seed(params.random_seed, x, y);

    let Some(dir) = camera_ray(x, y, tables, &rot) else {
        // Outside the fisheye field of view.
        return Pixel::new(Vec3::ZERO, params.view_distance_max);
    };

    let (colour, depth) = if params.dof_enabled {
        trace_with_dof(tables, eye, dir, &rot, seed)
    } else {
        trace_ray(tables, eye, dir, seed)
    };

    Pixel::new(post_process(colour, params), depth)
}

/// Trace one ray through march, shading and volumetrics.
fn trace_ray(tables: &FrameTables, eye: Vec3, dir: Vec3, seed: u64) -> (Vec3, f64) {
    let config = MarchConfig::primary(tables);
    let state = march(eye, dir, tables, &config, seed);

    let colour = if state.hit {
        let input = ShaderInput {
            tables,
            state: &state,
            view: dir,
            random_seed: seed,
        };
        shade_pixel(&input)
    } else {
        background(dir, tables.params)
    };

    let colour = apply_volumetrics(colour, tables, &state, eye, dir, seed);
    (colour, state.depth)
}

/// Average several aperture-jittered rays aimed at the focal point.
fn trace_with_dof(
    tables: &FrameTables,
    eye: Vec3,
    dir: Vec3,
    rot: &Matrix3,
    seed: u64,
) -> (Vec3, f64) {
    let params = tables.params;
    let focus = eye + dir * params.dof_focus;
    let right = rot.mul_vec(Vec3::new(1.0, 0.0, 0.0));
    let up = rot.mul_vec(Vec3::new(0.0, 0.0, 1.0));
    let mut rng = StdRng::seed_from_u64(seed);

    let mut colour = Vec3::ZERO;
    let mut depth = 0.0;
    for _ in 0..DOF_SAMPLES {
        let angle = rng.gen::<f64>() * std::f64::consts::TAU;
        let radius = rng.gen::<f64>().sqrt() * params.dof_radius;
        let origin = eye + right * (angle.cos() * radius) + up * (angle.sin() * radius);
        let sample_dir = (focus - origin).normalized();
        let (c, d) = trace_ray(tables, origin, sample_dir, seed);
        colour = colour + c;
        depth += d;
    }
    let inv = 1.0 / DOF_SAMPLES as f64;
    (colour * inv, depth * inv)
}

/// View direction for pixel `(x, y)`, or `None` when the fisheye cut
/// discards it.
fn camera_ray(x: usize, y: usize, tables: &FrameTables, rot: &Matrix3) -> Option<Vec3> {
    let params = tables.params;
    let w = params.width as f64;
    let h = params.height as f64;
    let x2 = ((x as f64 + 0.5) / w - 0.5) * (w / h);
    let z2 = 0.5 - (y as f64 + 0.5) / h;

    let local = match params.perspective_type {
        PerspectiveType::ThreePoint => {
            Vec3::new(x2 * params.persp, 1.0, z2 * params.persp).normalized()
        }
        PerspectiveType::FishEye => {
            let r = (x2 * x2 + z2 * z2).sqrt();
            if params.fish_eye_cut && r > 0.5 {
                return None;
            }
            if r < 1e-12 {
                Vec3::new(0.0, 1.0, 0.0)
            } else {
                let theta = r * params.persp * std::f64::consts::PI;
                let (st, ct) = theta.sin_cos();
                Vec3::new(x2 / r * st, ct, z2 / r * st)
            }
        }
    };
    Some(rot.mul_vec(local))
}

/// Per-pixel seed: the frame seed mixed with the coordinates through a
/// splitmix64 finalizer so neighbouring pixels decorrelate.
fn pixel_seed(frame_seed: u64, x: usize, y: usize) -> u64 {
    let mut z = frame_seed ^ ((x as u64) << 32) ^ y as u64;
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
