//! Sphere-tracing ray marcher.
//!
//! One `march` routine serves every ray class; the differences between
//! primary, shadow, reflection and occlusion rays are captured in a
//! [`MarchConfig`]. The marcher owns all per-ray mutable state in a
//! [`StepState`] so concurrent rays never share anything.

use crate::formulas::{self, CalcParams};

use super::types::FrameTables;
use crate::math::Vec3;

/// Hard cap on marching steps for surface-finding rays.
pub const MAX_STEPS: u32 = 2_500;
/// Step cap for the bounded occlusion probes.
pub const AO_STEPS: u32 = 32;

/// Per-ray-class marching configuration.
#[derive(Clone, Copy, Debug)]
pub struct MarchConfig {
    pub max_steps: u32,
    pub max_depth: f64,
    pub de_factor: f64,
    /// Initial depth along the ray; lets secondary rays start clear of the
    /// surface they spawn from.
    pub start_depth: f64,
    /// Soft-shadow cone angle; `Some` enables penumbra tracking.
    pub shadow_cone: Option<f64>,
    /// Accumulate iteration-fog opacity along the way.
    pub track_iter_fog: bool,
}

impl MarchConfig {
    /// Camera rays.
    pub fn primary(tables: &FrameTables) -> Self {
        MarchConfig {
            max_steps: MAX_STEPS,
            max_depth: tables.params.view_distance_max,
            de_factor: tables.params.de_factor,
            start_depth: 0.0,
            shadow_cone: None,
            track_iter_fog: tables.params.iter_fog_enabled,
        }
    }

    /// Shadow probes toward a light, with penumbra tracking.
    pub fn shadow(tables: &FrameTables, start_depth: f64, max_depth: f64) -> Self {
        MarchConfig {
            max_steps: MAX_STEPS,
            max_depth,
            de_factor: tables.params.de_factor,
            start_depth,
            shadow_cone: Some(tables.params.shadow_cone_angle),
            track_iter_fog: false,
        }
    }

    /// Reflected rays; like primary rays but launched off a surface.
    pub fn reflection(tables: &FrameTables, start_depth: f64) -> Self {
        MarchConfig {
            max_steps: MAX_STEPS,
            max_depth: tables.params.view_distance_max,
            de_factor: tables.params.de_factor,
            start_depth,
            shadow_cone: None,
            track_iter_fog: false,
        }
    }

    /// Short occlusion probes for the slow ambient-occlusion stage.
    pub fn ambient_occlusion(tables: &FrameTables, start_depth: f64, max_depth: f64) -> Self {
        MarchConfig {
            max_steps: AO_STEPS,
            max_depth,
            de_factor: tables.params.de_factor,
            start_depth,
            shadow_cone: None,
            track_iter_fog: false,
        }
    }
}

/// Mutable state of one march, returned to the caller when it ends.
#[derive(Clone, Copy, Debug)]
pub struct StepState {
    pub point: Vec3,
    pub depth: f64,
    /// Distance estimate at the final point.
    pub last_dist: f64,
    /// Length of the last step taken.
    pub step: f64,
    /// Hit threshold at the final depth.
    pub dist_thresh: f64,
    pub steps: u32,
    /// Escape iterations of the final evaluation.
    pub iterations: u32,
    pub colour_index: f64,
    pub trap_distance: f64,
    /// Accumulated iteration-fog opacity.
    pub iter_fog: f64,
    /// Soft-shadow penumbra factor, 1 when nothing grazed the ray.
    pub penumbra: f64,
    pub hit: bool,
}

impl Default for StepState {
    fn default() -> Self {
        StepState {
            point: Vec3::ZERO,
            depth: 0.0,
            last_dist: f64::MAX,
            step: 0.0,
            dist_thresh: 0.0,
            steps: 0,
            iterations: 0,
            colour_index: 0.0,
            trap_distance: f64::MAX,
            iter_fog: 0.0,
            penumbra: 1.0,
            hit: false,
        }
    }
}

/// March from `origin` along unit `direction` until the surface is hit, the
/// depth budget runs out, or the step cap trips. Deterministic for identical
/// inputs.
pub fn march(
    origin: Vec3,
    direction: Vec3,
    tables: &FrameTables,
    config: &MarchConfig,
    random_seed: u64,
) -> StepState {
    let params = tables.params;
    let fractal = tables.fractal;
    let constant_thresh = fractal.constant_de_threshold;
    let mut calc = CalcParams::new(fractal.n, random_seed, params.fake_lights_orbit_trap);

    let mut state = StepState {
        depth: config.start_depth,
        point: origin + direction * config.start_depth,
        ..StepState::default()
    };

    while state.steps < config.max_steps {
        state.dist_thresh = params.dist_thresh(state.depth, constant_thresh);
        let result = formulas::evaluate(state.point, fractal, &mut calc);
        if !result.distance.is_finite() {
            return state;
        }
        state.last_dist = result.distance;
        state.iterations = result.iterations;
        state.colour_index = result.colour_index;
        state.trap_distance = result.trap_distance;

        if result.distance <= state.dist_thresh {
            state.hit = true;
            return state;
        }

        if let Some(cone) = config.shadow_cone {
            if state.depth > 0.0 {
                let softness = result.distance / (cone.max(1e-6) * state.depth);
                state.penumbra = state.penumbra.min(softness);
            }
        }

        state.step = (result.distance * config.de_factor).max(state.dist_thresh * 0.5);

        if config.track_iter_fog {
            let trim = fractal.opacity_trim;
            let range = (fractal.n as f64 - trim).max(1.0);
            let band = ((result.iterations as f64 - trim) / range).clamp(0.0, 1.0);
            state.iter_fog += band * band * state.step * fractal.opacity;
        }

        state.depth += state.step;
        state.point = origin + direction * state.depth;
        state.steps += 1;

        if state.depth > config.max_depth {
            state.depth = config.max_depth;
            state.point = origin + direction * state.depth;
            return state;
        }
    }

    state
}
