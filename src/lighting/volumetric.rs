//! Effects integrated along the primary ray: volumetric lights, iteration
//! fog, distance fog and glow. Applied after surface shading, before post.

use crate::engine::raymarcher::StepState;
use crate::engine::types::{background_gradient, FrameTables, RenderParams, VOLUMETRIC_LIGHTS};
use crate::math::utils::smoothstep;
use crate::math::Vec3;

use super::shade::shadow_factor;

/// Samples taken along the ray when integrating volumetric lights.
const VOLUMETRIC_SAMPLES: u32 = 32;
/// Step count at which glow saturates.
const GLOW_SATURATION_STEPS: f64 = 512.0;

/// Background colour for a missed ray: the vertical three-colour gradient.
#[inline]
pub fn background(direction: Vec3, params: &RenderParams) -> Vec3 {
    background_gradient(direction.z, params)
}

/// Apply every along-the-ray effect to an already shaded colour, in order:
/// volumetric lights, iteration fog, distance fog, then glow.
pub fn apply_volumetrics(
    mut colour: Vec3,
    tables: &FrameTables,
    state: &StepState,
    eye: Vec3,
    direction: Vec3,
    seed: u64,
) -> Vec3 {
    let params = tables.params;

    if params.volumetric_light_enabled.iter().any(|&e| e) {
        colour = colour + volumetric_light_colour(tables, eye, direction, state.depth, seed);
    }

    if params.iter_fog_enabled {
        let opacity = state.iter_fog.clamp(0.0, 1.0);
        colour = colour.lerp(params.fog_colour, opacity);
    }

    if params.fog_enabled {
        colour = apply_fog(colour, params, state.depth);
    }

    if params.glow_intensity > 0.0 {
        let g = (state.steps as f64 / GLOW_SATURATION_STEPS * params.glow_intensity).min(1.0);
        let glow = params.glow_colour_1.lerp(params.glow_colour_2, g);
        colour = colour + glow * g;
    }

    colour
}

/// Distance fog: a linear visibility blend toward the base fog colour, plus
/// an exponential-density component that shifts through three colours with
/// depth.
fn apply_fog(colour: Vec3, params: &RenderParams, depth: f64) -> Vec3 {
    let mut out = colour;

    let visibility = smoothstep(0.0, params.fog_visibility.max(1e-9), depth);
    out = out.lerp(params.fog_colour, visibility);

    if params.fog_density > 0.0 {
        let d = depth * params.fog_distance_factor;
        let fog_colour = if d < params.fog_colour_1_distance {
            let t = d / params.fog_colour_1_distance.max(1e-9);
            params.fog_colour_1.lerp(params.fog_colour_2, t)
        } else if d < params.fog_colour_2_distance {
            let span = (params.fog_colour_2_distance - params.fog_colour_1_distance).max(1e-9);
            let t = (d - params.fog_colour_1_distance) / span;
            params.fog_colour_2.lerp(params.fog_colour_3, t)
        } else {
            params.fog_colour_3
        };
        let opacity = 1.0 - (-params.fog_density * d).exp();
        out = out.lerp(fog_colour, opacity.clamp(0.0, 1.0));
    }

    out
}

/// Integrate the enabled volumetric light slots along the ray. Slot 0 is the
/// main directional light; slots 1..5 follow the first auxiliary lights.
fn volumetric_light_colour(
    tables: &FrameTables,
    eye: Vec3,
    direction: Vec3,
    depth: f64,
    seed: u64,
) -> Vec3 {
    let params = tables.params;
    let step = depth / VOLUMETRIC_SAMPLES as f64;
    if step <= 0.0 {
        return Vec3::ZERO;
    }
    let constant = tables.fractal.constant_de_threshold;
    let main_light = params.main_light_vector();
    let aux: Vec<_> = tables
        .lights
        .enabled(params.aux_light_number)
        .take(VOLUMETRIC_LIGHTS - 1)
        .collect();

    let mut gathered = Vec3::ZERO;
    for s in 0..VOLUMETRIC_SAMPLES {
        let t = (s as f64 + 0.5) * step;
        let point = eye + direction * t;
        let probe = StepState {
            point,
            dist_thresh: params.dist_thresh(t, constant),
            ..StepState::default()
        };

        if params.volumetric_light_enabled[0] {
            let lit = if params.shadow {
                shadow_factor(tables, &probe, main_light, params.view_distance_max, seed)
            } else {
                1.0
            };
            gathered = gathered
                + params.main_light_colour
                    * (params.volumetric_light_intensity[0] * lit * step);
        }

        for (slot, light) in aux.iter().enumerate() {
            if !params.volumetric_light_enabled[slot + 1] {
                continue;
            }
            let to_light = light.position - point;
            let dist_sqr = to_light.length_sqr();
            if dist_sqr < 1e-12 {
                continue;
            }
            let dist = dist_sqr.sqrt();
            let lit = if params.shadow {
                shadow_factor(tables, &probe, to_light / dist, dist, seed)
            } else {
                1.0
            };
            let falloff = light.intensity / dist_sqr;
            gathered = gathered
                + light.colour
                    * (params.volumetric_light_intensity[slot + 1] * lit * falloff * step);
        }
    }

    gathered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{AoSampleTable, Light, LightTable, Palette};
    use crate::formulas::FractalParams;
    use approx::assert_abs_diff_eq;

    struct Fixture {
        params: RenderParams,
        fractal: FractalParams,
        palette: Palette,
        ao: AoSampleTable,
        lights: LightTable,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                params: RenderParams::default(),
                fractal: FractalParams::default(),
                palette: Palette::default(),
                ao: AoSampleTable::default(),
                lights: LightTable::new(),
            }
        }

        fn tables(&self) -> FrameTables<'_> {
            FrameTables {
                params: &self.params,
                fractal: &self.fractal,
                palette: &self.palette,
                ao_samples: &self.ao,
                lights: &self.lights,
            }
        }
    }

    #[test]
    fn all_effects_disabled_is_identity() {
        let fx = Fixture::new();
        let tables = fx.tables();
        let state = StepState {
            depth: 5.0,
            steps: 100,
            ..StepState::default()
        };
        let colour = Vec3::new(0.3, 0.5, 0.7);
        let out = apply_volumetrics(
            colour,
            &tables,
            &state,
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
            0,
        );
        assert_eq!(out, colour);
    }

    #[test]
    fn fog_saturates_to_fog_colour() {
        let mut params = RenderParams::default();
        params.fog_visibility = 1.0;
        params.fog_density = 0.0;
        let near = apply_fog(Vec3::ZERO, &params, 0.1);
        let far = apply_fog(Vec3::ZERO, &params, 50.0);
        assert!(near.x < far.x);
        assert_eq!(far, params.fog_colour);
    }

    #[test]
    fn dense_fog_shifts_through_colour_bands() {
        let mut params = RenderParams::default();
        params.fog_visibility = 1e9;
        params.fog_density = 100.0;
        params.fog_colour_1 = Vec3::new(1.0, 0.0, 0.0);
        params.fog_colour_2 = Vec3::new(0.0, 1.0, 0.0);
        params.fog_colour_3 = Vec3::new(0.0, 0.0, 1.0);
        params.fog_colour_1_distance = 1.0;
        params.fog_colour_2_distance = 2.0;
        // Deep in the third band the fog is fully the last colour.
        let deep = apply_fog(Vec3::ZERO, &params, 10.0);
        assert_abs_diff_eq!(deep.z, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(deep.x, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn iteration_fog_blends_toward_fog_colour() {
        let mut fx = Fixture::new();
        fx.params.iter_fog_enabled = true;
        fx.params.fog_colour = Vec3::splat(1.0);
        let tables = fx.tables();
        let state = StepState {
            depth: 2.0,
            iter_fog: 0.5,
            ..StepState::default()
        };
        let out = apply_volumetrics(
            Vec3::ZERO,
            &tables,
            &state,
            Vec3::ZERO,
            Vec3::new(0.0, 1.0, 0.0),
            0,
        );
        assert_abs_diff_eq!(out.x, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn glow_rises_with_step_count() {
        let mut fx = Fixture::new();
        fx.params.glow_intensity = 1.0;
        let tables = fx.tables();
        let few = StepState { depth: 2.0, steps: 10, ..StepState::default() };
        let many = StepState { depth: 2.0, steps: 400, ..StepState::default() };
        let base = Vec3::ZERO;
        let dir = Vec3::new(0.0, 1.0, 0.0);
        let a = apply_volumetrics(base, &tables, &few, Vec3::ZERO, dir, 0);
        let b = apply_volumetrics(base, &tables, &many, Vec3::ZERO, dir, 0);
        assert!(b.x > a.x);
    }

    #[test]
    fn volumetric_aux_light_brightens_nearby_ray() {
        let mut fx = Fixture::new();
        fx.params.volumetric_light_enabled[1] = true;
        fx.params.aux_light_number = 1;
        fx.lights.push(Light::new(
            Vec3::new(0.0, 2.5, 4.0),
            Vec3::splat(1.0),
            1.0,
        ));
        let tables = fx.tables();
        // Ray passing near the light versus one far from it.
        let near = volumetric_light_colour(
            &tables,
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(0.0, 1.0, 0.0),
            5.0,
            0,
        );
        let far = volumetric_light_colour(
            &tables,
            Vec3::new(0.0, 0.0, -8.0),
            Vec3::new(0.0, 1.0, 0.0),
            5.0,
            0,
        );
        assert!(near.x > far.x);
        assert!(far.x > 0.0);
    }
}
