//! Surface shading: normals, direct light, shadows, ambient occlusion,
//! global illumination and the bounded reflection loop.

use crate::engine::raymarcher::{march, MarchConfig, StepState};
use crate::engine::types::FrameTables;
use crate::formulas::{self, CalcParams};
use crate::math::utils::lerp;
use crate::math::Vec3;

use super::volumetric::background;

/// Everything the shader needs about one surface hit.
pub struct ShaderInput<'a, 'b> {
    pub tables: &'a FrameTables<'b>,
    pub state: &'a StepState,
    /// Unit direction of the arriving ray.
    pub view: Vec3,
    pub random_seed: u64,
}

/// State carried across the reflection loop.
struct ReflectionState {
    origin: Vec3,
    direction: Vec3,
    /// Blend weight of the next bounce; decays by the reflect coefficient.
    weight: f64,
    bounce: u32,
}

/// Shade one surface hit, including aux lights, occlusion and reflections.
/// Volumetric effects along the primary ray are applied by the caller.
pub fn shade_pixel(input: &ShaderInput) -> Vec3 {
    let params = input.tables.params;
    let mut colour = surface_colour(input.tables, input.state, input.view, input.random_seed);

    if params.reflections_max == 0 || params.reflect <= 0.0 {
        return colour;
    }

    let mut state = *input.state;
    let mut view = input.view;
    let mut normal = oriented_normal(input.tables, &state, view);
    let mut refl = ReflectionState {
        origin: state.point,
        direction: view.reflect(normal),
        weight: params.reflect,
        bounce: 0,
    };

    while refl.bounce < params.reflections_max && refl.weight > 1e-3 {
        let config = MarchConfig::reflection(input.tables, state.dist_thresh * 2.0);
        let bounced = march(
            refl.origin,
            refl.direction,
            input.tables,
            &config,
            input.random_seed,
        );
        let bounce_colour = if bounced.hit {
            surface_colour(input.tables, &bounced, refl.direction, input.random_seed)
        } else {
            background(refl.direction, params)
        };
        colour = colour.lerp(bounce_colour, refl.weight);

        if !bounced.hit {
            break;
        }
        state = bounced;
        view = refl.direction;
        normal = oriented_normal(input.tables, &state, view);
        refl = ReflectionState {
            origin: state.point,
            direction: view.reflect(normal),
            weight: refl.weight * params.reflect,
            bounce: refl.bounce + 1,
        };
    }

    colour
}

/// Lighting of a single surface point, no reflections.
pub fn surface_colour(tables: &FrameTables, state: &StepState, view: Vec3, seed: u64) -> Vec3 {
    let params = tables.params;
    let normal = oriented_normal(tables, state, view);
    let albedo = if params.colouring_enabled {
        tables
            .palette
            .colour(state.colour_index * params.colouring_speed + params.colouring_offset)
    } else {
        Vec3::splat(1.0)
    };

    let light_dir = params.main_light_vector();
    let lambert = diffuse_term(normal, light_dir, params.penetrating_lights);
    let shade = lerp(1.0, lambert, params.shading);
    let shadow = if params.shadow {
        shadow_factor(tables, state, light_dir, params.view_distance_max, seed)
    } else {
        1.0
    };

    let direct = params.main_light_intensity * shade * shadow;
    let mut colour = albedo * params.main_light_colour * direct;

    if params.specular_intensity > 0.0 {
        let half = (light_dir - view).normalized();
        let spec = normal.dot(half).max(0.0).powi(16) * params.specular_intensity * shadow;
        colour = colour + params.main_light_colour * spec;
    }

    colour = colour + aux_light_colour(tables, state, normal, seed) * albedo;

    if params.fake_lights_enabled {
        colour = colour + fake_light_colour(tables, state) * albedo;
    }

    if params.fast_ambient_occlusion {
        let ao = fast_ambient_occlusion(tables, state, normal);
        colour = colour + albedo * (ao * params.ambient_occlusion_intensity);
    } else if params.slow_ambient_occlusion {
        let ambient = slow_ambient_occlusion(tables, state, normal, seed);
        colour = colour + albedo * ambient * params.ambient_occlusion_intensity;
    }

    if params.global_ilum_quality > 0 {
        colour = colour + global_illumination(tables, state, normal, seed) * albedo;
    }

    colour
}

/// Central-difference normal of the distance field. A degenerate gradient
/// falls back to facing the viewer.
pub fn surface_normal(tables: &FrameTables, point: Vec3, dist_thresh: f64, view: Vec3) -> Vec3 {
    let eps = (dist_thresh * 0.5).max(1e-9);
    let de = |p: Vec3| {
        let mut calc = CalcParams::new(
            tables.fractal.n,
            0,
            tables.params.fake_lights_orbit_trap,
        );
        formulas::evaluate(p, tables.fractal, &mut calc).distance
    };
    let grad = Vec3::new(
        de(point + Vec3::new(eps, 0.0, 0.0)) - de(point - Vec3::new(eps, 0.0, 0.0)),
        de(point + Vec3::new(0.0, eps, 0.0)) - de(point - Vec3::new(0.0, eps, 0.0)),
        de(point + Vec3::new(0.0, 0.0, eps)) - de(point - Vec3::new(0.0, 0.0, eps)),
    );
    let normal = grad.normalized();
    if normal == Vec3::ZERO {
        -view
    } else {
        normal
    }
}

fn oriented_normal(tables: &FrameTables, state: &StepState, view: Vec3) -> Vec3 {
    surface_normal(tables, state.point, state.dist_thresh, view)
}

/// Lambert diffuse, or the softened variant that lets light wrap around when
/// penetrating lights are on.
fn diffuse_term(normal: Vec3, light_dir: Vec3, penetrating: bool) -> f64 {
    let n_dot_l = normal.dot(light_dir);
    if penetrating {
        (1.0 + n_dot_l) * 0.5
    } else {
        n_dot_l.max(0.0)
    }
}

/// Soft-shadow probe toward a light. 1 is fully lit, 0 fully shadowed.
pub fn shadow_factor(
    tables: &FrameTables,
    state: &StepState,
    light_dir: Vec3,
    max_depth: f64,
    seed: u64,
) -> f64 {
    let start = state.dist_thresh * 2.0;
    let config = MarchConfig::shadow(tables, start, max_depth);
    let probe = march(state.point, light_dir, tables, &config, seed);
    if probe.hit {
        if tables.params.penetrating_lights {
            0.2
        } else {
            0.0
        }
    } else {
        probe.penumbra.clamp(0.0, 1.0)
    }
}

/// Single-probe ambient occlusion: sample the field a short way along the
/// normal and compare with the unoccluded distance.
pub fn fast_ambient_occlusion(tables: &FrameTables, state: &StepState, normal: Vec3) -> f64 {
    let delta = (state.dist_thresh * tables.params.fast_ao_tune).max(1e-9) * 10.0;
    let mut calc = CalcParams::new(tables.fractal.n, 0, tables.params.fake_lights_orbit_trap);
    let probe = formulas::evaluate(state.point + normal * delta, tables.fractal, &mut calc);
    (probe.distance / delta).clamp(0.0, 1.0)
}

/// Hemisphere-sampled occlusion using the precomputed sample table. Returns
/// the gathered sky colour; unoccluded points receive every sample in full.
pub fn slow_ambient_occlusion(
    tables: &FrameTables,
    state: &StepState,
    normal: Vec3,
    seed: u64,
) -> Vec3 {
    let params = tables.params;
    let reach = ao_reach(state);
    let mut gathered = Vec3::ZERO;
    let mut count = 0u32;
    for sample in take_samples(tables, params.ambient_occlusion_vectors) {
        if sample.direction.dot(normal) <= 0.0 {
            continue;
        }
        count += 1;
        let config = MarchConfig::ambient_occlusion(tables, state.dist_thresh * 2.0, reach);
        let probe = march(state.point, sample.direction, tables, &config, seed);
        let visibility = if probe.hit {
            (probe.depth / reach).clamp(0.0, 1.0)
        } else {
            1.0
        };
        gathered = gathered + sample.colour * (visibility * sample.direction.dot(normal));
    }
    if count == 0 {
        Vec3::ZERO
    } else {
        gathered / count as f64
    }
}

/// One-bounce diffuse gathering over the sample table; sample count scales
/// with the quality knob.
pub fn global_illumination(
    tables: &FrameTables,
    state: &StepState,
    normal: Vec3,
    seed: u64,
) -> Vec3 {
    let params = tables.params;
    let count = (params.global_ilum_quality as usize * 4).min(tables.ao_samples.len());
    if count == 0 {
        return Vec3::ZERO;
    }
    let reach = ao_reach(state) * 4.0;
    let mut gathered = Vec3::ZERO;
    let mut used = 0u32;
    for sample in take_samples(tables, count) {
        let cosine = sample.direction.dot(normal);
        if cosine <= 0.0 {
            continue;
        }
        used += 1;
        let config = MarchConfig::ambient_occlusion(tables, state.dist_thresh * 2.0, reach);
        let probe = march(state.point, sample.direction, tables, &config, seed);
        if probe.hit {
            let bounce = if params.colouring_enabled {
                tables
                    .palette
                    .colour(probe.colour_index * params.colouring_speed + params.colouring_offset)
            } else {
                Vec3::splat(1.0)
            };
            let falloff = 1.0 - (probe.depth / reach).clamp(0.0, 1.0);
            gathered = gathered + bounce * (cosine * falloff);
        }
    }
    if used == 0 {
        Vec3::ZERO
    } else {
        gathered / used as f64 * 0.5
    }
}

/// Contribution of the auxiliary point lights, inverse-square falloff with a
/// per-light shadow probe.
fn aux_light_colour(tables: &FrameTables, state: &StepState, normal: Vec3, seed: u64) -> Vec3 {
    let params = tables.params;
    let mut colour = Vec3::ZERO;
    for light in tables.lights.enabled(params.aux_light_number) {
        let to_light = light.position - state.point;
        let dist_sqr = to_light.length_sqr();
        if dist_sqr < 1e-12 {
            continue;
        }
        let dist = dist_sqr.sqrt();
        let dir = to_light / dist;
        let lambert = diffuse_term(normal, dir, params.penetrating_lights);
        if lambert <= 0.0 {
            continue;
        }
        let shadow = if params.shadow {
            shadow_factor(tables, state, dir, dist, seed)
        } else {
            1.0
        };
        let falloff = light.intensity * params.aux_light_intensity / dist_sqr;
        colour = colour + light.colour * (lambert * shadow * falloff * params.aux_light_visibility);
    }
    colour
}

/// Emissive glow where the orbit trap came close, gated to an escape
/// iteration band.
fn fake_light_colour(tables: &FrameTables, state: &StepState) -> Vec3 {
    let params = tables.params;
    let fractal = tables.fractal;
    let in_band = state.iterations >= fractal.fake_lights_min_iter
        && state.iterations < fractal.fake_lights_max_iter;
    if !in_band {
        return Vec3::ZERO;
    }
    let r_sqr = state.trap_distance * state.trap_distance;
    let intensity =
        params.fake_lights_intensity / (r_sqr + params.fake_lights_visibility_size.max(1e-9));
    Vec3::splat(intensity * params.fake_lights_visibility)
}

/// Occlusion probe reach derived from the hit scale.
fn ao_reach(state: &StepState) -> f64 {
    (state.dist_thresh * 100.0).clamp(0.05, 1.0)
}

fn take_samples<'b>(
    tables: &FrameTables<'b>,
    count: usize,
) -> impl Iterator<Item = &'b crate::engine::types::AoSample> + 'b {
    let len = tables.ao_samples.len();
    let stride = if count == 0 { len.max(1) } else { (len / count).max(1) };
    tables.ao_samples.iter_step(stride).take(count.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{
        AoSampleTable, Light, LightTable, Palette, RenderParams,
    };
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
            let params = RenderParams::default();
            let ao = AoSampleTable::generate(128, 1, &params);
            Fixture {
                params,
                fractal: FractalParams::default(),
                palette: Palette::default(),
                ao,
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

    fn hit_state(tables: &FrameTables) -> StepState {
        let config = MarchConfig::primary(tables);
        let state = march(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            tables,
            &config,
            0,
        );
        assert!(state.hit);
        state
    }

    #[test]
    fn normal_faces_outward_on_top_of_bulb() {
        let fx = Fixture::new();
        let tables = fx.tables();
        let state = hit_state(&tables);
        let normal = surface_normal(&tables, state.point, state.dist_thresh, Vec3::new(0.0, 0.0, -1.0));
        assert_abs_diff_eq!(normal.length(), 1.0, epsilon = 1e-9);
        // Hitting from +z, the surface faces back toward the camera.
        assert!(normal.z > 0.0, "normal {normal:?}");
    }

    #[test]
    fn reflections_zero_matches_plain_surface_colour() {
        let mut fx = Fixture::new();
        fx.params.reflect = 0.5;
        fx.params.reflections_max = 0;
        let tables = fx.tables();
        let state = hit_state(&tables);
        let view = Vec3::new(0.0, 0.0, -1.0);
        let input = ShaderInput {
            tables: &tables,
            state: &state,
            view,
            random_seed: 0,
        };
        let shaded = shade_pixel(&input);
        let plain = surface_colour(&tables, &state, view, 0);
        assert_eq!(shaded, plain);
    }

    #[test]
    fn reflections_change_the_result_when_enabled() {
        let mut fx = Fixture::new();
        fx.params.reflect = 0.5;
        fx.params.reflections_max = 2;
        let tables = fx.tables();
        let state = hit_state(&tables);
        let view = Vec3::new(0.0, 0.0, -1.0);
        let input = ShaderInput {
            tables: &tables,
            state: &state,
            view,
            random_seed: 0,
        };
        let shaded = shade_pixel(&input);
        let plain = surface_colour(&tables, &state, view, 0);
        assert!(shaded != plain);
    }

    #[test]
    fn unlit_face_gets_no_specular_or_diffuse() {
        assert_eq!(diffuse_term(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), false), 0.0);
        // Penetrating lights keep a half-range instead.
        let p = diffuse_term(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, -1.0), true);
        assert_abs_diff_eq!(p, 0.0, epsilon = 1e-12);
        let side = diffuse_term(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 0.0), true);
        assert_abs_diff_eq!(side, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn slow_ao_unoccluded_point_sees_full_sky() {
        let fx = Fixture::new();
        let tables = fx.tables();
        // A free-floating state far from the set: nothing within reach.
        let state = StepState {
            point: Vec3::new(0.0, 0.0, 8.0),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let ambient = slow_ambient_occlusion(&tables, &state, normal, 0);
        // Every hemisphere sample is unobstructed, so the gathered colour
        // matches the cosine-weighted sky exactly, with no occlusion losses.
        let mut expected = Vec3::ZERO;
        let mut count = 0u32;
        for sample in take_samples(&tables, tables.params.ambient_occlusion_vectors) {
            let c = sample.direction.dot(normal);
            if c <= 0.0 {
                continue;
            }
            count += 1;
            expected = expected + sample.colour * c;
        }
        expected = expected / count as f64;
        assert_abs_diff_eq!(ambient.x, expected.x, epsilon = 1e-12);
        assert_abs_diff_eq!(ambient.y, expected.y, epsilon = 1e-12);
        assert_abs_diff_eq!(ambient.z, expected.z, epsilon = 1e-12);
    }

    #[test]
    fn slow_ao_occlusion_grows_as_surface_approaches() {
        let fx = Fixture::new();
        let tables = fx.tables();
        // Probe downward into the bulb from two heights above its pole; the
        // closer point loses more sample visibility.
        let normal = Vec3::new(0.0, 0.0, -1.0);
        let near = StepState {
            point: Vec3::new(0.0, 0.0, 0.78),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        let far = StepState {
            point: Vec3::new(0.0, 0.0, 0.95),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        let gathered_near = slow_ambient_occlusion(&tables, &near, normal, 0);
        let gathered_far = slow_ambient_occlusion(&tables, &far, normal, 0);
        let sum = |v: Vec3| v.x + v.y + v.z;
        assert!(
            sum(gathered_near) < sum(gathered_far),
            "near {gathered_near:?} far {gathered_far:?}"
        );
    }

    #[test]
    fn fast_ao_open_space_is_unoccluded() {
        let fx = Fixture::new();
        let tables = fx.tables();
        let state = StepState {
            point: Vec3::new(0.0, 0.0, 8.0),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        let ao = fast_ambient_occlusion(&tables, &state, Vec3::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(ao, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn aux_light_brightens_facing_surface() {
        let mut fx = Fixture::new();
        fx.params.aux_light_number = 1;
        fx.lights.push(Light::new(
            Vec3::new(0.0, 0.0, 4.0),
            Vec3::new(1.0, 0.2, 0.2),
            2.0,
        ));
        let tables = fx.tables();
        let state = hit_state(&tables);
        let normal = surface_normal(&tables, state.point, state.dist_thresh, Vec3::new(0.0, 0.0, -1.0));
        let contribution = aux_light_colour(&tables, &state, normal, 0);
        assert!(contribution.x > 0.0);
        // The light is red-dominant.
        assert!(contribution.x > contribution.y);
    }

    #[test]
    fn fake_lights_respect_iteration_band() {
        let mut fx = Fixture::new();
        fx.params.fake_lights_enabled = true;
        fx.fractal.fake_lights_min_iter = 2;
        fx.fractal.fake_lights_max_iter = 5;
        let tables = fx.tables();
        let mut state = StepState {
            trap_distance: 0.1,
            iterations: 3,
            ..StepState::default()
        };
        assert!(fake_light_colour(&tables, &state).x > 0.0);
        state.iterations = 7;
        assert_eq!(fake_light_colour(&tables, &state), Vec3::ZERO);
        state.iterations = 1;
        assert_eq!(fake_light_colour(&tables, &state), Vec3::ZERO);
    }

    #[test]
    fn shadowed_point_is_darker_than_open_point() {
        let mut fx = Fixture::new();
        fx.params.shadow = true;
        // Light straight up so the occluder test is geometric.
        fx.params.main_light_alpha = 0.0;
        fx.params.main_light_beta = std::f64::consts::FRAC_PI_2;
        let tables = fx.tables();
        let light_dir = tables.params.main_light_vector();
        assert_abs_diff_eq!(light_dir.z, 1.0, epsilon = 1e-12);
        // Below the bulb, looking up: the set blocks the light.
        let blocked = StepState {
            point: Vec3::new(0.0, 0.0, -1.6),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        // Far to the side: clear sky toward the light.
        let open = StepState {
            point: Vec3::new(6.0, 0.0, 0.0),
            dist_thresh: 0.002,
            ..StepState::default()
        };
        let s_blocked = shadow_factor(&tables, &blocked, light_dir, 20.0, 0);
        let s_open = shadow_factor(&tables, &open, light_dir, 20.0, 0);
        assert!(s_blocked < s_open, "blocked {s_blocked} open {s_open}");
        assert_abs_diff_eq!(s_open, 1.0, epsilon = 1e-6);
    }
}
