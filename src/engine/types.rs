//! Frame-constant render parameters and fixed-capacity input tables.
//!
//! Everything here is built once per frame and shared read-only across all
//! workers. Per-pixel mutable state lives in the marcher and shader, never in
//! these types.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::math::utils::spherical_to_cartesian;
use crate::math::{Matrix3, Vec3};

/// Palette length; colour indices wrap modulo this.
pub const PALETTE_SIZE: usize = 256;
/// Capacity of the ambient-occlusion sample table.
pub const AO_VECTORS_MAX: usize = 10_000;
/// Capacity of the auxiliary light table.
pub const LIGHTS_MAX: usize = 10_000;
/// Number of volumetric light slots.
pub const VOLUMETRIC_LIGHTS: usize = 5;

/// Projection used to build primary view rays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerspectiveType {
    /// Standard three-point perspective.
    #[default]
    ThreePoint,
    /// Equidistant fisheye.
    FishEye,
}

/// Frame-constant scene and image parameters.
///
/// The fields mirror the scene description one-to-one; the camera is a view
/// point plus Euler angles, with the eye placed `zoom` behind it along the
/// view axis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderParams {
    pub width: usize,
    pub height: usize,

    // Camera.
    pub vp: Vec3,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub zoom: f64,
    pub persp: f64,
    pub perspective_type: PerspectiveType,
    /// Fisheye only: rays outside the unit FOV circle are discarded.
    pub fish_eye_cut: bool,

    // March tuning.
    pub de_factor: f64,
    pub quality: f64,
    pub view_distance_max: f64,

    // Stage toggles.
    pub shadow: bool,
    pub fast_ambient_occlusion: bool,
    pub slow_ambient_occlusion: bool,
    pub ambient_occlusion_vectors: usize,
    pub dof_enabled: bool,
    pub fog_enabled: bool,
    pub iter_fog_enabled: bool,
    pub colouring_enabled: bool,
    pub penetrating_lights: bool,
    pub fake_lights_enabled: bool,
    pub hdr_enabled: bool,

    // Main light.
    pub main_light_alpha: f64,
    pub main_light_beta: f64,
    pub main_light_intensity: f64,
    pub main_light_colour: Vec3,
    pub shading: f64,
    pub specular_intensity: f64,
    pub shadow_cone_angle: f64,

    // Ambient occlusion and global illumination.
    pub ambient_occlusion_intensity: f64,
    pub fast_ao_tune: f64,
    pub global_ilum_quality: u32,

    // Auxiliary point lights.
    pub aux_light_number: usize,
    pub aux_light_intensity: f64,
    pub aux_light_visibility: f64,

    // Fake lights driven by the orbit trap.
    pub fake_lights_intensity: f64,
    pub fake_lights_visibility: f64,
    pub fake_lights_visibility_size: f64,
    pub fake_lights_orbit_trap: Vec3,

    // Volumetric lights.
    pub volumetric_light_enabled: [bool; VOLUMETRIC_LIGHTS],
    pub volumetric_light_intensity: [f64; VOLUMETRIC_LIGHTS],

    // Fog.
    pub fog_visibility: f64,
    pub fog_colour: Vec3,
    pub fog_density: f64,
    pub fog_colour_1: Vec3,
    pub fog_colour_2: Vec3,
    pub fog_colour_3: Vec3,
    pub fog_colour_1_distance: f64,
    pub fog_colour_2_distance: f64,
    pub fog_distance_factor: f64,

    // Glow.
    pub glow_intensity: f64,
    pub glow_colour_1: Vec3,
    pub glow_colour_2: Vec3,

    // Background gradient, top to bottom.
    pub background_colour_1: Vec3,
    pub background_colour_2: Vec3,
    pub background_colour_3: Vec3,

    // Reflections.
    pub reflect: f64,
    pub reflections_max: u32,

    // Depth of field.
    pub dof_focus: f64,
    pub dof_radius: f64,

    // Surface colouring.
    pub colouring_speed: f64,
    pub colouring_offset: f64,

    // Post-processing.
    pub image_brightness: f64,
    pub image_contrast: f64,
    pub image_gamma: f64,

    pub random_seed: u64,
}

impl Default for RenderParams {
    fn default() -> Self {
        RenderParams {
            width: 800,
            height: 600,
            vp: Vec3::ZERO,
            alpha: 0.0,
            beta: 0.0,
            gamma: 0.0,
            zoom: 2.5,
            persp: 0.5,
            perspective_type: PerspectiveType::ThreePoint,
            fish_eye_cut: false,
            de_factor: 1.0,
            quality: 1.0,
            view_distance_max: 20.0,
            shadow: false,
            fast_ambient_occlusion: false,
            slow_ambient_occlusion: false,
            ambient_occlusion_vectors: 64,
            dof_enabled: false,
            fog_enabled: false,
            iter_fog_enabled: false,
            colouring_enabled: false,
            penetrating_lights: false,
            fake_lights_enabled: false,
            hdr_enabled: false,
            main_light_alpha: -45.0_f64.to_radians(),
            main_light_beta: 45.0_f64.to_radians(),
            main_light_intensity: 1.0,
            main_light_colour: Vec3::splat(1.0),
            shading: 1.0,
            specular_intensity: 1.0,
            shadow_cone_angle: 0.1,
            ambient_occlusion_intensity: 1.0,
            fast_ao_tune: 1.0,
            global_ilum_quality: 0,
            aux_light_number: 0,
            aux_light_intensity: 1.0,
            aux_light_visibility: 1.0,
            fake_lights_intensity: 1.0,
            fake_lights_visibility: 1.0,
            fake_lights_visibility_size: 0.1,
            fake_lights_orbit_trap: Vec3::new(2.0, 0.0, 0.0),
            volumetric_light_enabled: [false; VOLUMETRIC_LIGHTS],
            volumetric_light_intensity: [1.0; VOLUMETRIC_LIGHTS],
            fog_visibility: 10.0,
            fog_colour: Vec3::splat(1.0),
            fog_density: 0.5,
            fog_colour_1: Vec3::splat(1.0),
            fog_colour_2: Vec3::new(0.6, 0.7, 0.9),
            fog_colour_3: Vec3::new(0.2, 0.3, 0.6),
            fog_colour_1_distance: 1.0,
            fog_colour_2_distance: 5.0,
            fog_distance_factor: 1.0,
            glow_intensity: 0.0,
            glow_colour_1: Vec3::new(1.0, 0.8, 0.5),
            glow_colour_2: Vec3::new(0.5, 0.8, 1.0),
            background_colour_1: Vec3::new(0.2, 0.4, 0.8),
            background_colour_2: Vec3::new(0.6, 0.7, 0.9),
            background_colour_3: Vec3::new(0.9, 0.9, 0.9),
            reflect: 0.0,
            reflections_max: 0,
            dof_focus: 2.5,
            dof_radius: 0.02,
            colouring_speed: 1.0,
            colouring_offset: 0.0,
            image_brightness: 1.0,
            image_contrast: 1.0,
            image_gamma: 1.0,
            random_seed: 0,
        }
    }
}

impl RenderParams {
    /// Image resolution scale used by the adaptive hit threshold.
    #[inline]
    pub fn resolution(&self) -> f64 {
        1.0 / self.width.max(1) as f64
    }

    /// Camera rotation built from the Euler angles.
    pub fn rotation(&self) -> Matrix3 {
        Matrix3::from_euler(self.beta, self.gamma, self.alpha)
    }

    /// Direction toward the main light.
    pub fn main_light_vector(&self) -> Vec3 {
        spherical_to_cartesian(self.main_light_alpha, self.main_light_beta)
    }

    /// Hit threshold at `depth` along a ray. Adaptive by default so distant
    /// surfaces resolve at screen-pixel precision; in constant mode `quality`
    /// is the threshold itself.
    #[inline]
    pub fn dist_thresh(&self, depth: f64, constant: bool) -> f64 {
        if constant {
            self.quality
        } else {
            depth * self.resolution() * self.persp / self.quality
        }
    }
}

/// One auxiliary point light.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub colour: Vec3,
    pub intensity: f64,
    pub enabled: bool,
}

impl Light {
    pub fn new(position: Vec3, colour: Vec3, intensity: f64) -> Self {
        Light {
            position,
            colour,
            intensity,
            enabled: true,
        }
    }
}

/// Auxiliary light table, capped at [`LIGHTS_MAX`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LightTable {
    lights: Vec<Light>,
}

impl LightTable {
    pub fn new() -> Self {
        LightTable { lights: Vec::new() }
    }

    /// Append a light. Returns false when the table is full.
    pub fn push(&mut self, light: Light) -> bool {
        if self.lights.len() < LIGHTS_MAX {
            self.lights.push(light);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Enabled lights among the first `n` entries.
    pub fn enabled(&self, n: usize) -> impl Iterator<Item = &Light> {
        self.lights[..n.min(self.lights.len())]
            .iter()
            .filter(|l| l.enabled)
    }
}

/// One ambient-occlusion sample: a probe direction and the sky colour seen
/// along it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AoSample {
    pub direction: Vec3,
    pub colour: Vec3,
}

/// Precomputed AO sample table, capped at [`AO_VECTORS_MAX`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AoSampleTable {
    samples: Vec<AoSample>,
}

impl AoSampleTable {
    /// Generate `count` samples distributed over the sphere, each carrying
    /// the background-gradient colour of its direction. Deterministic in
    /// `seed`.
    pub fn generate(count: usize, seed: u64, params: &RenderParams) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let count = count.min(AO_VECTORS_MAX);
        let mut samples = Vec::with_capacity(count);
        while samples.len() < count {
            let v = Vec3::new(
                rng.gen::<f64>() * 2.0 - 1.0,
                rng.gen::<f64>() * 2.0 - 1.0,
                rng.gen::<f64>() * 2.0 - 1.0,
            );
            let len_sqr = v.length_sqr();
            // Rejection sample the unit ball to avoid corner bias.
            if len_sqr > 1.0 || len_sqr < 1e-6 {
                continue;
            }
            let direction = v.normalized();
            samples.push(AoSample {
                direction,
                colour: background_gradient(direction.z, params),
            });
        }
        AoSampleTable { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AoSample> {
        self.samples.iter()
    }

    /// Every `stride`-th sample, for quality-scaled stages.
    pub fn iter_step(&self, stride: usize) -> impl Iterator<Item = &AoSample> {
        self.samples.iter().step_by(stride.max(1))
    }
}

/// Three-colour vertical gradient: colour 3 below the horizon, blending
/// through colour 2 at the horizon up to colour 1 at the zenith.
pub fn background_gradient(elevation: f64, params: &RenderParams) -> Vec3 {
    let t = elevation.clamp(-1.0, 1.0);
    if t >= 0.0 {
        params.background_colour_2.lerp(params.background_colour_1, t)
    } else {
        params.background_colour_2.lerp(params.background_colour_3, -t)
    }
}

/// Colour palette with wrapping interpolated lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Palette {
    entries: Box<[Vec3]>,
}

impl Palette {
    /// Build from exactly [`PALETTE_SIZE`] entries.
    pub fn new(entries: [Vec3; PALETTE_SIZE]) -> Self {
        Palette {
            entries: Box::new(entries),
        }
    }

    /// Fill each slot from its index.
    pub fn from_fn(mut f: impl FnMut(usize) -> Vec3) -> Self {
        let entries: Vec<Vec3> = (0..PALETTE_SIZE).map(&mut f).collect();
        Palette {
            entries: entries.into_boxed_slice(),
        }
    }

    /// Smooth default palette cycling through hue-shifted cosine waves.
    pub fn rainbow() -> Self {
        Palette::from_fn(|i| {
            let t = i as f64 / PALETTE_SIZE as f64 * std::f64::consts::TAU;
            Vec3::new(
                0.5 + 0.5 * t.cos(),
                0.5 + 0.5 * (t + 2.0).cos(),
                0.5 + 0.5 * (t + 4.0).cos(),
            )
        })
    }

    /// Interpolated lookup; the index wraps modulo the palette length.
    pub fn colour(&self, index: f64) -> Vec3 {
        let len = PALETTE_SIZE as f64;
        let i = index.rem_euclid(len);
        let i0 = i.floor() as usize % PALETTE_SIZE;
        let i1 = (i0 + 1) % PALETTE_SIZE;
        self.entries[i0].lerp(self.entries[i1], i - i.floor())
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::rainbow()
    }
}

/// Output pixel: linear RGB plus the depth of the first primary-ray hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub z_buffer: f32,
}

impl Pixel {
    pub fn new(colour: Vec3, depth: f64) -> Self {
        Pixel {
            r: colour.x as f32,
            g: colour.y as f32,
            b: colour.z as f32,
            z_buffer: depth as f32,
        }
    }
}

/// Borrowed bundle of everything a frame reads: parameters plus the input
/// tables. Shared read-only across workers.
#[derive(Clone, Copy)]
pub struct FrameTables<'a> {
    pub params: &'a RenderParams,
    pub fractal: &'a crate::formulas::FractalParams,
    pub palette: &'a Palette,
    pub ao_samples: &'a AoSampleTable,
    pub lights: &'a LightTable,
}
