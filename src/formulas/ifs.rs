//! Multi-plane iterated function system.
//!
//! Up to [`IFS_PLANES`] independently enabled folding planes reflect the
//! point, after optional per-axis abs folds and a global pre-rotation; the
//! iteration then scales toward the attractor. A Menger-sponge fold variant
//! replaces the plane set when enabled.

use serde::{Deserialize, Serialize};

use crate::math::{Matrix3, Vec3};

use super::{CalcParams, EvalResult, FractalParams};

/// Fixed capacity of the folding-plane array.
pub const IFS_PLANES: usize = 9;

/// One folding plane: the point is reflected when its projection onto
/// `direction` falls below `distance`, scaled by `intensity`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct IfsPlane {
    pub enabled: bool,
    pub direction: Vec3,
    pub distance: f64,
    pub intensity: f64,
    pub rotation: Matrix3,
}

impl Default for IfsPlane {
    fn default() -> Self {
        IfsPlane {
            enabled: false,
            direction: Vec3::new(1.0, 0.0, 0.0),
            distance: 0.0,
            intensity: 1.0,
            rotation: Matrix3::identity(),
        }
    }
}

impl IfsPlane {
    pub fn new(direction: Vec3, distance: f64, intensity: f64) -> Self {
        IfsPlane {
            enabled: true,
            direction: direction.normalized(),
            distance,
            intensity,
            rotation: Matrix3::identity(),
        }
    }

    /// Attach a per-plane rotation built from Euler angles.
    pub fn with_rotation(mut self, alpha: f64, beta: f64, gamma: f64) -> Self {
        self.rotation = Matrix3::from_euler(alpha, beta, gamma);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IfsParams {
    /// Fixed array of folding planes; disabled entries are skipped.
    pub planes: [IfsPlane; IFS_PLANES],
    /// Per-axis abs folds applied before the planes.
    pub abs_x: bool,
    pub abs_y: bool,
    pub abs_z: bool,
    /// Replace the plane folds with the Menger-sponge fold.
    pub menger_sponge_mode: bool,
    /// Global pre-rotation applied every iteration.
    pub main_rot: Matrix3,
    pub scale: f64,
    pub offset: Vec3,
    /// Corner offsets of the Menger fold.
    pub edge: Vec3,
}

impl Default for IfsParams {
    fn default() -> Self {
        IfsParams {
            planes: [IfsPlane::default(); IFS_PLANES],
            abs_x: false,
            abs_y: false,
            abs_z: false,
            menger_sponge_mode: false,
            main_rot: Matrix3::identity(),
            scale: 2.0,
            offset: Vec3::new(1.0, 0.0, 0.0),
            edge: Vec3::new(2.0, 2.0, 2.0),
        }
    }
}

impl IfsParams {
    /// Set the global pre-rotation from Euler angles.
    pub fn with_rotation(mut self, alpha: f64, beta: f64, gamma: f64) -> Self {
        self.main_rot = Matrix3::from_euler(alpha, beta, gamma);
        self
    }

    /// Classic Menger sponge: scale 3, corner edge 2.
    pub fn menger_sponge() -> Self {
        IfsParams {
            menger_sponge_mode: true,
            scale: 3.0,
            offset: Vec3::ZERO,
            edge: Vec3::new(2.0, 2.0, 2.0),
            ..Default::default()
        }
    }
}

pub(super) fn evaluate(
    point: Vec3,
    params: &IfsParams,
    fractal: &FractalParams,
    calc: &mut CalcParams,
) -> EvalResult {
    let mut z = point;
    let mut dr = 1.0f64;
    let mut r_sqr = z.length_sqr();
    let mut i = 0u32;

    while i < calc.n {
        calc.trap_min = calc.trap_min.min((z - calc.trap_point).length());

        if params.abs_x {
            z.x = z.x.abs();
        }
        if params.abs_y {
            z.y = z.y.abs();
        }
        if params.abs_z {
            z.z = z.z.abs();
        }

        z = params.main_rot.mul_vec(z);

        if params.menger_sponge_mode {
            menger_fold(&mut z, params);
        } else {
            for plane in params.planes.iter().filter(|p| p.enabled) {
                z = plane.rotation.mul_vec(z);
                let proj = z.dot(plane.direction);
                if proj < plane.distance {
                    z = z - plane.direction * (2.0 * (proj - plane.distance) * plane.intensity);
                }
            }
            z = z * params.scale - params.offset * (params.scale - 1.0);
        }
        dr *= params.scale.abs();

        r_sqr = z.length_sqr();
        i += 1;
        if r_sqr > fractal.bailout {
            break;
        }
    }

    let r = r_sqr.sqrt();
    // Linear estimate against the bounded base shape.
    let distance = if dr > 1e-30 { (r - 2.0) / dr } else { r };

    EvalResult {
        distance,
        iterations: i,
        colour_index: i as f64,
        ..Default::default()
    }
}

/// Menger fold: mirror into the positive octant, order the components, then
/// pull toward the sponge corner.
fn menger_fold(z: &mut Vec3, params: &IfsParams) {
    let mut v = z.abs();
    if v.x < v.y {
        std::mem::swap(&mut v.x, &mut v.y);
    }
    if v.x < v.z {
        std::mem::swap(&mut v.x, &mut v.z);
    }
    if v.y < v.z {
        std::mem::swap(&mut v.y, &mut v.z);
    }
    v = v * params.scale;
    v.x -= params.edge.x;
    v.y -= params.edge.y;
    if v.z > 0.5 * params.edge.z {
        v.z -= params.edge.z;
    }
    *z = v;
}
