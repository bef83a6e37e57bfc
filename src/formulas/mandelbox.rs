//! Box-folding "Mandelbox" iteration.
//!
//! Each iteration box-folds the point on every axis, sphere-folds by the
//! min/fixed radius thresholds, then scales and translates by the original
//! point. Axis folds feed per-channel colour factors into the colour index,
//! and each fold slot can carry an optional rotation pair.

use serde::{Deserialize, Serialize};

use crate::math::{Matrix3, Vec3};

use super::{CalcParams, EvalResult, FractalParams};

/// Fold slots: one per axis and fold sign (+x, +y, +z, -x, -y, -z).
pub const MANDELBOX_ROTATIONS: usize = 6;

/// Optional rotation applied around one fold slot.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct MandelboxRotation {
    pub rot: Matrix3,
    pub rot_inv: Matrix3,
}

impl MandelboxRotation {
    pub fn from_euler(alpha: f64, beta: f64, gamma: f64) -> Self {
        let rot = Matrix3::from_euler(alpha, beta, gamma);
        MandelboxRotation {
            rot_inv: rot.transpose(),
            rot,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MandelboxParams {
    pub scale: f64,
    pub folding_limit: f64,
    pub folding_value: f64,
    pub min_radius: f64,
    pub fixed_radius: f64,
    /// Per-channel colour-index contribution of each axis fold.
    pub colour_factor: Vec3,
    /// Fixed array of optional fold rotations, gated by `rot_enabled`.
    pub rotations: [MandelboxRotation; MANDELBOX_ROTATIONS],
    /// Bitmask enabling individual rotation slots (bit i = slot i).
    pub rot_enabled: u32,
}

impl Default for MandelboxParams {
    fn default() -> Self {
        MandelboxParams {
            scale: 2.0,
            folding_limit: 1.0,
            folding_value: 2.0,
            min_radius: 0.5,
            fixed_radius: 1.0,
            colour_factor: Vec3::new(0.03, 0.05, 0.07),
            rotations: [MandelboxRotation::default(); MANDELBOX_ROTATIONS],
            rot_enabled: 0,
        }
    }
}

/// Fold one axis of `z` against the positive (`sign = 1.0`) or negative
/// (`sign = -1.0`) folding plane, honouring the slot's optional rotation.
/// Slots 0..3 are the positive x/y/z folds, 3..6 the negative ones.
/// Returns whether the fold fired.
#[inline]
fn apply_fold(z: &mut Vec3, params: &MandelboxParams, axis: usize, sign: f64) -> bool {
    let slot = if sign > 0.0 { axis } else { axis + 3 };
    let rotated = params.rot_enabled & (1 << slot) != 0;
    let mut zf = if rotated {
        params.rotations[slot].rot.mul_vec(*z)
    } else {
        *z
    };
    let component = match axis {
        0 => &mut zf.x,
        1 => &mut zf.y,
        _ => &mut zf.z,
    };
    if *component * sign > params.folding_limit {
        *component = sign * params.folding_value - *component;
        *z = if rotated {
            params.rotations[slot].rot_inv.mul_vec(zf)
        } else {
            zf
        };
        true
    } else {
        false
    }
}

pub(super) fn evaluate(
    point: Vec3,
    params: &MandelboxParams,
    fractal: &FractalParams,
    calc: &mut CalcParams,
) -> EvalResult {
    let c = point * fractal.fractal_constant_factor;
    let mr_sqr = params.min_radius * params.min_radius;
    let fr_sqr = params.fixed_radius * params.fixed_radius;

    let mut z = point;
    let mut dr = 1.0f64;
    let mut r_sqr = z.length_sqr();
    let mut colour = 0.0f64;
    let mut i = 0u32;

    while i < calc.n {
        calc.trap_min = calc.trap_min.min((z - calc.trap_point).length());

        // Box folds: per axis, the positive slot folds first and the
        // negative slot only applies when it did not.
        for axis in 0..3 {
            let positive = apply_fold(&mut z, params, axis, 1.0);
            let folded = positive || apply_fold(&mut z, params, axis, -1.0);
            if folded {
                colour += match axis {
                    0 => params.colour_factor.x,
                    1 => params.colour_factor.y,
                    _ => params.colour_factor.z,
                };
            }
        }

        // Sphere fold.
        let rf_sqr = z.length_sqr();
        let factor = if rf_sqr < mr_sqr {
            fr_sqr / mr_sqr
        } else if rf_sqr < fr_sqr {
            fr_sqr / rf_sqr
        } else {
            1.0
        };

        z = z * (factor * params.scale) + c;
        dr = dr * (factor * params.scale).abs() + 1.0;

        r_sqr = z.length_sqr();
        i += 1;
        if r_sqr > fractal.bailout {
            break;
        }
    }

    let r = r_sqr.sqrt();
    let distance = if dr.abs() > 1e-30 { r / dr.abs() } else { r };

    EvalResult {
        distance,
        iterations: i,
        colour_index: colour,
        ..Default::default()
    }
}
