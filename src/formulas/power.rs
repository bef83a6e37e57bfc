//! Generalized power-law ("Mandelbulb") iteration.
//!
//! The point is iterated under the spherical power map z -> z^p + c with a
//! scalar running derivative, giving the analytic estimate
//! DE = 0.5 * r * ln(r) / dr at escape.

use crate::math::Vec3;

use super::{CalcParams, EvalResult, FractalParams};

pub(super) fn evaluate(
    point: Vec3,
    power: f64,
    julia: Option<Vec3>,
    fractal: &FractalParams,
    calc: &mut CalcParams,
) -> EvalResult {
    let c = julia.unwrap_or(point) * fractal.fractal_constant_factor;
    let mut z = point;
    let mut dr = 1.0f64;
    let mut r_sqr = z.length_sqr();

    let mut i = 0u32;
    while i < calc.n {
        r_sqr = z.length_sqr();
        calc.trap_min = calc.trap_min.min((z - calc.trap_point).length());
        if r_sqr > fractal.bailout {
            break;
        }

        let r = r_sqr.sqrt();
        if r < 1e-21 {
            // 0^p is 0: the orbit restarts at the additive constant.
            z = c;
            dr = 1.0;
        } else {
            let theta = (z.z / r).acos() * power;
            let phi = z.y.atan2(z.x) * power;
            let r_pow = r.powf(power - 1.0);
            dr = r_pow * power * dr + 1.0;
            let zr = r_pow * r;
            let st = theta.sin();
            z = Vec3::new(zr * st * phi.cos(), zr * st * phi.sin(), zr * theta.cos()) + c;
        }
        i += 1;
    }

    if i >= calc.n {
        // Never escaped: inside the set.
        return EvalResult {
            distance: 0.0,
            iterations: calc.n,
            colour_index: calc.n as f64,
            ..Default::default()
        };
    }

    let r = r_sqr.sqrt();
    let distance = if dr.abs() > 1e-30 {
        0.5 * r * r.ln() / dr
    } else {
        0.5 * r
    };
    // Smoothed escape count, used as the palette index.
    let log_r = r_sqr.ln().max(1e-30);
    let colour_index = i as f64 + 1.0 - log_r.ln() / power.abs().max(1.0 + 1e-9).ln();

    EvalResult {
        distance,
        iterations: i,
        colour_index,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{evaluate, CalcParams, Formula, FractalParams};
    use crate::math::Vec3;

    fn bulb(power: f64) -> FractalParams {
        FractalParams {
            formula: Formula::Power { power, julia: None },
            n: 40,
            ..Default::default()
        }
    }

    fn de(p: Vec3, fractal: &FractalParams) -> f64 {
        let mut calc = CalcParams::new(fractal.n, 0, Vec3::ZERO);
        evaluate(p, fractal, &mut calc).distance
    }

    #[test]
    fn origin_is_inside() {
        let fractal = bulb(8.0);
        let mut calc = CalcParams::new(fractal.n, 0, Vec3::ZERO);
        let r = evaluate(Vec3::ZERO, &fractal, &mut calc);
        assert_eq!(r.distance, 0.0);
        assert_eq!(r.iterations, fractal.n);
    }

    #[test]
    fn far_point_has_large_estimate() {
        let fractal = bulb(8.0);
        let d = de(Vec3::new(5.0, 0.0, 0.0), &fractal);
        assert!(d > 1.0, "DE at 5 units should be well clear of the bulb: {d}");
    }

    #[test]
    fn estimate_shrinks_towards_surface() {
        let fractal = bulb(8.0);
        let far = de(Vec3::new(3.0, 0.2, 0.1), &fractal);
        let near = de(Vec3::new(1.3, 0.2, 0.1), &fractal);
        assert!(near < far);
        assert!(near > 0.0);
    }

    #[test]
    fn no_overshoot_marching_inward() {
        // March from outside along -x: stepping the full estimate each time
        // must never cross into the set (DE stays non-negative).
        let fractal = bulb(8.0);
        let mut p = Vec3::new(3.0, 0.1, 0.05);
        for _ in 0..200 {
            let d = de(p, &fractal);
            assert!(d >= 0.0);
            if d < 1e-7 {
                break;
            }
            p = p + Vec3::new(-1.0, 0.0, 0.0) * d;
        }
    }

    #[test]
    fn power_two_matches_quadratic_growth() {
        let fractal = bulb(2.0);
        let d = de(Vec3::new(4.0, 0.0, 0.0), &fractal);
        assert!(d > 0.5 && d.is_finite());
    }
}
