//! Scalar helpers shared across the marcher and shading stages.

use crate::math::Vec3;

/// Linear interpolation between `a` and `b`.
#[inline(always)]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Hermite smooth step over `[edge0, edge1]`.
#[inline(always)]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Unit vector from spherical angles: `alpha` is the azimuth in the XY plane,
/// `beta` the elevation out of it.
#[inline]
pub fn spherical_to_cartesian(alpha: f64, beta: f64) -> Vec3 {
    let (sb, cb) = beta.sin_cos();
    let (sa, ca) = alpha.sin_cos();
    Vec3::new(cb * sa, cb * ca, sb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lerp_endpoints() {
        assert_abs_diff_eq!(lerp(2.0, 6.0, 0.0), 2.0);
        assert_abs_diff_eq!(lerp(2.0, 6.0, 1.0), 6.0);
        assert_abs_diff_eq!(lerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn smoothstep_clamps_and_interpolates() {
        assert_abs_diff_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_abs_diff_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_abs_diff_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn spherical_directions_are_unit() {
        let v = spherical_to_cartesian(0.7, -0.3);
        assert_abs_diff_eq!(v.length(), 1.0, epsilon = 1e-12);
        // Zero elevation stays in the XY plane.
        let flat = spherical_to_cartesian(1.2, 0.0);
        assert_abs_diff_eq!(flat.z, 0.0, epsilon = 1e-12);
    }
}
