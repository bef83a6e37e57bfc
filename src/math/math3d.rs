//! 3D math primitives with f64 precision.
//!
//! `Vec3` and `Matrix3` are immutable value types; every operation returns a
//! new value. A matrix is three row vectors, multiplied row-major.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 3-component vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    #[inline(always)]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    #[inline(always)]
    pub const fn splat(v: f64) -> Self {
        Vec3 { x: v, y: v, z: v }
    }

    #[inline(always)]
    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline(always)]
    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    #[inline(always)]
    pub fn length_sqr(self) -> f64 {
        self.dot(self)
    }

    #[inline(always)]
    pub fn length(self) -> f64 {
        self.length_sqr().sqrt()
    }

    /// Unit vector in the same direction; zero-length input stays zero.
    #[inline]
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len > 1e-30 {
            self * (1.0 / len)
        } else {
            Vec3::ZERO
        }
    }

    /// Mirror `self` about the unit normal `n`.
    #[inline]
    pub fn reflect(self, n: Vec3) -> Vec3 {
        self - n * (2.0 * self.dot(n))
    }

    #[inline]
    pub fn lerp(self, other: Vec3, t: f64) -> Vec3 {
        self + (other - self) * t
    }

    #[inline]
    pub fn abs(self) -> Vec3 {
        Vec3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[inline]
    pub fn clamp01(self) -> Vec3 {
        Vec3::new(
            self.x.clamp(0.0, 1.0),
            self.y.clamp(0.0, 1.0),
            self.z.clamp(0.0, 1.0),
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Component-wise product, used for colour modulation.
impl Mul<Vec3> for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn mul(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn div(self, s: f64) -> Vec3 {
        Vec3::new(self.x / s, self.y / s, self.z / s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    #[inline(always)]
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// 3x3 rotation matrix stored as three row vectors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix3 {
    pub rows: [Vec3; 3],
}

impl Matrix3 {
    pub fn identity() -> Self {
        Matrix3 {
            rows: [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
        }
    }

    /// Rotation from Euler angles in radians, XYZ order.
    pub fn from_euler(rx: f64, ry: f64, rz: f64) -> Self {
        let (sx, cx) = rx.sin_cos();
        let (sy, cy) = ry.sin_cos();
        let (sz, cz) = rz.sin_cos();

        Matrix3 {
            rows: [
                Vec3::new(cy * cz, -cy * sz, sy),
                Vec3::new(sx * sy * cz + cx * sz, -sx * sy * sz + cx * cz, -sx * cy),
                Vec3::new(-cx * sy * cz + sx * sz, cx * sy * sz + sx * cz, cx * cy),
            ],
        }
    }

    #[inline(always)]
    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        Vec3::new(self.rows[0].dot(v), self.rows[1].dot(v), self.rows[2].dot(v))
    }

    pub fn mul(&self, other: &Matrix3) -> Matrix3 {
        let t = other.transpose();
        Matrix3 {
            rows: [
                Vec3::new(
                    self.rows[0].dot(t.rows[0]),
                    self.rows[0].dot(t.rows[1]),
                    self.rows[0].dot(t.rows[2]),
                ),
                Vec3::new(
                    self.rows[1].dot(t.rows[0]),
                    self.rows[1].dot(t.rows[1]),
                    self.rows[1].dot(t.rows[2]),
                ),
                Vec3::new(
                    self.rows[2].dot(t.rows[0]),
                    self.rows[2].dot(t.rows[1]),
                    self.rows[2].dot(t.rows[2]),
                ),
            ],
        }
    }

    /// For a pure rotation the transpose is the inverse.
    pub fn transpose(&self) -> Matrix3 {
        Matrix3 {
            rows: [
                Vec3::new(self.rows[0].x, self.rows[1].x, self.rows[2].x),
                Vec3::new(self.rows[0].y, self.rows[1].y, self.rows[2].y),
                Vec3::new(self.rows[0].z, self.rows[1].z, self.rows[2].z),
            ],
        }
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Matrix3::identity()
    }
}
