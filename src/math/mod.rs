//! Vector/matrix primitives and scalar helpers.

pub mod math3d;
pub mod utils;

pub use math3d::{Matrix3, Vec3};
