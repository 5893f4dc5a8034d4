//! Pure-math routines shared by the camera, mask and annotation modules
//!
//! World coordinates are metres, z-up, with the ground plane at z = 0 and the
//! field centred on the origin. All angles are radians.

use glam::{DMat3, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Rays closer to horizontal than this never intersect the ground plane.
pub const GROUND_EPS: f64 = 1e-9;

/// Roll/pitch/yaw Euler angles (radians).
///
/// Rotations compose as `Rz(yaw) * Ry(pitch) * Rx(roll)`; the same order is
/// used everywhere a rotation is applied so that forward and inverse
/// transforms stay consistent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Euler {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Euler {
    pub const ZERO: Self = Self {
        roll: 0.0,
        pitch: 0.0,
        yaw: 0.0,
    };

    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Rotation matrix `Rz(yaw) * Ry(pitch) * Rx(roll)`.
    pub fn to_matrix(self) -> DMat3 {
        DMat3::from_rotation_z(self.yaw)
            * DMat3::from_rotation_y(self.pitch)
            * DMat3::from_rotation_x(self.roll)
    }

    /// Apply the rotation to a direction vector.
    pub fn rotate(self, v: DVec3) -> DVec3 {
        self.to_matrix() * v
    }

    /// Apply the inverse rotation (transpose of the rotation matrix).
    pub fn unrotate(self, v: DVec3) -> DVec3 {
        self.to_matrix().transpose() * v
    }
}

/// Unit ray through an equirectangular image pixel, before any environment
/// rotation is applied.
///
/// `phi` is the polar angle from +z (image top row looks straight up,
/// bottom row straight down); `theta` sweeps a full turn across the image
/// width with the centre column at theta = 0 facing +x.
pub fn equirect_ray(pixel: DVec2, width: u32, height: u32) -> DVec3 {
    let phi = (pixel.y / height as f64) * PI;
    let theta = (0.5 - pixel.x / width as f64) * TAU;
    DVec3::new(
        phi.sin() * theta.cos(),
        phi.sin() * theta.sin(),
        phi.cos(),
    )
}

/// Equirectangular pixel that views along `dir` (inverse of [`equirect_ray`]).
///
/// Returns `None` for a zero-length direction. The x coordinate is wrapped
/// into `[0, width)`.
pub fn equirect_pixel(dir: DVec3, width: u32, height: u32) -> Option<DVec2> {
    let len = dir.length();
    if len < GROUND_EPS {
        return None;
    }
    let phi = (dir.z / len).clamp(-1.0, 1.0).acos();
    let theta = dir.y.atan2(dir.x);
    let x = ((0.5 - theta / TAU) * width as f64).rem_euclid(width as f64);
    let y = (phi / PI) * height as f64;
    Some(DVec2::new(x, y))
}

/// Intersect a ray with the ground plane z = 0.
///
/// Returns `None` when the ray is parallel to the ground (near-horizon rays
/// are common under wide fields of view) or points away from it.
pub fn intersect_ground(origin: DVec3, dir: DVec3) -> Option<DVec3> {
    if dir.z.abs() < GROUND_EPS {
        return None;
    }
    let t = -origin.z / dir.z;
    if t <= 0.0 {
        return None;
    }
    Some(DVec3::new(
        origin.x + t * dir.x,
        origin.y + t * dir.y,
        0.0,
    ))
}
