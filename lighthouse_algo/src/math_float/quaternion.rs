// Rotation quaternion used to express the lighthouse orientation.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::ops::Mul;

use libm::{cosf, sinf};

use super::{Vector3, EPSILON};

/// Unit quaternion `w + xi + yj + zk`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians about `axis`.
    ///
    /// The axis does not need to be normalized; a zero axis yields the identity.
    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let axis = axis.normalized();
        if axis == Vector3::ZERO {
            return Self::IDENTITY;
        }
        let half = angle * 0.5;
        let s = sinf(half);
        Self::new(cosf(half), axis.x * s, axis.y * s, axis.z * s)
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotates `v` by this quaternion (`q v q*`).
    pub fn rotate(&self, v: Vector3) -> Vector3 {
        let p = Quaternion::new(0.0, v.x, v.y, v.z);
        let r = *self * p * self.conjugate();
        Vector3::new(r.x, r.y, r.z)
    }

    /// Rotates `v` by the inverse of this quaternion (`q* v q`).
    pub fn unrotate(&self, v: Vector3) -> Vector3 {
        self.conjugate().rotate(v)
    }

    pub fn is_identity(&self) -> bool {
        (self.w.abs() - 1.0).abs() < EPSILON
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    // Hamilton product
    fn mul(self, r: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * r.w - self.x * r.x - self.y * r.y - self.z * r.z,
            self.w * r.x + self.x * r.w + self.y * r.z - self.z * r.y,
            self.w * r.y - self.x * r.z + self.y * r.w + self.z * r.x,
            self.w * r.z + self.x * r.y - self.y * r.x + self.z * r.w,
        )
    }
}
