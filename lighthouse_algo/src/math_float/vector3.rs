// Spatial vector used for lighthouse directions and offsets.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::ops::{Add, Mul, Neg, Sub};

use libm::{acosf, sqrtf};

use super::{Quaternion, Vector2, EPSILON};

/// Immutable 3D vector. X right, Y forward, Z up in the global frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const UP: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 1.0 };
    pub const FORWARD: Vector3 = Vector3 { x: 0.0, y: 1.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        sqrtf(self.dot(self))
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

    /// Unsigned angle between two vectors in radians, [0, PI].
    pub fn angle_to(self, other: Vector3) -> f32 {
        let lengths = self.length() * other.length();
        if lengths < EPSILON {
            return 0.0;
        }
        acosf((self.dot(other) / lengths).clamp(-1.0, 1.0))
    }

    /// Applies the rotation `q`.
    pub fn rotated(self, q: &Quaternion) -> Self {
        q.rotate(self)
    }

    /// Applies the inverse of the rotation `q`.
    pub fn unrotated(self, q: &Quaternion) -> Self {
        q.unrotate(self)
    }

    /// Drops the Z component.
    pub fn xy(self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;

    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

/// Intersects a ray with a plane through the origin.
///
/// # Arguments
/// * `plane_normal` - Normal of the plane, any length
/// * `origin` - Start point of the ray
/// * `direction` - Direction of the ray, any length
///
/// # Returns
/// The intersection point, or `None` if the ray runs parallel to the plane
/// or points away from it.
pub fn intersect_plane(plane_normal: Vector3, origin: Vector3, direction: Vector3) -> Option<Vector3> {
    let denom = plane_normal.dot(direction);
    if denom.abs() < EPSILON {
        return None;
    }
    let t = -plane_normal.dot(origin) / denom;
    if t < 0.0 {
        return None;
    }
    Some(origin + direction * t)
}
