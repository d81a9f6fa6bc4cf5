// Planar vector used for sensor positions, robot position and heading.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::f32::consts::PI;
use core::ops::{Add, Mul, Sub};

use libm::{atan2f, cosf, sinf, sqrtf};

use super::EPSILON;

/// Immutable 2D vector, all derived values are computed on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        sqrtf(self.length_squared())
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < EPSILON {
            return Self::ZERO;
        }
        self * (1.0 / len)
    }

    /// Angle from the +X axis in radians, (-PI, PI].
    pub fn orientation(self) -> f32 {
        atan2f(self.y, self.x)
    }

    /// Counter-clockwise rotation by `angle` radians.
    pub fn rotated(self, angle: f32) -> Self {
        let (sin, cos) = (sinf(angle), cosf(angle));
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Signed angle that rotates `self` onto `other`, wrapped to (-PI, PI].
    pub fn angle_to(self, other: Vector2) -> f32 {
        let mut angle = other.orientation() - self.orientation();
        if angle > PI {
            angle -= 2.0 * PI;
        } else if angle <= -PI {
            angle += 2.0 * PI;
        }
        angle
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f32) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f32::consts::FRAC_PI_2;

    #[test]
    fn rotate_quarter_turn() {
        let v = Vector2::new(1.0, 0.0).rotated(FRAC_PI_2);
        assert_abs_diff_eq!(v.x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(v.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn angle_to_is_signed_and_wrapped() {
        let east = Vector2::new(1.0, 0.0);
        let north = Vector2::new(0.0, 1.0);
        assert_abs_diff_eq!(east.angle_to(north), FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(north.angle_to(east), -FRAC_PI_2, epsilon = 1e-6);

        // Crossing the +-PI seam takes the short way round
        let a = Vector2::new(-1.0, 0.1);
        let b = Vector2::new(-1.0, -0.1);
        let angle = a.angle_to(b);
        assert!(angle > 0.0 && angle < 0.3);
    }

    #[test]
    fn normalize_handles_zero() {
        assert_eq!(Vector2::ZERO.normalized(), Vector2::ZERO);
        assert_abs_diff_eq!(Vector2::new(3.0, 4.0).normalized().length(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(Vector2::new(3.0, 4.0).dot(Vector2::new(1.0, 1.0)), 7.0);
    }
}
