// Lighthouse placement relative to the robot's sensor plane.
// The base station reports its own "up" direction through the accelerometer
// bytes of the info block. From that single vector we derive how the lighthouse
// is tilted and where its forward axis meets the sensor plane; that crossing
// point becomes the origin of the global frame.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use libm::acosf;

use crate::math_float::vector3::intersect_plane;
use crate::math_float::{Quaternion, Vector3};

/// Orientation and position of the base station in the global frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LighthousePose {
    pub orientation: Quaternion, // Rotation taking the lighthouse "up" onto the global vertical
    pub offset: Vector3,         // Lighthouse center, z = height above the sensor plane
}

impl LighthousePose {
    /// Derives the pose from the raw accelerometer direction of the info block.
    ///
    /// # Arguments
    /// * `accel_dir` - Lighthouse frame: x left(+), y up(+), z front(+)
    /// * `plane_distance_mm` - Height of the lighthouse center above the sensor plane
    ///
    /// An upright lighthouse gets the identity orientation. When the forward
    /// axis never reaches the sensor plane the lighthouse is placed directly
    /// above the origin.
    pub fn from_accel_dir(accel_dir: [i8; 3], plane_distance_mm: f32) -> Self {
        let [ax, ay, az] = accel_dir.map(f32::from);

        // Global frame: x right, y forward, z up
        let up = Vector3::new(-ax, az, ay).normalized();
        let orientation = if up == Vector3::ZERO {
            Quaternion::IDENTITY
        } else {
            // up x (0, 0, 1) reduces to (up.y, -up.x, 0)
            let axis = Vector3::new(up.y, -up.x, 0.0);
            Quaternion::from_axis_angle(axis, acosf(up.z.clamp(-1.0, 1.0)))
        };

        let forward = Vector3::FORWARD.unrotated(&orientation);
        let center = Vector3::new(0.0, 0.0, plane_distance_mm);
        let offset = match intersect_plane(Vector3::UP, center, forward) {
            Some(hit) => Vector3::new(-hit.x, -hit.y, plane_distance_mm),
            None => center,
        };

        Self { orientation, offset }
    }

    /// Height of the lighthouse above the sensor plane.
    pub fn height(&self) -> f32 {
        self.offset.z
    }
}
