// Robot pose from the two sensor positions.
// The robot position is the midpoint of the sensors, the heading is
// perpendicular to the line joining them. Both only advance when a sensor
// position advances, the previous heading is kept for dead reckoning.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_float::{Vector2, EPSILON};
use crate::sensor::SensorPosition;

/// Combined position and heading of the robot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RobotPose {
    position: Vector2,
    position_ms: Option<u32>,
    previous_position: Vector2,
    previous_position_ms: Option<u32>,
    heading: Vector2,          // Unit vector, zero until the first update
    heading_ms: Option<u32>,
    previous_heading: Vector2,
    previous_heading_ms: Option<u32>,
}

impl RobotPose {
    pub const fn new() -> Self {
        Self {
            position: Vector2::ZERO,
            position_ms: None,
            previous_position: Vector2::ZERO,
            previous_position_ms: None,
            heading: Vector2::ZERO,
            heading_ms: None,
            previous_heading: Vector2::ZERO,
            previous_heading_ms: None,
        }
    }

    /// Combines the sensor positions, timestamped with the newer of the two.
    ///
    /// # Returns
    /// `true` if position and heading advanced
    pub fn update(&mut self, left: &SensorPosition, right: &SensorPosition) -> bool {
        let Some(at_ms) = left.timestamp_ms().max(right.timestamp_ms()) else {
            return false;
        };
        let (l, r) = (left.position(), right.position());
        let mut advanced = false;

        if self.position_ms != Some(at_ms) {
            self.previous_position = self.position;
            self.previous_position_ms = self.position_ms;
            self.position = (l + r) * 0.5;
            self.position_ms = Some(at_ms);
            advanced = true;
        }

        if self.heading_ms != Some(at_ms) {
            self.previous_heading = self.heading;
            self.previous_heading_ms = self.heading_ms;
            // Down axis crossed with the right-to-left sensor vector
            self.heading = Vector2::new(l.y - r.y, -(l.x - r.x)).normalized();
            self.heading_ms = Some(at_ms);
            advanced = true;
        }
        advanced
    }

    /// Signed heading change between the previous and the current update.
    /// Zero until two headings are known.
    pub fn turn(&self) -> f32 {
        if self.previous_heading.length() < EPSILON || self.heading.length() < EPSILON {
            return 0.0;
        }
        self.previous_heading.angle_to(self.heading)
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn timestamp_ms(&self) -> Option<u32> {
        self.position_ms
    }

    pub fn previous_position(&self) -> Vector2 {
        self.previous_position
    }

    pub fn heading(&self) -> Vector2 {
        self.heading
    }

    pub fn previous_heading(&self) -> Vector2 {
        self.previous_heading
    }

    /// Heading as an angle from the +X axis in radians.
    pub fn heading_angle(&self) -> f32 {
        self.heading.orientation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use core::f32::consts::FRAC_PI_2;

    fn sensor_at(x: f32, y: f32, at_ms: u32) -> SensorPosition {
        let mut sensor = SensorPosition::new();
        sensor.record(Vector2::new(x, y), at_ms);
        sensor
    }

    #[test]
    fn nothing_before_first_fix() {
        let mut pose = RobotPose::new();
        assert!(!pose.update(&SensorPosition::new(), &SensorPosition::new()));
        assert_eq!(pose.timestamp_ms(), None);
    }

    #[test]
    fn midpoint_and_heading() {
        let mut pose = RobotPose::new();
        // Left sensor on the -X side, robot facing +Y
        assert!(pose.update(&sensor_at(-40.0, 1000.0, 7), &sensor_at(40.0, 1000.0, 9)));

        assert_eq!(pose.timestamp_ms(), Some(9));
        assert_abs_diff_eq!(pose.position().x, 0.0);
        assert_abs_diff_eq!(pose.position().y, 1000.0);
        assert_abs_diff_eq!(pose.heading().x, 0.0);
        assert_abs_diff_eq!(pose.heading().y, 1.0);
        assert_abs_diff_eq!(pose.heading_angle(), FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(pose.turn(), 0.0);

        // Unchanged timestamp: nothing moves
        assert!(!pose.update(&sensor_at(0.0, 0.0, 9), &sensor_at(10.0, 0.0, 9)));
        assert_abs_diff_eq!(pose.position().y, 1000.0);
    }

    #[test]
    fn turn_between_updates() {
        let mut pose = RobotPose::new();
        pose.update(&sensor_at(-40.0, 0.0, 10), &sensor_at(40.0, 0.0, 10));
        // Rotated a quarter turn to the left: now facing -X
        pose.update(&sensor_at(0.0, -40.0, 20), &sensor_at(0.0, 40.0, 20));

        assert_abs_diff_eq!(pose.heading().x, -1.0);
        assert_abs_diff_eq!(pose.previous_heading().y, 1.0);
        assert_abs_diff_eq!(pose.turn(), FRAC_PI_2, epsilon = 1e-6);
    }
}
