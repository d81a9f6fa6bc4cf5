// Sensor position on the sensor plane.
// Sweep ticks of both axes become angles across the sweep field of view,
// corrected by the rotor phase calibration. The resulting ray from the
// lighthouse is rotated into the global frame and intersected with the plane.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use libm::tanf;

use crate::base_station::{BaseStation, LighthousePose};
use crate::config::LighthouseConfig;
use crate::math_float::vector3::intersect_plane;
use crate::math_float::{Vector2, Vector3};
use crate::Axis;

use super::decoder::CycleData;

/// Converts a pair of sweep measurements into a position on the sensor plane.
///
/// # Arguments
/// * `sweep_ticks` - Sweep hit of the X and Y rotor, from the start of the visible sweep
/// * `phase` - Factory phase calibration of the X and Y rotor, radians
/// * `pose` - Lighthouse orientation and offset
/// * `config` - Sweep duration and field of view
///
/// # Returns
/// Position in millimeters, `None` if the ray never reaches the plane.
pub fn resolve_position(
    sweep_ticks: [u32; 2],
    phase: [f32; 2],
    pose: &LighthousePose,
    config: &LighthouseConfig,
) -> Option<Vector2> {
    let duration = config.sweep_duration_ticks as f32;
    let [x, z] = [0, 1].map(|i| {
        let fraction = sweep_ticks[i] as f32 / duration;
        tanf((fraction - 0.5) * config.sweep_fov_rad + phase[i])
    });

    // Ticks grow left to right when facing the lighthouse, hence -x
    let direction = Vector3::new(-x, 1.0, z)
        .unrotated(&pose.orientation)
        .normalized();

    intersect_plane(Vector3::UP, pose.offset, direction).map(Vector3::xy)
}

/// Position history and velocity of one sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorPosition {
    position: Vector2,
    position_ms: Option<u32>, // None until the first fix
    previous: Vector2,
    previous_ms: Option<u32>,
    velocity: f32,            // mm/s, negative when moving against the heading
    velocity_ms: Option<u32>, // Position timestamp the velocity was computed for
}

impl SensorPosition {
    pub const fn new() -> Self {
        Self {
            position: Vector2::ZERO,
            position_ms: None,
            previous: Vector2::ZERO,
            previous_ms: None,
            velocity: 0.0,
            velocity_ms: None,
        }
    }

    /// Resolves a new fix from the decoded sweeps.
    ///
    /// Does nothing unless both axes are valid, the base station is known and
    /// the newest sweep hit is newer than the current fix.
    ///
    /// # Returns
    /// `true` if the position was updated
    pub fn update_from_fix(
        &mut self,
        cycles: &[CycleData; 2],
        base: &BaseStation,
        config: &LighthouseConfig,
    ) -> bool {
        let [x, y] = cycles;
        let (Some(x_ms), Some(y_ms)) = (x.sweep_hit_ms, y.sweep_hit_ms) else {
            return false;
        };
        let fix_ms = x_ms.max(y_ms);
        if self.position_ms == Some(fix_ms) {
            return false;
        }

        let (Some(pose), Some(rotor_x), Some(rotor_y)) =
            (base.pose(), base.rotor(Axis::X), base.rotor(Axis::Y))
        else {
            return false;
        };

        match resolve_position(
            [x.sweep_ticks, y.sweep_ticks],
            [rotor_x.phase, rotor_y.phase],
            pose,
            config,
        ) {
            Some(position) => {
                self.record(position, fix_ms);
                true
            }
            None => false,
        }
    }

    /// Dead reckoning while the signal is lost: repeats the last movement,
    /// turned by the heading change since it was made.
    pub fn estimate(&mut self, turn_rad: f32, now_ms: u32) {
        if self.position_ms.is_none() {
            return;
        }
        let delta = match self.previous_ms {
            Some(_) => self.position - self.previous,
            None => Vector2::ZERO,
        };
        self.record(self.position + delta.rotated(turn_rad), now_ms);
    }

    /// Stores a new position, keeping the current one as history.
    pub fn record(&mut self, position: Vector2, at_ms: u32) {
        self.previous = self.position;
        self.previous_ms = self.position_ms;
        self.position = position;
        self.position_ms = Some(at_ms);
    }

    /// Updates the velocity from the last two positions.
    ///
    /// Kept at its last value until there are two positions, and while the
    /// position has not changed since the last update.
    pub fn recalculate_velocity(&mut self, heading: Vector2) {
        let (Some(at_ms), Some(previous_ms)) = (self.position_ms, self.previous_ms) else {
            return;
        };
        if self.velocity_ms == Some(at_ms) {
            return;
        }
        let elapsed_ms = at_ms.wrapping_sub(previous_ms);
        if elapsed_ms == 0 {
            return;
        }

        let delta = self.position - self.previous;
        let speed = delta.length() * 1000.0 / elapsed_ms as f32;
        self.velocity = if delta.dot(heading) < 0.0 { -speed } else { speed };
        self.velocity_ms = Some(at_ms);
    }

    pub fn position(&self) -> Vector2 {
        self.position
    }

    pub fn timestamp_ms(&self) -> Option<u32> {
        self.position_ms
    }

    pub fn previous_position(&self) -> Vector2 {
        self.previous
    }

    /// Signed speed along the heading in mm/s.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_station::BaseStationInfo;
    use approx::assert_abs_diff_eq;
    use core::f64::consts::PI;

    /// Sweep ticks that make an upright lighthouse at `lighthouse` see `target`.
    fn ticks_towards(lighthouse: [f64; 3], target: [f64; 2], phase: [f64; 2]) -> [u32; 2] {
        let dx = target[0] - lighthouse[0];
        let dy = target[1] - lighthouse[1];
        let dz = -lighthouse[2];
        let angles = [(-dx / dy).atan(), (dz / dy).atan()];
        let fov = 2.0 * PI / 3.0;
        [0, 1].map(|i| (((angles[i] - phase[i]) / fov + 0.5) * 266_667.0).round() as u32)
    }

    fn upright_pose(height: f32) -> LighthousePose {
        LighthousePose::from_accel_dir([0, 127, 0], height)
    }

    #[test]
    fn resolves_point_seen_by_upright_lighthouse() {
        let cfg = LighthouseConfig::default();
        let pose = upright_pose(902.0);
        for target in [[100.0, 1500.0], [-350.0, 900.0], [0.0, 2500.0]] {
            let ticks = ticks_towards([0.0, 0.0, 902.0], target, [0.0; 2]);
            let p = resolve_position(ticks, [0.0; 2], &pose, &cfg).unwrap();
            assert_abs_diff_eq!(p.x, target[0] as f32, epsilon = 0.5);
            assert_abs_diff_eq!(p.y, target[1] as f32, epsilon = 0.5);
        }
    }

    #[test]
    fn phase_calibration_shifts_the_angle() {
        let cfg = LighthouseConfig::default();
        let pose = upright_pose(902.0);
        let phase: [f32; 2] = [0.01, -0.02];
        let ticks = ticks_towards([0.0, 0.0, 902.0], [200.0, 1200.0], phase.map(f64::from));

        let corrected = resolve_position(ticks, phase, &pose, &cfg).unwrap();
        assert_abs_diff_eq!(corrected.x, 200.0, epsilon = 0.5);
        assert_abs_diff_eq!(corrected.y, 1200.0, epsilon = 0.5);

        let raw = resolve_position(ticks, [0.0; 2], &pose, &cfg).unwrap();
        assert!((raw - corrected).length() > 5.0);
    }

    #[test]
    fn ray_above_the_horizon_has_no_fix() {
        let cfg = LighthouseConfig::default();
        let pose = upright_pose(902.0);
        // Y sweep past the middle points upward
        assert_eq!(resolve_position([133_333, 200_000], [0.0; 2], &pose, &cfg), None);
    }

    fn ready_base(cfg: &LighthouseConfig) -> BaseStation {
        let mut base = BaseStation::new();
        let info = BaseStationInfo {
            accel_dir: [0, 127, 0],
            ..Default::default()
        };
        base.apply_info_block(&info.to_bytes(), cfg);
        base
    }

    fn cycles(ticks: [u32; 2], at_ms: [Option<u32>; 2]) -> [CycleData; 2] {
        [0, 1].map(|i| CycleData {
            sync_ticks: 3_000,
            sweep_ticks: ticks[i],
            sweep_hit_ms: at_ms[i],
            ..Default::default()
        })
    }

    #[test]
    fn fix_needs_both_axes_and_a_newer_timestamp() {
        let cfg = LighthouseConfig::default();
        let base = ready_base(&cfg);
        let ticks = ticks_towards([0.0, 0.0, 902.0], [0.0, 1000.0], [0.0; 2]);
        let mut sensor = SensorPosition::new();

        assert!(!sensor.update_from_fix(&cycles(ticks, [Some(10), None]), &base, &cfg));
        assert!(!sensor.update_from_fix(&cycles(ticks, [Some(10), Some(12)]), &BaseStation::new(), &cfg));

        assert!(sensor.update_from_fix(&cycles(ticks, [Some(10), Some(12)]), &base, &cfg));
        assert_eq!(sensor.timestamp_ms(), Some(12));
        assert_abs_diff_eq!(sensor.position().y, 1000.0, epsilon = 0.5);

        // Same sweep hits again: nothing to do
        assert!(!sensor.update_from_fix(&cycles(ticks, [Some(12), Some(11)]), &base, &cfg));
    }

    #[test]
    fn velocity_sign_follows_heading() {
        let heading = Vector2::new(0.0, 1.0);

        let mut forward = SensorPosition::new();
        forward.record(Vector2::new(0.0, 1000.0), 100);
        forward.record(Vector2::new(0.0, 1010.0), 150);
        forward.recalculate_velocity(heading);
        assert_abs_diff_eq!(forward.velocity(), 200.0, epsilon = 1e-3);

        let mut backward = SensorPosition::new();
        backward.record(Vector2::new(0.0, 1000.0), 100);
        backward.record(Vector2::new(0.0, 990.0), 150);
        backward.recalculate_velocity(heading);
        assert_abs_diff_eq!(backward.velocity(), -200.0, epsilon = 1e-3);
    }

    #[test]
    fn velocity_waits_for_history_and_new_positions() {
        let heading = Vector2::new(1.0, 0.0);
        let mut sensor = SensorPosition::new();
        sensor.record(Vector2::new(0.0, 0.0), 100);
        sensor.recalculate_velocity(heading);
        assert_eq!(sensor.velocity(), 0.0);

        sensor.record(Vector2::new(5.0, 0.0), 110);
        sensor.recalculate_velocity(heading);
        assert_abs_diff_eq!(sensor.velocity(), 500.0, epsilon = 1e-3);

        // Same position timestamp: velocity stays
        sensor.recalculate_velocity(Vector2::new(-1.0, 0.0));
        assert_abs_diff_eq!(sensor.velocity(), 500.0, epsilon = 1e-3);

        // Zero elapsed time is skipped
        sensor.record(Vector2::new(9.0, 0.0), 110);
        sensor.recalculate_velocity(heading);
        assert_abs_diff_eq!(sensor.velocity(), 500.0, epsilon = 1e-3);
    }

    #[test]
    fn estimate_repeats_turned_movement() {
        let mut sensor = SensorPosition::new();
        sensor.estimate(0.0, 5);
        assert_eq!(sensor.timestamp_ms(), None);

        sensor.record(Vector2::new(0.0, 0.0), 10);
        sensor.record(Vector2::new(0.0, 10.0), 20);
        // Robot turned left by 90 degrees
        sensor.estimate(core::f32::consts::FRAC_PI_2, 25);

        assert_eq!(sensor.timestamp_ms(), Some(25));
        assert_abs_diff_eq!(sensor.position().x, -10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sensor.position().y, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sensor.previous_position().y, 10.0, epsilon = 1e-4);
    }
}
