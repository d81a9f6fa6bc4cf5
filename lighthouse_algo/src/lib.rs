#![cfg_attr(not(test), no_std)]

// Lighthouse optical positioning for a two sensor mobile robot.
// Captured photodiode edges go in, robot position, heading and velocity come out.

// Key Features:
// - Lock-free edge queues between the capture interrupt and the control loop
// - Sync / sweep pulse decoding with OOTX telemetry extraction
// - Base station calibration and pose from the telemetry info block
// - Sensor position by ray / plane intersection, dead reckoning on signal loss

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#[macro_use]
mod fmt;

pub mod base_station;
pub mod config;
pub mod edge_queue;
pub mod fault;
pub mod math_float;
pub mod math_integer;
pub mod pose_record;
pub mod robot_pose;
pub mod sensor;

use base_station::BaseStation;
use config::LighthouseConfig;
use edge_queue::EdgeConsumer;
use pose_record::{PoseRecord, PoseSource};
use robot_pose::RobotPose;
use sensor::LighthouseSensor;

/// Sweep axis, one per base station rotor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }

    /// Axis swept next.
    #[inline(always)]
    pub const fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// Mounting side of a photodiode, seen from behind the robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorSide {
    Right,
    Left,
}

/// Complete receiver: both sensors, the shared base station and the robot pose.
#[derive(Debug)]
pub struct Lighthouse {
    config: LighthouseConfig,
    base_station: BaseStation,
    right: LighthouseSensor,
    left: LighthouseSensor,
    robot: RobotPose,
}

impl Lighthouse {
    pub const fn new(config: LighthouseConfig) -> Self {
        Self {
            config,
            base_station: BaseStation::new(),
            right: LighthouseSensor::new(SensorSide::Right),
            left: LighthouseSensor::new(SensorSide::Left),
            robot: RobotPose::new(),
        }
    }

    /// Decodes every edge queued for one sensor. Call once per control tick per sensor.
    ///
    /// # Arguments
    /// * `side` - Sensor the queue belongs to
    /// * `edges` - Consumer half of that sensor's edge queue
    /// * `now_ms` - Current time, stamped on sweep hits
    ///
    /// # Returns
    /// Number of edges processed
    pub fn poll<const N: usize>(
        &mut self,
        side: SensorSide,
        edges: &mut EdgeConsumer<'_, N>,
        now_ms: u32,
    ) -> usize {
        let sensor = match side {
            SensorSide::Right => &mut self.right,
            SensorSide::Left => &mut self.left,
        };
        sensor.poll(edges, now_ms, &mut self.base_station, &self.config)
    }

    /// Per tick pose update: sensor positions, robot pose, then velocities.
    pub fn recalculate(&mut self, now_ms: u32) {
        let turn = self.robot.turn();
        for sensor in [&mut self.left, &mut self.right] {
            sensor.update_position(&self.base_station, &self.config, turn, now_ms);
        }

        self.robot
            .update(self.left.position(), self.right.position());

        let heading = self.robot.heading();
        self.left.recalculate_velocity(heading);
        self.right.recalculate_velocity(heading);
    }

    /// Forgets the received telemetry; the next OOTX frame recomputes the lighthouse pose.
    pub fn invalidate_base_station(&mut self) {
        self.base_station.invalidate();
    }

    /// Latest pose samples of both sensors and the robot, for streaming.
    pub fn pose_records(&self) -> [Option<PoseRecord>; 3] {
        let record = |source, at_ms: Option<u32>, position| {
            at_ms.map(|at_ms| PoseRecord::new(source, at_ms, position))
        };
        [
            record(
                PoseSource::RightSensor,
                self.right.position().timestamp_ms(),
                self.right.position().position(),
            ),
            record(
                PoseSource::LeftSensor,
                self.left.position().timestamp_ms(),
                self.left.position().position(),
            ),
            record(PoseSource::Robot, self.robot.timestamp_ms(), self.robot.position()),
        ]
    }

    pub fn robot(&self) -> &RobotPose {
        &self.robot
    }

    pub fn sensor(&self, side: SensorSide) -> &LighthouseSensor {
        match side {
            SensorSide::Right => &self.right,
            SensorSide::Left => &self.left,
        }
    }

    pub fn base_station(&self) -> &BaseStation {
        &self.base_station
    }

    pub fn config(&self) -> &LighthouseConfig {
        &self.config
    }
}
