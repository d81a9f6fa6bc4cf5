// Base station state shared by both sensors.
// Holds the decoded info block, the per-rotor factory calibration and the
// lighthouse pose derived from it. Populated by whichever sensor finishes an
// OOTX frame first, then kept until explicitly invalidated.

// Key Features:
// - Field-by-field decode of the 33-byte info block (see `info_block`)
// - Half precision calibration widened once on arrival
// - Lighthouse orientation and offset computed once per received block

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod info_block;
pub mod pose;

pub use info_block::{BaseStationInfo, InfoBlockError, RotorCalibration, INFO_BLOCK_SIZE};
pub use pose::LighthousePose;

use crate::config::LighthouseConfig;
use crate::Axis;

#[derive(Clone, Copy, Debug, Default)]
struct Telemetry {
    info: BaseStationInfo,
    rotors: [RotorCalibration; 2],
    pose: LighthousePose,
}

/// Calibration and placement of the single tracked base station.
#[derive(Debug, Default)]
pub struct BaseStation {
    telemetry: Option<Telemetry>, // None until the first info block arrives
}

impl BaseStation {
    pub const fn new() -> Self {
        Self { telemetry: None }
    }

    /// Decodes a completed info block and recomputes the lighthouse pose.
    pub fn apply_info_block(&mut self, block: &[u8; INFO_BLOCK_SIZE], config: &LighthouseConfig) {
        let info = BaseStationInfo::from_bytes(block);
        let rotors = [
            info.rotor_calibration(Axis::X),
            info.rotor_calibration(Axis::Y),
        ];
        let pose = LighthousePose::from_accel_dir(info.accel_dir, config.sensor_plane_distance_mm());

        info!(
            "LIGHTHOUSE: base station {=u32:x} fw {} hw {}",
            info.id,
            info.fw_version,
            info.hw_version
        );
        for (axis, rotor) in ["X", "Y"].iter().zip(rotors.iter()) {
            info!(
                "LIGHTHOUSE: {} rotor phase {} tilt {} curve {} rad",
                axis,
                rotor.phase,
                rotor.tilt,
                rotor.curve
            );
        }
        info!(
            "LIGHTHOUSE: offset ({}, {}, {}) mm",
            pose.offset.x,
            pose.offset.y,
            pose.offset.z
        );

        self.telemetry = Some(Telemetry { info, rotors, pose });
    }

    /// `true` once an info block has been received.
    pub fn is_ready(&self) -> bool {
        self.telemetry.is_some()
    }

    /// Drops the received telemetry so the next OOTX frame is decoded again.
    pub fn invalidate(&mut self) {
        if self.telemetry.take().is_some() {
            debug!("LIGHTHOUSE: base station telemetry invalidated");
        }
    }

    pub fn info(&self) -> Option<&BaseStationInfo> {
        self.telemetry.as_ref().map(|t| &t.info)
    }

    pub fn pose(&self) -> Option<&LighthousePose> {
        self.telemetry.as_ref().map(|t| &t.pose)
    }

    pub fn rotor(&self, axis: Axis) -> Option<&RotorCalibration> {
        self.telemetry.as_ref().map(|t| &t.rotors[axis.index()])
    }
}
