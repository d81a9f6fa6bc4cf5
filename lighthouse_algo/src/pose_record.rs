// Fixed size pose sample streamed to the host plotter over RTT.
//
// Layout, 13 bytes, little endian:
// | offset | field        | type |
// |-------:|--------------|------|
// |      0 | id           | u8   |
// |      1 | timestamp_ms | u32  |
// |      5 | x_mm         | f32  |
// |      9 | y_mm         | f32  |

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_float::Vector2;
use crate::SensorSide;

pub const POSE_RECORD_SIZE: usize = 13;

/// What a pose record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PoseSource {
    RightSensor = 0,
    LeftSensor = 1,
    Robot = 2,
}

impl PoseSource {
    pub const ALL: [PoseSource; 3] = [PoseSource::RightSensor, PoseSource::LeftSensor, PoseSource::Robot];

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|source| *source as u8 == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            PoseSource::RightSensor => "right sensor",
            PoseSource::LeftSensor => "left sensor",
            PoseSource::Robot => "robot",
        }
    }
}

impl From<SensorSide> for PoseSource {
    fn from(side: SensorSide) -> Self {
        match side {
            SensorSide::Right => PoseSource::RightSensor,
            SensorSide::Left => PoseSource::LeftSensor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PoseRecord {
    pub id: u8,
    pub timestamp_ms: u32,
    pub x_mm: f32,
    pub y_mm: f32,
}

impl PoseRecord {
    pub fn new(source: PoseSource, timestamp_ms: u32, position: Vector2) -> Self {
        Self {
            id: source as u8,
            timestamp_ms,
            x_mm: position.x,
            y_mm: position.y,
        }
    }

    pub fn source(&self) -> Option<PoseSource> {
        PoseSource::from_id(self.id)
    }

    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x_mm, self.y_mm)
    }

    pub fn to_bytes(&self) -> [u8; POSE_RECORD_SIZE] {
        let mut out = [0u8; POSE_RECORD_SIZE];
        out[0] = self.id;
        out[1..5].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        out[5..9].copy_from_slice(&self.x_mm.to_le_bytes());
        out[9..13].copy_from_slice(&self.y_mm.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; POSE_RECORD_SIZE]) -> Self {
        let word = |o: usize| [bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]];
        Self {
            id: bytes[0],
            timestamp_ms: u32::from_le_bytes(word(1)),
            x_mm: f32::from_le_bytes(word(5)),
            y_mm: f32::from_le_bytes(word(9)),
        }
    }
}
