// Base station info block: the OOTX payload carrying firmware, identity and
// factory calibration of a lighthouse.
//
// Wire layout, 33 bytes, little endian, no padding:
//
// | offset | field            | type |
// |-------:|------------------|------|
// |      0 | fw_version       | u16  |
// |      2 | id               | u32  |
// |      6 | fcal_0_phase     | f16  |
// |      8 | fcal_1_phase     | f16  |
// |     10 | fcal_0_tilt      | f16  |
// |     12 | fcal_1_tilt      | f16  |
// |     14 | sys_unlock_count | u8   |
// |     15 | hw_version       | u8   |
// |     16 | fcal_0_curve     | f16  |
// |     18 | fcal_1_curve     | f16  |
// |     20 | accel_dir_x      | i8   |
// |     21 | accel_dir_y      | i8   |
// |     22 | accel_dir_z      | i8   |
// |     23 | fcal_0_gibphase  | f16  |
// |     25 | fcal_1_gibphase  | f16  |
// |     27 | fcal_0_gibmag    | f16  |
// |     29 | fcal_1_gibmag    | f16  |
// |     31 | mode_current     | u8   |
// |     32 | sys_faults       | u8   |

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::fmt;

use crate::math_float::half_float::f16_to_f32;
use crate::Axis;

/// Size of the info block payload in bytes.
pub const INFO_BLOCK_SIZE: usize = 33;

const FW_VERSION: usize = 0;
const ID: usize = 2;
const FCAL_PHASE: usize = 6;
const FCAL_TILT: usize = 10;
const SYS_UNLOCK_COUNT: usize = 14;
const HW_VERSION: usize = 15;
const FCAL_CURVE: usize = 16;
const ACCEL_DIR: usize = 20;
const FCAL_GIBPHASE: usize = 23;
const FCAL_GIBMAG: usize = 27;
const MODE_CURRENT: usize = 31;
const SYS_FAULTS: usize = 32;

/// Raised when a byte slice cannot hold an info block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InfoBlockError {
    Length { expected: usize, actual: usize },
}

impl fmt::Display for InfoBlockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InfoBlockError::Length { expected, actual } => {
                write!(f, "info block must be {expected} bytes, got {actual}")
            }
        }
    }
}

/// Factory calibration of one rotor, converted to radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotorCalibration {
    pub phase: f32,
    pub tilt: f32,
    pub curve: f32,
    pub gibbous_phase: f32,
    pub gibbous_magnitude: f32,
}

/// Decoded base station info block. Calibration fields stay in their raw
/// half precision form, see [`BaseStationInfo::rotor_calibration`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaseStationInfo {
    pub fw_version: u16,
    pub id: u32,
    pub fcal_phase: [u16; 2],     // Indexed by rotor: 0 = X, 1 = Y
    pub fcal_tilt: [u16; 2],
    pub sys_unlock_count: u8,
    pub hw_version: u8,
    pub fcal_curve: [u16; 2],
    pub accel_dir: [i8; 3],       // Lighthouse "up" in its own frame: x left(+), y up(+), z front(+)
    pub fcal_gibphase: [u16; 2],
    pub fcal_gibmag: [u16; 2],
    pub mode_current: u8,
    pub sys_faults: u8,
}

impl BaseStationInfo {
    /// Deserializes a complete block field by field.
    pub fn from_bytes(block: &[u8; INFO_BLOCK_SIZE]) -> Self {
        let u16_at = |o: usize| u16::from_le_bytes([block[o], block[o + 1]]);
        let pair_at = |o: usize| [u16_at(o), u16_at(o + 2)];

        Self {
            fw_version: u16_at(FW_VERSION),
            id: u32::from_le_bytes([block[ID], block[ID + 1], block[ID + 2], block[ID + 3]]),
            fcal_phase: pair_at(FCAL_PHASE),
            fcal_tilt: pair_at(FCAL_TILT),
            sys_unlock_count: block[SYS_UNLOCK_COUNT],
            hw_version: block[HW_VERSION],
            fcal_curve: pair_at(FCAL_CURVE),
            accel_dir: [
                block[ACCEL_DIR] as i8,
                block[ACCEL_DIR + 1] as i8,
                block[ACCEL_DIR + 2] as i8,
            ],
            fcal_gibphase: pair_at(FCAL_GIBPHASE),
            fcal_gibmag: pair_at(FCAL_GIBMAG),
            mode_current: block[MODE_CURRENT],
            sys_faults: block[SYS_FAULTS],
        }
    }

    /// Serializes into the wire layout.
    pub fn to_bytes(&self) -> [u8; INFO_BLOCK_SIZE] {
        let mut block = [0u8; INFO_BLOCK_SIZE];
        let mut put = |o: usize, bytes: &[u8]| block[o..o + bytes.len()].copy_from_slice(bytes);

        put(FW_VERSION, &self.fw_version.to_le_bytes());
        put(ID, &self.id.to_le_bytes());
        for rotor in 0..2 {
            put(FCAL_PHASE + 2 * rotor, &self.fcal_phase[rotor].to_le_bytes());
            put(FCAL_TILT + 2 * rotor, &self.fcal_tilt[rotor].to_le_bytes());
            put(FCAL_CURVE + 2 * rotor, &self.fcal_curve[rotor].to_le_bytes());
            put(FCAL_GIBPHASE + 2 * rotor, &self.fcal_gibphase[rotor].to_le_bytes());
            put(FCAL_GIBMAG + 2 * rotor, &self.fcal_gibmag[rotor].to_le_bytes());
        }
        put(SYS_UNLOCK_COUNT, &[self.sys_unlock_count]);
        put(HW_VERSION, &[self.hw_version]);
        put(ACCEL_DIR, &self.accel_dir.map(|v| v as u8));
        put(MODE_CURRENT, &[self.mode_current]);
        put(SYS_FAULTS, &[self.sys_faults]);
        block
    }

    /// Factory calibration of the rotor sweeping `axis`, widened to `f32`.
    pub fn rotor_calibration(&self, axis: Axis) -> RotorCalibration {
        let i = axis.index();
        RotorCalibration {
            phase: f16_to_f32(self.fcal_phase[i]),
            tilt: f16_to_f32(self.fcal_tilt[i]),
            curve: f16_to_f32(self.fcal_curve[i]),
            gibbous_phase: f16_to_f32(self.fcal_gibphase[i]),
            gibbous_magnitude: f16_to_f32(self.fcal_gibmag[i]),
        }
    }
}

impl TryFrom<&[u8]> for BaseStationInfo {
    type Error = InfoBlockError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let block: &[u8; INFO_BLOCK_SIZE] = bytes.try_into().map_err(|_| InfoBlockError::Length {
            expected: INFO_BLOCK_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Block captured from a real base station (calibration in radians)
    const SAMPLE: [u8; INFO_BLOCK_SIZE] = [
        0x36, 0x02, // fw_version 566
        0x78, 0x56, 0x34, 0x12, // id
        0xfd, 0x24, 0x8a, 0x30, // phase X, Y
        0x96, 0x15, 0xa2, 0x90, // tilt X, Y
        0x03, // unlock count
        0x0a, // hw version
        0x1d, 0x8b, 0x8a, 0x10, // curve X, Y
        0x00, 0x7f, 0x00, // accel dir
        0x6b, 0x3e, 0xa5, 0x33, // gibbous phase X, Y
        0x76, 0x26, 0xbc, 0x9f, // gibbous magnitude X, Y
        0x01, // mode
        0x00, // faults
    ];

    #[test]
    fn fields_land_on_documented_offsets() {
        let info = BaseStationInfo::from_bytes(&SAMPLE);
        assert_eq!(info.fw_version, 566);
        assert_eq!(info.id, 0x1234_5678);
        assert_eq!(info.fcal_phase, [0x24fd, 0x308a]);
        assert_eq!(info.fcal_tilt, [0x1596, 0x90a2]);
        assert_eq!(info.sys_unlock_count, 3);
        assert_eq!(info.hw_version, 10);
        assert_eq!(info.fcal_curve, [0x8b1d, 0x108a]);
        assert_eq!(info.accel_dir, [0, 127, 0]);
        assert_eq!(info.fcal_gibphase, [0x3e6b, 0x33a5]);
        assert_eq!(info.fcal_gibmag, [0x2676, 0x9fbc]);
        assert_eq!(info.mode_current, 1);
        assert_eq!(info.sys_faults, 0);
        assert_eq!(info.to_bytes(), SAMPLE);
    }

    #[test]
    fn signed_accelerometer_bytes() {
        let mut raw = SAMPLE;
        raw[ACCEL_DIR..ACCEL_DIR + 3].copy_from_slice(&[0x81, 0xff, 0x40]);
        let info = BaseStationInfo::from_bytes(&raw);
        assert_eq!(info.accel_dir, [-127, -1, 64]);
    }

    #[test]
    fn rotor_calibration_is_widened() {
        let info = BaseStationInfo::from_bytes(&SAMPLE);
        let x = info.rotor_calibration(Axis::X);
        let y = info.rotor_calibration(Axis::Y);
        assert_eq!(x.phase, f16_to_f32(0x24fd));
        assert_eq!(y.tilt, f16_to_f32(0x90a2));
        assert!(x.curve < 0.0);
        assert!(y.gibbous_magnitude < 0.0);
        assert!(x.phase > 0.019 && x.phase < 0.0196);
    }

    #[test]
    fn rejects_wrong_length() {
        let short = &SAMPLE[..20];
        assert_eq!(
            BaseStationInfo::try_from(short),
            Err(InfoBlockError::Length { expected: 33, actual: 20 })
        );
        assert!(BaseStationInfo::try_from(&SAMPLE[..]).is_ok());
    }
}
