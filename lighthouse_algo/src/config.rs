// Timing and mounting configuration for the lighthouse receiver.
// All pulse thresholds are expressed in capture timer ticks. The nominal values
// belong to a 48 MHz timer; other timer rates are handled by proportional scaling.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::Axis;

/// Capture timer rate the nominal tick constants were measured with.
pub const NOMINAL_TICK_RATE_HZ: u32 = 48_000_000;

// Each rotor turns 180 degrees every 400_000 ticks but the laser is only visible for 120 of them.
// The visible part starts 30/180 into the rotation...
const SWEEP_START_TICKS: u32 = 66_667;
// ...and lasts 120/180 of the rotation.
const SWEEP_DURATION_TICKS: u32 = 266_667;

const SYNC_PULSE_J0_MIN: u32 = 2_950; // X axis, OOTX bit 0
const SYNC_PULSE_K0_MIN: u32 = 3_450; // Y axis, OOTX bit 0
const SYNC_PULSE_J1_MIN: u32 = 3_950; // X axis, OOTX bit 1
const SYNC_PULSE_K1_MIN: u32 = 4_450; // Y axis, OOTX bit 1
const NONSYNC_PULSE_J2_MIN: u32 = 4_950; // first width that is no longer a sync pulse

const LIGHTHOUSE_CENTER_HEIGHT_MM: f32 = 940.0;
const SENSOR_HEIGHT_MM: f32 = 38.0;
const SWEEP_FIELD_OF_VIEW_RAD: f32 = 2.0 * core::f32::consts::FRAC_PI_3;

/// Receiver configuration shared by the decoder, the base station pose and the resolver.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LighthouseConfig {
    pub tick_rate_hz: u32,         // Capture timer frequency
    pub sweep_start_ticks: u32,    // Offset from sync rising edge to the visible sweep
    pub sweep_duration_ticks: u32, // Length of the visible sweep
    pub sync_j0_min: u32,
    pub sync_k0_min: u32,
    pub sync_j1_min: u32,
    pub sync_k1_min: u32,
    pub nonsync_j2_min: u32,

    pub lighthouse_height_mm: f32, // Lighthouse center above the floor
    pub sensor_height_mm: f32,     // Photodiodes above the floor
    pub sweep_fov_rad: f32,        // Angle covered by the visible sweep
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self::for_tick_rate(NOMINAL_TICK_RATE_HZ)
    }
}

impl LighthouseConfig {
    /// Builds a configuration for a capture timer running at `tick_rate_hz`.
    ///
    /// Every tick threshold is scaled from its 48 MHz nominal value, so pulse
    /// classification is identical regardless of the timer clock.
    pub const fn for_tick_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            sweep_start_ticks: scale_ticks(SWEEP_START_TICKS, tick_rate_hz),
            sweep_duration_ticks: scale_ticks(SWEEP_DURATION_TICKS, tick_rate_hz),
            sync_j0_min: scale_ticks(SYNC_PULSE_J0_MIN, tick_rate_hz),
            sync_k0_min: scale_ticks(SYNC_PULSE_K0_MIN, tick_rate_hz),
            sync_j1_min: scale_ticks(SYNC_PULSE_J1_MIN, tick_rate_hz),
            sync_k1_min: scale_ticks(SYNC_PULSE_K1_MIN, tick_rate_hz),
            nonsync_j2_min: scale_ticks(NONSYNC_PULSE_J2_MIN, tick_rate_hz),
            lighthouse_height_mm: LIGHTHOUSE_CENTER_HEIGHT_MM,
            sensor_height_mm: SENSOR_HEIGHT_MM,
            sweep_fov_rad: SWEEP_FIELD_OF_VIEW_RAD,
        }
    }

    /// Overrides the mounting geometry.
    pub fn with_mounting(mut self, lighthouse_height_mm: f32, sensor_height_mm: f32) -> Self {
        self.lighthouse_height_mm = lighthouse_height_mm;
        self.sensor_height_mm = sensor_height_mm;
        self
    }

    /// Distance between the lighthouse center and the plane of the photodiodes.
    pub fn sensor_plane_distance_mm(&self) -> f32 {
        self.lighthouse_height_mm - self.sensor_height_mm
    }

    /// Returns `true` if a pulse of this width is a sync pulse from a single base station.
    pub fn is_sync_pulse(&self, width: u32) -> bool {
        width >= self.sync_j0_min && width < self.nonsync_j2_min
    }

    /// Axis announced by a sync pulse, `None` if the width is outside the sync band.
    ///
    /// X: [J0, K0) and [J1, K1); Y: [K0, J1) and [K1, J2).
    pub fn classify_sync(&self, width: u32) -> Option<Axis> {
        if !self.is_sync_pulse(width) {
            return None;
        }
        if width < self.sync_k0_min || (width >= self.sync_j1_min && width < self.sync_k1_min) {
            Some(Axis::X)
        } else {
            Some(Axis::Y)
        }
    }

    /// OOTX data bit carried by a sync pulse of this width.
    pub fn ootx_bit(&self, width: u32) -> bool {
        width >= self.sync_j1_min
    }
}

const fn scale_ticks(ticks: u32, tick_rate_hz: u32) -> u32 {
    ((ticks as u64 * tick_rate_hz as u64) / NOMINAL_TICK_RATE_HZ as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_rate_keeps_reference_thresholds() {
        let cfg = LighthouseConfig::default();
        assert_eq!(cfg.sweep_start_ticks, 66_667);
        assert_eq!(cfg.sweep_duration_ticks, 266_667);
        assert_eq!(cfg.sync_j0_min, 2_950);
        assert_eq!(cfg.nonsync_j2_min, 4_950);
        assert!((cfg.sensor_plane_distance_mm() - 902.0).abs() < 1e-3);
    }

    #[test]
    fn sync_band_boundaries_classify_deterministically() {
        let cfg = LighthouseConfig::default();
        assert_eq!(cfg.classify_sync(2_949), None);
        assert_eq!(cfg.classify_sync(2_950), Some(Axis::X));
        assert_eq!(cfg.classify_sync(3_449), Some(Axis::X));
        assert_eq!(cfg.classify_sync(3_450), Some(Axis::Y));
        assert_eq!(cfg.classify_sync(3_949), Some(Axis::Y));
        assert_eq!(cfg.classify_sync(3_950), Some(Axis::X));
        assert_eq!(cfg.classify_sync(4_449), Some(Axis::X));
        assert_eq!(cfg.classify_sync(4_450), Some(Axis::Y));
        assert_eq!(cfg.classify_sync(4_949), Some(Axis::Y));
        assert_eq!(cfg.classify_sync(4_950), None);
    }

    #[test]
    fn ootx_bit_threshold() {
        let cfg = LighthouseConfig::default();
        assert!(!cfg.ootx_bit(3_000));
        assert!(!cfg.ootx_bit(3_949));
        assert!(cfg.ootx_bit(3_950));
        assert!(cfg.ootx_bit(4_500));
    }

    #[test]
    fn scaled_rate_classifies_like_nominal() {
        // A 96 MHz timer sees every pulse twice as long
        let cfg = LighthouseConfig::for_tick_rate(96_000_000);
        assert_eq!(cfg.sweep_duration_ticks, 533_334);
        assert_eq!(cfg.classify_sync(2 * 3_000), Some(Axis::X));
        assert_eq!(cfg.classify_sync(2 * 3_500), Some(Axis::Y));
        assert_eq!(cfg.classify_sync(2 * 4_000), Some(Axis::X));
        assert_eq!(cfg.classify_sync(2 * 5_000), None);
    }
}
