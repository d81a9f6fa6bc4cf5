// One lighthouse photodiode: edge decoding plus position tracking.
// The capture interrupt owns the producer half of the sensor's edge queue,
// the control loop drains the consumer half through `poll`.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod decoder;
pub mod ootx;
pub mod position;

pub use decoder::{CycleData, PendingEdge, SignalDecoder};
pub use ootx::OotxDecoder;
pub use position::{resolve_position, SensorPosition};

use crate::base_station::BaseStation;
use crate::config::LighthouseConfig;
use crate::edge_queue::EdgeConsumer;
use crate::fault::{FaultCounters, SignalFault};
use crate::math_float::Vector2;
use crate::{Axis, SensorSide};

/// Decoder and position state of one photodiode.
#[derive(Debug)]
pub struct LighthouseSensor {
    decoder: SignalDecoder,
    position: SensorPosition,
    dropped_seen: u32, // Queue drop counter value already reported
}

impl LighthouseSensor {
    pub const fn new(side: SensorSide) -> Self {
        Self {
            decoder: SignalDecoder::new(side),
            position: SensorPosition::new(),
            dropped_seen: 0,
        }
    }

    /// Drains every queued edge through the decoder.
    ///
    /// # Returns
    /// Number of edges processed
    pub fn poll<const N: usize>(
        &mut self,
        edges: &mut EdgeConsumer<'_, N>,
        now_ms: u32,
        base: &mut BaseStation,
        config: &LighthouseConfig,
    ) -> usize {
        let mut processed = 0;
        while let Some(tick) = edges.pop() {
            self.decoder.process_edge(tick, now_ms, base, config);
            processed += 1;
        }

        let dropped = edges.dropped();
        let missed = dropped.wrapping_sub(self.dropped_seen);
        if missed != 0 {
            self.dropped_seen = dropped;
            self.decoder.record_faults(SignalFault::QueueOverflow, missed);
            warn!("LIGHTHOUSE: {} edges dropped, queue full", missed);
        }
        processed
    }

    /// Refreshes the position: a new fix when both axes have signal,
    /// dead reckoning otherwise.
    pub fn update_position(
        &mut self,
        base: &BaseStation,
        config: &LighthouseConfig,
        turn_rad: f32,
        now_ms: u32,
    ) {
        if self.decoder.has_fix() {
            self.position
                .update_from_fix(self.decoder.cycles(), base, config);
        } else {
            self.position.estimate(turn_rad, now_ms);
        }
    }

    pub fn recalculate_velocity(&mut self, heading: Vector2) {
        self.position.recalculate_velocity(heading);
    }

    pub fn has_fix(&self) -> bool {
        self.decoder.has_fix()
    }

    pub fn position(&self) -> &SensorPosition {
        &self.position
    }

    pub fn velocity(&self) -> f32 {
        self.position.velocity()
    }

    pub fn cycle(&self, axis: Axis) -> &CycleData {
        self.decoder.cycle(axis)
    }

    pub fn decoder(&self) -> &SignalDecoder {
        &self.decoder
    }

    pub fn faults(&self) -> &FaultCounters {
        self.decoder.faults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_queue::EdgeQueue;

    #[test]
    fn poll_drains_queue_and_counts_overflow() {
        let config = LighthouseConfig::default();
        let mut base = BaseStation::new();
        let mut sensor = LighthouseSensor::new(SensorSide::Left);
        let mut queue: EdgeQueue<4> = EdgeQueue::new();
        let (mut tx, mut rx) = queue.split();

        for tick in [0, 3_000, 70_000, 70_100, 90_000] {
            let _ = tx.push(tick);
        }
        assert_eq!(sensor.poll(&mut rx, 1, &mut base, &config), 3);
        assert_eq!(sensor.faults().count(SignalFault::QueueOverflow), 2);
        assert_eq!(sensor.decoder().pending_edge(), PendingEdge::SweepFalling);

        // Already reported drops are not counted twice
        assert_eq!(sensor.poll(&mut rx, 2, &mut base, &config), 0);
        assert_eq!(sensor.faults().count(SignalFault::QueueOverflow), 2);
    }
}
