// Pulse decoder for one photodiode.
// Consumes captured edges in order and tracks where we are inside the
// sync / sweep cycle of the base station:
//
//   sync rising -> sync falling -> sweep rising -> sweep falling -> (other axis) ...
//
// Sync pulse widths select the axis of the upcoming sweep and carry one OOTX
// bit each. The sweep rising edge, measured from the sync rising edge, gives
// the sweep angle of the sensor on that axis.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::base_station::BaseStation;
use crate::config::LighthouseConfig;
use crate::fault::{FaultCounters, SignalFault};
use crate::math_integer::ticks::delta_ticks;
use crate::{Axis, SensorSide};

use super::ootx::OotxDecoder;

/// Edge the decoder expects next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingEdge {
    SyncRising,
    SyncFalling,
    SweepRising,
    SweepFalling,
}

/// Latest sweep measurement of one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleData {
    pub pending_sync_ticks: u32,  // Width of the sync pulse awaiting its sweep
    pub sync_ticks: u32,          // Width of the sync pulse of the committed sweep
    pub sweep_ticks: u32,         // Sweep hit measured from the start of the visible sweep
    pub sweep_hit_ms: Option<u32>,// Time of the sweep hit, None when the axis has no signal
}

impl CycleData {
    pub const EMPTY: CycleData = CycleData {
        pending_sync_ticks: 0,
        sync_ticks: 0,
        sweep_ticks: 0,
        sweep_hit_ms: None,
    };

    /// `true` while the measurement belongs to a live signal.
    pub fn is_valid(&self) -> bool {
        self.sweep_hit_ms.is_some()
    }
}

/// Sync / sweep state machine of one sensor channel.
#[derive(Debug)]
pub struct SignalDecoder {
    side: SensorSide,
    pending: PendingEdge,
    axis: Option<Axis>,   // Axis of the cycle being tracked
    previous_tick: u32,
    cycles: [CycleData; 2],
    ootx: OotxDecoder,
    faults: FaultCounters,
}

impl SignalDecoder {
    pub const fn new(side: SensorSide) -> Self {
        Self {
            side,
            pending: PendingEdge::SyncRising,
            axis: None,
            previous_tick: 0,
            cycles: [CycleData::EMPTY; 2],
            ootx: OotxDecoder::new(),
            faults: FaultCounters::new(),
        }
    }

    /// Advances the state machine by one captured edge.
    ///
    /// # Arguments
    /// * `tick` - Capture timestamp, 24 bit counter domain
    /// * `now_ms` - Current time, stamped on sweep hits
    /// * `base` - Receives the info block when an OOTX frame completes
    /// * `config` - Pulse thresholds
    pub fn process_edge(
        &mut self,
        tick: u32,
        now_ms: u32,
        base: &mut BaseStation,
        config: &LighthouseConfig,
    ) {
        let delta = delta_ticks(self.previous_tick, tick);
        match self.pending {
            PendingEdge::SyncRising => self.pending = PendingEdge::SyncFalling,
            PendingEdge::SyncFalling => self.on_sync_pulse(delta, base, config),
            PendingEdge::SweepRising => self.on_sweep_hit(delta, now_ms, config),
            PendingEdge::SweepFalling => {
                // Sweeps alternate between the two rotors
                self.axis = self.axis.map(Axis::other);
                self.pending = PendingEdge::SyncRising;
            }
        }
        self.previous_tick = tick;
    }

    fn on_sync_pulse(&mut self, width: u32, base: &mut BaseStation, config: &LighthouseConfig) {
        let Some(axis) = config.classify_sync(width) else {
            // Not a single base station sync pulse, stay in SyncFalling
            if let Some(lost) = self.axis.take() {
                self.cycles[lost.index()].sweep_hit_ms = None;
                self.report(SignalFault::SignalLoss);
            }
            return;
        };

        if base.is_ready() {
            // Bits are skipped from here on, a later frame must start clean
            self.ootx.reset();
        } else {
            match self.ootx.push_bit(config.ootx_bit(width)) {
                Ok(Some(block)) => {
                    info!("LIGHTHOUSE: {} sensor received base station info block", self.side);
                    base.apply_info_block(block, config);
                }
                Ok(None) => {}
                Err(fault) => {
                    self.faults.record(fault);
                    warn!("LIGHTHOUSE: {} sensor {}", self.side, fault);
                }
            }
        }

        if let Some(tracked) = self.axis {
            if tracked != axis {
                // The sweep of the tracked axis was skipped
                self.cycles[tracked.index()] = CycleData::default();
                self.report(SignalFault::AxisDesync);
            }
        }

        self.axis = Some(axis);
        self.cycles[axis.index()].pending_sync_ticks = width;
        self.pending = PendingEdge::SweepRising;
    }

    fn on_sweep_hit(&mut self, delta: u32, now_ms: u32, config: &LighthouseConfig) {
        let Some(axis) = self.axis else {
            self.pending = PendingEdge::SyncFalling;
            return;
        };
        let cycle = &mut self.cycles[axis.index()];

        // Sweep position relative to the start of the visible sweep
        let sweep_ticks = (cycle.pending_sync_ticks + delta)
            .checked_sub(config.sweep_start_ticks)
            .filter(|ticks| *ticks < config.sweep_duration_ticks);

        match sweep_ticks {
            Some(sweep_ticks) => {
                cycle.sync_ticks = cycle.pending_sync_ticks;
                cycle.pending_sync_ticks = 0;
                cycle.sweep_ticks = sweep_ticks;
                cycle.sweep_hit_ms = Some(now_ms);
                self.pending = PendingEdge::SweepFalling;
            }
            None => {
                *cycle = CycleData::default();
                self.axis = None;
                self.pending = PendingEdge::SyncFalling;
                self.report(SignalFault::MissedSweep);
            }
        }
    }

    fn report(&mut self, fault: SignalFault) {
        self.faults.record(fault);
        warn!("LIGHTHOUSE: {} sensor {}", self.side, fault);
    }

    /// Records faults detected outside the state machine, e.g. queue overflows.
    pub fn record_faults(&mut self, fault: SignalFault, count: u32) {
        self.faults.record_n(fault, count);
    }

    /// `true` when both axes hold a live sweep measurement.
    pub fn has_fix(&self) -> bool {
        self.cycles.iter().all(CycleData::is_valid)
    }

    pub fn cycle(&self, axis: Axis) -> &CycleData {
        &self.cycles[axis.index()]
    }

    pub fn cycles(&self) -> &[CycleData; 2] {
        &self.cycles
    }

    pub fn pending_edge(&self) -> PendingEdge {
        self.pending
    }

    pub fn tracked_axis(&self) -> Option<Axis> {
        self.axis
    }

    pub fn faults(&self) -> &FaultCounters {
        &self.faults
    }

    pub fn ootx(&self) -> &OotxDecoder {
        &self.ootx
    }
}
