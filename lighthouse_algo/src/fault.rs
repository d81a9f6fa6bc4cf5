// Non-fatal receiver faults.
// Every fault is self-healing: the state machines resynchronize on their own and
// the only cost is a stale position or a delayed telemetry block. Faults are
// counted per sensor so the control loop can judge link quality.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Recoverable conditions detected while decoding one sensor channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalFault {
    /// Sync pulse width outside the single base station band.
    SignalLoss,
    /// Sweep pulse did not arrive inside the visible sweep window.
    MissedSweep,
    /// Sync pulse announced a different axis than the one being tracked.
    AxisDesync,
    /// OOTX sync bit missing at its 17th bit position.
    FrameSyncError,
    /// OOTX payload length does not match the base station info block.
    UnrecognizedPayload,
    /// Capture interrupt found the edge queue full.
    QueueOverflow,
}

impl SignalFault {
    const COUNT: usize = 6;

    const fn index(self) -> usize {
        match self {
            SignalFault::SignalLoss => 0,
            SignalFault::MissedSweep => 1,
            SignalFault::AxisDesync => 2,
            SignalFault::FrameSyncError => 3,
            SignalFault::UnrecognizedPayload => 4,
            SignalFault::QueueOverflow => 5,
        }
    }
}

/// Saturating per-kind fault counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultCounters {
    counts: [u32; SignalFault::COUNT],
}

impl FaultCounters {
    pub const fn new() -> Self {
        Self {
            counts: [0; SignalFault::COUNT],
        }
    }

    pub fn record(&mut self, fault: SignalFault) {
        self.record_n(fault, 1);
    }

    pub fn record_n(&mut self, fault: SignalFault, n: u32) {
        let slot = &mut self.counts[fault.index()];
        *slot = slot.saturating_add(n);
    }

    pub fn count(&self, fault: SignalFault) -> u32 {
        self.counts[fault.index()]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().fold(0u32, |acc, c| acc.saturating_add(*c))
    }

    pub fn clear(&mut self) {
        self.counts = [0; SignalFault::COUNT];
    }
}
