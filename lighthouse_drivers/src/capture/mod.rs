// Photodiode edge capture on TIM2.
// The timer runs free at the full timer clock with a 24 bit period, both
// channels capture rising and falling edges. Each capture raises the TIM2
// interrupt; the handler collects the timestamps with `take_captures`.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    clocks::Clocks,
    pac::TIM2,
    timer::{
        Alignment, CaptureCompareDma, CountDir, Timer, TimerConfig, TimerInterrupt, UpdateReqSrc,
    },
};

use super::pinout;

/// Capture counter period, matches the 24 bit tick domain of the decoder.
pub const COUNTER_MASK: u32 = 0x00FF_FFFF;

pub struct TimCapture {
    tim: Timer<TIM2>,
    tick_rate_hz: u32,
    overcaptures: u32, // Edges overwritten before the handler read them
}

impl TimCapture {
    pub fn new(tim2: TIM2, clock_cfg: &Clocks) -> Self {
        let mut timer = Timer::new_tim2(
            tim2,
            1.0,
            TimerConfig {
                one_pulse_mode: false,
                update_request_source: UpdateReqSrc::Any,
                auto_reload_preload: false,
                alignment: Alignment::Edge,
                capture_compare_dma: CaptureCompareDma::Update,
                direction: CountDir::Up,
            },
            clock_cfg,
        );
        // Count every timer clock, wrap at 2^24
        timer.set_prescaler(0);
        timer.set_auto_reload(COUNTER_MASK);

        pinout::sensors::RIGHT.init();
        pinout::sensors::LEFT.init();

        let regs = &timer.regs;
        // CC1 <- TI1, CC2 <- TI2, no input filter, no prescaler
        regs.ccmr1_input()
            .modify(|_, w| unsafe { w.cc1s().bits(0b01).cc2s().bits(0b01) });
        // CCxP = CCxNP = 1: capture on both edges
        regs.ccer().modify(|_, w| {
            w.cc1p()
                .set_bit()
                .cc1np()
                .set_bit()
                .cc1e()
                .set_bit()
                .cc2p()
                .set_bit()
                .cc2np()
                .set_bit()
                .cc2e()
                .set_bit()
        });

        timer.enable_interrupt(TimerInterrupt::CaptureCompare1);
        timer.enable_interrupt(TimerInterrupt::CaptureCompare2);
        timer.enable();

        TimCapture {
            tim: timer,
            tick_rate_hz: clock_cfg.apb1_timer(),
            overcaptures: 0,
        }
    }

    /// Pending capture of each channel, `[right, left]`.
    ///
    /// Reading a capture register clears its interrupt flag.
    pub fn take_captures(&mut self) -> [Option<u32>; 2] {
        let regs = &self.tim.regs;
        let sr = regs.sr().read();

        if sr.cc1of().bit_is_set() || sr.cc2of().bit_is_set() {
            self.overcaptures = self.overcaptures.wrapping_add(1);
            regs.sr()
                .modify(|_, w| w.cc1of().clear_bit().cc2of().clear_bit());
        }

        let right = sr
            .cc1if()
            .bit_is_set()
            .then(|| regs.ccr1().read().bits() & COUNTER_MASK);
        let left = sr
            .cc2if()
            .bit_is_set()
            .then(|| regs.ccr2().read().bits() & COUNTER_MASK);
        [right, left]
    }

    /// Capture counter frequency, feeds `LighthouseConfig::for_tick_rate`.
    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn overcaptures(&self) -> u32 {
        self.overcaptures
    }
}
