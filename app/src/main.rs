#![no_main]
#![no_std]

// Lighthouse receiver firmware.
// TIM2 captures photodiode edges into one lock-free queue per sensor, TIM6
// paces the control loop that decodes them, updates the robot pose and
// streams pose records to the host over RTT.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use panic_probe as _;

use hal::{
    self,
    clocks::Clocks,
    gpio::Pin,
    pac,
    pac::TIM6,
    timer::{Timer, TimerInterrupt},
};
use rtt_target::{rtt_init, set_defmt_channel, ChannelMode::NoBlockSkip, UpChannel};

use lighthouse_algo::{
    config::LighthouseConfig,
    edge_queue::{EdgeConsumer, EdgeProducer, EdgeQueue},
    fault::FaultCounters,
    robot_pose::RobotPose,
    Lighthouse, SensorSide,
};

// Edges between two control ticks: 4 per 8.3 ms cycle, with headroom
const QUEUE_SLOTS: usize = 64;
const CONTROL_FREQ_HZ: u32 = 200;
const CONTROL_PERIOD_MS: u32 = 1000 / CONTROL_FREQ_HZ;
const REPORT_PERIOD_TICKS: u32 = CONTROL_FREQ_HZ; // Once per second

#[rtic::app(device = pac, peripherals = true, dispatchers = [TIM7])]
mod app {
    use super::*;

    use lighthouse_drivers::*;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        capture: capture::TimCapture,
        overcaptures_seen: u32,
        right_tx: EdgeProducer<'static, QUEUE_SLOTS>,
        left_tx: EdgeProducer<'static, QUEUE_SLOTS>,
        right_rx: EdgeConsumer<'static, QUEUE_SLOTS>,
        left_rx: EdgeConsumer<'static, QUEUE_SLOTS>,
        control_timer: Timer<TIM6>,
        lighthouse: Lighthouse,
        pose_channel: UpChannel,
        streamed: [Option<u32>; 3], // Timestamp of the last record sent per pose source
        now_ms: u32,
        ticker: u32,
        led_fault: Pin,
        led_fix: Pin,
        led_telemetry: Pin,
    }

    #[init(local = [
        right_queue: EdgeQueue<QUEUE_SLOTS> = EdgeQueue::new(),
        left_queue: EdgeQueue<QUEUE_SLOTS> = EdgeQueue::new(),
    ])]
    fn init(ctx: init::Context) -> (Shared, Local) {
        let channels = rtt_init! {
            up: {
                0: {
                    size: 1024,
                    mode: NoBlockSkip,
                    name: "defmt"
                }
                1: {
                    size: 2048,
                    mode: NoBlockSkip,
                    name: "pose"
                }
            }
        };
        set_defmt_channel(channels.up.0);

        let dp = ctx.device;
        let clock_cfg = Clocks::default();
        clock_cfg.setup().unwrap();
        defmt::debug!("SYSTEM: Clock frequency is {} MHz", clock_cfg.sysclk() / 1000000);

        let right_queue: &'static mut EdgeQueue<QUEUE_SLOTS> = ctx.local.right_queue;
        let left_queue: &'static mut EdgeQueue<QUEUE_SLOTS> = ctx.local.left_queue;
        let (right_tx, right_rx) = right_queue.split();
        let (left_tx, left_rx) = left_queue.split();

        let capture = capture::TimCapture::new(dp.TIM2, &clock_cfg);
        let config = LighthouseConfig::for_tick_rate(capture.tick_rate_hz());
        defmt::info!(
            "LIGHTHOUSE: capture at {} Hz, sweep {} ticks",
            config.tick_rate_hz,
            config.sweep_duration_ticks
        );

        let mut control_timer = Timer::new_tim6(
            dp.TIM6,
            CONTROL_FREQ_HZ as f32,
            Default::default(),
            &clock_cfg,
        );
        control_timer.enable_interrupt(TimerInterrupt::Update);
        control_timer.enable();

        let mut led_fault = pinout::led::FAULT.init();
        let mut led_fix = pinout::led::FIX.init();
        let mut led_telemetry = pinout::led::TELEMETRY.init();
        led_fault.set_high();
        led_fix.set_high();
        led_telemetry.set_high();

        (
            Shared {},
            Local {
                capture,
                overcaptures_seen: 0,
                right_tx,
                left_tx,
                right_rx,
                left_rx,
                control_timer,
                lighthouse: Lighthouse::new(config),
                pose_channel: channels.up.1,
                streamed: [None; 3],
                now_ms: 0,
                ticker: 0,
                led_fault,
                led_fix,
                led_telemetry,
            },
        )
    }

    #[task(binds = TIM2, local = [capture, overcaptures_seen, right_tx, left_tx], priority = 3)]
    fn capture_edge(cx: capture_edge::Context) {
        let [right, left] = cx.local.capture.take_captures();
        let overcaptures = cx.local.capture.overcaptures();
        if overcaptures != *cx.local.overcaptures_seen {
            *cx.local.overcaptures_seen = overcaptures;
            defmt::warn!("CAPTURE: edge overwritten before read ({} total)", overcaptures);
        }
        // A full queue counts the drop itself, the control loop reports it
        if let Some(tick) = right {
            cx.local.right_tx.push(tick).ok();
        }
        if let Some(tick) = left {
            cx.local.left_tx.push(tick).ok();
        }
    }

    #[task(
        binds = TIM6_DACUNDER,
        local = [control_timer, lighthouse, right_rx, left_rx, pose_channel, streamed, now_ms, ticker,
                 led_fault, led_fix, led_telemetry],
        priority = 2
    )]
    fn control_tick(cx: control_tick::Context) {
        cx.local
            .control_timer
            .clear_interrupt(TimerInterrupt::Update);

        *cx.local.now_ms = cx.local.now_ms.wrapping_add(CONTROL_PERIOD_MS);
        let now_ms = *cx.local.now_ms;
        let lighthouse = cx.local.lighthouse;

        lighthouse.poll(SensorSide::Right, cx.local.right_rx, now_ms);
        lighthouse.poll(SensorSide::Left, cx.local.left_rx, now_ms);
        lighthouse.recalculate(now_ms);

        stream_poses(lighthouse, cx.local.pose_channel, cx.local.streamed);

        let right = lighthouse.sensor(SensorSide::Right);
        let left = lighthouse.sensor(SensorSide::Left);
        set_led(cx.local.led_telemetry, lighthouse.base_station().is_ready());
        set_led(cx.local.led_fix, right.has_fix() && left.has_fix());

        *cx.local.ticker += 1;
        if *cx.local.ticker >= REPORT_PERIOD_TICKS {
            *cx.local.ticker = 0;
            let faults = [*right.faults(), *left.faults()];
            set_led(cx.local.led_fault, faults.iter().any(|f| f.total() != 0));
            report_status::spawn(faults, *lighthouse.robot()).ok();
        }
    }

    #[task(priority = 1)]
    async fn report_status(
        _cx: report_status::Context,
        faults: [FaultCounters; 2],
        robot: RobotPose,
    ) {
        let position = robot.position();
        defmt::info!(
            "ROBOT: ({}, {}) mm heading {} rad, faults R {} L {}",
            position.x,
            position.y,
            robot.heading_angle(),
            faults[0].total(),
            faults[1].total()
        );
    }

    /// Writes every pose that changed since the last tick to the pose channel.
    fn stream_poses(lighthouse: &Lighthouse, channel: &mut UpChannel, streamed: &mut [Option<u32>; 3]) {
        for (record, last) in lighthouse.pose_records().iter().zip(streamed.iter_mut()) {
            let Some(record) = record else { continue };
            if *last == Some(record.timestamp_ms) {
                continue;
            }
            *last = Some(record.timestamp_ms);
            channel.write(&record.to_bytes());
        }
    }

    fn set_led(led: &mut Pin, lit: bool) {
        // Active low
        if lit {
            led.set_low();
        } else {
            led.set_high();
        }
    }
}

#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}
