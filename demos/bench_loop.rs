//! Bench harness: wires the full control stack against the in-memory
//! transport and drives the cooperative outer loop the way the firmware
//! main loop does (poll, measure, telemetry, publish).
//!
//! Run with `cargo run --example bench_loop`.

use core::time::Duration;
use std::sync::Arc;

use log::info;

use locolink::hal::{MockMotor, MockTransport, RecordingTelemetry, SystemClock};
use locolink::{
    legacy, ChannelConfig, CommandChannel, CommandFrame, CommandProcessor, Config, Direction,
    FrameHeader, PidRegulator, TelemetrySample, TrainController,
};

fn main() {
    env_logger::init();

    let config = Config::default().with_channel(
        ChannelConfig::default()
            .with_uri("wss://train.local/control")
            .with_session_id([0xA5; 16]),
    );

    let clock = SystemClock::new();
    let motor = MockMotor::new();
    let telemetry = RecordingTelemetry::new();

    let controller = Arc::new(TrainController::new(
        PidRegulator::from(config.pid),
        motor.clone(),
        telemetry.clone(),
        config.controller,
        clock.clone(),
    ));

    let processor = CommandProcessor::new(controller.clone(), clock.clone())
        .with_legacy_parser(legacy::controller_parser(controller.clone()));

    let transport = MockTransport::new();
    let probe = transport.clone();
    let mut channel = CommandChannel::new(config.channel, transport, processor, clock);

    // A couple of operator frames, as the remote pilot would send them.
    for (sequence, speed) in [(1u32, 1.0f32), (2, 1.5)] {
        let frame = CommandFrame {
            header: FrameHeader {
                session_id: [0xA5; 16],
                sequence,
                target_speed_mps: speed,
                direction: Direction::Forward,
                ..FrameHeader::default()
            },
            payload: vec![0x00],
        };
        probe.queue_incoming(frame.encode());
    }

    channel.start().expect("transport connect");

    let mut measured = 0.0f32;
    for tick in 0..5 {
        if let Ok(Some(disposition)) = channel.poll() {
            info!("tick {tick}: {disposition}");
        }

        controller.on_speed_measurement(measured, Duration::from_millis(50));
        measured = (measured + 0.3).min(1.5);

        controller.on_telemetry_sample(&TelemetrySample {
            speed_mps: measured,
            battery_voltage: 11.4,
            temperature_celsius: 27.5,
            ..TelemetrySample::default()
        });

        if let Some(average) = controller.aggregated_telemetry() {
            channel
                .publish_telemetry(&average, tick as u32)
                .expect("telemetry publish");
        }
    }

    let state = controller.state();
    println!(
        "final: target {:.2} m/s, applied {:.2} m/s, motor {:?}, lights {:?} ({:?})",
        state.target_speed,
        state.applied_speed,
        motor.last_command(),
        state.lights_state,
        state.lights_source,
    );
    println!(
        "published {} telemetry frames over the link",
        probe.sent().len()
    );

    channel.stop().expect("transport close");
}
