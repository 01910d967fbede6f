//! Integration tests for the command channel: session binding, frame
//! dispatch and telemetry publication.

use core::time::Duration;
use std::sync::Arc;

use locolink::hal::{MockClock, MockMotor, MockTransport, RecordingTelemetry};
use locolink::{
    ChannelConfig, ChannelError, CommandChannel, CommandError, CommandFrame, CommandProcessor,
    ControllerConfig, Direction, FrameDisposition, FrameHeader, PidRegulator, TelemetrySample,
    TrainController, FRAME_HEADER_LEN, STATUS_PAYLOAD_LEN,
};

type TestController = TrainController<MockMotor, RecordingTelemetry, Arc<MockClock>>;
type TestChannel =
    CommandChannel<MockTransport, MockMotor, RecordingTelemetry, Arc<MockClock>>;

struct Rig {
    channel: TestChannel,
    controller: Arc<TestController>,
    transport: MockTransport,
    clock: Arc<MockClock>,
}

const SESSION_ID: [u8; 16] = [0xA5; 16];

fn rig() -> Rig {
    let clock = Arc::new(MockClock::new());
    let controller = Arc::new(TrainController::new(
        PidRegulator::new(0.5, 0.05, 0.01, 0.0, 1.0),
        MockMotor::new(),
        RecordingTelemetry::new(),
        ControllerConfig::default(),
        clock.clone(),
    ));
    let processor = CommandProcessor::new(controller.clone(), clock.clone());
    let transport = MockTransport::new();
    let channel = CommandChannel::new(
        ChannelConfig::default()
            .with_uri("wss://train.local/control")
            .with_session_id(SESSION_ID)
            .with_receive_timeout(Duration::from_millis(50)),
        transport.clone(),
        processor,
        clock.clone(),
    );
    Rig {
        channel,
        controller,
        transport,
        clock,
    }
}

fn command_frame(sequence: u32, speed: f32) -> CommandFrame {
    CommandFrame {
        header: FrameHeader {
            session_id: SESSION_ID,
            sequence,
            timestamp_micros: 0,
            target_speed_mps: speed,
            direction: Direction::Forward,
            lights_override: 0,
        },
        payload: vec![0x00],
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn start_connects_to_the_configured_uri() {
    let mut rig = rig();
    rig.channel.start().unwrap();

    assert!(rig.channel.is_running());
    assert!(rig.transport.is_connected());
    assert_eq!(
        rig.transport.connected_uri().as_deref(),
        Some("wss://train.local/control")
    );
}

#[test]
fn start_is_idempotent() {
    let mut rig = rig();
    rig.channel.start().unwrap();
    rig.channel.start().unwrap();
    assert_eq!(rig.transport.connect_count(), 1);
}

#[test]
fn stop_is_idempotent() {
    let mut rig = rig();
    rig.channel.start().unwrap();
    rig.channel.stop().unwrap();
    rig.channel.stop().unwrap();

    assert!(!rig.channel.is_running());
    assert!(!rig.transport.is_connected());
    assert_eq!(rig.transport.close_count(), 1);
}

#[test]
fn stop_before_start_is_a_no_op() {
    let mut rig = rig();
    rig.channel.stop().unwrap();
    assert_eq!(rig.transport.close_count(), 0);
}

#[test]
fn dropping_the_channel_closes_the_transport() {
    let rig = rig();
    let transport = rig.transport.clone();
    {
        let mut channel = rig.channel;
        channel.start().unwrap();
        assert!(transport.is_connected());
    }
    assert!(!transport.is_connected());
}

// ============================================================================
// Poll
// ============================================================================

#[test]
fn poll_decodes_and_forwards_frames() {
    let mut rig = rig();
    rig.transport.queue_incoming(command_frame(1, 1.5).encode());

    rig.channel.start().unwrap();
    let result = rig.channel.poll().unwrap();

    assert_eq!(result, Some(FrameDisposition::StateUpdated));
    assert!((rig.controller.state().target_speed - 1.5).abs() < 0.01);
}

#[test]
fn poll_returns_none_when_nothing_arrives() {
    let mut rig = rig();
    rig.channel.start().unwrap();
    assert_eq!(rig.channel.poll().unwrap(), None);
}

#[test]
fn poll_while_stopped_returns_none() {
    let mut rig = rig();
    rig.transport.queue_incoming(command_frame(1, 1.5).encode());
    assert_eq!(rig.channel.poll().unwrap(), None);
}

#[test]
fn poll_rejects_malformed_frames() {
    let mut rig = rig();
    rig.transport.queue_incoming(vec![0u8; FRAME_HEADER_LEN - 4]);

    rig.channel.start().unwrap();
    let result = rig.channel.poll();
    assert!(matches!(
        result,
        Err(ChannelError::Command(CommandError::MalformedFrame))
    ));
}

#[test]
fn poll_stamps_arrival_from_the_clock() {
    let mut rig = rig();
    rig.clock.set_monotonic_micros(42_000_000);
    rig.transport.queue_incoming(command_frame(1, 1.0).encode());

    rig.channel.start().unwrap();
    let _ = rig.channel.poll().unwrap();

    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        42_000_000
    );
}

#[test]
fn cadence_fallback_is_observable_through_the_channel() {
    let mut rig = rig();
    rig.channel.start().unwrap();

    rig.transport.queue_incoming(command_frame(1, 1.0).encode());
    let _ = rig.channel.poll().unwrap();

    rig.clock.advance(Duration::from_millis(100));
    rig.transport.queue_incoming(command_frame(2, 1.0).encode());
    let _ = rig.channel.poll().unwrap();

    assert!(rig.channel.low_frequency_fallback_active());
}

// ============================================================================
// Telemetry publication
// ============================================================================

#[test]
fn publish_uses_channel_session_and_fallback_sequence() {
    let mut rig = rig();
    rig.clock.set_wall_micros(1_700_000_000_000_000);
    rig.channel.start().unwrap();

    let sample = TelemetrySample {
        applied_speed_mps: 1.2,
        applied_direction: Direction::Reverse,
        battery_voltage: 11.1,
        lights_override_mask: 0x05,
        ..TelemetrySample::default()
    };
    rig.channel.publish_telemetry(&sample, 77).unwrap();

    let sent = rig.transport.sent();
    assert_eq!(sent.len(), 1);
    let frame = CommandFrame::decode(&sent[0]).unwrap();

    assert_eq!(frame.header.session_id, SESSION_ID);
    assert_eq!(frame.header.sequence, 77);
    assert_eq!(frame.header.timestamp_micros, 1_700_000_000_000_000);
    assert!((frame.header.target_speed_mps - 1.2).abs() < 0.01);
    assert_eq!(frame.header.direction, Direction::Reverse);
    // Telemetry flag set on top of the mask.
    assert_eq!(frame.header.lights_override, 0x85);
    assert_eq!(frame.payload.len(), STATUS_PAYLOAD_LEN);
    // Battery voltage sits after speed and motor current in the payload.
    let battery = f32::from_le_bytes([
        frame.payload[8],
        frame.payload[9],
        frame.payload[10],
        frame.payload[11],
    ]);
    assert!((battery - 11.1).abs() < 0.01);
}

#[test]
fn publish_prefers_sample_correlation_fields() {
    let mut rig = rig();
    rig.channel.start().unwrap();

    let sample = TelemetrySample {
        session_id: [0x33; 16],
        sequence: 900,
        command_timestamp_micros: 123_456,
        ..TelemetrySample::default()
    };
    rig.channel.publish_telemetry(&sample, 77).unwrap();

    let frame = CommandFrame::decode(&rig.transport.sent()[0]).unwrap();
    assert_eq!(frame.header.session_id, [0x33; 16]);
    assert_eq!(frame.header.sequence, 900);
    assert_eq!(frame.header.timestamp_micros, 123_456);
}

#[test]
fn publish_while_stopped_sends_nothing() {
    let mut rig = rig();
    rig.channel
        .publish_telemetry(&TelemetrySample::default(), 1)
        .unwrap();
    assert!(rig.transport.sent().is_empty());
}

#[test]
fn published_frames_round_trip_as_heartbeats() {
    let mut rig = rig();
    rig.channel.start().unwrap();

    rig.channel
        .publish_telemetry(&TelemetrySample::default(), 5)
        .unwrap();
    let frame = CommandFrame::decode(&rig.transport.sent()[0]).unwrap();
    assert!(frame.is_telemetry_only());
}
