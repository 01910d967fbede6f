//! Integration tests for the command processor: cadence policy, timestamp
//! normalization, control flags and the legacy text path.

use core::time::Duration;
use std::sync::Arc;

use locolink::hal::{MockClock, MockMotor, RecordingTelemetry};
use locolink::{
    legacy, CommandError, CommandFrame, CommandProcessor, ControllerConfig, Direction,
    FrameDisposition, FrameHeader, PidRegulator, TrainController,
};

type TestController = TrainController<MockMotor, RecordingTelemetry, Arc<MockClock>>;

struct Rig {
    controller: Arc<TestController>,
    processor: CommandProcessor<MockMotor, RecordingTelemetry, Arc<MockClock>>,
    clock: Arc<MockClock>,
}

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
    Rig {
        controller,
        processor,
        clock,
    }
}

fn rig_with_legacy() -> Rig {
    let mut rig = rig();
    let parser = legacy::controller_parser(rig.controller.clone());
    rig.processor = CommandProcessor::new(rig.controller.clone(), rig.clock.clone())
        .with_legacy_parser(parser);
    rig
}

fn command_frame(sequence: u32, speed: f32, direction: Direction) -> CommandFrame {
    CommandFrame {
        header: FrameHeader {
            session_id: [0x11; 16],
            sequence,
            timestamp_micros: 0,
            target_speed_mps: speed,
            direction,
            lights_override: 0,
        },
        payload: vec![0x00],
    }
}

const MS: u64 = 1_000;

// ============================================================================
// Setpoint application
// ============================================================================

#[test]
fn valid_frame_applies_setpoints() {
    let mut rig = rig();
    let result = rig
        .processor
        .process_frame(&command_frame(1, 1.5, Direction::Forward), 0);

    assert_eq!(result, Ok(FrameDisposition::StateUpdated));
    let state = rig.controller.state();
    assert!((state.target_speed - 1.5).abs() < 0.01);
    assert_eq!(state.direction, Direction::Forward);
}

#[test]
fn frame_without_payload_applies_setpoints() {
    let mut rig = rig();
    let mut frame = command_frame(1, 0.8, Direction::Reverse);
    frame.payload.clear();

    assert_eq!(
        rig.processor.process_frame(&frame, 0),
        Ok(FrameDisposition::StateUpdated)
    );
    assert_eq!(rig.controller.state().direction, Direction::Reverse);
}

// ============================================================================
// Telemetry-only frames
// ============================================================================

#[test]
fn telemetry_frame_is_read_only() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);
    let before = rig.controller.state();

    let mut heartbeat = command_frame(2, 3.0, Direction::Reverse);
    heartbeat.header.lights_override = 0x80;
    let result = rig.processor.process_frame(&heartbeat, 10 * MS);

    assert_eq!(result, Ok(FrameDisposition::TelemetryFrame));
    assert_eq!(result.unwrap().to_string(), "Telemetry frame");

    let after = rig.controller.state();
    assert_eq!(after.target_speed, before.target_speed);
    assert_eq!(after.direction, before.direction);
    assert!(after.lights_telemetry_only);
    // Liveness is untouched by heartbeats.
    assert_eq!(
        after.realtime.last_command_timestamp,
        before.realtime.last_command_timestamp
    );
}

#[test]
fn heartbeat_still_conveys_the_mask() {
    let mut rig = rig();
    let mut heartbeat = command_frame(1, 0.0, Direction::Neutral);
    heartbeat.header.lights_override = 0x80 | 0x06;

    let _ = rig.processor.process_frame(&heartbeat, 0);
    let state = rig.controller.state();
    assert_eq!(state.lights_override_mask, 0x06);
    assert!(state.lights_telemetry_only);
}

// ============================================================================
// Cadence gate
// ============================================================================

#[test]
fn nominal_cadence_keeps_fallback_clear() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);
    let _ = rig
        .processor
        .process_frame(&command_frame(2, 1.0, Direction::Forward), 30 * MS);

    assert!(!rig.processor.low_frequency_fallback_active());
}

#[test]
fn degraded_cadence_sets_the_fallback_flag() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);
    let result = rig
        .processor
        .process_frame(&command_frame(2, 1.0, Direction::Forward), 100 * MS);

    assert!(result.is_ok());
    assert!(rig.processor.low_frequency_fallback_active());

    // A nominal frame clears the flag again.
    let _ = rig
        .processor
        .process_frame(&command_frame(3, 1.0, Direction::Forward), 120 * MS);
    assert!(!rig.processor.low_frequency_fallback_active());
}

#[test]
fn excessive_gap_rejects_the_frame() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);
    let _ = rig
        .processor
        .process_frame(&command_frame(2, 1.0, Direction::Forward), 100 * MS);
    assert!(rig.processor.low_frequency_fallback_active());

    let result = rig
        .processor
        .process_frame(&command_frame(3, 2.0, Direction::Forward), 300 * MS);
    assert_eq!(result, Err(CommandError::RateBelow10Hz));

    // The rejected frame's setpoints were not applied.
    assert!((rig.controller.state().target_speed - 1.0).abs() < 0.01);
}

#[test]
fn rejected_frame_does_not_reanchor_cadence() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);

    // 200 ms gap: rejected, anchor stays at 0.
    let result = rig
        .processor
        .process_frame(&command_frame(2, 1.0, Direction::Forward), 200 * MS);
    assert_eq!(result, Err(CommandError::RateBelow10Hz));

    // 230 ms since the anchor: still rejected even though only 30 ms passed
    // since the rejected frame.
    let result = rig
        .processor
        .process_frame(&command_frame(3, 1.0, Direction::Forward), 230 * MS);
    assert_eq!(result, Err(CommandError::RateBelow10Hz));
}

#[test]
fn rejected_frame_still_applies_the_lights_override() {
    let mut rig = rig();
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 0);

    let mut late = command_frame(2, 2.0, Direction::Forward);
    late.header.lights_override = 0x04;
    let result = rig.processor.process_frame(&late, 200 * MS);

    assert_eq!(result, Err(CommandError::RateBelow10Hz));
    assert_eq!(rig.controller.state().lights_override_mask, 0x04);
}

#[test]
fn first_frame_is_exempt_from_the_gate() {
    let mut rig = rig();
    // Arbitrary arrival instant, no prior anchor.
    let result = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), 10_000 * MS);
    assert_eq!(result, Ok(FrameDisposition::StateUpdated));
}

// ============================================================================
// Timestamp normalization
// ============================================================================

#[test]
fn zero_timestamp_uses_the_arrival_instant() {
    let mut rig = rig();
    rig.clock.set_monotonic_micros(50_000 * MS);
    rig.clock.set_wall_micros(1_700_000_000_000_000);

    let arrival = 50_000 * MS;
    let _ = rig
        .processor
        .process_frame(&command_frame(1, 1.0, Direction::Forward), arrival);

    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        arrival
    );
}

#[test]
fn remote_timestamp_is_shifted_onto_the_monotonic_timeline() {
    let mut rig = rig();
    rig.clock.set_monotonic_micros(50_000 * MS);
    rig.clock.set_wall_micros(1_700_000_000_000_000);

    // Sent 200 ms ago on the sender's wall clock.
    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.header.timestamp_micros = 1_700_000_000_000_000 - 200 * MS;

    let arrival = 50_000 * MS;
    let _ = rig.processor.process_frame(&frame, arrival);

    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        arrival - 200 * MS
    );
}

#[test]
fn future_remote_timestamp_clamps_to_arrival() {
    let mut rig = rig();
    rig.clock.set_monotonic_micros(50_000 * MS);
    rig.clock.set_wall_micros(1_700_000_000_000_000);

    // Sender clock runs half a second ahead of ours.
    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.header.timestamp_micros = 1_700_000_000_000_000 + 500 * MS;

    let arrival = 50_000 * MS;
    let _ = rig.processor.process_frame(&frame, arrival);

    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        arrival
    );
}

// ============================================================================
// Control flags
// ============================================================================

#[test]
fn headlight_flag_is_honored_when_no_mask_is_set() {
    let mut rig = rig();
    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.payload = vec![0x01];

    let _ = rig.processor.process_frame(&frame, 0);
    assert_eq!(rig.controller.state().lights_override_mask, 0x01);
}

#[test]
fn headlight_flag_is_ignored_while_a_mask_is_active() {
    let mut rig = rig();
    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.header.lights_override = 0x06;
    frame.payload = vec![0x01];

    let _ = rig.processor.process_frame(&frame, 0);
    // The explicit mask wins; the headlight bit is not applied.
    assert_eq!(rig.controller.state().lights_override_mask, 0x06);
}

#[test]
fn horn_flag_follows_the_frame() {
    let mut rig = rig();
    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.payload = vec![0x02];
    let _ = rig.processor.process_frame(&frame, 0);
    assert!(rig.controller.state().horn);

    let mut frame = command_frame(2, 1.0, Direction::Forward);
    frame.payload = vec![0x00];
    let _ = rig.processor.process_frame(&frame, 20 * MS);
    assert!(!rig.controller.state().horn);
}

#[test]
fn emergency_flag_stops_the_train() {
    let mut rig = rig();
    let mut frame = command_frame(1, 2.0, Direction::Forward);
    frame.payload = vec![0x04];

    let result = rig.processor.process_frame(&frame, 0);
    assert_eq!(result, Ok(FrameDisposition::EmergencyStop));
    assert_eq!(result.unwrap().to_string(), "Emergency stop");

    let state = rig.controller.state();
    assert!(state.emergency_stop);
    assert_eq!(state.target_speed, 0.0);
}

// ============================================================================
// Legacy text path
// ============================================================================

#[test]
fn aux_payload_without_parser_is_rejected() {
    let mut rig = rig();
    let before = rig.controller.state().realtime.last_command_timestamp;

    let mut frame = command_frame(1, 1.0, Direction::Forward);
    frame.payload = vec![0x00];
    frame.payload.extend_from_slice(b"command=emergency");

    let result = rig.processor.process_frame(&frame, 0);
    assert_eq!(result, Err(CommandError::LegacyParserDisabled));
    // The failed frame does not refresh liveness.
    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        before
    );
}

#[test]
fn legacy_set_speed_runs_through_the_parser() {
    let mut rig = rig_with_legacy();
    let mut frame = command_frame(1, 0.0, Direction::Neutral);
    frame.payload = vec![0x00];
    frame.payload.extend_from_slice(b"command=set_speed;value=1.2");

    let result = rig.processor.process_frame(&frame, 0);
    assert_eq!(result, Ok(FrameDisposition::Legacy("Speed updated".into())));
    assert!((rig.controller.state().target_speed - 1.2).abs() < 0.01);
}

#[test]
fn legacy_parser_errors_propagate() {
    let mut rig = rig_with_legacy();
    let mut frame = command_frame(1, 0.0, Direction::Neutral);
    frame.payload = vec![0x00];
    frame.payload.extend_from_slice(b"command=warp_drive");

    let result = rig.processor.process_frame(&frame, 0);
    assert_eq!(
        result,
        Err(CommandError::LegacyParser("Unknown command: warp_drive".into()))
    );
}

#[test]
fn legacy_direction_and_headlights_commands_apply() {
    let mut rig = rig_with_legacy();

    let mut frame = command_frame(1, 0.0, Direction::Neutral);
    frame.payload = vec![0x00];
    frame
        .payload
        .extend_from_slice(b"command=set_direction;value=reverse");
    let result = rig.processor.process_frame(&frame, 0);
    assert_eq!(
        result,
        Ok(FrameDisposition::Legacy("Direction updated".into()))
    );
    // The legacy command runs after the header setpoints.
    assert_eq!(rig.controller.state().direction, Direction::Reverse);

    let mut frame = command_frame(2, 0.0, Direction::Reverse);
    frame.payload = vec![0x00];
    frame
        .payload
        .extend_from_slice(b"command=headlights;value=on");
    let _ = rig.processor.process_frame(&frame, 20 * MS);
    assert_eq!(rig.controller.state().lights_override_mask, 0x01);
}

#[test]
fn legacy_frame_registers_the_command_timestamp() {
    let mut rig = rig_with_legacy();
    rig.clock.set_monotonic_micros(10_000 * MS);

    let mut frame = command_frame(1, 0.0, Direction::Neutral);
    frame.payload = vec![0x00];
    frame.payload.extend_from_slice(b"command=horn;value=on");

    let arrival = 10_000 * MS;
    let _ = rig.processor.process_frame(&frame, arrival);
    assert_eq!(
        rig.controller.state().realtime.last_command_timestamp,
        arrival
    );
    assert!(rig.controller.state().horn);
}
