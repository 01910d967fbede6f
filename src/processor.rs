//! Command processor: frame validation, link-cadence policy and fan-out to
//! the controller.
//!
//! One [`process_frame`](CommandProcessor::process_frame) call takes a
//! decoded [`CommandFrame`] plus its monotonic arrival instant and:
//!
//! 1. applies the lights override unconditionally (heartbeats still convey
//!    the mask),
//! 2. short-circuits telemetry-only frames,
//! 3. enforces the cadence gate (≤ 30 ms nominal, ≤ 120 ms low-frequency
//!    fallback, beyond that [`CommandError::RateBelow10Hz`]),
//! 4. normalizes the sender's wall-clock timestamp onto the local
//!    monotonic timeline,
//! 5. applies the setpoints and control flags, feeds any legacy text
//!    payload to the installed parser, and
//! 6. registers the command timestamp with the controller's liveness
//!    engine.
//!
//! A frame rejected by the cadence gate does **not** update the arrival
//! anchor: the next well-spaced frame re-anchors the cadence measurement.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};

use crate::controller::TrainController;
use crate::error::CommandError;
use crate::frame::{CommandFrame, LIGHTS_TELEMETRY_ONLY_BIT};
use crate::traits::{Clock, MotorOutput, TelemetrySink};

/// Cadence gate: arrivals at most this far apart are nominal.
const NOMINAL_CADENCE_MICROS: u64 = 30_000;

/// Cadence gate: arrivals beyond the nominal spacing but within this bound
/// set the low-frequency fallback flag; beyond it the frame is rejected.
const FALLBACK_CADENCE_MICROS: u64 = 120_000;

/// Control-flag bits carried in the first aux payload byte.
const FLAG_HEADLIGHTS: u8 = 0x01;
const FLAG_HORN: u8 = 0x02;
const FLAG_EMERGENCY_STOP: u8 = 0x04;

/// Hook for legacy semicolon-separated text commands.
///
/// Receives the text carried after the control-flag byte; returns a result
/// message (possibly empty) or an error description.
pub type LegacyParser = Box<dyn FnMut(&str) -> Result<String, String> + Send>;

/// How an accepted frame was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// The frame was telemetry/heartbeat only; no setpoints were applied.
    TelemetryFrame,
    /// Setpoints and control flags were applied.
    StateUpdated,
    /// The frame carried the emergency-stop flag.
    EmergencyStop,
    /// The legacy parser handled an aux payload and returned a message.
    Legacy(String),
}

impl fmt::Display for FrameDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameDisposition::TelemetryFrame => f.write_str("Telemetry frame"),
            FrameDisposition::StateUpdated => f.write_str("State updated"),
            FrameDisposition::EmergencyStop => f.write_str("Emergency stop"),
            FrameDisposition::Legacy(message) => f.write_str(message),
        }
    }
}

/// Validates arriving frames and fans them out to controller operations.
///
/// Owns a shared handle to the controller (one-way fan-in: the channel owns
/// the processor, the processor holds the controller, the controller holds
/// only value-type sinks).
pub struct CommandProcessor<M: MotorOutput, T: TelemetrySink, C: Clock> {
    controller: Arc<TrainController<M, T, C>>,
    clock: C,
    legacy_parser: Option<LegacyParser>,
    last_arrival_micros: Option<u64>,
    low_frequency_fallback: bool,
}

impl<M: MotorOutput, T: TelemetrySink, C: Clock> CommandProcessor<M, T, C> {
    /// Create a processor without a legacy parser.
    pub fn new(controller: Arc<TrainController<M, T, C>>, clock: C) -> Self {
        Self {
            controller,
            clock,
            legacy_parser: None,
            last_arrival_micros: None,
            low_frequency_fallback: false,
        }
    }

    /// Install a legacy text-command parser.
    pub fn with_legacy_parser(mut self, parser: LegacyParser) -> Self {
        self.legacy_parser = Some(parser);
        self
    }

    /// Whether the link cadence most recently fell into the 30–120 ms
    /// fallback band. Observable only; reported in telemetry.
    pub fn low_frequency_fallback_active(&self) -> bool {
        self.low_frequency_fallback
    }

    /// Process one decoded frame that arrived at the given monotonic
    /// instant.
    pub fn process_frame(
        &mut self,
        frame: &CommandFrame,
        arrival_micros: u64,
    ) -> Result<FrameDisposition, CommandError> {
        // The lights override applies even to frames the gates below
        // reject, so heartbeats always convey the current mask.
        let telemetry_only = frame.header.lights_override & LIGHTS_TELEMETRY_ONLY_BIT != 0;
        let lights_mask = frame.header.lights_override & !LIGHTS_TELEMETRY_ONLY_BIT;
        self.controller.set_lights_override(lights_mask, telemetry_only);

        if telemetry_only {
            return Ok(FrameDisposition::TelemetryFrame);
        }

        if let Some(last_arrival) = self.last_arrival_micros {
            let delta = arrival_micros.saturating_sub(last_arrival);
            if delta <= NOMINAL_CADENCE_MICROS {
                self.low_frequency_fallback = false;
            } else if delta <= FALLBACK_CADENCE_MICROS {
                if !self.low_frequency_fallback {
                    warn!("command cadence degraded: {} ms between frames", delta / 1_000);
                }
                self.low_frequency_fallback = true;
            } else {
                // Do not re-anchor: the next well-spaced frame restarts
                // the cadence measurement.
                warn!("command frame rejected: {} ms since previous", delta / 1_000);
                return Err(CommandError::RateBelow10Hz);
            }
        }
        self.last_arrival_micros = Some(arrival_micros);

        let remote_monotonic = self.normalize_timestamp(frame.header.timestamp_micros, arrival_micros);

        self.controller.set_target_speed(frame.header.target_speed_mps);
        self.controller.set_direction(frame.header.direction);

        let flags = frame.payload.first().copied().unwrap_or(0);
        if lights_mask == 0 {
            self.controller.toggle_headlights(flags & FLAG_HEADLIGHTS != 0);
        }
        self.controller.toggle_horn(flags & FLAG_HORN != 0);
        let emergency = flags & FLAG_EMERGENCY_STOP != 0;
        if emergency {
            self.controller.trigger_emergency_stop();
        }

        let mut legacy_message = None;
        if frame.payload.len() > 1 {
            let parser = self
                .legacy_parser
                .as_mut()
                .ok_or(CommandError::LegacyParserDisabled)?;
            let text = String::from_utf8_lossy(&frame.payload[1..]);
            match parser(&text) {
                Ok(message) if !message.is_empty() => legacy_message = Some(message),
                Ok(_) => {}
                Err(message) => return Err(CommandError::LegacyParser(message)),
            }
        }

        self.controller.register_command_timestamp(remote_monotonic);
        debug!(
            "frame {} applied: target {:.2} m/s {}",
            frame.header.sequence,
            frame.header.target_speed_mps,
            frame.header.direction.as_str()
        );

        if emergency {
            Ok(FrameDisposition::EmergencyStop)
        } else if let Some(message) = legacy_message {
            Ok(FrameDisposition::Legacy(message))
        } else {
            Ok(FrameDisposition::StateUpdated)
        }
    }

    /// Map the sender's wall-clock timestamp onto the local monotonic
    /// timeline.
    ///
    /// A zero timestamp means "now". Otherwise the frame's age is the
    /// wall-clock difference, clamped to non-negative so remote clock skew
    /// can never push a command into the future, and the arrival instant
    /// minus that age is the command's monotonic origin. Intra-session
    /// ordering survives because every frame of a session shifts by the
    /// same skew.
    fn normalize_timestamp(&self, timestamp_micros: u64, arrival_micros: u64) -> u64 {
        if timestamp_micros == 0 {
            return arrival_micros;
        }
        let age = self.clock.wall_micros().saturating_sub(timestamp_micros);
        arrival_micros.saturating_sub(age)
    }
}
