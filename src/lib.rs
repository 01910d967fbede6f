//! # locolink
//!
//! Onboard real-time control core for a remotely piloted model locomotive.
//!
//! A human operator drives the locomotive over a secure binary link at
//! roughly 33 Hz. This crate turns each command frame into motor and
//! lighting actuation, streams enriched telemetry back, and above all
//! degrades safely when the link falters.
//!
//! ## Features
//!
//! - **Fixed-layout wire codec**: little-endian command/telemetry frames
//!   with an opaque session id and heartbeat flag
//! - **Closed-loop speed control**: bounded PID regulator with variable
//!   timestep
//! - **Liveness fail-safe**: stale links ramp the train to rest and redden
//!   the lamps; prolonged silence releases the pilot session entirely
//! - **Automatic lighting**: headlight/marker logic from cab and direction,
//!   with operator overrides and fail-safe precedence
//! - **Telemetry aggregation**: fixed-window averages that keep their
//!   correlation metadata
//!
//! ## Architecture
//!
//! One-way fan-in, no back-edges: the [`CommandChannel`] owns the
//! [`CommandProcessor`], the processor holds the [`TrainController`], and
//! the controller owns only value-type sinks behind a single mutex.
//!
//! - `frame` - wire codec for the command/telemetry frame
//! - `pid` - speed regulator
//! - `state` - the protected train state aggregate
//! - `lights` - pure lamp policy
//! - `telemetry` - samples and the rolling aggregator
//! - `controller` - orchestration and the fail-safe engine
//! - `processor` - frame validation, cadence policy, timestamp
//!   normalization
//! - `channel` - session binding and telemetry publication
//! - `legacy` - semicolon `key=value` bench commands
//! - `traits` - hardware and transport seams
//! - `hal` - mocks for testing, system clock for deployment
//!
//! ## Example
//!
//! ```rust
//! use core::time::Duration;
//! use locolink::hal::{MockClock, MockMotor};
//! use locolink::{ControllerConfig, PidRegulator, TelemetrySample, TrainController};
//! use std::sync::Arc;
//!
//! let motor = MockMotor::new();
//! let clock = Arc::new(MockClock::new());
//! let controller = TrainController::new(
//!     PidRegulator::new(0.5, 0.05, 0.01, 0.0, 1.0),
//!     motor.clone(),
//!     |_sample: &TelemetrySample| {},
//!     ControllerConfig::default(),
//!     clock.clone(),
//! );
//!
//! // Operator commands arrive through the processor; drive directly here.
//! controller.set_target_speed(1.5);
//! controller.on_speed_measurement(0.5, Duration::from_millis(50));
//! assert!(motor.last_command().unwrap() > 0.0);
//!
//! // Silence past the stale threshold engages the fail-safe.
//! clock.advance(Duration::from_millis(600));
//! controller.on_speed_measurement(0.5, Duration::from_millis(50));
//! assert!(controller.state().fail_safe_active);
//! assert_eq!(motor.last_command(), Some(0.0));
//! ```

#![warn(missing_docs)]

/// Command channel over a pluggable binary transport.
pub mod channel;
/// Configuration for the control core and command channel.
pub mod config;
/// Train controller and the liveness fail-safe engine.
pub mod controller;
/// Boundary error types.
pub mod error;
/// Wire codec for the command/telemetry frame.
pub mod frame;
/// Concrete trait implementations (mocks, system clock).
pub mod hal;
/// Legacy semicolon-separated text commands.
pub mod legacy;
/// Automatic lighting policy.
pub mod lights;
/// Closed-loop speed regulator.
pub mod pid;
/// Command processor: validation, cadence, normalization, fan-out.
pub mod processor;
/// Train state aggregate and kinematic/lighting enums.
pub mod state;
/// Telemetry samples and the rolling aggregator.
pub mod telemetry;
/// Core traits for hardware and transport seams.
pub mod traits;

// Re-exports for convenience
pub use channel::{CommandChannel, STATUS_PAYLOAD_LEN};
pub use config::{ChannelConfig, Config, ConfigError, ControllerConfig, PidConfig, TlsConfig};
pub use controller::TrainController;
pub use error::{ChannelError, CommandError};
pub use frame::{
    session_id_le, CommandFrame, FrameHeader, FRAME_HEADER_LEN, LIGHTS_FRONT_RED,
    LIGHTS_FRONT_WHITE, LIGHTS_REAR_RED, LIGHTS_REAR_WHITE, LIGHTS_TELEMETRY_ONLY_BIT,
};
pub use pid::PidRegulator;
pub use processor::{CommandProcessor, FrameDisposition, LegacyParser};
pub use state::{
    ActiveCab, Direction, LightsSource, LightsState, RealtimeSession, TrainState,
    MAX_BATTERY_VOLTS, MAX_SPEED_MPS,
};
pub use telemetry::{TelemetryAggregator, TelemetrySample, TelemetrySource};
pub use traits::{BinaryTransport, Clock, MotorOutput, TelemetrySink};
