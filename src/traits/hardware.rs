//! Hardware abstraction traits for motor output, telemetry and time.
//!
//! These seams let the control core run against desktop mocks in tests and
//! against real actuators on the locomotive. The controller owns its sinks
//! by value; there are no back-references from a sink into the controller.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`MotorOutput`] | PWM duty-cycle sink for the traction motor |
//! | [`TelemetrySink`] | Consumer of enriched telemetry samples |
//! | [`Clock`] | Injectable monotonic + wall-clock time source |
//!
//! # Example
//!
//! ```
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
//! controller.set_target_speed(1.0);
//! ```

use crate::telemetry::TelemetrySample;

/// Traction motor PWM sink.
///
/// The controller clamps the duty cycle to [0, 1] before every call, and
/// writes exactly 0.0 on every fail-safe, pilot-release and emergency-stop
/// path. Implementations own their error handling (retry, log, or latch a
/// fault); a write must not re-enter the controller.
pub trait MotorOutput {
    /// Apply a PWM duty cycle in [0, 1].
    fn write_duty(&mut self, duty: f32);
}

impl<F: FnMut(f32)> MotorOutput for F {
    fn write_duty(&mut self, duty: f32) {
        self(duty);
    }
}

/// Consumer of enriched telemetry samples.
///
/// Invoked under the controller mutex; implementations must be quick and
/// must not call back into the controller.
pub trait TelemetrySink {
    /// Receive one enriched sample.
    fn publish(&mut self, sample: &TelemetrySample);
}

impl<F: FnMut(&TelemetrySample)> TelemetrySink for F {
    fn publish(&mut self, sample: &TelemetrySample) {
        self(sample);
    }
}

/// Injectable time source.
///
/// The control core never reads a global clock: liveness ages, ramp
/// kinematics and wire timestamps all flow through this trait, so tests can
/// substitute a hand-advanced [`MockClock`](crate::hal::MockClock).
///
/// The two timelines are deliberately separate. Liveness and ramp logic use
/// the monotonic reading; only the boundary code that talks to remote peers
/// (timestamp normalization, telemetry timestamp fallback) touches the wall
/// clock.
pub trait Clock {
    /// Monotonic microseconds since an arbitrary epoch. Must never go
    /// backwards.
    fn monotonic_micros(&self) -> u64;

    /// Wall-clock microseconds since the Unix epoch.
    fn wall_micros(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn monotonic_micros(&self) -> u64 {
        (**self).monotonic_micros()
    }

    fn wall_micros(&self) -> u64 {
        (**self).wall_micros()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn monotonic_micros(&self) -> u64 {
        (**self).monotonic_micros()
    }

    fn wall_micros(&self) -> u64 {
        (**self).wall_micros()
    }
}
