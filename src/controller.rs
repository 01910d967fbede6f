//! The train controller: orchestrates state, regulation, lighting and the
//! liveness-driven fail-safe engine.
//!
//! # Overview
//!
//! The controller:
//! - applies operator setpoints (speed, direction, cab, lights, horn)
//! - runs the PID speed regulator on every measurement tick
//! - watches the age of the last accepted command and degrades through
//!   fail-safe into pilot release when the link goes silent
//! - enriches and republishes telemetry samples
//!
//! # Liveness state machine
//!
//! ```text
//! Normal ── age > stale ──────────→ FailSafe ── ramp elapsed & still stale ──→ FailSafe@Rest
//!   ↑                                   │                                        │
//!   │ register_command_timestamp        │ register_command_timestamp             │ age > pilot release
//!   ├───────────────────────────────────┘                                        ↓
//!   └─────────────────────── register_command_timestamp ─────────────────── PilotRelease
//! ```
//!
//! Fail-safe linearly ramps the target speed to zero, forces the motor off
//! and reddens all lamps, latching the previous lamp state for restoration.
//! Pilot release is the terminal safe state: overrides are zeroed (and
//! latched), the train locks to neutral, and a single availability
//! telemetry sample announces that the locomotive is free for a new
//! session.
//!
//! # Concurrency
//!
//! One mutex serializes every public operation; none of them block while
//! holding it. The motor and telemetry sinks are invoked under the lock and
//! must not re-enter the controller.
//!
//! # Example
//!
//! ```
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
//! controller.set_target_speed(1.5);
//! controller.on_speed_measurement(0.5, Duration::from_millis(50));
//!
//! let command = motor.last_command().unwrap();
//! assert!(command > 0.0 && command <= 1.0);
//! ```

use core::time::Duration;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::lights;
use crate::pid::PidRegulator;
use crate::state::{ActiveCab, Direction, TrainState};
use crate::telemetry::{TelemetryAggregator, TelemetrySample, TelemetrySource};
use crate::traits::{Clock, MotorOutput, TelemetrySink};

/// Window of the controller-side telemetry aggregator.
const AGGREGATOR_WINDOW: usize = 20;

fn duration_micros(duration: Duration) -> u64 {
    duration.as_micros() as u64
}

/// Fail-safe ramp progress for telemetry: `(progress 0..=1, elapsed ms)`.
fn fail_safe_metrics(state: &TrainState, now_micros: u64) -> (f32, u32) {
    if !state.fail_safe_active {
        return (0.0, 0);
    }
    match state.realtime.fail_safe_ramp_start {
        Some(start) => {
            let elapsed_millis = (now_micros.saturating_sub(start) / 1_000) as u32;
            let ramp_millis = state.fail_safe_ramp_duration.as_millis() as u32;
            let progress = if ramp_millis == 0 {
                1.0
            } else {
                (elapsed_millis as f32 / ramp_millis as f32).clamp(0.0, 1.0)
            };
            (progress, elapsed_millis)
        }
        None => (0.0, 0),
    }
}

/// Build the one-shot pilot-release availability sample from current state.
fn availability_sample(state: &TrainState, now_micros: u64) -> TelemetrySample {
    let (progress, elapsed_millis) = fail_safe_metrics(state, now_micros);
    TelemetrySample {
        speed_mps: state.applied_speed,
        battery_voltage: state.battery_voltage,
        fail_safe_active: state.fail_safe_active,
        fail_safe_progress: progress,
        fail_safe_elapsed_millis: elapsed_millis,
        lights_state: state.lights_state,
        lights_source: state.lights_source,
        active_cab: state.active_cab,
        lights_override_mask: state.lights_override_mask,
        lights_telemetry_only: state.lights_telemetry_only,
        applied_speed_mps: state.applied_speed,
        applied_direction: state.direction,
        source: TelemetrySource::Instantaneous,
        ..TelemetrySample::default()
    }
}

struct ControlCore<M, T> {
    state: TrainState,
    pid: PidRegulator,
    motor: M,
    telemetry: T,
    aggregator: TelemetryAggregator,
}

/// The onboard control core.
///
/// Owns the [`TrainState`], the PID regulator, the motor and telemetry
/// sinks, and a 20-sample telemetry aggregator, all behind one mutex.
/// Constructed with an injectable [`Clock`]; core code never reads the
/// global clock.
pub struct TrainController<M: MotorOutput, T: TelemetrySink, C: Clock> {
    core: Mutex<ControlCore<M, T>>,
    stale_command_threshold: Duration,
    pilot_release_duration: Duration,
    fail_safe_ramp_duration: Duration,
    clock: C,
}

impl<M: MotorOutput, T: TelemetrySink, C: Clock> TrainController<M, T, C> {
    /// Create a controller.
    ///
    /// Seeds `last_command_timestamp` with the clock's current monotonic
    /// reading, so a freshly constructed controller is "live" until the
    /// stale threshold first elapses.
    pub fn new(
        pid: PidRegulator,
        motor: M,
        telemetry: T,
        config: ControllerConfig,
        clock: C,
    ) -> Self {
        let now = clock.monotonic_micros();
        let mut state = TrainState::new(now);
        state.fail_safe_ramp_duration = config.fail_safe_ramp_duration;
        state.pilot_release_duration = config.pilot_release_duration;

        Self {
            core: Mutex::new(ControlCore {
                state,
                pid,
                motor,
                telemetry,
                aggregator: TelemetryAggregator::new(AGGREGATOR_WINDOW),
            }),
            stale_command_threshold: config.stale_command_threshold,
            pilot_release_duration: config.pilot_release_duration,
            fail_safe_ramp_duration: config.fail_safe_ramp_duration,
            clock,
        }
    }

    /// Lock the core, recovering from poisoning: the aggregate stays
    /// internally consistent because no operation leaves it mid-mutation
    /// across a sink call that could panic the lock.
    fn lock_core(&self) -> MutexGuard<'_, ControlCore<M, T>> {
        match self.core.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Set the commanded target speed in m/s.
    ///
    /// A positive target clears a latched emergency stop.
    pub fn set_target_speed(&self, meters_per_second: f32) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let now = self.clock.monotonic_micros();

        core.state.update_target_speed(meters_per_second, now);
        if core.state.emergency_stop && meters_per_second > 0.0 {
            debug!("emergency stop cleared by positive target speed");
            core.state.emergency_stop = false;
        }
        lights::apply(&mut core.state);
    }

    /// Set the direction of travel.
    ///
    /// Neutral deselects the cab; otherwise a missing cab selection is
    /// inferred from the direction (front for forward, rear for reverse).
    pub fn set_direction(&self, direction: Direction) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let now = self.clock.monotonic_micros();

        core.state.set_direction(direction, now);
        if direction == Direction::Neutral {
            core.state.set_active_cab(ActiveCab::None, now);
        } else if core.state.active_cab == ActiveCab::None {
            let inferred = if direction == Direction::Forward {
                ActiveCab::Front
            } else {
                ActiveCab::Rear
            };
            core.state.set_active_cab(inferred, now);
        }
        lights::apply(&mut core.state);
    }

    /// Select the leading cab.
    pub fn set_active_cab(&self, cab: ActiveCab) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        core.state.set_active_cab(cab, self.clock.monotonic_micros());
        lights::apply(&mut core.state);
    }

    /// Record an operator lights override.
    ///
    /// A telemetry-only override updates the stored mask without touching
    /// the lamps.
    pub fn set_lights_override(&self, mask: u8, telemetry_only: bool) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        core.state
            .set_lights_override(mask, telemetry_only, self.clock.monotonic_micros());
        if !telemetry_only {
            lights::apply(&mut core.state);
        }
    }

    /// Headlight convenience: override mask 0x01 when enabled, cleared
    /// otherwise.
    pub fn toggle_headlights(&self, enabled: bool) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let mask = if enabled { 0x01 } else { 0x00 };
        core.state
            .set_lights_override(mask, false, self.clock.monotonic_micros());
        lights::apply(&mut core.state);
    }

    /// Turn the horn on or off.
    pub fn toggle_horn(&self, enabled: bool) {
        let mut guard = self.lock_core();
        guard.state.set_horn(enabled, self.clock.monotonic_micros());
    }

    /// Latch the emergency stop: both speeds to zero, regulator reset,
    /// motor off. Sticky until a positive target speed arrives.
    pub fn trigger_emergency_stop(&self) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        warn!("emergency stop triggered");
        core.state.apply_emergency_stop(self.clock.monotonic_micros());
        core.pid.reset();
        core.motor.write_duty(0.0);
        lights::apply(&mut core.state);
    }

    /// Feed one speed measurement into the control loop.
    ///
    /// Runs the liveness state machine, the lighting policy and the PID
    /// regulator, and drives the motor sink exactly once: with the
    /// regulator output in normal operation, with 0.0 on every emergency,
    /// fail-safe or pilot-release path.
    pub fn on_speed_measurement(&self, measured_mps: f32, dt: Duration) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let now = self.clock.monotonic_micros();

        core.state.update_applied_speed(measured_mps, now);

        if core.state.emergency_stop {
            core.motor.write_duty(0.0);
            return;
        }

        let age = now.saturating_sub(core.state.realtime.last_command_timestamp);
        let stale_micros = duration_micros(self.stale_command_threshold);
        let pilot_release_micros = duration_micros(self.pilot_release_duration);

        // Pilot release supersedes fail-safe.
        if !core.state.pilot_release_active
            && pilot_release_micros > 0
            && age > pilot_release_micros
        {
            warn!(
                "pilot release engaged after {} ms of link silence",
                age / 1_000
            );
            let state = &mut core.state;
            state.pilot_release_active = true;
            state.fail_safe_active = false;
            state.realtime.fail_safe_ramp_start = None;
            state.realtime.lights_latched = false;
            if !state.realtime.pilot_release_lights_latched {
                state.realtime.lights_override_mask_before_pilot_release =
                    state.lights_override_mask;
                state.realtime.lights_telemetry_only_before_pilot_release =
                    state.lights_telemetry_only;
                state.realtime.pilot_release_lights_latched = true;
            }
            state.lights_override_mask = 0;
            state.lights_telemetry_only = false;
            state.set_direction(Direction::Neutral, now);
            state.set_active_cab(ActiveCab::None, now);
            state.update_target_speed(0.0, now);
            state.realtime.pilot_release_telemetry_sent = false;
            core.pid.reset();
        }

        if !core.state.pilot_release_active && age > stale_micros {
            if !core.state.fail_safe_active {
                warn!(
                    "fail-safe engaged: last command is {} ms old",
                    age / 1_000
                );
                let state = &mut core.state;
                state.fail_safe_active = true;
                state.realtime.fail_safe_ramp_start = Some(now);
                state.realtime.fail_safe_initial_target = state.target_speed;
                state.realtime.lights_before_fail_safe = state.lights_state;
                state.realtime.lights_source_before_fail_safe = state.lights_source;
                state.realtime.lights_latched = true;
            }
        } else if core.state.fail_safe_active
            && (age <= stale_micros || core.state.pilot_release_active)
        {
            info!("fail-safe released");
            let state = &mut core.state;
            state.fail_safe_active = false;
            state.realtime.fail_safe_ramp_start = None;
            if state.realtime.lights_latched && !state.pilot_release_active {
                state.lights_state = state.realtime.lights_before_fail_safe;
                state.lights_source = state.realtime.lights_source_before_fail_safe;
            }
            state.realtime.lights_latched = false;
        }

        lights::apply(&mut core.state);

        if core.state.pilot_release_active && !core.state.realtime.pilot_release_telemetry_sent {
            let sample = availability_sample(&core.state, now);
            core.telemetry.publish(&sample);
            core.state.realtime.pilot_release_telemetry_sent = true;
        }

        if core.state.fail_safe_active {
            let ramp_micros = duration_micros(self.fail_safe_ramp_duration);
            let ramp_start = core.state.realtime.fail_safe_ramp_start;
            let mut new_target = 0.0;
            match ramp_start {
                Some(start) => {
                    let elapsed = now.saturating_sub(start);
                    if ramp_micros > 0 && elapsed < ramp_micros {
                        let ratio = (1.0 - elapsed as f32 / ramp_micros as f32).max(0.0);
                        new_target = core.state.realtime.fail_safe_initial_target * ratio;
                    } else {
                        // Ramp exhausted: come to rest in neutral.
                        core.state.set_direction(Direction::Neutral, now);
                        core.state.set_active_cab(ActiveCab::None, now);
                    }
                }
                // Ramp start lost (should not happen); re-arm it.
                None => core.state.realtime.fail_safe_ramp_start = Some(now),
            }
            core.state.update_target_speed(new_target, now);
            core.motor.write_duty(0.0);
            return;
        }

        if core.state.pilot_release_active {
            core.motor.write_duty(0.0);
            return;
        }

        let output = core.pid.update(core.state.target_speed, measured_mps, dt);
        core.motor.write_duty(output.clamp(0.0, 1.0));
    }

    /// Enrich a received telemetry sample with authoritative state fields,
    /// retain it in the aggregator, track the battery voltage and publish
    /// the enriched sample.
    pub fn on_telemetry_sample(&self, sample: &TelemetrySample) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let now = self.clock.monotonic_micros();

        let (progress, elapsed_millis) = fail_safe_metrics(&core.state, now);
        let mut enriched = sample.clone();
        enriched.fail_safe_active = core.state.fail_safe_active;
        enriched.fail_safe_progress = progress;
        enriched.fail_safe_elapsed_millis = elapsed_millis;
        enriched.lights_state = core.state.lights_state;
        enriched.lights_source = core.state.lights_source;
        enriched.active_cab = core.state.active_cab;
        enriched.lights_override_mask = core.state.lights_override_mask;
        enriched.lights_telemetry_only = core.state.lights_telemetry_only;
        enriched.applied_speed_mps = core.state.applied_speed;
        enriched.applied_direction = core.state.direction;
        enriched.source = TelemetrySource::Instantaneous;

        core.aggregator.add_sample(enriched.clone());
        core.state.set_battery_voltage(sample.battery_voltage, now);
        core.telemetry.publish(&enriched);
    }

    /// Record the (normalized, monotonic) timestamp of an accepted command.
    ///
    /// Restores the lamp state latched at fail-safe entry and the override
    /// mask latched at pilot-release entry. The `fail_safe_active` flag
    /// itself clears on the next measurement tick once the age drops below
    /// the stale threshold.
    pub fn register_command_timestamp(&self, timestamp_micros: u64) {
        let mut guard = self.lock_core();
        let core = &mut *guard;
        let now = self.clock.monotonic_micros();

        let was_fail_safe = core.state.fail_safe_active;
        let was_pilot_released = core.state.pilot_release_active;
        core.state.update_command_timestamp(timestamp_micros, now);

        if was_fail_safe && core.state.realtime.lights_latched {
            let state = &mut core.state;
            state.lights_state = state.realtime.lights_before_fail_safe;
            state.lights_source = state.realtime.lights_source_before_fail_safe;
            state.realtime.lights_latched = false;
        }

        if was_pilot_released {
            info!("pilot release ended by incoming command");
            let state = &mut core.state;
            state.pilot_release_active = false;
            if state.realtime.pilot_release_lights_latched {
                state.lights_override_mask =
                    state.realtime.lights_override_mask_before_pilot_release;
                state.lights_telemetry_only =
                    state.realtime.lights_telemetry_only_before_pilot_release;
                state.realtime.pilot_release_lights_latched = false;
            }
        }

        lights::apply(&mut core.state);
    }

    /// Snapshot of the current train state.
    pub fn state(&self) -> TrainState {
        self.lock_core().state.clone()
    }

    /// Average over the controller's telemetry window, if any samples were
    /// retained.
    pub fn aggregated_telemetry(&self) -> Option<TelemetrySample> {
        self.lock_core().aggregator.average()
    }
}
