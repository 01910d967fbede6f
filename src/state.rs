//! Train state: the single source of truth for the control core.
//!
//! [`TrainState`] aggregates the kinematic setpoints, lighting
//! configuration, liveness bookkeeping and battery reading for the
//! locomotive. It is owned by the
//! [`TrainController`](crate::TrainController) and mutated only through the
//! controller's public operations, all of which run under a single mutex.
//! Reads hand out a snapshot clone; the state is never exposed by shared
//! reference outside the lock.
//!
//! # Invariants
//!
//! After every public controller operation returns:
//!
//! - `target_speed` and `applied_speed` are clamped into [0, 5] m/s and
//!   `battery_voltage` into [0, 12.6] V
//! - `emergency_stop` implies both speeds are zero (until the operator
//!   commands a positive target speed again)
//! - fail-safe without pilot release forces `BothRed` lamps from the
//!   `FailSafe` source
//! - pilot release forces neutral direction, no active cab, zero target
//!   speed and a cleared lights override
//!
//! Timekeeping note: mutators take the current monotonic time in
//! microseconds as an explicit argument. Core code never reads a global
//! clock; the controller passes down its injected [`Clock`](crate::Clock).

use core::time::Duration;

/// Maximum commanded or measured speed in meters per second.
pub const MAX_SPEED_MPS: f32 = 5.0;

/// Maximum plausible battery voltage (3S LiPo fully charged).
pub const MAX_BATTERY_VOLTS: f32 = 12.6;

/// Direction of travel.
///
/// On the wire this encodes as a single byte: 0 = neutral, 1 = forward,
/// 2 = reverse. Unknown codes decode to [`Neutral`](Self::Neutral).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Moving toward the front cab.
    Forward,
    /// Moving toward the rear cab.
    Reverse,
    /// Not commanded in either direction.
    #[default]
    Neutral,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Neutral => "neutral",
        }
    }

    /// Parse a direction from text input (trimmed, case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use locolink::Direction;
    ///
    /// assert_eq!(Direction::from_text("forward"), Some(Direction::Forward));
    /// assert_eq!(Direction::from_text(" REVERSE "), Some(Direction::Reverse));
    /// assert_eq!(Direction::from_text("sideways"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "fwd" => Some(Direction::Forward),
            "reverse" | "rev" => Some(Direction::Reverse),
            "neutral" => Some(Direction::Neutral),
            _ => None,
        }
    }

    /// Wire encoding of the direction.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            Direction::Neutral => 0,
            Direction::Forward => 1,
            Direction::Reverse => 2,
        }
    }

    /// Decode a direction byte; unknown codes fall back to neutral.
    #[inline]
    pub const fn from_wire(code: u8) -> Self {
        match code {
            1 => Direction::Forward,
            2 => Direction::Reverse,
            _ => Direction::Neutral,
        }
    }
}

/// Which end of the locomotive is currently leading for lighting purposes.
///
/// Independent of the direction of travel: a locomotive can run in reverse
/// while the front cab stays active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ActiveCab {
    /// No cab selected (parked or pilot released).
    #[default]
    None,
    /// Front cab is leading.
    Front,
    /// Rear cab is leading.
    Rear,
}

impl ActiveCab {
    /// Wire encoding of the active cab.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            ActiveCab::None => 0,
            ActiveCab::Front => 1,
            ActiveCab::Rear => 2,
        }
    }
}

/// Lamp configuration at both ends of the locomotive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LightsState {
    /// Red at both ends (parked, neutral, or fail-safe).
    #[default]
    BothRed,
    /// White headlight at the front, red marker at the rear.
    FrontWhiteRearRed,
    /// Red marker at the front, white headlight at the rear.
    FrontRedRearWhite,
    /// All lamps off.
    BothOff,
    /// White at both ends.
    BothWhite,
    /// Flashing red at both ends (reserved for future fault signalling).
    BothRedFlashing,
}

impl LightsState {
    /// Wire encoding of the lamp configuration.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            LightsState::BothRed => 0,
            LightsState::FrontWhiteRearRed => 1,
            LightsState::FrontRedRearWhite => 2,
            LightsState::BothOff => 3,
            LightsState::BothWhite => 4,
            LightsState::BothRedFlashing => 5,
        }
    }
}

/// What decided the current lamp configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LightsSource {
    /// Derived from active cab and direction.
    #[default]
    Automatic,
    /// Forced by an operator override mask.
    Override,
    /// Forced red by the fail-safe engine.
    FailSafe,
}

impl LightsSource {
    /// Wire encoding of the lights source.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            LightsSource::Automatic => 0,
            LightsSource::Override => 1,
            LightsSource::FailSafe => 2,
        }
    }
}

/// Liveness scratch pad, private to the controller.
///
/// Tracks when the last command arrived and everything the fail-safe and
/// pilot-release engines need to latch and later restore: the lamp state
/// before fail-safe reddened it, and the override mask before pilot release
/// zeroed it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealtimeSession {
    /// Monotonic instant (microseconds) of the most recent accepted command.
    pub last_command_timestamp: u64,
    /// Start of the fail-safe ramp-down, if one is in progress.
    pub fail_safe_ramp_start: Option<u64>,
    /// Target speed at the moment fail-safe engaged (anchor for the ramp).
    pub fail_safe_initial_target: f32,
    /// Lamp state latched when fail-safe engaged.
    pub lights_before_fail_safe: LightsState,
    /// Lamp source latched when fail-safe engaged.
    pub lights_source_before_fail_safe: LightsSource,
    /// Whether the pre-fail-safe lamp latch is armed.
    pub lights_latched: bool,
    /// Override mask latched when pilot release engaged.
    pub lights_override_mask_before_pilot_release: u8,
    /// Telemetry-only flag latched when pilot release engaged.
    pub lights_telemetry_only_before_pilot_release: bool,
    /// Whether the pre-pilot-release override latch is armed.
    pub pilot_release_lights_latched: bool,
    /// One-shot gate: the availability telemetry for the current
    /// pilot-release engagement has been published.
    pub pilot_release_telemetry_sent: bool,
}

impl RealtimeSession {
    fn new(now_micros: u64) -> Self {
        Self {
            last_command_timestamp: now_micros,
            fail_safe_ramp_start: None,
            fail_safe_initial_target: 0.0,
            lights_before_fail_safe: LightsState::BothRed,
            lights_source_before_fail_safe: LightsSource::Automatic,
            lights_latched: false,
            lights_override_mask_before_pilot_release: 0,
            lights_telemetry_only_before_pilot_release: false,
            pilot_release_lights_latched: false,
            pilot_release_telemetry_sent: false,
        }
    }
}

/// The protected train state aggregate.
///
/// Constructed at controller construction with `last_command_timestamp`
/// seeded from the injected clock, and destroyed with the controller.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainState {
    /// Commanded direction of travel.
    pub direction: Direction,
    /// Commanded setpoint in m/s, clamped to [0, 5].
    pub target_speed: f32,
    /// Most recently measured true speed in m/s, clamped to [0, 5].
    pub applied_speed: f32,
    /// Whether the horn is sounding.
    pub horn: bool,
    /// Sticky emergency-stop flag; cleared by a positive target speed.
    pub emergency_stop: bool,
    /// Battery voltage in volts, clamped to [0, 12.6].
    pub battery_voltage: f32,
    /// Whether the fail-safe engine is ramping the train down.
    pub fail_safe_active: bool,
    /// Whether the terminal pilot-release state is engaged.
    pub pilot_release_active: bool,
    /// Which cab currently leads for lighting purposes.
    pub active_cab: ActiveCab,
    /// Current lamp configuration.
    pub lights_state: LightsState,
    /// What decided the current lamp configuration.
    pub lights_source: LightsSource,
    /// Operator override mask; the low 7 bits are meaningful (bit 7 is the
    /// telemetry-only flag on the wire and never stored here).
    pub lights_override_mask: u8,
    /// Suppresses the override's effect on the lamps while still recording
    /// the mask.
    pub lights_telemetry_only: bool,
    /// Configured duration of the fail-safe ramp-down.
    pub fail_safe_ramp_duration: Duration,
    /// Configured silence before pilot release engages (zero disables it).
    pub pilot_release_duration: Duration,
    /// Liveness bookkeeping.
    pub realtime: RealtimeSession,
    /// Monotonic instant (microseconds) of the last mutation.
    pub last_updated: u64,
}

impl TrainState {
    /// Create the initial state at the given monotonic instant.
    pub fn new(now_micros: u64) -> Self {
        Self {
            direction: Direction::Forward,
            target_speed: 0.0,
            applied_speed: 0.0,
            horn: false,
            emergency_stop: false,
            battery_voltage: 0.0,
            fail_safe_active: false,
            pilot_release_active: false,
            active_cab: ActiveCab::None,
            lights_state: LightsState::BothRed,
            lights_source: LightsSource::Automatic,
            lights_override_mask: 0,
            lights_telemetry_only: false,
            fail_safe_ramp_duration: Duration::ZERO,
            pilot_release_duration: Duration::ZERO,
            realtime: RealtimeSession::new(now_micros),
            last_updated: now_micros,
        }
    }

    /// Latch the emergency stop: zero both speeds and disarm the fail-safe
    /// ramp. The flag stays set until a positive target speed arrives.
    pub fn apply_emergency_stop(&mut self, now_micros: u64) {
        self.emergency_stop = true;
        self.target_speed = 0.0;
        self.applied_speed = 0.0;
        self.fail_safe_active = false;
        self.realtime.fail_safe_ramp_start = None;
        self.last_updated = now_micros;
    }

    /// Set the target speed, clamped to [0, 5] m/s.
    pub fn update_target_speed(&mut self, meters_per_second: f32, now_micros: u64) {
        self.target_speed = meters_per_second.clamp(0.0, MAX_SPEED_MPS);
        self.last_updated = now_micros;
    }

    /// Record a measured speed, clamped to [0, 5] m/s.
    pub fn update_applied_speed(&mut self, measured: f32, now_micros: u64) {
        self.applied_speed = measured.clamp(0.0, MAX_SPEED_MPS);
        self.last_updated = now_micros;
    }

    /// Set the direction of travel.
    pub fn set_direction(&mut self, direction: Direction, now_micros: u64) {
        self.direction = direction;
        self.last_updated = now_micros;
    }

    /// Select the leading cab.
    pub fn set_active_cab(&mut self, cab: ActiveCab, now_micros: u64) {
        self.active_cab = cab;
        self.last_updated = now_micros;
    }

    /// Record an operator lights override.
    ///
    /// The mask is stored even when `telemetry_only` is set; the light
    /// policy decides whether it takes effect.
    pub fn set_lights_override(&mut self, mask: u8, telemetry_only: bool, now_micros: u64) {
        self.lights_override_mask = mask;
        self.lights_telemetry_only = telemetry_only;
        self.last_updated = now_micros;
    }

    /// Turn the horn on or off.
    pub fn set_horn(&mut self, enabled: bool, now_micros: u64) {
        self.horn = enabled;
        self.last_updated = now_micros;
    }

    /// Record the battery voltage, clamped to [0, 12.6] V.
    pub fn set_battery_voltage(&mut self, volts: f32, now_micros: u64) {
        self.battery_voltage = volts.clamp(0.0, MAX_BATTERY_VOLTS);
        self.last_updated = now_micros;
    }

    /// Record the monotonic instant of an accepted command.
    pub fn update_command_timestamp(&mut self, timestamp_micros: u64, now_micros: u64) {
        self.realtime.last_command_timestamp = timestamp_micros;
        self.last_updated = now_micros;
    }
}
