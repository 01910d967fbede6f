//! Telemetry samples and the fixed-window rolling aggregator.
//!
//! Every sample carries the instantaneous sensor readings plus the
//! correlation metadata (session id, sequence, command timestamp) and the
//! authoritative state fields the controller stamps on before publication.
//! The aggregator keeps a sliding window and exposes an averaged sample
//! whose correlation fields come from the newest entry, so downstream
//! consumers can still tie the average back to the operator session.

use std::collections::VecDeque;

use crate::state::{ActiveCab, Direction, LightsSource, LightsState};

/// Whether a sample is a single measurement or a window average.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TelemetrySource {
    /// A single enriched measurement.
    #[default]
    Instantaneous,
    /// The arithmetic mean over the aggregator window.
    Aggregated,
}

impl TelemetrySource {
    /// Wire encoding of the telemetry source.
    #[inline]
    pub const fn wire_code(self) -> u8 {
        match self {
            TelemetrySource::Instantaneous => 0,
            TelemetrySource::Aggregated => 1,
        }
    }
}

/// One telemetry sample.
///
/// Sensor producers fill in the measurement fields; the controller enriches
/// the sample with the authoritative state fields before it reaches the
/// aggregator or the telemetry sink.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TelemetrySample {
    /// Measured ground speed in m/s.
    pub speed_mps: f32,
    /// Motor current draw in amps.
    pub motor_current_amps: f32,
    /// Battery voltage in volts.
    pub battery_voltage: f32,
    /// Controller board temperature in °C.
    pub temperature_celsius: f32,
    /// Whether the fail-safe engine was active when the sample was taken.
    pub fail_safe_active: bool,
    /// Progress of the fail-safe ramp, 0.0 to 1.0.
    pub fail_safe_progress: f32,
    /// Milliseconds since the fail-safe ramp started.
    pub fail_safe_elapsed_millis: u32,
    /// Lamp configuration at sample time.
    pub lights_state: LightsState,
    /// What decided the lamp configuration.
    pub lights_source: LightsSource,
    /// Leading cab at sample time.
    pub active_cab: ActiveCab,
    /// Operator override mask at sample time.
    pub lights_override_mask: u8,
    /// Whether the override was telemetry-only.
    pub lights_telemetry_only: bool,
    /// Session id correlating the sample with an operator session.
    pub session_id: [u8; 16],
    /// Sequence number of the correlated command frame.
    pub sequence: u32,
    /// Wall-clock microseconds of the correlated command.
    pub command_timestamp_micros: u64,
    /// Speed the controller most recently measured, in m/s.
    pub applied_speed_mps: f32,
    /// Direction the controller was actually holding.
    pub applied_direction: Direction,
    /// Instantaneous measurement or window average.
    pub source: TelemetrySource,
}

/// Fixed-window rolling average with correlation-metadata preservation.
///
/// # Example
///
/// ```
/// use locolink::{TelemetryAggregator, TelemetrySample, TelemetrySource};
///
/// let mut aggregator = TelemetryAggregator::new(10);
/// aggregator.add_sample(TelemetrySample {
///     speed_mps: 1.0,
///     ..TelemetrySample::default()
/// });
///
/// let average = aggregator.average().unwrap();
/// assert_eq!(average.speed_mps, 1.0);
/// assert_eq!(average.source, TelemetrySource::Aggregated);
/// ```
#[derive(Clone, Debug)]
pub struct TelemetryAggregator {
    samples: VecDeque<TelemetrySample>,
    window_size: usize,
}

impl Default for TelemetryAggregator {
    /// A 10-sample window, the default for channel-side aggregation.
    fn default() -> Self {
        Self::new(10)
    }
}

impl TelemetryAggregator {
    /// Create an aggregator holding at most `window_size` samples.
    ///
    /// A zero window is treated as one.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Push a sample, evicting the oldest when the window is full.
    pub fn add_sample(&mut self, sample: TelemetrySample) {
        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Average over the window, or `None` when no samples are held.
    ///
    /// Float fields are arithmetic means; `fail_safe_active` is the OR
    /// across the window; the categorical and correlation fields come from
    /// the newest sample; `source` is [`TelemetrySource::Aggregated`].
    pub fn average(&self) -> Option<TelemetrySample> {
        let latest = self.samples.back()?;

        let mut result = TelemetrySample::default();
        let mut any_fail_safe = false;
        for sample in &self.samples {
            result.speed_mps += sample.speed_mps;
            result.motor_current_amps += sample.motor_current_amps;
            result.battery_voltage += sample.battery_voltage;
            result.temperature_celsius += sample.temperature_celsius;
            result.applied_speed_mps += sample.applied_speed_mps;
            result.fail_safe_progress += sample.fail_safe_progress;
            any_fail_safe = any_fail_safe || sample.fail_safe_active;
        }

        let size = self.samples.len() as f32;
        result.speed_mps /= size;
        result.motor_current_amps /= size;
        result.battery_voltage /= size;
        result.temperature_celsius /= size;
        result.applied_speed_mps /= size;
        result.fail_safe_progress /= size;

        result.fail_safe_active = any_fail_safe;
        result.fail_safe_elapsed_millis = latest.fail_safe_elapsed_millis;
        result.session_id = latest.session_id;
        result.sequence = latest.sequence;
        result.command_timestamp_micros = latest.command_timestamp_micros;
        result.lights_state = latest.lights_state;
        result.lights_source = latest.lights_source;
        result.active_cab = latest.active_cab;
        result.lights_override_mask = latest.lights_override_mask;
        result.lights_telemetry_only = latest.lights_telemetry_only;
        result.applied_direction = latest.applied_direction;
        result.source = TelemetrySource::Aggregated;

        Some(result)
    }

    /// Snapshot of the retained samples, oldest first.
    pub fn history(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop all retained samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
