//! Mock implementations for testing without hardware or a live link.
//!
//! All mocks hand out cloneable inspection handles: the clone moved into
//! the controller or channel shares state with the clone the test keeps, so
//! assertions can run after ownership transfers.
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockMotor`] | [`MotorOutput`] | Records every duty-cycle write |
//! | [`MockClock`] | [`Clock`] | Hand-advanced monotonic + wall time |
//! | [`MockTransport`] | [`BinaryTransport`] | Queued reads, captured writes |
//! | [`RecordingTelemetry`] | [`TelemetrySink`] | Captures published samples |
//!
//! # Example
//!
//! ```
//! use locolink::hal::{MockClock, MockMotor};
//! use locolink::traits::{Clock, MotorOutput};
//!
//! let mut motor = MockMotor::new();
//! let probe = motor.clone();
//! motor.write_duty(0.4);
//! assert_eq!(probe.last_command(), Some(0.4));
//!
//! let clock = MockClock::new();
//! clock.advance(core::time::Duration::from_millis(50));
//! assert_eq!(clock.monotonic_micros(), 50_000);
//! ```

use core::time::Duration;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::telemetry::TelemetrySample;
use crate::traits::{BinaryTransport, Clock, MotorOutput, TelemetrySink};

// ============================================================================
// Motor
// ============================================================================

/// Mock traction motor that records every commanded duty cycle.
#[derive(Clone, Debug, Default)]
pub struct MockMotor {
    commands: Arc<Mutex<Vec<f32>>>,
}

impl MockMotor {
    /// Creates a new mock motor with no recorded commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// All duty cycles written so far, oldest first.
    pub fn commands(&self) -> Vec<f32> {
        self.lock().clone()
    }

    /// The most recent duty cycle, if any write happened.
    pub fn last_command(&self) -> Option<f32> {
        self.lock().last().copied()
    }

    /// Number of writes so far.
    pub fn command_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<f32>> {
        match self.commands.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MotorOutput for MockMotor {
    fn write_duty(&mut self, duty: f32) {
        self.lock().push(duty);
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Hand-advanced time source.
///
/// Both timelines start at zero; `advance` moves them together, and the
/// setters move them independently for clock-skew tests. Interior
/// mutability means a single `Arc<MockClock>` can be shared between the
/// test and every component under test.
#[derive(Debug, Default)]
pub struct MockClock {
    monotonic_micros: AtomicU64,
    wall_micros: AtomicU64,
}

impl MockClock {
    /// Creates a clock with both timelines at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance both timelines.
    pub fn advance(&self, duration: Duration) {
        self.advance_micros(duration.as_micros() as u64);
    }

    /// Advance both timelines by the given number of microseconds.
    pub fn advance_micros(&self, micros: u64) {
        self.monotonic_micros.fetch_add(micros, Ordering::SeqCst);
        self.wall_micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Pin the monotonic timeline.
    pub fn set_monotonic_micros(&self, micros: u64) {
        self.monotonic_micros.store(micros, Ordering::SeqCst);
    }

    /// Pin the wall-clock timeline.
    pub fn set_wall_micros(&self, micros: u64) {
        self.wall_micros.store(micros, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn monotonic_micros(&self) -> u64 {
        self.monotonic_micros.load(Ordering::SeqCst)
    }

    fn wall_micros(&self) -> u64 {
        self.wall_micros.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Telemetry sink
// ============================================================================

/// Telemetry sink that records every published sample.
#[derive(Clone, Debug, Default)]
pub struct RecordingTelemetry {
    samples: Arc<Mutex<Vec<TelemetrySample>>>,
}

impl RecordingTelemetry {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All published samples, oldest first.
    pub fn samples(&self) -> Vec<TelemetrySample> {
        self.lock().clone()
    }

    /// Number of samples published so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing was published yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The most recent sample.
    pub fn last(&self) -> Option<TelemetrySample> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TelemetrySample>> {
        match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&mut self, sample: &TelemetrySample) {
        self.lock().push(sample.clone());
    }
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Debug, Default)]
struct TransportInner {
    connected: bool,
    connected_uri: Option<String>,
    connect_count: usize,
    close_count: usize,
    sent: Vec<Vec<u8>>,
    incoming: VecDeque<Vec<u8>>,
}

/// In-memory binary transport.
///
/// Queue inbound messages with [`queue_incoming`](Self::queue_incoming) and
/// inspect outbound frames with [`sent`](Self::sent). `receive_binary`
/// returns queued messages immediately and `Ok(None)` when the queue is
/// empty; the timeout is never actually waited out.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<TransportInner>>,
}

impl MockTransport {
    /// Creates a disconnected transport with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message to be returned by the next `receive_binary`.
    pub fn queue_incoming(&self, bytes: Vec<u8>) {
        self.lock().incoming.push_back(bytes);
    }

    /// All messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Whether the transport is currently connected.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// The URI passed to the most recent `connect`.
    pub fn connected_uri(&self) -> Option<String> {
        self.lock().connected_uri.clone()
    }

    /// Number of `connect` calls.
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransportInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl BinaryTransport for MockTransport {
    type Error = ();

    fn connect(&mut self, uri: &str) -> Result<(), ()> {
        let mut inner = self.lock();
        inner.connected = true;
        inner.connected_uri = Some(uri.to_string());
        inner.connect_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ()> {
        let mut inner = self.lock();
        inner.connected = false;
        inner.close_count += 1;
        Ok(())
    }

    fn send_binary(&mut self, bytes: &[u8]) -> Result<(), ()> {
        self.lock().sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive_binary(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, ()> {
        Ok(self.lock().incoming.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // MockMotor
    // =========================================================================

    #[test]
    fn mock_motor_records_commands() {
        let mut motor = MockMotor::new();
        let probe = motor.clone();

        motor.write_duty(0.25);
        motor.write_duty(0.75);

        assert_eq!(probe.commands(), vec![0.25, 0.75]);
        assert_eq!(probe.last_command(), Some(0.75));
        assert_eq!(probe.command_count(), 2);
    }

    #[test]
    fn mock_motor_starts_empty() {
        let motor = MockMotor::new();
        assert_eq!(motor.last_command(), None);
        assert_eq!(motor.command_count(), 0);
    }

    // =========================================================================
    // MockClock
    // =========================================================================

    #[test]
    fn mock_clock_starts_at_zero() {
        let clock = MockClock::new();
        assert_eq!(clock.monotonic_micros(), 0);
        assert_eq!(clock.wall_micros(), 0);
    }

    #[test]
    fn mock_clock_advance_moves_both_timelines() {
        let clock = MockClock::new();
        clock.advance(Duration::from_millis(30));
        assert_eq!(clock.monotonic_micros(), 30_000);
        assert_eq!(clock.wall_micros(), 30_000);
    }

    #[test]
    fn mock_clock_timelines_can_diverge() {
        let clock = MockClock::new();
        clock.set_monotonic_micros(1_000);
        clock.set_wall_micros(1_000_000_000);
        assert_eq!(clock.monotonic_micros(), 1_000);
        assert_eq!(clock.wall_micros(), 1_000_000_000);
    }

    // =========================================================================
    // RecordingTelemetry
    // =========================================================================

    #[test]
    fn recording_telemetry_captures_samples() {
        let mut sink = RecordingTelemetry::new();
        let probe = sink.clone();
        assert!(probe.is_empty());

        sink.publish(&TelemetrySample {
            speed_mps: 1.0,
            ..TelemetrySample::default()
        });

        assert_eq!(probe.len(), 1);
        assert_eq!(probe.last().map(|s| s.speed_mps), Some(1.0));
    }

    // =========================================================================
    // MockTransport
    // =========================================================================

    #[test]
    fn mock_transport_lifecycle() {
        let mut transport = MockTransport::new();
        let probe = transport.clone();

        assert!(!probe.is_connected());
        transport.connect("wss://train.local/control").unwrap();
        assert!(probe.is_connected());
        assert_eq!(
            probe.connected_uri().as_deref(),
            Some("wss://train.local/control")
        );

        transport.close().unwrap();
        transport.close().unwrap();
        assert!(!probe.is_connected());
        assert_eq!(probe.close_count(), 2);
    }

    #[test]
    fn mock_transport_queues_and_captures() {
        let mut transport = MockTransport::new();
        let probe = transport.clone();

        probe.queue_incoming(vec![1, 2, 3]);
        let received = transport.receive_binary(Duration::from_millis(10)).unwrap();
        assert_eq!(received, Some(vec![1, 2, 3]));

        let received = transport.receive_binary(Duration::from_millis(10)).unwrap();
        assert_eq!(received, None);

        transport.send_binary(&[9, 8]).unwrap();
        assert_eq!(probe.sent(), vec![vec![9, 8]]);
    }
}
