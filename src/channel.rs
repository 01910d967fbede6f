//! Command channel: session binding, frame dispatch and telemetry
//! publication over a pluggable binary transport.
//!
//! The channel owns the [`CommandProcessor`] and a [`BinaryTransport`]
//! (one-way fan-in; there are no back-edges from the processor or the
//! controller toward the channel). A cooperative outer loop drives it:
//! [`poll`](CommandChannel::poll) performs one bounded-duration read and
//! forwards any decoded frame to the processor, and
//! [`publish_telemetry`](CommandChannel::publish_telemetry) sends an
//! enriched sample back to the operator as a heartbeat-flagged frame.
//!
//! # Telemetry status payload
//!
//! Outgoing telemetry frames carry a fixed 36-byte little-endian payload:
//!
//! ```text
//! offset  size  field
//!      0     4  speed (f32, m/s)
//!      4     4  motor current (f32, A)
//!      8     4  battery voltage (f32, V)
//!     12     4  temperature (f32, °C)
//!     16     4  applied speed (f32, m/s)
//!     20     4  fail-safe progress (f32, 0..=1)
//!     24     4  fail-safe elapsed (u32, ms)
//!     28     1  flags (bit 0 fail-safe active, bit 1 telemetry-only override)
//!     29     1  active cab
//!     30     1  lights state
//!     31     1  lights source
//!     32     1  lights override mask
//!     33     1  telemetry source
//!     34     1  applied direction
//!     35     1  reserved
//! ```

use log::{debug, info};

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::frame::{CommandFrame, FrameHeader, LIGHTS_TELEMETRY_ONLY_BIT};
use crate::processor::{CommandProcessor, FrameDisposition};
use crate::telemetry::TelemetrySample;
use crate::traits::{BinaryTransport, Clock, MotorOutput, TelemetrySink};

/// Size of the telemetry status payload in bytes.
pub const STATUS_PAYLOAD_LEN: usize = 36;

/// Encode the telemetry status payload carried by outgoing frames.
fn encode_status_payload(sample: &TelemetrySample) -> Vec<u8> {
    let mut payload = Vec::with_capacity(STATUS_PAYLOAD_LEN);

    payload.extend_from_slice(&sample.speed_mps.to_le_bytes());
    payload.extend_from_slice(&sample.motor_current_amps.to_le_bytes());
    payload.extend_from_slice(&sample.battery_voltage.to_le_bytes());
    payload.extend_from_slice(&sample.temperature_celsius.to_le_bytes());
    payload.extend_from_slice(&sample.applied_speed_mps.to_le_bytes());
    payload.extend_from_slice(&sample.fail_safe_progress.to_le_bytes());
    payload.extend_from_slice(&sample.fail_safe_elapsed_millis.to_le_bytes());

    let mut flags = 0u8;
    if sample.fail_safe_active {
        flags |= 0x01;
    }
    if sample.lights_telemetry_only {
        flags |= 0x02;
    }
    payload.push(flags);
    payload.push(sample.active_cab.wire_code());
    payload.push(sample.lights_state.wire_code());
    payload.push(sample.lights_source.wire_code());
    payload.push(sample.lights_override_mask);
    payload.push(sample.source.wire_code());
    payload.push(sample.applied_direction.wire_code());
    payload.push(0);

    payload
}

/// Binds an operator session to a transport and shuttles frames both ways.
pub struct CommandChannel<W, M, T, C>
where
    W: BinaryTransport,
    M: MotorOutput,
    T: TelemetrySink,
    C: Clock,
{
    config: ChannelConfig,
    transport: W,
    processor: CommandProcessor<M, T, C>,
    clock: C,
    running: bool,
}

impl<W, M, T, C> CommandChannel<W, M, T, C>
where
    W: BinaryTransport,
    M: MotorOutput,
    T: TelemetrySink,
    C: Clock,
{
    /// Create a channel over the given transport.
    pub fn new(
        config: ChannelConfig,
        transport: W,
        processor: CommandProcessor<M, T, C>,
        clock: C,
    ) -> Self {
        Self {
            config,
            transport,
            processor,
            clock,
            running: false,
        }
    }

    /// Open the transport and bind the session. Idempotent.
    pub fn start(&mut self) -> Result<(), ChannelError<W::Error>> {
        if self.running {
            return Ok(());
        }
        self.transport
            .connect(self.config.uri.as_str())
            .map_err(ChannelError::Transport)?;
        self.running = true;
        info!("command channel connected to {}", self.config.uri);
        Ok(())
    }

    /// Close the transport. Idempotent; also runs on drop.
    pub fn stop(&mut self) -> Result<(), ChannelError<W::Error>> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.transport.close().map_err(ChannelError::Transport)?;
        info!("command channel closed");
        Ok(())
    }

    /// Whether the channel is currently started.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the processor's low-frequency fallback flag is set.
    pub fn low_frequency_fallback_active(&self) -> bool {
        self.processor.low_frequency_fallback_active()
    }

    /// Attempt one bounded-duration read; decode and process any frame
    /// that arrives.
    ///
    /// Returns `Ok(None)` when the channel is stopped or nothing arrived
    /// within the receive timeout.
    pub fn poll(&mut self) -> Result<Option<FrameDisposition>, ChannelError<W::Error>> {
        if !self.running {
            return Ok(None);
        }
        let bytes = self
            .transport
            .receive_binary(self.config.receive_timeout)
            .map_err(ChannelError::Transport)?;
        let bytes = match bytes {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(None),
        };

        let frame = CommandFrame::decode(&bytes)?;
        let arrival = self.clock.monotonic_micros();
        let disposition = self.processor.process_frame(&frame, arrival)?;
        debug!("frame {}: {}", frame.header.sequence, disposition);
        Ok(Some(disposition))
    }

    /// Publish one telemetry sample to the operator.
    ///
    /// The frame header carries the applied speed and direction; the
    /// session id, sequence and timestamp fall back to the channel's
    /// session, the given sequence and the current wall clock when the
    /// sample carries zeros. Quietly does nothing while stopped.
    pub fn publish_telemetry(
        &mut self,
        sample: &TelemetrySample,
        fallback_sequence: u32,
    ) -> Result<(), ChannelError<W::Error>> {
        if !self.running {
            return Ok(());
        }

        let session_id = if sample.session_id == [0; 16] {
            self.config.session_id
        } else {
            sample.session_id
        };
        let sequence = if sample.sequence != 0 {
            sample.sequence
        } else {
            fallback_sequence
        };
        let timestamp_micros = if sample.command_timestamp_micros != 0 {
            sample.command_timestamp_micros
        } else {
            self.clock.wall_micros()
        };

        let frame = CommandFrame {
            header: FrameHeader {
                session_id,
                sequence,
                timestamp_micros,
                target_speed_mps: sample.applied_speed_mps,
                direction: sample.applied_direction,
                lights_override: (sample.lights_override_mask & !LIGHTS_TELEMETRY_ONLY_BIT)
                    | LIGHTS_TELEMETRY_ONLY_BIT,
            },
            payload: encode_status_payload(sample),
        };

        self.transport
            .send_binary(&frame.encode())
            .map_err(ChannelError::Transport)
    }
}

impl<W, M, T, C> Drop for CommandChannel<W, M, T, C>
where
    W: BinaryTransport,
    M: MotorOutput,
    T: TelemetrySink,
    C: Clock,
{
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
