//! Wire codec for the fixed-layout command/telemetry frame.
//!
//! Every frame on the command link (operator commands inbound, telemetry
//! outbound) shares one little-endian layout:
//!
//! ```text
//! offset  size  field
//!      0    16  session id (opaque UUID bytes)
//!     16     4  sequence (u32)
//!     20     8  timestamp (u64, microseconds since the sender's wall-clock epoch)
//!     28     4  target speed (IEEE-754 f32, m/s)
//!     32     1  direction (0 = neutral, 1 = forward, 2 = reverse)
//!     33     1  lights override (bit 7 = telemetry/heartbeat only, bits 0..3 = lamp mask)
//!     34     2  aux payload length (u16)
//!     36     …  aux payload
//! ```
//!
//! A set bit 7 in the lights override byte marks the frame as telemetry or
//! heartbeat only: the header setpoints must not be applied.
//!
//! # Example
//!
//! ```
//! use locolink::{CommandFrame, Direction, FrameHeader};
//!
//! let frame = CommandFrame {
//!     header: FrameHeader {
//!         session_id: [7; 16],
//!         sequence: 42,
//!         timestamp_micros: 1_000_000,
//!         target_speed_mps: 1.5,
//!         direction: Direction::Forward,
//!         lights_override: 0x01,
//!     },
//!     payload: vec![0x02],
//! };
//!
//! let bytes = frame.encode();
//! assert_eq!(CommandFrame::decode(&bytes).unwrap(), frame);
//! ```

use crate::error::CommandError;
use crate::state::Direction;

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 36;

/// Bit 7 of the lights override byte: the frame is telemetry/heartbeat only.
pub const LIGHTS_TELEMETRY_ONLY_BIT: u8 = 0x80;

/// Lamp mask bit: force the front lamp white.
pub const LIGHTS_FRONT_WHITE: u8 = 0x01;
/// Lamp mask bit: force the rear lamp white.
pub const LIGHTS_REAR_WHITE: u8 = 0x02;
/// Lamp mask bit: force the front lamp red.
pub const LIGHTS_FRONT_RED: u8 = 0x04;
/// Lamp mask bit: force the rear lamp red.
pub const LIGHTS_REAR_RED: u8 = 0x08;

/// Decoded frame header fields.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameHeader {
    /// Opaque 16-byte session identifier binding the frame to an operator
    /// session.
    pub session_id: [u8; 16],
    /// Sender-assigned sequence number.
    pub sequence: u32,
    /// Microseconds since the sender's wall-clock epoch; zero means "use
    /// the arrival instant".
    pub timestamp_micros: u64,
    /// Commanded target speed in m/s.
    pub target_speed_mps: f32,
    /// Commanded direction of travel.
    pub direction: Direction,
    /// Raw lights override byte (telemetry-only flag plus lamp mask).
    pub lights_override: u8,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            session_id: [0; 16],
            sequence: 0,
            timestamp_micros: 0,
            target_speed_mps: 0.0,
            direction: Direction::Neutral,
            lights_override: 0,
        }
    }
}

/// A complete command or telemetry frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandFrame {
    /// The fixed-layout header.
    pub header: FrameHeader,
    /// Auxiliary payload (control flags, legacy text, or telemetry status).
    pub payload: Vec<u8>,
}

impl CommandFrame {
    /// True when the lights override byte marks this frame as
    /// telemetry/heartbeat only.
    #[inline]
    pub fn is_telemetry_only(&self) -> bool {
        self.header.lights_override & LIGHTS_TELEMETRY_ONLY_BIT != 0
    }

    /// Encode the frame into its wire representation.
    ///
    /// Encoding is total; a payload longer than `u16::MAX` bytes (far beyond
    /// any real frame) is truncated to fit the length field.
    pub fn encode(&self) -> Vec<u8> {
        let payload_len = self.payload.len().min(u16::MAX as usize);
        let mut buffer = Vec::with_capacity(FRAME_HEADER_LEN + payload_len);

        buffer.extend_from_slice(&self.header.session_id);
        buffer.extend_from_slice(&self.header.sequence.to_le_bytes());
        buffer.extend_from_slice(&self.header.timestamp_micros.to_le_bytes());
        buffer.extend_from_slice(&self.header.target_speed_mps.to_le_bytes());
        buffer.push(self.header.direction.wire_code());
        buffer.push(self.header.lights_override);
        buffer.extend_from_slice(&(payload_len as u16).to_le_bytes());
        buffer.extend_from_slice(&self.payload[..payload_len]);

        buffer
    }

    /// Decode a frame from its wire representation.
    ///
    /// Fails with [`CommandError::MalformedFrame`] when the buffer is
    /// shorter than the header or shorter than the declared payload.
    pub fn decode(buffer: &[u8]) -> Result<Self, CommandError> {
        if buffer.len() < FRAME_HEADER_LEN {
            return Err(CommandError::MalformedFrame);
        }

        let mut session_id = [0u8; 16];
        session_id.copy_from_slice(&buffer[0..16]);

        let sequence = u32::from_le_bytes([buffer[16], buffer[17], buffer[18], buffer[19]]);
        let timestamp_micros = u64::from_le_bytes([
            buffer[20], buffer[21], buffer[22], buffer[23], buffer[24], buffer[25], buffer[26],
            buffer[27],
        ]);
        let target_speed_mps =
            f32::from_le_bytes([buffer[28], buffer[29], buffer[30], buffer[31]]);
        let direction = Direction::from_wire(buffer[32]);
        let lights_override = buffer[33];
        let payload_len = u16::from_le_bytes([buffer[34], buffer[35]]) as usize;

        if buffer.len() < FRAME_HEADER_LEN + payload_len {
            return Err(CommandError::MalformedFrame);
        }

        Ok(Self {
            header: FrameHeader {
                session_id,
                sequence,
                timestamp_micros,
                target_speed_mps,
                direction,
                lights_override,
            },
            payload: buffer[FRAME_HEADER_LEN..FRAME_HEADER_LEN + payload_len].to_vec(),
        })
    }
}

/// Returns the little-endian byte reversal of a session UUID.
///
/// Convenience for peers that transmit UUIDs in reversed byte order.
pub fn session_id_le(uuid: [u8; 16]) -> [u8; 16] {
    let mut reversed = uuid;
    reversed.reverse();
    reversed
}
