//! Error types surfaced at the control-core boundary.
//!
//! Frame-level failures are reported to the caller and deliberately leave
//! the train state untouched beyond the lights override applied before the
//! cadence gate runs; the fail-safe engine guarantees that a stream of bad
//! frames still degrades safely.

use thiserror::Error;

/// Errors produced while decoding or processing a command frame.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The buffer was shorter than the frame header or the declared payload.
    #[error("malformed command frame")]
    MalformedFrame,

    /// The gap since the previous accepted frame exceeded 120 ms.
    #[error("frame rate below 10Hz")]
    RateBelow10Hz,

    /// The frame carried a legacy text payload but no parser is installed.
    #[error("legacy parser disabled")]
    LegacyParserDisabled,

    /// The installed legacy parser rejected the payload.
    #[error("legacy parser error: {0}")]
    LegacyParser(String),
}

/// Errors produced by the command channel.
///
/// Wraps either a transport failure (generic over the transport's own error
/// type) or a frame-processing failure from [`CommandError`]. Implemented
/// by hand rather than derived so the transport error type only needs
/// `Display`/`Debug` when the channel error is actually formatted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelError<E> {
    /// The underlying binary transport failed.
    Transport(E),

    /// The received frame could not be decoded or processed.
    Command(CommandError),
}

impl<E> From<CommandError> for ChannelError<E> {
    fn from(error: CommandError) -> Self {
        ChannelError::Command(error)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for ChannelError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChannelError::Transport(error) => write!(f, "transport error: {error}"),
            ChannelError::Command(error) => write!(f, "{error}"),
        }
    }
}

impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for ChannelError<E> {}
