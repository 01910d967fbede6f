//! Configuration for the control core and command channel.
//!
//! Uses `heapless::String` for the short identifier fields so configs stay
//! allocation-free and bounded; certificate material uses owned `String`s
//! since PEM blocks run to kilobytes.
//!
//! # Example
//!
//! ```
//! use core::time::Duration;
//! use locolink::config::{ChannelConfig, Config, ControllerConfig};
//!
//! let config = Config::default()
//!     .with_controller(
//!         ControllerConfig::default().with_stale_command_threshold(Duration::from_millis(300)),
//!     )
//!     .with_channel(ChannelConfig::default().with_uri("wss://train.local/control"));
//!
//! assert_eq!(config.controller.stale_command_threshold, Duration::from_millis(300));
//! ```

use core::time::Duration;

use heapless::String as HString;
use thiserror::Error;

use crate::pid::PidRegulator;

/// Maximum length for short config strings (hostnames).
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (URIs).
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings.
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings.
pub type LongString = HString<MAX_LONG_STRING>;

/// Create a ShortString from a `&str`, truncating if too long.
pub fn short_string(s: &str) -> ShortString {
    bounded_string(s)
}

/// Create a LongString from a `&str`, truncating if too long.
pub fn long_string(s: &str) -> LongString {
    bounded_string(s)
}

fn bounded_string<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    let mut end = s.len().min(N);
    // Back off to a valid UTF-8 boundary.
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let _ = hs.push_str(&s[..end]);
    hs
}

/// Errors raised while assembling configuration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value was absent from both the build config and the
    /// environment.
    #[error("configuration value missing for {0}")]
    MissingValue(&'static str),

    /// The expected TLS host could not be inferred from the URI.
    #[error("unable to infer host name from URI {0}")]
    HostInference(String),
}

// ============================================================================
// Controller
// ============================================================================

/// Liveness and ramp timing for the train controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Command-link silence after which the fail-safe ramp engages.
    pub stale_command_threshold: Duration,
    /// Silence after which the terminal pilot-release state engages;
    /// `Duration::ZERO` disables pilot release.
    pub pilot_release_duration: Duration,
    /// Length of the linear fail-safe ramp from the last target down to
    /// zero; `Duration::ZERO` drops the target immediately.
    pub fail_safe_ramp_duration: Duration,
}

impl Default for ControllerConfig {
    /// Defaults sized for a ~33 Hz command link: roughly sixteen missed
    /// frames engage the fail-safe, a two-second ramp brings the train to
    /// rest, and half a minute of silence releases the pilot session.
    fn default() -> Self {
        Self {
            stale_command_threshold: Duration::from_millis(500),
            pilot_release_duration: Duration::from_secs(30),
            fail_safe_ramp_duration: Duration::from_secs(2),
        }
    }
}

impl ControllerConfig {
    /// Set the stale-command threshold.
    pub fn with_stale_command_threshold(mut self, threshold: Duration) -> Self {
        self.stale_command_threshold = threshold;
        self
    }

    /// Set the pilot-release duration (zero disables pilot release).
    pub fn with_pilot_release_duration(mut self, duration: Duration) -> Self {
        self.pilot_release_duration = duration;
        self
    }

    /// Set the fail-safe ramp duration.
    pub fn with_fail_safe_ramp_duration(mut self, duration: Duration) -> Self {
        self.fail_safe_ramp_duration = duration;
        self
    }
}

// ============================================================================
// PID
// ============================================================================

/// Speed-regulator gains and output bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PidConfig {
    /// Proportional gain.
    pub kp: f32,
    /// Integral gain.
    pub ki: f32,
    /// Derivative gain.
    pub kd: f32,
    /// Lower output bound.
    pub min_output: f32,
    /// Upper output bound.
    pub max_output: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.8,
            ki: 0.2,
            kd: 0.05,
            min_output: 0.0,
            max_output: 1.0,
        }
    }
}

impl PidConfig {
    /// Set the three gains at once.
    pub fn with_gains(mut self, kp: f32, ki: f32, kd: f32) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// Set the output bounds.
    pub fn with_output_bounds(mut self, min_output: f32, max_output: f32) -> Self {
        self.min_output = min_output;
        self.max_output = max_output;
        self
    }
}

impl From<PidConfig> for PidRegulator {
    fn from(config: PidConfig) -> Self {
        PidRegulator::new(
            config.kp,
            config.ki,
            config.kd,
            config.min_output,
            config.max_output,
        )
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Command-channel session and transport settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelConfig {
    /// Transport URI to connect to.
    pub uri: LongString,
    /// Session id stamped on outgoing telemetry when the sample carries
    /// none.
    pub session_id: [u8; 16],
    /// Upper bound for one blocking `poll` read.
    pub receive_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            uri: LongString::new(),
            session_id: [0; 16],
            receive_timeout: Duration::from_millis(100),
        }
    }
}

impl ChannelConfig {
    /// Set the transport URI (truncated to 128 bytes).
    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uri = long_string(uri);
        self
    }

    /// Set the session id.
    pub fn with_session_id(mut self, session_id: [u8; 16]) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the bounded receive timeout.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

// ============================================================================
// TLS credentials (interface to the external secure transport adapter)
// ============================================================================

/// Credentials and policy for the TLS-secured transport.
///
/// The secure WebSocket adapter itself lives outside this crate; this is
/// the surface it consumes. PEM fields are owned strings because
/// certificate blocks exceed any reasonable bounded-string size.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlsConfig {
    /// `wss://` URI of the command endpoint.
    pub uri: LongString,
    /// Hostname the server certificate must present.
    pub expected_host: ShortString,
    /// CA certificate chain, PEM.
    pub ca_certificate_pem: String,
    /// Client certificate, PEM.
    pub client_certificate_pem: String,
    /// Client private key, PEM.
    pub client_private_key_pem: String,
    /// Whether to verify the peer hostname against `expected_host`.
    pub enforce_hostname_validation: bool,
}

impl TlsConfig {
    /// Load credentials from the environment.
    ///
    /// Reads `LOCOLINK_WSS_URI`, `LOCOLINK_CA_CERT_PEM`,
    /// `LOCOLINK_CLIENT_CERT_PEM`, `LOCOLINK_CLIENT_KEY_PEM` and the
    /// optional `LOCOLINK_EXPECTED_HOST`; when the expected host is unset
    /// it is inferred from the `wss://` URI. Hostname validation defaults
    /// to on.
    pub fn from_env() -> Result<Self, ConfigError> {
        let uri = require_env("LOCOLINK_WSS_URI")?;
        let expected_host = match std::env::var("LOCOLINK_EXPECTED_HOST") {
            Ok(host) if !host.is_empty() => host,
            _ => host_from_uri(&uri)?,
        };

        Ok(Self {
            uri: long_string(&uri),
            expected_host: short_string(&expected_host),
            ca_certificate_pem: require_env("LOCOLINK_CA_CERT_PEM")?,
            client_certificate_pem: require_env("LOCOLINK_CLIENT_CERT_PEM")?,
            client_private_key_pem: require_env("LOCOLINK_CLIENT_KEY_PEM")?,
            enforce_hostname_validation: true,
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingValue(name)),
    }
}

fn host_from_uri(uri: &str) -> Result<String, ConfigError> {
    let rest = uri
        .strip_prefix("wss://")
        .ok_or_else(|| ConfigError::HostInference(uri.to_string()))?;
    let host: String = rest
        .chars()
        .take_while(|c| *c != '/' && *c != ':')
        .collect();
    if host.is_empty() {
        return Err(ConfigError::HostInference(uri.to_string()));
    }
    Ok(host)
}

// ============================================================================
// Aggregate
// ============================================================================

/// Complete firmware configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Liveness and ramp timing.
    pub controller: ControllerConfig,
    /// Speed-regulator tuning.
    pub pid: PidConfig,
    /// Command-channel settings.
    pub channel: ChannelConfig,
    /// TLS credentials for the secure transport adapter, when configured.
    pub tls: Option<TlsConfig>,
}

impl Config {
    /// Set the controller timing.
    pub fn with_controller(mut self, controller: ControllerConfig) -> Self {
        self.controller = controller;
        self
    }

    /// Set the PID tuning.
    pub fn with_pid(mut self, pid: PidConfig) -> Self {
        self.pid = pid;
        self
    }

    /// Set the channel settings.
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Set the TLS credentials.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}
