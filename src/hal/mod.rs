//! Concrete trait implementations: mocks for testing, system clock for
//! deployment.

pub mod mock;
mod system;

pub use mock::{MockClock, MockMotor, MockTransport, RecordingTelemetry};
pub use system::SystemClock;
