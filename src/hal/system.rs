//! Real time source backed by the operating system.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::traits::Clock;

/// Clock backed by [`Instant`] and [`SystemTime`].
///
/// The monotonic timeline starts at construction, so all components wired
/// to one controller should share a single `SystemClock` (clone it or wrap
/// it in an `Arc`).
#[derive(Clone, Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Create a clock whose monotonic epoch is now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn wall_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}
