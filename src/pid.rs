//! Closed-loop speed regulator.
//!
//! A small PID controller driving the measured speed toward the commanded
//! setpoint. The integrator and derivative only advance when the timestep is
//! positive, and the derivative needs one prior update before it
//! contributes. Output saturation to `[min_output, max_output]` doubles as
//! the windup bound.

use core::time::Duration;

/// Bounded PID regulator with a variable timestep.
///
/// # Example
///
/// ```
/// use core::time::Duration;
/// use locolink::PidRegulator;
///
/// let mut pid = PidRegulator::new(0.5, 0.05, 0.01, 0.0, 1.0);
/// let output = pid.update(1.5, 0.5, Duration::from_millis(50));
/// assert!(output > 0.0 && output <= 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct PidRegulator {
    kp: f32,
    ki: f32,
    kd: f32,
    min_output: f32,
    max_output: f32,
    integral: f32,
    previous_error: f32,
    has_previous_error: bool,
}

impl PidRegulator {
    /// Create a regulator with the given gains and output bounds.
    pub fn new(kp: f32, ki: f32, kd: f32, min_output: f32, max_output: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            min_output,
            max_output,
            integral: 0.0,
            previous_error: 0.0,
            has_previous_error: false,
        }
    }

    /// Advance the regulator by one timestep and return the saturated output.
    ///
    /// A zero `dt` (e.g. two measurements on the same tick) contributes
    /// nothing to the integral or derivative terms.
    pub fn update(&mut self, target: f32, measurement: f32, dt: Duration) -> f32 {
        let error = target - measurement;
        let seconds = dt.as_secs_f32();

        if seconds > 0.0 {
            self.integral += error * seconds;
        }

        let mut derivative = 0.0;
        if self.has_previous_error && seconds > 0.0 {
            derivative = (error - self.previous_error) / seconds;
        }

        self.previous_error = error;
        self.has_previous_error = true;

        let output = self.kp * error + self.ki * self.integral + self.kd * derivative;
        output.clamp(self.min_output, self.max_output)
    }

    /// Zero the integrator and forget the previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.has_previous_error = false;
    }
}
