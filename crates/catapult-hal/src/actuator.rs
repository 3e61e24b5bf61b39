//! Continuous motor outputs.
//!
//! Drivers implement [`MotorController`]; control loops only ever talk to the
//! [`Motor`] façade, which clamps set points and contains write failures.

use catapult_types::CatapultError;

use crate::io_guard::IoGuard;

/// A speed controller accepting a normalised set point in `[-1, 1]`.
pub trait MotorController: Send {
    /// Stable identifier for this controller, e.g. `"pivot_motor"`.
    fn id(&self) -> &str;

    /// Apply `output` (already clamped by the caller).
    ///
    /// # Errors
    ///
    /// Returns [`CatapultError::HardwareFault`] when the controller cannot be
    /// reached.
    fn set_output(&mut self, output: f64) -> Result<(), CatapultError>;

    /// The set point most recently accepted by the controller.
    fn output(&self) -> f64;
}

/// Actuator façade around a [`MotorController`].
///
/// Set points are clamped to `[-1, 1]`; non-finite values become `0`. A write
/// that fails is logged and dropped, and [`Motor::output`] keeps reporting the
/// last value that actually reached the controller.
pub struct Motor {
    driver: Box<dyn MotorController>,
    output: f64,
    guard: IoGuard,
}

impl Motor {
    pub fn new(driver: Box<dyn MotorController>) -> Self {
        let guard = IoGuard::new(driver.id());
        Self {
            driver,
            output: 0.0,
            guard,
        }
    }

    pub fn id(&self) -> &str {
        self.driver.id()
    }

    /// Command a new set point. Written every call so controller-side
    /// watchdogs stay fed.
    pub fn set(&mut self, value: f64) {
        let value = if value.is_finite() {
            value.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        if self.guard.observe(self.driver.set_output(value)).is_some() {
            self.output = value;
        }
    }

    /// Last set point successfully written.
    pub fn output(&self) -> f64 {
        self.output
    }
}
