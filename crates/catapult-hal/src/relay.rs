//! Two-position pneumatic valves: mechanism stages, the pivot brake and the
//! winch latch.

use catapult_types::CatapultError;

use crate::io_guard::IoGuard;

/// A two-position pneumatic valve.
pub trait Solenoid: Send {
    /// Stable identifier for this valve, e.g. `"pivot_brake"`.
    fn id(&self) -> &str;

    /// Drive the valve to `extended` (`true`) or retracted (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`CatapultError::HardwareFault`] if the command cannot be applied.
    fn set_extended(&mut self, extended: bool) -> Result<(), CatapultError>;

    /// Read back the valve position.
    ///
    /// # Errors
    ///
    /// Returns [`CatapultError::HardwareFault`] if the read-back fails.
    fn is_extended(&self) -> Result<bool, CatapultError>;
}

/// Actuator façade around a [`Solenoid`].
pub struct PneumaticStage {
    driver: Box<dyn Solenoid>,
    commanded: bool,
    confirmed: bool,
    write_guard: IoGuard,
    read_guard: IoGuard,
}

impl PneumaticStage {
    pub fn new(driver: Box<dyn Solenoid>) -> Self {
        let write_guard = IoGuard::new(driver.id());
        let read_guard = IoGuard::new(format!("{}/readback", driver.id()));
        Self {
            driver,
            commanded: false,
            confirmed: false,
            write_guard,
            read_guard,
        }
    }

    pub fn id(&self) -> &str {
        self.driver.id()
    }

    /// Command the stage. A failed write is logged and leaves the previous
    /// command in place.
    pub fn set(&mut self, extended: bool) {
        if self
            .write_guard
            .observe(self.driver.set_extended(extended))
            .is_some()
        {
            self.commanded = extended;
        }
    }

    pub fn extend(&mut self) {
        self.set(true);
    }

    pub fn retract(&mut self) {
        self.set(false);
    }

    /// Last command that reached the valve.
    pub fn commanded(&self) -> bool {
        self.commanded
    }

    /// Read the valve position back from the driver, falling back to the
    /// last confirmed position when the read fails.
    pub fn read_back(&mut self) -> bool {
        if let Some(extended) = self.read_guard.observe(self.driver.is_extended()) {
            self.confirmed = extended;
        }
        self.confirmed
    }
}
