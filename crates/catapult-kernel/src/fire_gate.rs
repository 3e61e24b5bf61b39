//! [`FireGate`] – the cross-subsystem arbitration point for firing.
//!
//! The winch may only release when the pivot reports ready. The operator can
//! bypass readiness with the manual override, but only while the robot is
//! teleoperated; autonomous routines always wait for the pivot.
//!
//! # Example
//!
//! ```
//! use catapult_kernel::{FireGate, ManualOverride, ModeSwitch, Readiness};
//! use catapult_types::OperatingMode;
//!
//! let readiness = Readiness::new();
//! let manual = ManualOverride::new();
//! let modes = ModeSwitch::new();
//! let gate = FireGate::new(readiness.probe(), manual.clone(), modes.clone());
//!
//! assert!(gate.check().is_err());
//! readiness.set(true);
//! assert!(gate.check().is_ok());
//! ```

use catapult_types::{CatapultError, SubsystemId};
use tracing::debug;

use crate::interlock::{ManualOverride, ModeSwitch, ReadinessProbe};

#[derive(Debug, Clone)]
pub struct FireGate {
    readiness: ReadinessProbe,
    manual_override: ManualOverride,
    modes: ModeSwitch,
}

impl FireGate {
    pub fn new(
        readiness: ReadinessProbe,
        manual_override: ManualOverride,
        modes: ModeSwitch,
    ) -> Self {
        Self {
            readiness,
            manual_override,
            modes,
        }
    }

    /// Whether the manual override is currently honoured.
    pub fn override_engaged(&self) -> bool {
        self.manual_override.is_active() && self.modes.is_teleoperated()
    }

    /// # Errors
    ///
    /// [`CatapultError::CommandRejected`] when the pivot is not ready and no
    /// override is in effect.
    pub fn check(&self) -> Result<(), CatapultError> {
        if self.readiness.is_ready() || self.override_engaged() {
            return Ok(());
        }
        let reason = if self.manual_override.is_active() {
            format!("manual override ignored in {} mode", self.modes.get())
        } else {
            "pivot not ready".to_string()
        };
        debug!(reason = %reason, "fire request rejected");
        Err(CatapultError::CommandRejected {
            subsystem: SubsystemId::Winch,
            reason,
        })
    }
}
