//! Containment of driver I/O errors.
//!
//! A failing driver is reported once when the outage starts and once when it
//! ends, instead of once per control tick.

use catapult_types::CatapultError;
use tracing::{info, warn};

#[derive(Debug)]
pub(crate) struct IoGuard {
    component: String,
    failing: bool,
}

impl IoGuard {
    pub(crate) fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            failing: false,
        }
    }

    /// Unwrap `result`, logging the first error of an outage. Returns `None`
    /// on error so the caller can keep its last-known value.
    pub(crate) fn observe<T>(&mut self, result: Result<T, CatapultError>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.failing {
                    info!(component = %self.component, "driver I/O recovered");
                    self.failing = false;
                }
                Some(value)
            }
            Err(e) => {
                if !self.failing {
                    warn!(
                        component = %self.component,
                        error = %e,
                        "driver I/O failed; holding last-known value"
                    );
                    self.failing = true;
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault() -> CatapultError {
        CatapultError::HardwareFault {
            component: "x".to_string(),
            details: "timeout".to_string(),
        }
    }

    #[test]
    fn tracks_outage_boundaries() {
        let mut guard = IoGuard::new("x");
        assert_eq!(guard.observe(Ok(3)), Some(3));
        assert!(!guard.failing);

        assert_eq!(guard.observe::<i32>(Err(fault())), None);
        assert!(guard.failing);
        assert_eq!(guard.observe::<i32>(Err(fault())), None);
        assert!(guard.failing);

        assert_eq!(guard.observe(Ok(4)), Some(4));
        assert!(!guard.failing);
    }
}
