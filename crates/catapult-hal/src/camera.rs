//! Capture requests to the external vision pipeline.
//!
//! The pipeline itself lives outside this workspace; the control core only
//! asks it to grab a frame after each shot.

use catapult_types::CatapultError;

use crate::io_guard::IoGuard;

/// A camera that can be asked to capture a frame.
pub trait Camera: Send {
    fn id(&self) -> &str;

    /// Request one image capture. Edge-triggered: one call, one frame.
    ///
    /// # Errors
    ///
    /// Returns [`CatapultError::HardwareFault`] if the request cannot be sent.
    fn request_capture(&mut self) -> Result<(), CatapultError>;
}

/// Façade over a [`Camera`] that contains request failures.
pub struct CaptureTrigger {
    camera: Box<dyn Camera>,
    guard: IoGuard,
}

impl CaptureTrigger {
    pub fn new(camera: Box<dyn Camera>) -> Self {
        let guard = IoGuard::new(camera.id());
        Self { camera, guard }
    }

    /// Send one capture request. Returns `false` if it could not be sent.
    pub fn fire(&mut self) -> bool {
        self.guard.observe(self.camera.request_capture()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimCamera;

    #[test]
    fn trigger_counts_requests() {
        let camera = SimCamera::new("vision");
        let mut trigger = CaptureTrigger::new(Box::new(camera.clone()));
        assert!(trigger.fire());
        assert!(trigger.fire());
        assert_eq!(camera.captures(), 2);
    }

    #[test]
    fn failed_request_reports_false() {
        let camera = SimCamera::new("vision");
        camera.inject_fault(true);
        let mut trigger = CaptureTrigger::new(Box::new(camera.clone()));
        assert!(!trigger.fire());
        assert_eq!(camera.captures(), 0);
    }
}
