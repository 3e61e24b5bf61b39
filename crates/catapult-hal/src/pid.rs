//! Position controller for aiming.
//!
//! Proportional control built from a "gain distance": the angular error at
//! which the output saturates.
//!
//! # Example
//!
//! ```rust
//! use catapult_hal::pid::PositionController;
//!
//! let mut ctl = PositionController::from_gain_distance(30.0);
//! ctl.set_set_point(45.0);
//! // 15° short of the target → half output.
//! assert!((ctl.output(30.0) - 0.5).abs() < 1e-9);
//! ```

#[derive(Debug, Clone)]
pub struct PositionController {
    kp: f64,
    set_point: f64,
}

impl PositionController {
    /// An error of `distance` gives full output. A non-positive distance
    /// yields a zero-gain controller.
    pub fn from_gain_distance(distance: f64) -> Self {
        let kp = if distance > 0.0 { 1.0 / distance } else { 0.0 };
        Self { kp, set_point: 0.0 }
    }

    pub fn set_set_point(&mut self, set_point: f64) {
        self.set_point = set_point;
    }

    /// Signed distance from `measurement` to the set point.
    pub fn error(&self, measurement: f64) -> f64 {
        self.set_point - measurement
    }

    /// Output for `measurement`, clamped to `[-1, 1]`.
    pub fn output(&self, measurement: f64) -> f64 {
        (self.kp * self.error(measurement)).clamp(-1.0, 1.0)
    }
}
