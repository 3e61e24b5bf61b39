//! In-process simulation drivers for tests and the CLI.
//!
//! Every driver is cheaply [`Clone`]: clones share one channel, so a test or
//! a simulated plant keeps a handle while the façade owns the boxed driver.
//! Each channel supports fault injection, making every driver call fail with
//! [`CatapultError::HardwareFault`] until cleared.
//!
//! # Example
//!
//! ```rust
//! use catapult_hal::{HardwareConfig, sim::SimRig};
//!
//! let (mut pivot, _winch, handles) = SimRig::build(&HardwareConfig::default());
//! pivot.motor.set(0.4);
//! assert!((handles.pivot_motor.value() - 0.4).abs() < 1e-9);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use catapult_types::CatapultError;

use crate::actuator::MotorController;
use crate::camera::Camera;
use crate::hardware::{
    HardwareConfig, PivotDrivers, PivotHardware, WinchDrivers, WinchHardware,
};
use crate::relay::Solenoid;
use crate::sensor::{AnalogInput, DigitalInput, Encoder};

// ────────────────────────────────────────────────────────────────────────────
// Shared channel
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Channel<T> {
    value: T,
    failing: bool,
}

#[derive(Debug, Clone)]
struct Shared<T> {
    id: String,
    inner: Arc<Mutex<Channel<T>>>,
}

impl<T: Default> Shared<T> {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Arc::new(Mutex::new(Channel::default())),
        }
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Channel<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), CatapultError> {
        if self.lock().failing {
            return Err(CatapultError::HardwareFault {
                component: self.id.clone(),
                details: "injected fault".to_string(),
            });
        }
        Ok(())
    }

    fn inject_fault(&self, failing: bool) {
        self.lock().failing = failing;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drivers
// ────────────────────────────────────────────────────────────────────────────

/// Simulated speed controller recording its set point.
#[derive(Debug, Clone)]
pub struct SimMotor(Shared<f64>);

impl SimMotor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn value(&self) -> f64 {
        self.0.lock().value
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl MotorController for SimMotor {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn set_output(&mut self, output: f64) -> Result<(), CatapultError> {
        self.0.check()?;
        self.0.lock().value = output;
        Ok(())
    }

    fn output(&self) -> f64 {
        self.value()
    }
}

/// Simulated valve. The read-back follows the last command unless a test
/// forces it with [`SimSolenoid::set_position`].
#[derive(Debug, Clone)]
pub struct SimSolenoid(Shared<bool>);

impl SimSolenoid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn position(&self) -> bool {
        self.0.lock().value
    }

    pub fn set_position(&self, extended: bool) {
        self.0.lock().value = extended;
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl Solenoid for SimSolenoid {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn set_extended(&mut self, extended: bool) -> Result<(), CatapultError> {
        self.0.check()?;
        self.set_position(extended);
        Ok(())
    }

    fn is_extended(&self) -> Result<bool, CatapultError> {
        self.0.check()?;
        Ok(self.position())
    }
}

/// Simulated quadrature encoder: `(count, counts_per_second)`.
#[derive(Debug, Clone)]
pub struct SimEncoder(Shared<(i64, f64)>);

impl SimEncoder {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn set(&self, count: i64, rate: f64) {
        self.0.lock().value = (count, rate);
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl Encoder for SimEncoder {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn count(&self) -> Result<i64, CatapultError> {
        self.0.check()?;
        Ok(self.0.lock().value.0)
    }

    fn rate(&self) -> Result<f64, CatapultError> {
        self.0.check()?;
        Ok(self.0.lock().value.1)
    }
}

#[derive(Debug, Clone)]
pub struct SimAnalogInput(Shared<f64>);

impl SimAnalogInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn set_voltage(&self, volts: f64) {
        self.0.lock().value = volts;
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl AnalogInput for SimAnalogInput {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn voltage(&self) -> Result<f64, CatapultError> {
        self.0.check()?;
        Ok(self.0.lock().value)
    }
}

#[derive(Debug, Clone)]
pub struct SimSwitch(Shared<bool>);

impl SimSwitch {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn set_active(&self, active: bool) {
        self.0.lock().value = active;
    }

    pub fn is_set(&self) -> bool {
        self.0.lock().value
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl DigitalInput for SimSwitch {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn is_active(&self) -> Result<bool, CatapultError> {
        self.0.check()?;
        Ok(self.0.lock().value)
    }
}

/// Simulated camera counting capture requests.
#[derive(Debug, Clone)]
pub struct SimCamera(Shared<u64>);

impl SimCamera {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Shared::new(id))
    }

    pub fn captures(&self) -> u64 {
        self.0.lock().value
    }

    pub fn inject_fault(&self, failing: bool) {
        self.0.inject_fault(failing);
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn request_capture(&mut self) -> Result<(), CatapultError> {
        self.0.check()?;
        self.0.lock().value += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig
// ────────────────────────────────────────────────────────────────────────────

/// Handles onto every simulated driver of a [`SimRig`].
#[derive(Debug, Clone)]
pub struct SimHandles {
    pub pivot_motor: SimMotor,
    pub rollers: SimMotor,
    pub pivot_encoder: SimEncoder,
    pub upper_limit: SimSwitch,
    pub lower_limit: SimSwitch,
    pub ball_present: SimSwitch,
    pub brake: SimSolenoid,
    pub lower_stage: SimSolenoid,
    pub upper_stage: SimSolenoid,
    pub winch_motor: SimMotor,
    pub winch_pot: SimAnalogInput,
    pub winch_home: SimSwitch,
    pub latch: SimSolenoid,
    pub camera: SimCamera,
    degrees_per_count: f64,
    units_per_volt: f64,
}

impl SimHandles {
    /// Place the pivot at `degrees` moving at `rate` degrees per second, in
    /// the encoder's raw units.
    pub fn set_pivot_angle(&self, degrees: f64, rate: f64) {
        let count = (degrees / self.degrees_per_count).round() as i64;
        self.pivot_encoder
            .set(count, rate / self.degrees_per_count);
    }

    /// Place the winch at `units` of raw (un-zeroed) travel.
    pub fn set_winch_position(&self, units: f64) {
        self.winch_pot.set_voltage(units / self.units_per_volt);
    }
}

/// Builder for a fully simulated catapult.
pub struct SimRig;

impl SimRig {
    pub fn build(config: &HardwareConfig) -> (PivotHardware, WinchHardware, SimHandles) {
        let handles = SimHandles {
            pivot_motor: SimMotor::new("pivot_motor"),
            rollers: SimMotor::new("pivot_rollers"),
            pivot_encoder: SimEncoder::new("pivot_encoder"),
            upper_limit: SimSwitch::new("pivot_upper_limit"),
            lower_limit: SimSwitch::new("pivot_lower_limit"),
            ball_present: SimSwitch::new("ball_present"),
            brake: SimSolenoid::new("pivot_brake"),
            lower_stage: SimSolenoid::new("pivot_lower_stage"),
            upper_stage: SimSolenoid::new("pivot_upper_stage"),
            winch_motor: SimMotor::new("winch_motor"),
            winch_pot: SimAnalogInput::new("winch_pot"),
            winch_home: SimSwitch::new("winch_home"),
            latch: SimSolenoid::new("winch_latch"),
            camera: SimCamera::new("vision"),
            degrees_per_count: config.encoder_degrees_per_count,
            units_per_volt: config.pot_units_per_volt,
        };

        let pivot = PivotHardware::new(
            PivotDrivers {
                motor: Box::new(handles.pivot_motor.clone()),
                rollers: Box::new(handles.rollers.clone()),
                encoder: Box::new(handles.pivot_encoder.clone()),
                upper_limit: Box::new(handles.upper_limit.clone()),
                lower_limit: Box::new(handles.lower_limit.clone()),
                ball_present: Box::new(handles.ball_present.clone()),
                brake: Box::new(handles.brake.clone()),
                lower_stage: Box::new(handles.lower_stage.clone()),
                upper_stage: Box::new(handles.upper_stage.clone()),
            },
            config,
        );
        let winch = WinchHardware::new(
            WinchDrivers {
                motor: Box::new(handles.winch_motor.clone()),
                position: Box::new(handles.winch_pot.clone()),
                home: Box::new(handles.winch_home.clone()),
                latch: Box::new(handles.latch.clone()),
                camera: Box::new(handles.camera.clone()),
            },
            config,
        );
        (pivot, winch, handles)
    }
}
