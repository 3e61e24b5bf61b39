//! `catapult-hal` – Sensor & Actuator Façades
//!
//! The only layer that touches hardware drivers. Everything above it sees
//! calibrated quantities and clamped set points.
//!
//! # Modules
//!
//! - [`actuator`] – [`MotorController`][actuator::MotorController] driver
//!   trait and the [`Motor`][actuator::Motor] façade that clamps set points to
//!   `[-1, 1]` and turns failed writes into logged no-ops.
//! - [`relay`] – [`Solenoid`][relay::Solenoid] driver trait and the
//!   [`PneumaticStage`][relay::PneumaticStage] façade (pneumatic stages, the
//!   pivot brake and the winch latch).
//! - [`sensor`] – raw [`Encoder`][sensor::Encoder],
//!   [`AnalogInput`][sensor::AnalogInput] and
//!   [`DigitalInput`][sensor::DigitalInput] driver traits.
//! - [`calibrated`] – [`Calibration`][calibrated::Calibration] and the
//!   calibrated [`AngleSensor`][calibrated::AngleSensor],
//!   [`LinearPositionSensor`][calibrated::LinearPositionSensor] and
//!   [`DebouncedSwitch`][calibrated::DebouncedSwitch] façades.
//! - [`camera`] – [`Camera`][camera::Camera] capture-request trait for the
//!   external vision pipeline.
//! - [`pid`] – [`PositionController`][pid::PositionController] used for
//!   proportional aiming.
//! - [`hardware`] – per-subsystem hardware bundles
//!   ([`PivotHardware`][hardware::PivotHardware],
//!   [`WinchHardware`][hardware::WinchHardware]) and
//!   [`HardwareConfig`][hardware::HardwareConfig].
//! - [`sim`] – in-process simulation drivers for tests and the CLI.

pub mod actuator;
pub mod calibrated;
pub mod camera;
mod io_guard;
pub mod hardware;
pub mod pid;
pub mod relay;
pub mod sensor;
pub mod sim;

pub use actuator::{Motor, MotorController};
pub use calibrated::{AngleSensor, Calibration, DebouncedSwitch, LinearPositionSensor};
pub use camera::{Camera, CaptureTrigger};
pub use hardware::{
    HardwareConfig, PivotDrivers, PivotHardware, PivotReadings, WinchDrivers, WinchHardware,
    WinchReadings,
};
pub use pid::PositionController;
pub use relay::{PneumaticStage, Solenoid};
pub use sensor::{AnalogInput, DigitalInput, Encoder};
