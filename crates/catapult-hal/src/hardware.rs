//! Per-subsystem hardware bundles.
//!
//! Each control loop exclusively owns one bundle. Bundles are assembled from
//! raw drivers plus a [`HardwareConfig`] holding the calibration constants.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::actuator::{Motor, MotorController};
use crate::calibrated::{AngleSensor, DebouncedSwitch, LinearPositionSensor};
use crate::camera::{Camera, CaptureTrigger};
use crate::relay::{PneumaticStage, Solenoid};
use crate::sensor::{AnalogInput, DigitalInput, Encoder};

// ────────────────────────────────────────────────────────────────────────────
// HardwareConfig
// ────────────────────────────────────────────────────────────────────────────

/// Calibration constants and debounce windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Pivot encoder scale.
    pub encoder_degrees_per_count: f64,
    /// Winch potentiometer scale (length units per volt).
    pub pot_units_per_volt: f64,
    pub limit_debounce_ms: u64,
    pub ball_debounce_ms: u64,
    pub home_debounce_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            encoder_degrees_per_count: 0.1,
            pot_units_per_volt: 4.0,
            limit_debounce_ms: 20,
            ball_debounce_ms: 100,
            home_debounce_ms: 20,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pivot
// ────────────────────────────────────────────────────────────────────────────

/// Raw drivers for the pivot/acquisition mechanism.
pub struct PivotDrivers {
    pub motor: Box<dyn MotorController>,
    pub rollers: Box<dyn MotorController>,
    pub encoder: Box<dyn Encoder>,
    pub upper_limit: Box<dyn DigitalInput>,
    pub lower_limit: Box<dyn DigitalInput>,
    pub ball_present: Box<dyn DigitalInput>,
    /// Extended = brake engaged.
    pub brake: Box<dyn Solenoid>,
    pub lower_stage: Box<dyn Solenoid>,
    pub upper_stage: Box<dyn Solenoid>,
}

/// One tick's worth of pivot inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PivotReadings {
    pub angle: f64,
    pub rate: f64,
    pub upper_limit: bool,
    pub lower_limit: bool,
    pub ball_present: bool,
    pub brake_engaged: bool,
}

pub struct PivotHardware {
    pub motor: Motor,
    pub rollers: Motor,
    pub angle: AngleSensor,
    pub upper_limit: DebouncedSwitch,
    pub lower_limit: DebouncedSwitch,
    pub ball_present: DebouncedSwitch,
    pub brake: PneumaticStage,
    pub lower_stage: PneumaticStage,
    pub upper_stage: PneumaticStage,
}

impl PivotHardware {
    pub fn new(drivers: PivotDrivers, config: &HardwareConfig) -> Self {
        let limit = Duration::from_millis(config.limit_debounce_ms);
        Self {
            motor: Motor::new(drivers.motor),
            rollers: Motor::new(drivers.rollers),
            angle: AngleSensor::new(drivers.encoder, config.encoder_degrees_per_count),
            upper_limit: DebouncedSwitch::new(drivers.upper_limit, limit),
            lower_limit: DebouncedSwitch::new(drivers.lower_limit, limit),
            ball_present: DebouncedSwitch::new(
                drivers.ball_present,
                Duration::from_millis(config.ball_debounce_ms),
            ),
            brake: PneumaticStage::new(drivers.brake),
            lower_stage: PneumaticStage::new(drivers.lower_stage),
            upper_stage: PneumaticStage::new(drivers.upper_stage),
        }
    }

    pub fn sample(&mut self, now: Instant) -> PivotReadings {
        let (angle, rate) = self.angle.sample();
        PivotReadings {
            angle,
            rate,
            upper_limit: self.upper_limit.sample(now),
            lower_limit: self.lower_limit.sample(now),
            ball_present: self.ball_present.sample(now),
            brake_engaged: self.brake.read_back(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Winch
// ────────────────────────────────────────────────────────────────────────────

/// Raw drivers for the winch/latch firing mechanism.
pub struct WinchDrivers {
    pub motor: Box<dyn MotorController>,
    pub position: Box<dyn AnalogInput>,
    pub home: Box<dyn DigitalInput>,
    /// Extended = latch engaged (holding the winch).
    pub latch: Box<dyn Solenoid>,
    pub camera: Box<dyn Camera>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WinchReadings {
    pub position: f64,
    pub rate: f64,
    pub home: bool,
}

pub struct WinchHardware {
    pub motor: Motor,
    pub position: LinearPositionSensor,
    pub home: DebouncedSwitch,
    pub latch: PneumaticStage,
    pub camera: CaptureTrigger,
}

impl WinchHardware {
    pub fn new(drivers: WinchDrivers, config: &HardwareConfig) -> Self {
        Self {
            motor: Motor::new(drivers.motor),
            position: LinearPositionSensor::new(drivers.position, config.pot_units_per_volt),
            home: DebouncedSwitch::new(
                drivers.home,
                Duration::from_millis(config.home_debounce_ms),
            ),
            latch: PneumaticStage::new(drivers.latch),
            camera: CaptureTrigger::new(drivers.camera),
        }
    }

    pub fn sample(&mut self, now: Instant) -> WinchReadings {
        let (position, rate) = self.position.sample(now);
        WinchReadings {
            position,
            rate,
            home: self.home.sample(now),
        }
    }
}
