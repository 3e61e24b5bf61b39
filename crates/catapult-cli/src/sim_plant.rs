//! Toy physics for the simulated catapult.
//!
//! Runs as one more supervised loop next to the subsystems: integrates the
//! commanded motor outputs into encoder and potentiometer readings and drives
//! the limit and home switches from the resulting positions.

use std::time::Instant;

use catapult_hal::sim::SimHandles;
use catapult_runtime::ControlLoop;
use catapult_runtime::pivot::{ANGLE_MAX, ANGLE_MIN};
use catapult_types::CatapultError;

/// Pivot speed at full output, degrees per second.
const PIVOT_MAX_RATE: f64 = 150.0;
/// Winch line speed at full output, length units per second.
const WINCH_MAX_RATE: f64 = 6.0;
/// Distance from either end of travel at which a limit switch closes.
const LIMIT_WINDOW: f64 = 0.5;
const WINCH_HOME_WINDOW: f64 = 0.05;
const WINCH_TRAVEL: f64 = 12.0;

pub struct SimPlant {
    sim: SimHandles,
    angle: f64,
    winch: f64,
    last: Option<Instant>,
}

impl SimPlant {
    /// Starts folded vertical with the winch at home.
    pub fn new(sim: SimHandles) -> Self {
        let plant = Self {
            sim,
            angle: ANGLE_MIN,
            winch: 0.0,
            last: None,
        };
        plant.publish(0.0);
        plant
    }

    /// The potentiometer has no rate channel; the sensor derives it.
    fn publish(&self, pivot_rate: f64) {
        self.sim.set_pivot_angle(self.angle, pivot_rate);
        self.sim.set_winch_position(self.winch);
        self.sim
            .upper_limit
            .set_active(self.angle <= ANGLE_MIN + LIMIT_WINDOW);
        self.sim
            .lower_limit
            .set_active(self.angle >= ANGLE_MAX - LIMIT_WINDOW);
        self.sim.winch_home.set_active(self.winch <= WINCH_HOME_WINDOW);
    }
}

impl ControlLoop for SimPlant {
    fn tick(&mut self, now: Instant) -> Result<(), CatapultError> {
        let dt = self
            .last
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f64());
        self.last = Some(now);

        // The brake holds the pivot regardless of motor output.
        let pivot_rate = if self.sim.brake.position() {
            0.0
        } else {
            self.sim.pivot_motor.value() * PIVOT_MAX_RATE
        };
        let before = self.angle;
        self.angle = (self.angle + pivot_rate * dt).clamp(ANGLE_MIN, ANGLE_MAX);

        let winch_rate = self.sim.winch_motor.value() * WINCH_MAX_RATE;
        self.winch = (self.winch + winch_rate * dt).clamp(0.0, WINCH_TRAVEL);

        let pivot_rate = if dt > 0.0 { (self.angle - before) / dt } else { 0.0 };
        self.publish(pivot_rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catapult_hal::sim::SimRig;
    use catapult_hal::{HardwareConfig, PivotHardware, WinchHardware};
    use std::time::Duration;

    fn plant() -> (SimPlant, SimHandles, PivotHardware, WinchHardware) {
        let (pivot, winch, sim) = SimRig::build(&HardwareConfig::default());
        (SimPlant::new(sim.clone()), sim, pivot, winch)
    }

    #[test]
    fn starts_at_both_home_switches() {
        let (_plant, sim, _pivot, _winch) = plant();
        assert!(sim.upper_limit.is_set());
        assert!(!sim.lower_limit.is_set());
        assert!(sim.winch_home.is_set());
    }

    #[test]
    fn motor_output_moves_the_pivot_until_the_stop() {
        let (mut plant, sim, mut pivot, _winch) = plant();
        let mut now = Instant::now();
        pivot.motor.set(1.0);
        for _ in 0..100 {
            now += Duration::from_millis(20);
            plant.tick(now).unwrap();
        }
        let readings = pivot.sample(now);
        assert!((readings.angle - ANGLE_MAX).abs() < 0.1);
        assert!(sim.lower_limit.is_set());
        assert!(!sim.upper_limit.is_set());
    }

    #[test]
    fn engaged_brake_holds_the_pivot() {
        let (mut plant, sim, mut pivot, _winch) = plant();
        let now = Instant::now();
        plant.tick(now).unwrap();
        pivot.brake.extend();
        pivot.motor.set(1.0);
        plant.tick(now + Duration::from_millis(500)).unwrap();
        assert!(sim.upper_limit.is_set());
    }

    #[test]
    fn winch_pays_out_and_leaves_home() {
        let (mut plant, sim, _pivot, mut winch) = plant();
        let mut now = Instant::now();
        plant.tick(now).unwrap();
        winch.motor.set(0.5);
        now += Duration::from_millis(1000);
        plant.tick(now).unwrap();
        assert!(!sim.winch_home.is_set());
        let readings = winch.sample(now);
        assert!((readings.position - 3.0).abs() < 1e-6);
    }
}
