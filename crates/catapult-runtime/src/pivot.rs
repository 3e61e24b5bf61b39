//! Pivot/acquisition state machine.
//!
//! The pivot both intakes balls near the floor (120°) and aims the winch near
//! vertical (0°). Positive motor output increases the angle, i.e. rotates
//! toward the floor ("down").
//!
//! # Current vs wanted state
//!
//! Commands set the *wanted* state immediately and, when the mechanism is not
//! yet at the required angle, make `ROTATE_UP` / `ROTATE_DOWN` the *current*
//! state. The rotation states carry the pivot to the wanted angle and then
//! hand over to the destination state.
//!
//! # Readiness
//!
//! The readiness predicate shared with the winch is written only here. It is
//! cleared synchronously by every command and set again only once
//! `READY_TO_SHOOT` has run through both settle delays and the brake reads
//! back engaged.

use std::time::{Duration, Instant};

use catapult_hal::{PivotHardware, PivotReadings, PositionController};
use catapult_kernel::{ManualOverride, ModeSwitch, Readiness, StallDetector};
use catapult_types::{CatapultError, PivotState, SubsystemId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::diagnostics::DiagnosticSink;
use crate::supervisor::ControlLoop;

/// Vertical: folded inside the frame perimeter.
pub const ANGLE_MIN: f64 = 0.0;
/// Floor: acquisition angle.
pub const ANGLE_MAX: f64 = 120.0;

const SUBSYSTEM: &str = "pivot";

// ────────────────────────────────────────────────────────────────────────────
// Config
// ────────────────────────────────────────────────────────────────────────────

/// A named shooting angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnglePreset {
    pub name: String,
    pub angle: f64,
}

impl AnglePreset {
    fn new(name: &str, angle: f64) -> Self {
        Self {
            name: name.to_string(),
            angle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub period_ms: u64,
    pub acquire_angle: f64,
    /// Arrival window around the wanted angle, degrees.
    pub angle_tolerance: f64,
    /// Target rotation speed for ROTATE_UP/DOWN, degrees per second.
    pub target_rate: f64,
    /// Half-width of the acceptable speed band around `target_rate`.
    pub rate_band: f64,
    /// Output increment per tick while rotating.
    pub output_step: f64,
    /// Small constant output that counteracts backdrive.
    pub hold_output: f64,
    pub brake_settle_ms: u64,
    /// Angle beyond which the lower stage extends while rotating down.
    pub lower_stage_angle: f64,
    /// Angle beyond which the upper (trap) stage extends while rotating down.
    pub upper_stage_angle: f64,
    /// Below this angle every stage must be retracted to stay inside the
    /// frame perimeter.
    pub perimeter_safe_angle: f64,
    /// Angular error giving full output in READY_TO_SHOOT.
    pub gain_distance: f64,
    pub ready_hold_delay_ms: u64,
    pub ready_brake_delay_ms: u64,
    /// Output magnitude above which the pivot is expected to move.
    pub moving_threshold: f64,
    pub stall_rate_epsilon: f64,
    pub stall_interval_ms: u64,
    pub intake_output: f64,
    pub eject_output: f64,
    pub presets: Vec<AnglePreset>,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            acquire_angle: ANGLE_MAX,
            angle_tolerance: 2.0,
            target_rate: 90.0,
            rate_band: 10.0,
            output_step: 0.05,
            hold_output: 0.1,
            brake_settle_ms: 200,
            lower_stage_angle: 20.0,
            upper_stage_angle: 45.0,
            perimeter_safe_angle: 15.0,
            gain_distance: 30.0,
            ready_hold_delay_ms: 500,
            ready_brake_delay_ms: 250,
            moving_threshold: 0.35,
            stall_rate_epsilon: 2.0,
            stall_interval_ms: 500,
            intake_output: 1.0,
            eject_output: 1.0,
            presets: vec![
                AnglePreset::new("close", 30.0),
                AnglePreset::new("mid", 45.0),
                AnglePreset::new("far", 60.0),
            ],
        }
    }
}

impl PivotConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Serializable view for status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotSnapshot {
    pub current: PivotState,
    pub wanted: PivotState,
    pub wanted_angle: f64,
    pub aim_angle: f64,
    pub angle: f64,
    pub rate: f64,
    pub motor_output: f64,
    pub roller_output: f64,
    pub brake_engaged: bool,
    pub ball_present: bool,
    pub ready: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

pub struct PivotController {
    config: PivotConfig,
    hw: PivotHardware,
    readiness: Readiness,
    manual_override: ManualOverride,
    modes: ModeSwitch,
    diagnostics: DiagnosticSink,

    current: PivotState,
    wanted: PivotState,
    /// State entered once the rotation reaches `wanted_angle`.
    destination: PivotState,
    wanted_angle: f64,
    /// Shooting angle set by presets and offsets.
    aim_angle: f64,
    /// Stamped on the first tick spent in `current`.
    entered_at: Option<Instant>,
    brake_release_at: Option<Instant>,
    rotate_output: f64,
    aim: PositionController,
    stall: StallDetector,
    /// Operator roller output; `None` leaves the rollers to the state.
    roller_setpoint: Option<f64>,
    readings: PivotReadings,
}

impl PivotController {
    pub fn new(
        config: PivotConfig,
        hw: PivotHardware,
        readiness: Readiness,
        manual_override: ManualOverride,
        modes: ModeSwitch,
        diagnostics: DiagnosticSink,
    ) -> Self {
        let aim_angle = config
            .presets
            .first()
            .map_or(ANGLE_MIN, |p| p.angle.clamp(ANGLE_MIN, ANGLE_MAX));
        let stall = StallDetector::new(
            config.moving_threshold,
            config.stall_rate_epsilon,
            Duration::from_millis(config.stall_interval_ms),
        );
        let aim = PositionController::from_gain_distance(config.gain_distance);
        readiness.set(false);
        Self {
            config,
            hw,
            readiness,
            manual_override,
            modes,
            diagnostics,
            current: PivotState::SafeState,
            wanted: PivotState::SafeState,
            destination: PivotState::SafeState,
            wanted_angle: ANGLE_MIN,
            aim_angle,
            entered_at: None,
            brake_release_at: None,
            rotate_output: 0.0,
            aim,
            stall,
            roller_setpoint: None,
            readings: PivotReadings::default(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn current(&self) -> PivotState {
        self.current
    }

    pub fn wanted(&self) -> PivotState {
        self.wanted
    }

    pub fn wanted_angle(&self) -> f64 {
        self.wanted_angle
    }

    pub fn aim_angle(&self) -> f64 {
        self.aim_angle
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// `true` once the pivot has settled in the state the last command asked
    /// for.
    pub fn is_command_done(&self) -> bool {
        self.current == self.destination
    }

    pub fn presets(&self) -> &[AnglePreset] {
        &self.config.presets
    }

    pub fn snapshot(&self) -> PivotSnapshot {
        PivotSnapshot {
            current: self.current,
            wanted: self.wanted,
            wanted_angle: self.wanted_angle,
            aim_angle: self.aim_angle,
            angle: self.readings.angle,
            rate: self.readings.rate,
            motor_output: self.hw.motor.output(),
            roller_output: self.hw.rollers.output(),
            brake_engaged: self.readings.brake_engaged,
            ball_present: self.readings.ball_present,
            ready: self.is_ready(),
        }
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Request a mode. Rotations are inserted automatically when the mode
    /// needs a different angle.
    pub fn set_mode(&mut self, state: PivotState) {
        self.readiness.set(false);
        self.stall.reset();
        self.wanted = state;
        match state {
            PivotState::SafeState => self.route(ANGLE_MIN, PivotState::SafeState),
            PivotState::Acquiring => self.route(self.acquire_angle(), PivotState::Acquiring),
            PivotState::ReadyToShoot => self.route(self.aim_angle, PivotState::ReadyToShoot),
            PivotState::RotateUp => self.route(ANGLE_MIN, PivotState::SafeState),
            PivotState::RotateDown => self.route(self.acquire_angle(), PivotState::SafeState),
            PivotState::Acquired | PivotState::EjectBall | PivotState::OffState => {
                self.destination = state;
                self.enter(state, None);
            }
        }
    }

    /// Parse and apply a mode tag. Unknown tags change nothing.
    pub fn set_mode_tag(&mut self, tag: &str) -> Result<(), CatapultError> {
        match tag.parse::<PivotState>() {
            Ok(state) => {
                self.set_mode(state);
                Ok(())
            }
            Err(e) => {
                error!(subsystem = SUBSYSTEM, tag, "unknown pivot state tag");
                self.diagnostics.error(SUBSYSTEM, e.to_string());
                Err(e)
            }
        }
    }

    /// Aim at preset `index` and head for READY_TO_SHOOT.
    pub fn set_preset(&mut self, index: usize) -> Result<(), CatapultError> {
        let preset = self
            .config
            .presets
            .get(index)
            .ok_or_else(|| CatapultError::InvalidPreset(index.to_string()))?;
        self.aim_angle = preset.angle.clamp(ANGLE_MIN, ANGLE_MAX);
        self.set_mode(PivotState::ReadyToShoot);
        Ok(())
    }

    pub fn set_preset_named(&mut self, name: &str) -> Result<(), CatapultError> {
        let index = self
            .config
            .presets
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| CatapultError::InvalidPreset(name.to_string()))?;
        self.set_preset(index)
    }

    /// Shift the shooting angle by `degrees`, clamped to the travel range,
    /// and head for READY_TO_SHOOT.
    pub fn add_offset(&mut self, degrees: f64) -> Result<(), CatapultError> {
        if degrees.is_nan() {
            return Err(CatapultError::InvalidArgument(
                "angle offset must be a number".to_string(),
            ));
        }
        self.aim_angle = (self.aim_angle + degrees).clamp(ANGLE_MIN, ANGLE_MAX);
        self.set_mode(PivotState::ReadyToShoot);
        Ok(())
    }

    /// Operator roller set point, used only while the manual override is
    /// honoured. `None` hands the rollers back to the running state.
    pub fn set_roller_override(&mut self, output: Option<f64>) {
        self.roller_setpoint =
            output.map(|v| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 });
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    fn acquire_angle(&self) -> f64 {
        self.config.acquire_angle.clamp(ANGLE_MIN, ANGLE_MAX)
    }

    fn route(&mut self, target: f64, destination: PivotState) {
        self.wanted_angle = target;
        self.destination = destination;
        let angle = self.readings.angle;
        let next = if (target - angle).abs() <= self.config.angle_tolerance {
            destination
        } else if target > angle {
            PivotState::RotateDown
        } else {
            PivotState::RotateUp
        };
        self.enter(next, None);
    }

    fn enter(&mut self, next: PivotState, now: Option<Instant>) {
        let previous = self.current;
        self.current = next;
        self.entered_at = now;
        self.brake_release_at = None;
        self.rotate_output = 0.0;
        if next == PivotState::ReadyToShoot {
            self.aim.set_set_point(self.aim_angle);
        }
        self.diagnostics.info(
            SUBSYSTEM,
            format!("{previous} -> {next} (wanted {}, {:.1}°)", self.wanted, self.wanted_angle),
        );
    }

    // ── Per-state behaviour ─────────────────────────────────────────────────

    /// Returns `(motor, rollers)` for this tick.
    fn run_state(&mut self, now: Instant) -> (f64, f64) {
        let r = self.readings;
        let entered = *self.entered_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(entered);

        match self.current {
            PivotState::RotateUp => (self.rotate(-1.0, now), 0.0),
            PivotState::RotateDown => (self.rotate(1.0, now), 0.0),
            PivotState::Acquiring => {
                self.extend_where_legal(true, true);
                if r.ball_present {
                    self.wanted = PivotState::Acquired;
                    self.destination = PivotState::Acquired;
                    self.enter(PivotState::Acquired, Some(now));
                    self.hw.upper_stage.retract();
                    return (self.config.hold_output, 0.0);
                }
                (self.config.hold_output, self.config.intake_output)
            }
            PivotState::Acquired => {
                self.hw.upper_stage.retract();
                (self.config.hold_output, 0.0)
            }
            PivotState::EjectBall => {
                self.extend_where_legal(false, true);
                (0.0, -self.config.eject_output)
            }
            PivotState::ReadyToShoot => (self.ready_to_shoot(elapsed), 0.0),
            PivotState::SafeState => {
                if r.angle < ANGLE_MIN {
                    self.hw.angle.reset_zero();
                    self.readings.angle = self.hw.angle.degrees();
                    self.diagnostics.warn(
                        SUBSYSTEM,
                        format!("angle drifted to {:.2}°; zero reference reset", r.angle),
                    );
                }
                (0.0, 0.0)
            }
            PivotState::OffState => (0.0, 0.0),
        }
    }

    /// Bang-bang rotation toward `wanted_angle`. `direction` is `+1` toward
    /// the floor, `-1` toward vertical.
    fn rotate(&mut self, direction: f64, now: Instant) -> f64 {
        let r = self.readings;

        if r.brake_engaged && self.brake_release_at.is_none() {
            self.hw.brake.retract();
            self.brake_release_at = Some(now);
        }
        let settle = Duration::from_millis(self.config.brake_settle_ms);
        if let Some(released) = self.brake_release_at {
            if now.saturating_duration_since(released) < settle {
                return 0.0;
            }
        }

        self.drive_stages(r.angle, direction);

        let remaining = (self.wanted_angle - r.angle) * direction;
        let at_limit = if direction > 0.0 { r.lower_limit } else { r.upper_limit };
        if remaining <= self.config.angle_tolerance || at_limit {
            let destination = self.destination;
            self.enter(destination, Some(now));
            return 0.0;
        }

        let speed = r.rate.abs();
        if speed < self.config.target_rate - self.config.rate_band {
            self.rotate_output += self.config.output_step;
        } else if speed > self.config.target_rate + self.config.rate_band {
            self.rotate_output -= self.config.output_step;
        }
        self.rotate_output = self.rotate_output.clamp(0.0, 1.0);
        direction * self.rotate_output
    }

    /// Readiness tracks the brake read-back on every tick of the final
    /// phase, so a slipping brake withdraws it.
    fn ready_to_shoot(&mut self, elapsed: Duration) -> f64 {
        let hold = Duration::from_millis(self.config.ready_hold_delay_ms);
        let brake = hold + Duration::from_millis(self.config.ready_brake_delay_ms);
        let angle = self.readings.angle;

        if elapsed < hold {
            self.readiness.set(false);
            self.aim.output(angle)
        } else if elapsed < brake {
            self.readiness.set(false);
            if self.aim.error(angle) < 0.0 {
                -self.config.hold_output
            } else {
                self.config.hold_output
            }
        } else {
            self.hw.brake.extend();
            let engaged = self.readings.brake_engaged;
            let was_ready = self.readiness.is_ready();
            self.readiness.set(engaged);
            if engaged && !was_ready {
                self.diagnostics
                    .info(SUBSYSTEM, format!("ready to shoot at {angle:.1}°"));
            } else if !engaged && was_ready {
                self.diagnostics
                    .warn(SUBSYSTEM, "brake reads disengaged; readiness withdrawn");
            }
            0.0
        }
    }

    /// Extend or retract both stages in step with rotation.
    fn drive_stages(&mut self, angle: f64, direction: f64) {
        if direction > 0.0 {
            self.extend_where_legal(
                angle >= self.config.lower_stage_angle,
                angle >= self.config.upper_stage_angle,
            );
        } else {
            if angle < self.config.upper_stage_angle {
                self.hw.upper_stage.retract();
            }
            if angle < self.config.lower_stage_angle {
                self.hw.lower_stage.retract();
            }
        }
    }

    fn extend_where_legal(&mut self, lower: bool, upper: bool) {
        if self.readings.angle < self.config.perimeter_safe_angle {
            return;
        }
        if lower {
            self.hw.lower_stage.extend();
        }
        if upper {
            self.hw.upper_stage.extend();
        }
    }

    /// Frame-perimeter rule: nothing sticks out near vertical.
    fn enforce_perimeter(&mut self) {
        if self.readings.angle < self.config.perimeter_safe_angle {
            if self.hw.lower_stage.commanded() {
                self.hw.lower_stage.retract();
            }
            if self.hw.upper_stage.commanded() {
                self.hw.upper_stage.retract();
            }
        }
    }

    fn enter_off_state(&mut self, output: f64, now: Instant) {
        let fault = CatapultError::Stall {
            subsystem: SubsystemId::Pivot,
            output,
            rate: self.readings.rate,
        };
        error!(subsystem = SUBSYSTEM, error = %fault, "stall detected; pivot disabled");
        self.diagnostics.error(SUBSYSTEM, fault.to_string());
        self.wanted = PivotState::OffState;
        self.destination = PivotState::OffState;
        self.enter(PivotState::OffState, Some(now));
        self.stall.reset();
    }
}

impl ControlLoop for PivotController {
    fn tick(&mut self, now: Instant) -> Result<(), CatapultError> {
        self.readings = self.hw.sample(now);

        if self.current != PivotState::ReadyToShoot {
            self.readiness.set(false);
        }

        let (mut motor, mut rollers) = self.run_state(now);

        let into_limit = (motor > 0.0 && self.readings.lower_limit)
            || (motor < 0.0 && self.readings.upper_limit);
        if into_limit {
            debug!(subsystem = SUBSYSTEM, output = motor, "torque into active limit cut");
            motor = 0.0;
        }
        if let Some(setpoint) = self.roller_setpoint {
            if self.manual_override.is_active()
                && self.modes.is_teleoperated()
                && self.current != PivotState::OffState
            {
                rollers = setpoint;
            }
        }

        let running = self.current != PivotState::OffState;
        if running && self.stall.update(motor, self.readings.rate, now) {
            self.enter_off_state(motor, now);
            motor = 0.0;
            rollers = 0.0;
        }

        self.enforce_perimeter();
        self.hw.motor.set(motor);
        self.hw.rollers.set(rollers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catapult_hal::HardwareConfig;
    use catapult_hal::sim::{SimHandles, SimRig};
    use catapult_types::OperatingMode;

    const TICK: Duration = Duration::from_millis(20);

    struct Bench {
        pivot: PivotController,
        sim: SimHandles,
        modes: ModeSwitch,
        manual: ManualOverride,
        now: Instant,
    }

    impl Bench {
        fn new() -> Self {
            Self::with_config(PivotConfig::default())
        }

        fn with_config(config: PivotConfig) -> Self {
            let hw_config = HardwareConfig {
                limit_debounce_ms: 0,
                ball_debounce_ms: 100,
                ..HardwareConfig::default()
            };
            let (hw, _winch, sim) = SimRig::build(&hw_config);
            let modes = ModeSwitch::new();
            let manual = ManualOverride::new();
            let pivot = PivotController::new(
                config,
                hw,
                Readiness::new(),
                manual.clone(),
                modes.clone(),
                DiagnosticSink::new(64, modes.clone()),
            );
            Self {
                pivot,
                sim,
                modes,
                manual,
                now: Instant::now(),
            }
        }

        fn tick(&mut self) {
            self.now += TICK;
            self.pivot.tick(self.now).unwrap();
        }

        fn ticks(&mut self, n: usize) {
            for _ in 0..n {
                self.tick();
            }
        }

        /// Place the simulated pivot at `angle`, at rest, and tick once.
        fn arrive(&mut self, angle: f64) {
            self.sim.set_pivot_angle(angle, 0.0);
            self.tick();
        }
    }

    #[test]
    fn starts_safe_and_not_ready() {
        let mut b = Bench::new();
        b.tick();
        assert_eq!(b.pivot.current(), PivotState::SafeState);
        assert!(!b.pivot.is_ready());
        assert!(b.pivot.is_command_done());
    }

    #[test]
    fn wanted_state_is_reported_while_rotating() {
        for state in PivotState::ALL {
            let mut b = Bench::new();
            b.sim.set_pivot_angle(60.0, 0.0);
            b.tick();
            b.pivot.set_mode(state);
            assert_eq!(b.pivot.wanted(), state, "wanted must reflect {state} immediately");
        }
    }

    #[test]
    fn unknown_tag_changes_nothing() {
        let mut b = Bench::new();
        b.pivot.set_mode(PivotState::Acquiring);
        let before = (b.pivot.current(), b.pivot.wanted());
        let err = b.pivot.set_mode_tag("SPIN").unwrap_err();
        assert!(matches!(err, CatapultError::UnknownState { .. }));
        assert_eq!((b.pivot.current(), b.pivot.wanted()), before);
    }

    #[test]
    fn offsets_stay_within_travel() {
        let mut b = Bench::new();
        for delta in [500.0, -1e9, 37.5, f64::INFINITY, -3.0, f64::NEG_INFINITY, 1e-3] {
            b.pivot.add_offset(delta).unwrap();
            let angle = b.pivot.wanted_angle();
            assert!((ANGLE_MIN..=ANGLE_MAX).contains(&angle), "{angle} out of range");
            assert!((ANGLE_MIN..=ANGLE_MAX).contains(&b.pivot.aim_angle()));
        }
        assert!(b.pivot.add_offset(f64::NAN).is_err());
    }

    #[test]
    fn presets_route_through_ready_to_shoot() {
        let mut b = Bench::new();
        b.pivot.set_preset(2).unwrap();
        assert_eq!(b.pivot.wanted(), PivotState::ReadyToShoot);
        assert_eq!(b.pivot.current(), PivotState::RotateDown);
        assert_eq!(b.pivot.wanted_angle(), 60.0);
        assert!(matches!(b.pivot.set_preset(9), Err(CatapultError::InvalidPreset(_))));
        b.pivot.set_preset_named("CLOSE").unwrap();
        assert_eq!(b.pivot.wanted_angle(), 30.0);
    }

    #[test]
    fn rotation_waits_for_brake_release() {
        let mut b = Bench::new();
        b.sim.brake.set_position(true);
        b.pivot.set_mode(PivotState::Acquiring);
        assert_eq!(b.pivot.current(), PivotState::RotateDown);

        b.tick();
        assert!(!b.sim.brake.position(), "release must be commanded");
        assert_eq!(b.sim.pivot_motor.value(), 0.0);

        // 200 ms settle → no torque for the next 9 ticks.
        b.ticks(9);
        assert_eq!(b.sim.pivot_motor.value(), 0.0);
        b.ticks(2);
        assert!(b.sim.pivot_motor.value() > 0.0);
    }

    #[test]
    fn rotation_output_ramps_and_settles_in_band() {
        let mut b = Bench::new();
        b.pivot.set_mode(PivotState::Acquiring);
        b.sim.set_pivot_angle(10.0, 0.0);
        b.ticks(3);
        let ramped = b.sim.pivot_motor.value();
        assert!((ramped - 0.15).abs() < 1e-9);

        // Inside the band: output holds.
        b.sim.set_pivot_angle(30.0, 90.0);
        b.tick();
        assert!((b.sim.pivot_motor.value() - ramped).abs() < 1e-9);

        // Too fast: output backs off.
        b.sim.set_pivot_angle(40.0, 150.0);
        b.tick();
        assert!(b.sim.pivot_motor.value() < ramped);
    }

    #[test]
    fn stages_follow_rotation_and_perimeter() {
        let mut b = Bench::new();
        b.pivot.set_mode(PivotState::Acquiring);
        b.sim.set_pivot_angle(25.0, 90.0);
        b.tick();
        assert!(b.sim.lower_stage.position());
        assert!(!b.sim.upper_stage.position());
        b.sim.set_pivot_angle(50.0, 90.0);
        b.tick();
        assert!(b.sim.upper_stage.position());

        b.pivot.set_mode(PivotState::SafeState);
        assert_eq!(b.pivot.current(), PivotState::RotateUp);
        b.sim.set_pivot_angle(30.0, -90.0);
        b.tick();
        assert!(!b.sim.upper_stage.position());
        assert!(b.sim.lower_stage.position());
        b.sim.set_pivot_angle(10.0, -90.0);
        b.tick();
        assert!(!b.sim.lower_stage.position());
    }

    #[test]
    fn limit_switch_cuts_torque() {
        let mut b = Bench::new();
        b.sim.set_pivot_angle(60.0, 0.0);
        b.tick();
        b.pivot.set_mode(PivotState::RotateUp);
        b.sim.upper_limit.set_active(true);
        b.sim.set_pivot_angle(30.0, 0.0);
        b.tick();
        // Active upper limit counts as arrival; no torque into it.
        assert_eq!(b.pivot.current(), PivotState::SafeState);
        assert_eq!(b.sim.pivot_motor.value(), 0.0);
    }

    #[test]
    fn safe_state_rezeroes_negative_drift() {
        let mut b = Bench::new();
        b.sim.set_pivot_angle(-3.0, 0.0);
        b.tick();
        assert_eq!(b.pivot.current(), PivotState::SafeState);
        assert_eq!(b.pivot.snapshot().angle, 0.0);
        b.tick();
        assert_eq!(b.pivot.snapshot().angle, 0.0);
    }

    #[test]
    fn readiness_needs_both_delays_and_brake() {
        let mut b = Bench::new();
        b.pivot.set_preset(0).unwrap();
        b.arrive(30.0);
        assert_eq!(b.pivot.current(), PivotState::ReadyToShoot);

        // 500 ms proportional phase, then 250 ms hold phase.
        let mut elapsed = Duration::ZERO;
        while elapsed < Duration::from_millis(740) {
            b.tick();
            elapsed += TICK;
            assert!(!b.pivot.is_ready(), "ready too early at {elapsed:?}");
            assert!(!b.sim.brake.position());
        }
        b.tick();
        assert!(b.sim.brake.position(), "brake engages after both delays");
        // Ready only once the brake reads back engaged.
        b.tick();
        assert!(b.pivot.is_ready());
        assert!(b.pivot.is_command_done());

        b.pivot.set_mode(PivotState::Acquiring);
        assert!(!b.pivot.is_ready());
    }

    #[test]
    fn brake_slip_withdraws_readiness() {
        let mut b = Bench::new();
        b.pivot.set_preset(0).unwrap();
        b.arrive(30.0);
        b.ticks(40);
        assert!(b.pivot.is_ready());

        b.sim.brake.set_position(false);
        b.tick();
        assert!(!b.pivot.snapshot().brake_engaged);
        assert!(!b.pivot.is_ready(), "ready while the brake reads disengaged");

        // The brake is re-commanded; readiness follows the read-back.
        assert!(b.sim.brake.position());
        b.tick();
        assert!(b.pivot.is_ready());
    }

    #[test]
    fn ready_to_shoot_applies_proportional_torque() {
        let mut b = Bench::new();
        b.pivot.set_preset(1).unwrap();
        b.arrive(44.0);
        assert_eq!(b.pivot.current(), PivotState::ReadyToShoot);
        b.sim.set_pivot_angle(39.0, 0.0);
        b.tick();
        // 6° short of 45° with a 30° gain distance.
        assert!((b.sim.pivot_motor.value() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn stall_forces_off_state_and_zeroes_output() {
        let mut b = Bench::new();
        b.sim.set_pivot_angle(60.0, 0.0);
        b.tick();
        b.pivot.set_mode(PivotState::Acquiring);

        let config = PivotConfig::default();
        let interval_ticks = (config.stall_interval_ms / TICK.as_millis() as u64) as usize;
        let mut above_at = None;
        let mut tripped_at = None;
        for i in 0..100 {
            b.tick();
            if b.pivot.current() == PivotState::OffState {
                tripped_at = Some(i);
                break;
            }
            if above_at.is_none() && b.sim.pivot_motor.value() > config.moving_threshold {
                above_at = Some(i);
            }
        }
        let above_at = above_at.expect("output must ramp past the moving threshold");
        let tripped_at = tripped_at.expect("stall must be detected");
        // Trips on the very tick the stall interval has elapsed.
        assert_eq!(tripped_at, above_at + interval_ticks);
        assert_eq!(b.sim.pivot_motor.value(), 0.0);
        assert_eq!(b.pivot.wanted(), PivotState::OffState);

        // Stays off until commanded.
        b.ticks(10);
        assert_eq!(b.pivot.current(), PivotState::OffState);
        assert_eq!(b.sim.pivot_motor.value(), 0.0);
        b.pivot.set_mode(PivotState::SafeState);
        assert_ne!(b.pivot.current(), PivotState::OffState);
    }

    #[test]
    fn roller_override_only_in_teleop() {
        let mut b = Bench::new();
        b.pivot.set_roller_override(Some(-0.5));
        b.manual.set(true);
        b.tick();
        assert_eq!(b.sim.rollers.value(), 0.0);

        b.modes.set(OperatingMode::Teleoperated);
        b.tick();
        assert_eq!(b.sim.rollers.value(), -0.5);

        b.manual.set(false);
        b.tick();
        assert_eq!(b.sim.rollers.value(), 0.0);

        b.manual.set(true);
        b.pivot.set_roller_override(None);
        b.tick();
        assert_eq!(b.sim.rollers.value(), 0.0, "SAFE_STATE rollers are idle");
    }

    #[test]
    fn acquire_then_eject_end_to_end() {
        let mut b = Bench::new();
        b.tick();
        assert_eq!(b.pivot.current(), PivotState::SafeState);

        b.pivot.set_mode(PivotState::Acquiring);
        assert_eq!(b.pivot.current(), PivotState::RotateDown);
        for angle in [20.0, 50.0, 80.0, 110.0] {
            b.sim.set_pivot_angle(angle, 90.0);
            b.tick();
            assert_eq!(b.pivot.current(), PivotState::RotateDown);
        }
        b.arrive(120.0);
        assert_eq!(b.pivot.current(), PivotState::Acquiring);
        b.tick();
        assert!(b.sim.rollers.value() > 0.0);

        b.sim.ball_present.set_active(true);
        b.ticks(3);
        assert_eq!(b.pivot.current(), PivotState::Acquiring, "debounce must hold");
        b.ticks(4);
        assert_eq!(b.pivot.current(), PivotState::Acquired);
        assert_eq!(b.pivot.wanted(), PivotState::Acquired);
        assert!(!b.sim.upper_stage.position(), "trap stage retracted");

        b.pivot.set_mode(PivotState::EjectBall);
        for _ in 0..10 {
            b.tick();
            assert!(b.sim.rollers.value() < 0.0);
        }

        b.pivot.set_mode(PivotState::SafeState);
        b.tick();
        assert_eq!(b.sim.rollers.value(), 0.0);
    }
}
