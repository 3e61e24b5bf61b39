//! Winch/latch firing state machine.
//!
//! The winch stores energy by winding against the latch. Firing releases the
//! latch; the cooldown then triggers one camera capture and, unless the shot
//! was short, rewinds to home automatically:
//!
//! ```text
//! STANDBY ─fire─▶ SHOOT ─▶ SHOOTER_COOLDOWN ─▶ SET_HOME ─▶ HOLD_WINCH ─▶ UNWINDING ─▶ STANDBY
//!                                  └──────(home tripped or short shot)──────────────▶ STANDBY
//! ```
//!
//! Positive motor output pays line out (position increases); negative output
//! winds toward the home switch.

use std::time::{Duration, Instant};

use catapult_hal::{WinchHardware, WinchReadings};
use catapult_kernel::{FireGate, StallDetector};
use catapult_types::{CatapultError, SubsystemId, WinchState};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::diagnostics::DiagnosticSink;
use crate::supervisor::ControlLoop;

const SUBSYSTEM: &str = "winch";

// ────────────────────────────────────────────────────────────────────────────
// Config
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinchConfig {
    pub period_ms: u64,
    /// Full travel in calibrated length units.
    pub max_position: f64,
    pub set_home_output: f64,
    pub unwind_output: f64,
    pub unwind_timeout_ms: u64,
    /// Slack-settle time between homing and unwinding.
    pub hold_ms: u64,
    /// Delay after release before the capture request.
    pub capture_delay_ms: u64,
    pub cooldown_ms: u64,
    /// Output magnitude for slack take-up.
    pub slack_output: f64,
    pub slack_timeout_ms: u64,
    pub moving_threshold: f64,
    pub stall_rate_epsilon: f64,
    pub stall_interval_ms: u64,
}

impl Default for WinchConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            max_position: 10.0,
            set_home_output: -0.6,
            unwind_output: 0.6,
            unwind_timeout_ms: 2500,
            hold_ms: 300,
            capture_delay_ms: 50,
            cooldown_ms: 750,
            slack_output: 0.4,
            slack_timeout_ms: 3000,
            moving_threshold: 0.3,
            stall_rate_epsilon: 0.05,
            stall_interval_ms: 500,
        }
    }
}

impl WinchConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinchSnapshot {
    pub current: WinchState,
    pub wanted: WinchState,
    pub position: f64,
    pub rate: f64,
    pub home: bool,
    pub slack_target: f64,
    pub motor_output: f64,
    pub latch_engaged: bool,
    pub faulted: bool,
    pub short_shot: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

pub struct WinchController {
    config: WinchConfig,
    hw: WinchHardware,
    gate: FireGate,
    diagnostics: DiagnosticSink,

    current: WinchState,
    wanted: WinchState,
    entered_at: Option<Instant>,
    fired_at: Option<Instant>,
    short_shot: bool,
    capture_sent: bool,
    slack_target: f64,
    /// Latched by a stall; blocks firing until the next explicit command.
    faulted: bool,
    stall: StallDetector,
    readings: WinchReadings,
}

impl WinchController {
    pub fn new(
        config: WinchConfig,
        hw: WinchHardware,
        gate: FireGate,
        diagnostics: DiagnosticSink,
    ) -> Self {
        let stall = StallDetector::new(
            config.moving_threshold,
            config.stall_rate_epsilon,
            Duration::from_millis(config.stall_interval_ms),
        );
        Self {
            config,
            hw,
            gate,
            diagnostics,
            current: WinchState::Standby,
            wanted: WinchState::Standby,
            entered_at: None,
            fired_at: None,
            short_shot: false,
            capture_sent: false,
            slack_target: 0.0,
            faulted: false,
            stall,
            readings: WinchReadings::default(),
        }
    }

    pub fn current(&self) -> WinchState {
        self.current
    }

    pub fn wanted(&self) -> WinchState {
        self.wanted
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Every winch command ends in STANDBY.
    pub fn is_command_done(&self) -> bool {
        self.current == WinchState::Standby
    }

    pub fn snapshot(&self) -> WinchSnapshot {
        WinchSnapshot {
            current: self.current,
            wanted: self.wanted,
            position: self.readings.position,
            rate: self.readings.rate,
            home: self.readings.home,
            slack_target: self.slack_target,
            motor_output: self.hw.motor.output(),
            latch_engaged: self.hw.latch.commanded(),
            faulted: self.faulted,
            short_shot: self.short_shot,
        }
    }

    // ── Commands ────────────────────────────────────────────────────────────

    /// Force a mode. Clears a latched stall fault.
    pub fn set_mode(&mut self, state: WinchState) {
        if state == WinchState::Shoot {
            warn!(subsystem = SUBSYSTEM, "SHOOT forced without readiness arbitration");
        }
        self.faulted = false;
        self.stall.reset();
        self.wanted = state;
        self.enter(state, None);
    }

    pub fn set_mode_tag(&mut self, tag: &str) -> Result<(), CatapultError> {
        match tag.parse::<WinchState>() {
            Ok(state) => {
                self.set_mode(state);
                Ok(())
            }
            Err(e) => {
                error!(subsystem = SUBSYSTEM, tag, "unknown winch state tag");
                self.diagnostics.error(SUBSYSTEM, e.to_string());
                Err(e)
            }
        }
    }

    /// Take up or pay out slack to `target`. The direction is picked from the
    /// last measured position and confirmed against a fresh sample on the
    /// first tick in the state.
    pub fn set_slack_target(&mut self, target: f64) -> Result<(), CatapultError> {
        if !target.is_finite() {
            return Err(CatapultError::InvalidArgument(format!(
                "slack target must be finite, got {target}"
            )));
        }
        self.slack_target = target.clamp(0.0, self.config.max_position);
        let next = self.slack_direction(self.readings.position);
        self.faulted = false;
        self.stall.reset();
        self.wanted = next;
        self.enter(next, None);
        Ok(())
    }

    /// Arbitrated fire request. Accepted only from STANDBY, with no latched
    /// fault, and when the [`FireGate`] allows it.
    ///
    /// # Errors
    ///
    /// [`CatapultError::CommandRejected`] describing why the shot was refused.
    pub fn request_fire(&mut self) -> Result<(), CatapultError> {
        let reject = |reason: String| CatapultError::CommandRejected {
            subsystem: SubsystemId::Winch,
            reason,
        };
        if self.current != WinchState::Standby {
            return Err(reject(format!("busy in {}", self.current)));
        }
        if self.faulted {
            return Err(reject("stall fault latched".to_string()));
        }
        self.gate.check()?;
        self.wanted = WinchState::Shoot;
        self.enter(WinchState::Shoot, None);
        Ok(())
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    fn enter(&mut self, next: WinchState, now: Option<Instant>) {
        let previous = self.current;
        self.current = next;
        self.entered_at = now;
        self.diagnostics
            .info(SUBSYSTEM, format!("{previous} -> {next} (wanted {})", self.wanted));
    }

    fn slack_direction(&self, position: f64) -> WinchState {
        if position > self.slack_target {
            WinchState::ShooterWinding
        } else {
            WinchState::ShooterUnwinding
        }
    }

    fn finish(&mut self, now: Instant) {
        self.wanted = WinchState::Standby;
        self.enter(WinchState::Standby, Some(now));
    }

    /// Returns the motor output for this tick.
    fn run_state(&mut self, now: Instant) -> f64 {
        let r = self.readings;
        let first_tick = self.entered_at.is_none();
        let entered = *self.entered_at.get_or_insert(now);
        let elapsed = now.saturating_duration_since(entered);

        let slacking = matches!(
            self.current,
            WinchState::ShooterWinding | WinchState::ShooterUnwinding
        );
        if first_tick && slacking {
            let direction = self.slack_direction(r.position);
            if direction != self.current {
                self.wanted = direction;
                self.enter(direction, Some(now));
            }
        }

        match self.current {
            WinchState::Standby => 0.0,
            WinchState::Shoot => {
                self.hw.latch.retract();
                self.fired_at = Some(now);
                self.short_shot = r.position < self.config.max_position / 2.0;
                self.capture_sent = false;
                let short = if self.short_shot { " (short)" } else { "" };
                self.diagnostics
                    .info(SUBSYSTEM, format!("fired at {:.2}{short}", r.position));
                self.enter(WinchState::ShooterCooldown, Some(now));
                0.0
            }
            WinchState::ShooterCooldown => {
                let since_fire = now.saturating_duration_since(self.fired_at.unwrap_or(entered));
                let capture_due = since_fire >= Duration::from_millis(self.config.capture_delay_ms);
                if !self.capture_sent && capture_due {
                    self.capture_sent = true;
                    if !self.hw.camera.fire() {
                        self.diagnostics.warn(SUBSYSTEM, "capture request failed");
                    }
                }
                if since_fire >= Duration::from_millis(self.config.cooldown_ms) {
                    if r.home || self.short_shot {
                        self.finish(now);
                    } else {
                        self.wanted = WinchState::SetHome;
                        self.enter(WinchState::SetHome, Some(now));
                    }
                }
                0.0
            }
            WinchState::SetHome => {
                if r.home {
                    self.hw.position.reset_zero();
                    self.readings.position = self.hw.position.position();
                    self.hw.latch.extend();
                    self.enter(WinchState::HoldWinch, Some(now));
                    0.0
                } else {
                    self.config.set_home_output
                }
            }
            WinchState::HoldWinch => {
                if elapsed >= Duration::from_millis(self.config.hold_ms) {
                    self.enter(WinchState::Unwinding, Some(now));
                }
                0.0
            }
            WinchState::Unwinding => {
                if elapsed >= Duration::from_millis(self.config.unwind_timeout_ms)
                    || r.position >= self.config.max_position
                {
                    self.finish(now);
                    0.0
                } else {
                    self.config.unwind_output
                }
            }
            WinchState::ShooterWinding => {
                if r.position <= self.slack_target
                    || r.home
                    || self.slack_timed_out(elapsed, r.position)
                {
                    self.finish(now);
                    0.0
                } else {
                    -self.config.slack_output.abs()
                }
            }
            WinchState::ShooterUnwinding => {
                if r.position >= self.slack_target || self.slack_timed_out(elapsed, r.position) {
                    self.finish(now);
                    0.0
                } else {
                    self.config.slack_output.abs()
                }
            }
        }
    }

    fn slack_timed_out(&self, elapsed: Duration, position: f64) -> bool {
        let timed_out = elapsed >= Duration::from_millis(self.config.slack_timeout_ms);
        if timed_out {
            self.diagnostics.warn(
                SUBSYSTEM,
                format!(
                    "slack target {:.2} not reached (at {position:.2}); giving up",
                    self.slack_target
                ),
            );
        }
        timed_out
    }

    fn trip_stall(&mut self, output: f64, now: Instant) {
        let fault = CatapultError::Stall {
            subsystem: SubsystemId::Winch,
            output,
            rate: self.readings.rate,
        };
        error!(subsystem = SUBSYSTEM, error = %fault, "stall detected; winch halted");
        self.diagnostics.error(SUBSYSTEM, fault.to_string());
        self.faulted = true;
        self.stall.reset();
        self.finish(now);
    }
}

impl ControlLoop for WinchController {
    fn tick(&mut self, now: Instant) -> Result<(), CatapultError> {
        self.readings = self.hw.sample(now);
        let mut output = self.run_state(now);

        if self.current.drives_motor() {
            if self.stall.update(output, self.readings.rate, now) {
                self.trip_stall(output, now);
                output = 0.0;
            }
        } else {
            self.stall.reset();
        }

        if output != 0.0 {
            debug!(subsystem = SUBSYSTEM, state = %self.current, output, "winch drive");
        }
        self.hw.motor.set(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catapult_hal::HardwareConfig;
    use catapult_hal::sim::{SimHandles, SimRig};
    use catapult_kernel::{ManualOverride, ModeSwitch, Readiness};
    use catapult_types::OperatingMode;

    const TICK: Duration = Duration::from_millis(10);

    struct Bench {
        winch: WinchController,
        sim: SimHandles,
        readiness: Readiness,
        manual: ManualOverride,
        modes: ModeSwitch,
        camera_before: u64,
        now: Instant,
    }

    impl Bench {
        fn new() -> Self {
            let hw_config = HardwareConfig {
                home_debounce_ms: 0,
                ..HardwareConfig::default()
            };
            let (_pivot, hw, sim) = SimRig::build(&hw_config);
            let readiness = Readiness::new();
            let manual = ManualOverride::new();
            let modes = ModeSwitch::new();
            let gate = FireGate::new(readiness.probe(), manual.clone(), modes.clone());
            let winch = WinchController::new(
                WinchConfig::default(),
                hw,
                gate,
                DiagnosticSink::new(64, modes.clone()),
            );
            Self {
                winch,
                camera_before: sim.camera.captures(),
                sim,
                readiness,
                manual,
                modes,
                now: Instant::now(),
            }
        }

        fn tick(&mut self) {
            self.now += TICK;
            self.winch.tick(self.now).unwrap();
        }

        fn ticks(&mut self, n: usize) {
            for _ in 0..n {
                self.tick();
            }
        }

        fn captures(&self) -> u64 {
            self.sim.camera.captures() - self.camera_before
        }
    }

    #[test]
    fn fire_rejected_without_readiness() {
        let mut b = Bench::new();
        b.tick();
        let err = b.winch.request_fire().unwrap_err();
        assert!(matches!(err, CatapultError::CommandRejected { .. }));
        assert_eq!(b.winch.current(), WinchState::Standby);
        assert_eq!(b.winch.wanted(), WinchState::Standby);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::Standby);
    }

    #[test]
    fn fire_accepted_when_ready() {
        let mut b = Bench::new();
        b.sim.latch.set_position(true);
        b.sim.set_winch_position(8.0);
        b.tick();
        b.readiness.set(true);
        b.winch.request_fire().unwrap();
        assert_eq!(b.winch.current(), WinchState::Shoot);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::ShooterCooldown);
        assert!(!b.sim.latch.position(), "latch released");
        assert!(!b.winch.snapshot().short_shot);
    }

    #[test]
    fn override_fires_only_in_teleop() {
        let mut b = Bench::new();
        b.tick();
        b.manual.set(true);
        b.modes.set(OperatingMode::Autonomous);
        assert!(b.winch.request_fire().is_err());
        b.modes.set(OperatingMode::Teleoperated);
        assert!(b.winch.request_fire().is_ok());
    }

    #[test]
    fn fire_rejected_when_busy() {
        let mut b = Bench::new();
        b.readiness.set(true);
        b.winch.set_mode(WinchState::SetHome);
        let err = b.winch.request_fire().unwrap_err();
        assert!(matches!(
            err,
            CatapultError::CommandRejected { ref reason, .. } if reason.contains("SET_HOME")
        ));
    }

    #[test]
    fn cooldown_captures_once_then_rewinds() {
        let mut b = Bench::new();
        b.sim.set_winch_position(8.0);
        b.tick();
        b.readiness.set(true);
        b.winch.request_fire().unwrap();
        b.tick(); // SHOOT → COOLDOWN, fired_at = t

        b.ticks(4); // 40 ms
        assert_eq!(b.captures(), 0);
        b.tick(); // 50 ms
        assert_eq!(b.captures(), 1);
        b.ticks(60); // 650 ms
        assert_eq!(b.captures(), 1, "capture is edge-triggered");
        assert_eq!(b.winch.current(), WinchState::ShooterCooldown);

        b.ticks(10); // 750 ms
        assert_eq!(b.winch.current(), WinchState::SetHome);
        b.tick();
        assert!(b.sim.winch_motor.value() < 0.0);
    }

    #[test]
    fn short_shot_returns_to_standby() {
        let mut b = Bench::new();
        b.sim.set_winch_position(2.0);
        b.tick();
        b.readiness.set(true);
        b.winch.request_fire().unwrap();
        b.tick();
        assert!(b.winch.snapshot().short_shot);
        b.ticks(75);
        assert_eq!(b.winch.current(), WinchState::Standby);
        assert!(b.winch.is_command_done());
    }

    #[test]
    fn set_home_zeroes_latches_and_unwinds() {
        let mut b = Bench::new();
        b.sim.set_winch_position(3.0);
        b.winch.set_mode(WinchState::SetHome);
        b.tick();
        assert_eq!(b.sim.winch_motor.value(), -0.6);

        b.sim.winch_home.set_active(true);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::HoldWinch);
        assert_eq!(b.winch.snapshot().position, 0.0);
        assert!(b.sim.latch.position());
        assert_eq!(b.sim.winch_motor.value(), 0.0);

        b.sim.winch_home.set_active(false);
        b.ticks(30);
        assert_eq!(b.winch.current(), WinchState::Unwinding);
        b.tick();
        assert_eq!(b.sim.winch_motor.value(), 0.6);

        // Raw 3.0 was zeroed; 13.0 raw is 10.0 calibrated = max.
        b.sim.set_winch_position(13.0);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::Standby);
        assert_eq!(b.sim.winch_motor.value(), 0.0);
    }

    #[test]
    fn unwinding_times_out() {
        let mut b = Bench::new();
        b.winch.set_mode(WinchState::Unwinding);
        // Simulated pot moves a little each tick so no stall is detected.
        for i in 0..260 {
            b.sim.set_winch_position(i as f64 * 0.01);
            b.tick();
        }
        assert_eq!(b.winch.current(), WinchState::Standby);
        assert!(!b.winch.is_faulted());
    }

    #[test]
    fn slack_direction_follows_position() {
        let mut b = Bench::new();
        b.sim.set_winch_position(6.0);
        b.tick();
        b.winch.set_slack_target(2.0).unwrap();
        assert_eq!(b.winch.current(), WinchState::ShooterWinding);
        assert_eq!(b.winch.wanted(), WinchState::ShooterWinding);
        b.sim.set_winch_position(5.0);
        b.tick();
        assert!(b.sim.winch_motor.value() < 0.0);
        b.sim.set_winch_position(1.9);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::Standby);

        b.winch.set_slack_target(50.0).unwrap();
        assert_eq!(b.winch.current(), WinchState::ShooterUnwinding);
        assert_eq!(b.winch.snapshot().slack_target, 10.0);
        b.sim.set_winch_position(4.0);
        b.tick();
        assert!(b.sim.winch_motor.value() > 0.0);

        assert!(b.winch.set_slack_target(f64::NAN).is_err());
    }

    #[test]
    fn slack_direction_is_confirmed_on_first_tick() {
        let mut b = Bench::new();
        b.sim.set_winch_position(6.0);
        // No tick yet: the last sample still reads the start-up position.
        b.winch.set_slack_target(2.0).unwrap();
        b.tick();
        assert_eq!(b.winch.current(), WinchState::ShooterWinding);
        assert_eq!(b.winch.wanted(), WinchState::ShooterWinding);
        assert!(b.sim.winch_motor.value() < 0.0, "must wind toward the target");

        b.sim.set_winch_position(1.5);
        b.tick();
        assert_eq!(b.winch.current(), WinchState::Standby);
    }

    #[test]
    fn stall_halts_and_blocks_firing() {
        let mut b = Bench::new();
        b.sim.set_winch_position(5.0);
        b.winch.set_mode(WinchState::SetHome);
        for _ in 0..55 {
            b.tick();
        }
        assert_eq!(b.winch.current(), WinchState::Standby);
        assert!(b.winch.is_faulted());
        assert_eq!(b.sim.winch_motor.value(), 0.0);

        b.readiness.set(true);
        assert!(b.winch.request_fire().is_err());

        b.winch.set_mode(WinchState::Standby);
        assert!(!b.winch.is_faulted());
        assert!(b.winch.request_fire().is_ok());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut b = Bench::new();
        assert!(b.winch.set_mode_tag("LAUNCH").is_err());
        assert_eq!(b.winch.current(), WinchState::Standby);
        b.winch.set_mode_tag("set_home").unwrap();
        assert_eq!(b.winch.current(), WinchState::SetHome);
    }
}
