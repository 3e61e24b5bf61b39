//! [`Robot`] – the synchronous command surface.
//!
//! Owns both subsystems behind `Arc<Mutex<_>>` so commands and the supervised
//! loops act on the same instances. Every command takes the subsystem lock
//! briefly, mutates current and wanted state together, and returns.
//! Cross-subsystem wiring is explicit: the pivot gets the only
//! [`Readiness`] writer and the winch a [`FireGate`] built from its probe.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use catapult_hal::{PivotHardware, WinchHardware};
use catapult_kernel::{FireGate, ManualOverride, ModeSwitch, Readiness, ReadinessProbe};
use catapult_types::{CatapultError, OperatingMode, PivotState, SubsystemId, WinchState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diagnostics::{DEFAULT_CAPACITY, DiagnosticSink};
use crate::pivot::{AnglePreset, PivotConfig, PivotController, PivotSnapshot};
use crate::supervisor::{Supervisor, SupervisorConfig};
use crate::winch::{WinchConfig, WinchController, WinchSnapshot};

/// Tunables for the whole control core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub pivot: PivotConfig,
    pub winch: WinchConfig,
    pub supervisor: SupervisorConfig,
}

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Robot {
    config: RobotConfig,
    pivot: Arc<Mutex<PivotController>>,
    winch: Arc<Mutex<WinchController>>,
    modes: ModeSwitch,
    manual_override: ManualOverride,
    readiness: ReadinessProbe,
    diagnostics: DiagnosticSink,
}

impl Robot {
    pub fn new(config: RobotConfig, pivot_hw: PivotHardware, winch_hw: WinchHardware) -> Self {
        let modes = ModeSwitch::new();
        let manual_override = ManualOverride::new();
        let readiness = Readiness::new();
        let probe = readiness.probe();
        let diagnostics = DiagnosticSink::new(DEFAULT_CAPACITY, modes.clone());

        let gate = FireGate::new(probe.clone(), manual_override.clone(), modes.clone());
        let pivot = PivotController::new(
            config.pivot.clone(),
            pivot_hw,
            readiness,
            manual_override.clone(),
            modes.clone(),
            diagnostics.clone(),
        );
        let winch = WinchController::new(config.winch.clone(), winch_hw, gate, diagnostics.clone());

        Self {
            config,
            pivot: Arc::new(Mutex::new(pivot)),
            winch: Arc::new(Mutex::new(winch)),
            modes,
            manual_override,
            readiness: probe,
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// A supervisor sharing this robot's diagnostic sink.
    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.config.supervisor.clone(), self.diagnostics.clone())
    }

    /// Register both control loops at their configured periods.
    pub fn register(&self, supervisor: &mut Supervisor) {
        supervisor.register(
            SubsystemId::Pivot.as_str(),
            self.config.pivot.period(),
            Arc::clone(&self.pivot),
        );
        supervisor.register(
            SubsystemId::Winch.as_str(),
            self.config.winch.period(),
            Arc::clone(&self.winch),
        );
    }

    // ── Mode commands ───────────────────────────────────────────────────────

    /// Request a mode by tag. Unknown tags are logged and change nothing.
    pub fn set_mode(&self, subsystem: SubsystemId, tag: &str) -> Result<(), CatapultError> {
        match subsystem {
            SubsystemId::Pivot => lock(&self.pivot).set_mode_tag(tag),
            SubsystemId::Winch => lock(&self.winch).set_mode_tag(tag),
        }
    }

    pub fn set_pivot_mode(&self, state: PivotState) {
        lock(&self.pivot).set_mode(state);
    }

    pub fn set_winch_mode(&self, state: WinchState) {
        lock(&self.winch).set_mode(state);
    }

    pub fn set_preset(&self, index: usize) -> Result<(), CatapultError> {
        lock(&self.pivot).set_preset(index)
    }

    pub fn set_preset_named(&self, name: &str) -> Result<(), CatapultError> {
        lock(&self.pivot).set_preset_named(name)
    }

    pub fn presets(&self) -> Vec<AnglePreset> {
        lock(&self.pivot).presets().to_vec()
    }

    pub fn add_offset(&self, degrees: f64) -> Result<(), CatapultError> {
        lock(&self.pivot).add_offset(degrees)
    }

    pub fn set_slack_target(&self, target: f64) -> Result<(), CatapultError> {
        lock(&self.winch).set_slack_target(target)
    }

    /// Returns `true` when the shot was accepted.
    pub fn attempt_fire(&self) -> bool {
        match lock(&self.winch).request_fire() {
            Ok(()) => {
                info!("fire request accepted");
                true
            }
            Err(e) => {
                warn!(error = %e, "fire request refused");
                self.diagnostics.warn(SubsystemId::Winch.as_str(), e.to_string());
                false
            }
        }
    }

    // ── Operator & lifecycle ────────────────────────────────────────────────

    pub fn set_manual_override(&self, active: bool) {
        self.manual_override.set(active);
        self.diagnostics.info(
            "operator",
            format!("manual override {}", if active { "on" } else { "off" }),
        );
    }

    pub fn set_roller_override(&self, output: Option<f64>) {
        lock(&self.pivot).set_roller_override(output);
    }

    /// Notification from the external scheduler.
    pub fn set_operating_mode(&self, mode: OperatingMode) {
        self.modes.set(mode);
        self.diagnostics.info("lifecycle", format!("entered {mode} mode"));
    }

    pub fn operating_mode(&self) -> OperatingMode {
        self.modes.get()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    pub fn is_manual_override(&self) -> bool {
        self.manual_override.is_active()
    }

    /// `true` when both subsystems have finished their last command.
    pub fn is_last_command_done(&self) -> bool {
        self.is_command_done(SubsystemId::Pivot) && self.is_command_done(SubsystemId::Winch)
    }

    pub fn is_command_done(&self, subsystem: SubsystemId) -> bool {
        match subsystem {
            SubsystemId::Pivot => lock(&self.pivot).is_command_done(),
            SubsystemId::Winch => lock(&self.winch).is_command_done(),
        }
    }

    pub fn pivot(&self) -> PivotSnapshot {
        lock(&self.pivot).snapshot()
    }

    pub fn winch(&self) -> WinchSnapshot {
        lock(&self.winch).snapshot()
    }

    /// Stop-everything used on shutdown: pivot off, winch standby.
    pub fn halt(&self) {
        self.set_pivot_mode(PivotState::OffState);
        self.set_winch_mode(WinchState::Standby);
    }
}
