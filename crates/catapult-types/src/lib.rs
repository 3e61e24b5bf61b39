use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Independently scheduled mechanisms that accept mode commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemId {
    /// Elevation/pivot assembly with intake rollers.
    Pivot,
    /// Winch-and-latch firing mechanism.
    Winch,
}

impl SubsystemId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemId::Pivot => "pivot",
            SubsystemId::Winch => "winch",
        }
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubsystemId {
    type Err = CatapultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pivot" => Ok(SubsystemId::Pivot),
            "winch" | "shooter" => Ok(SubsystemId::Winch),
            other => Err(CatapultError::InvalidArgument(format!(
                "unknown subsystem '{other}'"
            ))),
        }
    }
}

/// Operating mode notified by the external field/driver-station scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Autonomous,
    Teleoperated,
    #[default]
    Disabled,
}

impl OperatingMode {
    /// Compact encoding used when the mode is stored in an atomic cell.
    pub fn as_u8(self) -> u8 {
        match self {
            OperatingMode::Autonomous => 0,
            OperatingMode::Teleoperated => 1,
            OperatingMode::Disabled => 2,
        }
    }

    /// Inverse of [`OperatingMode::as_u8`]. Unknown values decode as
    /// [`OperatingMode::Disabled`].
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0 => OperatingMode::Autonomous,
            1 => OperatingMode::Teleoperated,
            _ => OperatingMode::Disabled,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperatingMode::Autonomous => "autonomous",
            OperatingMode::Teleoperated => "teleop",
            OperatingMode::Disabled => "disabled",
        })
    }
}

impl FromStr for OperatingMode {
    type Err = CatapultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "autonomous" => Ok(OperatingMode::Autonomous),
            "teleop" | "teleoperated" => Ok(OperatingMode::Teleoperated),
            "disabled" => Ok(OperatingMode::Disabled),
            other => Err(CatapultError::InvalidArgument(format!(
                "unknown operating mode '{other}'"
            ))),
        }
    }
}

/// Closed set of pivot/acquisition states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PivotState {
    RotateUp,
    RotateDown,
    Acquiring,
    Acquired,
    EjectBall,
    ReadyToShoot,
    SafeState,
    /// Terminal fault state; left only by an explicit command.
    OffState,
}

impl PivotState {
    pub const ALL: [PivotState; 8] = [
        PivotState::RotateUp,
        PivotState::RotateDown,
        PivotState::Acquiring,
        PivotState::Acquired,
        PivotState::EjectBall,
        PivotState::ReadyToShoot,
        PivotState::SafeState,
        PivotState::OffState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PivotState::RotateUp => "ROTATE_UP",
            PivotState::RotateDown => "ROTATE_DOWN",
            PivotState::Acquiring => "ACQUIRING",
            PivotState::Acquired => "ACQUIRED",
            PivotState::EjectBall => "EJECT_BALL",
            PivotState::ReadyToShoot => "READY_TO_SHOOT",
            PivotState::SafeState => "SAFE_STATE",
            PivotState::OffState => "OFF_STATE",
        }
    }
}

impl fmt::Display for PivotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PivotState {
    type Err = CatapultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        PivotState::ALL
            .into_iter()
            .find(|state| state.as_str() == tag)
            .ok_or_else(|| CatapultError::UnknownState {
                subsystem: SubsystemId::Pivot,
                tag: s.trim().to_string(),
            })
    }
}

/// Closed set of winch/latch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinchState {
    Shoot,
    Standby,
    ShooterCooldown,
    SetHome,
    HoldWinch,
    Unwinding,
    ShooterWinding,
    ShooterUnwinding,
}

impl WinchState {
    pub const ALL: [WinchState; 8] = [
        WinchState::Shoot,
        WinchState::Standby,
        WinchState::ShooterCooldown,
        WinchState::SetHome,
        WinchState::HoldWinch,
        WinchState::Unwinding,
        WinchState::ShooterWinding,
        WinchState::ShooterUnwinding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WinchState::Shoot => "SHOOT",
            WinchState::Standby => "STANDBY",
            WinchState::ShooterCooldown => "SHOOTER_COOLDOWN",
            WinchState::SetHome => "SET_HOME",
            WinchState::HoldWinch => "HOLD_WINCH",
            WinchState::Unwinding => "UNWINDING",
            WinchState::ShooterWinding => "SHOOTER_WINDING",
            WinchState::ShooterUnwinding => "SHOOTER_UNWINDING",
        }
    }

    /// `true` for the states in which the winch motor is driven.
    pub fn drives_motor(&self) -> bool {
        matches!(
            self,
            WinchState::SetHome
                | WinchState::Unwinding
                | WinchState::ShooterWinding
                | WinchState::ShooterUnwinding
        )
    }
}

impl fmt::Display for WinchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WinchState {
    type Err = CatapultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_uppercase();
        WinchState::ALL
            .into_iter()
            .find(|state| state.as_str() == tag)
            .ok_or_else(|| CatapultError::UnknownState {
                subsystem: SubsystemId::Winch,
                tag: s.trim().to_string(),
            })
    }
}

/// Severity attached to a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

/// One diagnostic event, rendered as `"[time] {mode} subsystem: message"`
/// for the external writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Operating mode at the time of the event.
    pub mode: OperatingMode,
    /// e.g. "pivot", "winch", "supervisor"
    pub subsystem: String,
    pub level: DiagnosticLevel,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(
        mode: OperatingMode,
        subsystem: impl Into<String>,
        level: DiagnosticLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mode,
            subsystem: subsystem.into(),
            level,
            message: message.into(),
        }
    }

    /// Render the single-line text form consumed by log writers.
    pub fn line(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.mode,
            self.subsystem,
            self.message
        )
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

/// Structured error shared by every catapult crate. Each variant carries the
/// context needed to diagnose it without string parsing.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CatapultError {
    #[error("Unknown {subsystem} state tag: {tag}")]
    UnknownState { subsystem: SubsystemId, tag: String },

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Stall on {subsystem}: output {output:.2} with rate {rate:.2}")]
    Stall {
        subsystem: SubsystemId,
        output: f64,
        rate: f64,
    },

    #[error("{subsystem} rejected command: {reason}")]
    CommandRejected { subsystem: SubsystemId, reason: String },

    #[error("Unknown angle preset: {0}")]
    InvalidPreset(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_tags_parse_case_insensitively() {
        for state in PivotState::ALL {
            let lower = state.as_str().to_ascii_lowercase();
            assert_eq!(lower.parse::<PivotState>().unwrap(), state);
        }
    }

    #[test]
    fn unknown_pivot_tag_is_structured_error() {
        let err = "SPIN_FOREVER".parse::<PivotState>().unwrap_err();
        assert_eq!(
            err,
            CatapultError::UnknownState {
                subsystem: SubsystemId::Pivot,
                tag: "SPIN_FOREVER".to_string(),
            }
        );
        assert!(err.to_string().contains("pivot"));
    }

    #[test]
    fn winch_tags_match_serde_names() {
        for state in WinchState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state.as_str()));
        }
    }

    #[test]
    fn operating_mode_survives_atomic_encoding() {
        for mode in [
            OperatingMode::Autonomous,
            OperatingMode::Teleoperated,
            OperatingMode::Disabled,
        ] {
            assert_eq!(OperatingMode::from_u8(mode.as_u8()), mode);
        }
        assert_eq!(OperatingMode::from_u8(200), OperatingMode::Disabled);
    }

    #[test]
    fn diagnostic_line_has_mode_and_subsystem() {
        let event = DiagnosticEvent::new(
            OperatingMode::Teleoperated,
            "winch",
            DiagnosticLevel::Info,
            "SHOOT -> SHOOTER_COOLDOWN",
        );
        let line = event.line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] teleop winch: SHOOT -> SHOOTER_COOLDOWN"));
    }

    #[test]
    fn error_display_carries_context() {
        let err = CatapultError::Stall {
            subsystem: SubsystemId::Pivot,
            output: 0.8,
            rate: 0.0,
        };
        assert_eq!(err.to_string(), "Stall on pivot: output 0.80 with rate 0.00");

        let err = CatapultError::HardwareFault {
            component: "pivot_encoder".to_string(),
            details: "bus timeout".to_string(),
        };
        assert!(err.to_string().contains("pivot_encoder"));
    }
}
