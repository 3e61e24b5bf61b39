//! `catapult-runtime` – subsystem state machines and their supervision.
//!
//! # Modules
//!
//! - [`pivot`] – [`PivotController`][pivot::PivotController]: the
//!   pivot/acquisition state machine. Owns the pivot hardware and is the only
//!   writer of the shared readiness predicate.
//! - [`winch`] – [`WinchController`][winch::WinchController]: the firing
//!   sequence (release, camera capture, rewind, unwind) and slack take-up.
//!   Fire requests are arbitrated by a [`FireGate`][catapult_kernel::FireGate].
//! - [`robot`] – [`Robot`][robot::Robot]: the command surface that wires both
//!   subsystems together and serves operator and scheduler requests.
//! - [`supervisor`] – [`Supervisor`][supervisor::Supervisor]: runs every
//!   [`ControlLoop`][supervisor::ControlLoop] at a fixed period on its own
//!   task. A fault or panic in one tick is reported and the loop keeps
//!   running; a kernel [`Watchdog`][catapult_kernel::Watchdog] flags loops
//!   that stop ticking.
//! - [`diagnostics`] – [`DiagnosticSink`][diagnostics::DiagnosticSink]:
//!   broadcast channel of timestamped, mode-tagged diagnostic events.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod diagnostics;
pub mod pivot;
pub mod robot;
pub mod supervisor;
pub mod telemetry;
pub mod winch;

pub use diagnostics::DiagnosticSink;
pub use pivot::{AnglePreset, PivotConfig, PivotController, PivotSnapshot};
pub use robot::{Robot, RobotConfig};
pub use supervisor::{ControlLoop, LoopReport, Supervisor, SupervisorConfig, SupervisorHandle};
pub use telemetry::{LogFormat, TelemetryConfig, TracerProviderGuard, init_tracing};
pub use winch::{WinchConfig, WinchController, WinchSnapshot};
