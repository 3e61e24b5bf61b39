//! `catapult-kernel` – Safety & Arbitration
//!
//! Holds the small pieces of state that cross subsystem boundaries and the
//! rules that decide whether an actuator command is allowed.
//!
//! # Modules
//!
//! - [`interlock`] – lock-free shared flags: the pivot
//!   [`Readiness`][interlock::Readiness] predicate (single writer, read-only
//!   [`ReadinessProbe`][interlock::ReadinessProbe] for consumers), the
//!   [`ManualOverride`][interlock::ManualOverride] flag and the
//!   [`ModeSwitch`][interlock::ModeSwitch] holding the current
//!   [`OperatingMode`][catapult_types::OperatingMode].
//! - [`fire_gate`] – [`FireGate`][fire_gate::FireGate]: the cross-subsystem
//!   arbitration point deciding whether the winch may release.
//! - [`stall_guard`] – [`StallDetector`][stall_guard::StallDetector]:
//!   output-vs-rate heuristic flagging a stalled actuator.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: heartbeat deadlines
//!   for supervised control loops.

pub mod fire_gate;
pub mod interlock;
pub mod stall_guard;
pub mod watchdog;

pub use fire_gate::FireGate;
pub use interlock::{ManualOverride, ModeSwitch, Readiness, ReadinessProbe};
pub use stall_guard::StallDetector;
pub use watchdog::{LoopHealth, Watchdog};
