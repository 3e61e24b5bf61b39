//! Diagnostic sink.
//!
//! Every subsystem event becomes one [`DiagnosticEvent`], mirrored to
//! `tracing` and published on a [`tokio::sync::broadcast`] channel so any
//! number of writers (console printer, log file, dashboard) can consume the
//! `"[time] {mode} subsystem: message"` lines. Publishing never fails from
//! the caller's point of view: with no subscribers, or a lagging one, events
//! are simply dropped.

use catapult_kernel::ModeSwitch;
use catapult_types::{DiagnosticEvent, DiagnosticLevel};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Cheap to clone; all clones publish on the same channel.
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    sender: broadcast::Sender<DiagnosticEvent>,
    modes: ModeSwitch,
}

impl DiagnosticSink {
    pub fn new(capacity: usize, modes: ModeSwitch) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, modes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, subsystem: &str, level: DiagnosticLevel, message: impl Into<String>) {
        let event = DiagnosticEvent::new(self.modes.get(), subsystem, level, message);
        match level {
            DiagnosticLevel::Info => info!(subsystem, mode = %event.mode, "{}", event.message),
            DiagnosticLevel::Warn => warn!(subsystem, mode = %event.mode, "{}", event.message),
            DiagnosticLevel::Error => error!(subsystem, mode = %event.mode, "{}", event.message),
        }
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn info(&self, subsystem: &str, message: impl Into<String>) {
        self.emit(subsystem, DiagnosticLevel::Info, message);
    }

    pub fn warn(&self, subsystem: &str, message: impl Into<String>) {
        self.emit(subsystem, DiagnosticLevel::Warn, message);
    }

    pub fn error(&self, subsystem: &str, message: impl Into<String>) {
        self.emit(subsystem, DiagnosticLevel::Error, message);
    }
}
