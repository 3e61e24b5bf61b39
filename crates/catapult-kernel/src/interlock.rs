//! Shared flags read across control loops.
//!
//! No locks: every flag is a single atomic. Readers may observe a value up to
//! one scheduling period stale, which the consumers tolerate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use catapult_types::OperatingMode;

// ────────────────────────────────────────────────────────────────────────────
// Readiness
// ────────────────────────────────────────────────────────────────────────────

/// Writer side of the pivot readiness predicate. Owned by the pivot
/// controller; everyone else gets a [`ReadinessProbe`].
#[derive(Debug, Default)]
pub struct Readiness {
    flag: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ready: bool) {
        self.flag.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Read-only capability for consumers of the predicate.
    pub fn probe(&self) -> ReadinessProbe {
        ReadinessProbe {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Read-only view of a [`Readiness`] predicate.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    flag: Arc<AtomicBool>,
}

impl ReadinessProbe {
    pub fn is_ready(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ManualOverride
// ────────────────────────────────────────────────────────────────────────────

/// Operator manual-override flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ManualOverride {
    flag: Arc<AtomicBool>,
}

impl ManualOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, active: bool) {
        self.flag.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ModeSwitch
// ────────────────────────────────────────────────────────────────────────────

/// Current [`OperatingMode`], notified by the external scheduler. Starts
/// [`OperatingMode::Disabled`].
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    mode: Arc<AtomicU8>,
}

impl Default for ModeSwitch {
    fn default() -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(OperatingMode::default().as_u8())),
        }
    }
}

impl ModeSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, mode: OperatingMode) {
        self.mode.store(mode.as_u8(), Ordering::Release);
    }

    pub fn get(&self) -> OperatingMode {
        OperatingMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn is_teleoperated(&self) -> bool {
        self.get() == OperatingMode::Teleoperated
    }
}
