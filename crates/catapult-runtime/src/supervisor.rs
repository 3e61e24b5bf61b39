//! Task supervisor.
//!
//! Owns one periodic control loop per subsystem and drives each on its own
//! tokio task. Every tick is isolated: an `Err` or a panic inside
//! [`ControlLoop::tick`] is turned into a diagnostic and the loop simply runs
//! again at its next period. Nothing a loop does can stop another loop or the
//! supervisor itself.
//!
//! Overrunning ticks are not aborted; the interval uses
//! [`MissedTickBehavior::Burst`] so late ticks run back-to-back.
//!
//! There is no cancellation primitive. Loops stop when the runtime does.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use catapult_kernel::{LoopHealth, Watchdog};
use catapult_types::CatapultError;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::diagnostics::DiagnosticSink;

const SUBSYSTEM: &str = "supervisor";

// ────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ────────────────────────────────────────────────────────────────────────────

/// One subsystem's per-tick body. A tick runs to completion; it must never
/// loop internally or wait on anything but bounded I/O.
pub trait ControlLoop: Send + 'static {
    fn tick(&mut self, now: Instant) -> Result<(), CatapultError>;
}

/// Shared subsystems: the supervisor ticks through the lock while the command
/// surface mutates through another clone. A lock poisoned by a panicking tick
/// is taken over with whatever partial state it holds.
impl<T: ControlLoop> ControlLoop for Arc<Mutex<T>> {
    fn tick(&mut self, now: Instant) -> Result<(), CatapultError> {
        self.lock().unwrap_or_else(PoisonError::into_inner).tick(now)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Config & stats
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// A loop is frozen once its last heartbeat is older than
    /// `period × watchdog_factor`.
    pub watchdog_factor: u32,
    /// How often the watchdog is checked.
    pub monitor_period_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            watchdog_factor: 10,
            monitor_period_ms: 250,
        }
    }
}

#[derive(Debug, Default)]
struct LoopStats {
    ticks: AtomicU64,
    faults: AtomicU64,
    overruns: AtomicU64,
}

/// Point-in-time view of one supervised loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopReport {
    pub name: String,
    pub period_ms: u64,
    pub ticks: u64,
    pub faults: u64,
    pub overruns: u64,
    pub frozen: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Supervisor
// ────────────────────────────────────────────────────────────────────────────

struct Registered {
    name: String,
    period: Duration,
    body: Box<dyn ControlLoop>,
}

pub struct Supervisor {
    config: SupervisorConfig,
    diagnostics: DiagnosticSink,
    loops: Vec<Registered>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, diagnostics: DiagnosticSink) -> Self {
        Self {
            config,
            diagnostics,
            loops: Vec::new(),
        }
    }

    /// Register a loop to be ticked every `period`. A zero period is raised
    /// to one millisecond.
    pub fn register(&mut self, name: impl Into<String>, period: Duration, body: impl ControlLoop) {
        self.loops.push(Registered {
            name: name.into(),
            period: period.max(Duration::from_millis(1)),
            body: Box::new(body),
        });
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Start every registered loop plus the watchdog monitor. Must be called
    /// from within a tokio runtime.
    pub fn spawn(self) -> SupervisorHandle {
        let watchdog = Arc::new(Mutex::new(Watchdog::new()));
        let factor = self.config.watchdog_factor.max(1);
        let mut entries = Vec::with_capacity(self.loops.len());

        for registered in self.loops {
            let stats = Arc::new(LoopStats::default());
            lock(&watchdog).register(&registered.name, registered.period * factor, Instant::now());
            entries.push(LoopEntry {
                name: registered.name.clone(),
                period: registered.period,
                stats: Arc::clone(&stats),
            });
            tokio::spawn(run_loop(
                registered,
                stats,
                Arc::clone(&watchdog),
                self.diagnostics.clone(),
            ));
        }

        self.diagnostics
            .info(SUBSYSTEM, format!("started {} control loops", entries.len()));

        let handle = SupervisorHandle {
            entries: Arc::new(entries),
            watchdog,
        };
        tokio::spawn(monitor(
            handle.clone(),
            Duration::from_millis(self.config.monitor_period_ms.max(1)),
            self.diagnostics,
        ));
        handle
    }
}

fn lock(watchdog: &Mutex<Watchdog>) -> std::sync::MutexGuard<'_, Watchdog> {
    watchdog.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_loop(
    mut registered: Registered,
    stats: Arc<LoopStats>,
    watchdog: Arc<Mutex<Watchdog>>,
    diagnostics: DiagnosticSink,
) {
    let mut interval = tokio::time::interval(registered.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let name = registered.name.as_str();

    loop {
        interval.tick().await;
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| registered.body.tick(started)));
        let finished = Instant::now();

        stats.ticks.fetch_add(1, Ordering::Relaxed);
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                stats.faults.fetch_add(1, Ordering::Relaxed);
                diagnostics.error(name, format!("tick failed: {e}"));
            }
            Err(payload) => {
                stats.faults.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(payload.as_ref());
                diagnostics.error(name, format!("tick panicked: {message}"));
            }
        }

        let elapsed = finished.duration_since(started);
        if elapsed > registered.period {
            stats.overruns.fetch_add(1, Ordering::Relaxed);
            debug!(
                loop_name = name,
                elapsed_us = elapsed.as_micros() as u64,
                "tick overran its period"
            );
        }

        lock(&watchdog).heartbeat(name, finished);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn monitor(handle: SupervisorHandle, period: Duration, diagnostics: DiagnosticSink) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reported: Vec<String> = Vec::new();

    loop {
        interval.tick().await;
        let frozen = handle.frozen_loops();
        for name in frozen.iter().filter(|n| !reported.contains(n)) {
            diagnostics.warn(SUBSYSTEM, format!("loop '{name}' missed its heartbeat deadline"));
        }
        for name in reported.iter().filter(|n| !frozen.contains(n)) {
            diagnostics.info(SUBSYSTEM, format!("loop '{name}' is ticking again"));
        }
        reported = frozen;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

struct LoopEntry {
    name: String,
    period: Duration,
    stats: Arc<LoopStats>,
}

/// Read-only view of running loops. Cheap to clone.
#[derive(Clone)]
pub struct SupervisorHandle {
    entries: Arc<Vec<LoopEntry>>,
    watchdog: Arc<Mutex<Watchdog>>,
}

impl SupervisorHandle {
    pub fn report(&self, name: &str) -> Option<LoopReport> {
        let now = Instant::now();
        let watchdog = lock(&self.watchdog);
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| Self::build_report(e, &watchdog, now))
    }

    /// Reports for every loop in registration order.
    pub fn reports(&self) -> Vec<LoopReport> {
        let now = Instant::now();
        let watchdog = lock(&self.watchdog);
        self.entries
            .iter()
            .map(|e| Self::build_report(e, &watchdog, now))
            .collect()
    }

    pub fn frozen_loops(&self) -> Vec<String> {
        lock(&self.watchdog).frozen(Instant::now())
    }

    fn build_report(entry: &LoopEntry, watchdog: &Watchdog, now: Instant) -> LoopReport {
        LoopReport {
            name: entry.name.clone(),
            period_ms: entry.period.as_millis() as u64,
            ticks: entry.stats.ticks.load(Ordering::Relaxed),
            faults: entry.stats.faults.load(Ordering::Relaxed),
            overruns: entry.stats.overruns.load(Ordering::Relaxed),
            frozen: watchdog.health(&entry.name, now) == LoopHealth::Frozen,
        }
    }
}
