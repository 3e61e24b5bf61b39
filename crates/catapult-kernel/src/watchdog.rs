//! [`Watchdog`] – heartbeat deadlines for supervised control loops.
//!
//! Each loop heartbeats after every completed tick, faulted or not. A loop
//! whose last heartbeat is older than its timeout is reported as frozen; that
//! usually means a tick is blocked on I/O it should not be waiting on.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Health reported for one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopHealth {
    Healthy,
    Frozen,
}

struct LoopEntry {
    last_heartbeat: Instant,
    timeout: Duration,
}

/// Tracks loop heartbeats.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use catapult_kernel::watchdog::{LoopHealth, Watchdog};
///
/// let t0 = Instant::now();
/// let mut wd = Watchdog::new();
/// wd.register("pivot", Duration::from_millis(100), t0);
/// assert_eq!(wd.health("pivot", t0 + Duration::from_millis(50)), LoopHealth::Healthy);
/// assert_eq!(wd.health("pivot", t0 + Duration::from_millis(150)), LoopHealth::Frozen);
/// ```
#[derive(Default)]
pub struct Watchdog {
    loops: HashMap<String, LoopEntry>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with a heartbeat `timeout`, counting from `now`.
    /// Re-registering resets the deadline.
    pub fn register(&mut self, name: &str, timeout: Duration, now: Instant) {
        self.loops.insert(
            name.to_string(),
            LoopEntry {
                last_heartbeat: now,
                timeout,
            },
        );
    }

    /// No-op for unregistered names.
    pub fn heartbeat(&mut self, name: &str, now: Instant) {
        if let Some(entry) = self.loops.get_mut(name) {
            entry.last_heartbeat = now;
        }
    }

    /// Unknown loops report [`LoopHealth::Frozen`].
    pub fn health(&self, name: &str, now: Instant) -> LoopHealth {
        match self.loops.get(name) {
            Some(entry) if now.saturating_duration_since(entry.last_heartbeat) <= entry.timeout => {
                LoopHealth::Healthy
            }
            _ => LoopHealth::Frozen,
        }
    }

    /// Names of every loop past its deadline, sorted.
    pub fn frozen(&self, now: Instant) -> Vec<String> {
        let mut names: Vec<String> = self
            .loops
            .iter()
            .filter(|(_, entry)| {
                now.saturating_duration_since(entry.last_heartbeat) > entry.timeout
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn heartbeat_extends_deadline() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new();
        wd.register("winch", 20 * MS, t0);
        wd.heartbeat("winch", t0 + 15 * MS);
        assert_eq!(wd.health("winch", t0 + 30 * MS), LoopHealth::Healthy);
        assert_eq!(wd.health("winch", t0 + 40 * MS), LoopHealth::Frozen);
    }

    #[test]
    fn frozen_lists_only_late_loops() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new();
        wd.register("pivot", 100 * MS, t0);
        wd.register("winch", 50 * MS, t0);
        wd.register("plant", 50 * MS, t0);
        wd.heartbeat("plant", t0 + 60 * MS);
        assert_eq!(wd.frozen(t0 + 80 * MS), vec!["winch".to_string()]);
        assert!(wd.frozen(t0).is_empty());
        assert_eq!(wd.len(), 3);
    }

    #[test]
    fn unknown_loop_is_frozen_and_heartbeat_is_noop() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new();
        wd.heartbeat("ghost", t0);
        assert!(wd.is_empty());
        assert_eq!(wd.health("ghost", t0), LoopHealth::Frozen);
    }

    #[test]
    fn reregister_resets_deadline() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new();
        wd.register("pivot", 10 * MS, t0);
        assert_eq!(wd.health("pivot", t0 + 20 * MS), LoopHealth::Frozen);
        wd.register("pivot", 10 * MS, t0 + 20 * MS);
        assert_eq!(wd.health("pivot", t0 + 25 * MS), LoopHealth::Healthy);
    }
}
