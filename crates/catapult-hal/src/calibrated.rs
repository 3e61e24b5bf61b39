//! Calibrated sensor façades.
//!
//! Each façade is sampled once per control tick. A failed read is logged once
//! per outage and the last-known value is reused, so control loops never see
//! an I/O error.

use std::time::{Duration, Instant};

use crate::io_guard::IoGuard;
use crate::sensor::{AnalogInput, DigitalInput, Encoder};

// ────────────────────────────────────────────────────────────────────────────
// Calibration
// ────────────────────────────────────────────────────────────────────────────

/// Linear calibration: `(raw − zero) × scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub zero: f64,
    pub scale: f64,
}

impl Calibration {
    pub fn new(scale: f64) -> Self {
        Self { zero: 0.0, scale }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        (raw - self.zero) * self.scale
    }

    /// Make `raw` the new zero reference.
    pub fn rezero(&mut self, raw: f64) {
        self.zero = raw;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AngleSensor
// ────────────────────────────────────────────────────────────────────────────

/// Encoder-backed angle in degrees.
pub struct AngleSensor {
    encoder: Box<dyn Encoder>,
    calibration: Calibration,
    last_count: i64,
    last_rate: f64,
    guard: IoGuard,
}

impl AngleSensor {
    /// `degrees_per_count` converts quadrature pulses to degrees.
    pub fn new(encoder: Box<dyn Encoder>, degrees_per_count: f64) -> Self {
        let guard = IoGuard::new(encoder.id());
        Self {
            encoder,
            calibration: Calibration::new(degrees_per_count),
            last_count: 0,
            last_rate: 0.0,
            guard,
        }
    }

    /// Read the encoder and return `(degrees, degrees_per_second)`.
    pub fn sample(&mut self) -> (f64, f64) {
        let reading = self
            .encoder
            .count()
            .and_then(|count| Ok((count, self.encoder.rate()?)));
        if let Some((count, rate)) = self.guard.observe(reading) {
            self.last_count = count;
            self.last_rate = rate;
        }
        (self.degrees(), self.rate())
    }

    /// Angle from the most recent sample.
    pub fn degrees(&self) -> f64 {
        self.calibration.apply(self.last_count as f64)
    }

    pub fn rate(&self) -> f64 {
        self.last_rate * self.calibration.scale
    }

    /// Re-read the encoder and make the current position zero degrees.
    pub fn reset_zero(&mut self) {
        if let Some(count) = self.guard.observe(self.encoder.count()) {
            self.last_count = count;
        }
        self.calibration.rezero(self.last_count as f64);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LinearPositionSensor
// ────────────────────────────────────────────────────────────────────────────

/// Potentiometer-backed linear position. The rate is differentiated from
/// successive samples.
pub struct LinearPositionSensor {
    input: Box<dyn AnalogInput>,
    calibration: Calibration,
    last_voltage: f64,
    previous: Option<(f64, Instant)>,
    rate: f64,
    guard: IoGuard,
}

impl LinearPositionSensor {
    pub fn new(input: Box<dyn AnalogInput>, units_per_volt: f64) -> Self {
        let guard = IoGuard::new(input.id());
        Self {
            input,
            calibration: Calibration::new(units_per_volt),
            last_voltage: 0.0,
            previous: None,
            rate: 0.0,
            guard,
        }
    }

    /// Read the potentiometer and return `(position, units_per_second)`.
    pub fn sample(&mut self, now: Instant) -> (f64, f64) {
        if let Some(voltage) = self.guard.observe(self.input.voltage()) {
            self.last_voltage = voltage;
        }
        let position = self.position();
        self.rate = match self.previous {
            Some((prev, at)) if now > at => {
                (position - prev) / now.duration_since(at).as_secs_f64()
            }
            Some(_) => self.rate,
            None => 0.0,
        };
        self.previous = Some((position, now));
        (position, self.rate)
    }

    pub fn position(&self) -> f64 {
        self.calibration.apply(self.last_voltage)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Re-read the potentiometer and make the current position zero. The
    /// rate history is dropped so the jump does not read as motion.
    pub fn reset_zero(&mut self) {
        if let Some(voltage) = self.guard.observe(self.input.voltage()) {
            self.last_voltage = voltage;
        }
        self.calibration.rezero(self.last_voltage);
        self.previous = None;
        self.rate = 0.0;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// DebouncedSwitch
// ────────────────────────────────────────────────────────────────────────────

/// Boolean input that only changes after the raw value has held steady for
/// the debounce window.
pub struct DebouncedSwitch {
    input: Box<dyn DigitalInput>,
    window: Duration,
    stable: bool,
    candidate: Option<(bool, Instant)>,
    last_raw: bool,
    guard: IoGuard,
}

impl DebouncedSwitch {
    pub fn new(input: Box<dyn DigitalInput>, window: Duration) -> Self {
        let guard = IoGuard::new(input.id());
        Self {
            input,
            window,
            stable: false,
            candidate: None,
            last_raw: false,
            guard,
        }
    }

    pub fn sample(&mut self, now: Instant) -> bool {
        if let Some(raw) = self.guard.observe(self.input.is_active()) {
            self.last_raw = raw;
        }
        let raw = self.last_raw;

        if raw == self.stable {
            self.candidate = None;
            return self.stable;
        }

        let since = match self.candidate {
            Some((value, since)) if value == raw => since,
            _ => {
                self.candidate = Some((raw, now));
                now
            }
        };
        if now.saturating_duration_since(since) >= self.window {
            self.stable = raw;
            self.candidate = None;
        }
        self.stable
    }

    /// Filtered value from the most recent sample.
    pub fn is_active(&self) -> bool {
        self.stable
    }
}
