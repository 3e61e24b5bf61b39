//! Raw sensor driver traits. Nothing here is calibrated; see
//! [`calibrated`][crate::calibrated] for the façades the control loops use.

use catapult_types::CatapultError;

/// Quadrature encoder.
pub trait Encoder: Send {
    fn id(&self) -> &str;

    /// Accumulated pulse count.
    fn count(&self) -> Result<i64, CatapultError>;

    /// Pulse rate in counts per second.
    fn rate(&self) -> Result<f64, CatapultError>;
}

/// Analog voltage input (potentiometers).
pub trait AnalogInput: Send {
    fn id(&self) -> &str;

    fn voltage(&self) -> Result<f64, CatapultError>;
}

/// Digital input (limit, presence and home switches). `true` means the switch
/// is active after any wiring inversion.
pub trait DigitalInput: Send {
    fn id(&self) -> &str;

    fn is_active(&self) -> Result<bool, CatapultError>;
}
