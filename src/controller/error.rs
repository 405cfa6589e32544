//! Error types of the controller subsystem

use std::time::Duration;

use crate::bus::BusError;
use crate::config::SettingsError;

/// Out-of-range arguments, rejected before the bus is touched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid lamp index {index}, board has {lamp_count} lamps")]
    LampIndex { index: usize, lamp_count: usize },

    #[error("Brightness must be between 0 and 100, got {0}")]
    Brightness(u8),

    #[error("Fan speed must be between 0 and 100, got {0}")]
    FanSpeed(u8),

    #[error("Flash interval must be greater than zero")]
    ZeroInterval,

    #[error("Flash interval {interval:?} exceeds the maximum of {max:?}")]
    IntervalTooLong { interval: Duration, max: Duration },
}

/// Operation not allowed in the current lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Controller is already running")]
    AlreadyRunning,

    #[error("Controller is not running")]
    NotRunning,

    #[error("Controller has been disposed")]
    Disposed,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}
