use thiserror::Error;
use std::fmt;

/// Primary error type for the barometer crate
///
/// Every variant except `InvalidInstance` is an initialization failure: the
/// vehicle must not fly when one of them is returned.
#[derive(Error, Debug)]
pub enum BaroError {
    /// More sensors registered than the sensor table holds
    #[error("Too many barometers (max {max})")]
    TooManySensors { max: usize },

    /// More backends added than the driver table holds
    #[error("Too many barometer drivers (max {max})")]
    TooManyDrivers { max: usize },

    /// No backend registered any sensor
    #[error("Baro: unable to initialise driver")]
    NoSensors,

    /// No healthy reading within the per-round timeout
    #[error("Baro: unable to calibrate ({phase} round {round}, {elapsed_ms}ms without a healthy reading)")]
    CalibrationTimeout {
        phase: CalibrationPhase,
        round: u8,
        elapsed_ms: u32,
    },

    /// Calibration finished without a single calibrated instance
    #[error("Baro: all sensors uncalibrated")]
    AllSensorsUncalibrated,

    /// Instance index outside the registered range
    #[error("Invalid barometer instance {0}")]
    InvalidInstance(u8),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        /// Detailed error message
        message: String,
        /// Configuration parameter that caused the error
        parameter: Option<String>,
    },

    /// A thread panicked while holding the barometer lock
    #[error("Barometer lock poisoned")]
    LockPoisoned,
}

/// Calibration phase that can time out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Settling,
    Sampling,
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationPhase::Settling => write!(f, "settling"),
            CalibrationPhase::Sampling => write!(f, "sampling"),
        }
    }
}

/// Create a configuration error
pub fn config_error(message: impl Into<String>, parameter: Option<impl Into<String>>) -> BaroError {
    BaroError::Configuration {
        message: message.into(),
        parameter: parameter.map(|p| p.into()),
    }
}

/// Type alias for Result with BaroError
pub type BaroResult<T> = Result<T, BaroError>;
