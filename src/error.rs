//! Custom error types for the launcher core.
//!
//! Every failure path in the core returns one of the typed errors below or
//! flips a readiness flag; nothing here terminates the host process.
//!
//! ## Error Hierarchy
//!
//! - **`ParseError`**: a text field does not hold a finite number. Recovered
//!   locally by marking the field not ready.
//! - **`ConversionError`**: a derived value is undefined (zero or invalid
//!   resistance). Same local recovery as `ParseError`.
//! - **`ValidationError`**: a business rule was violated (physical limit,
//!   readiness gate, wrong tab). Shown to the operator, measurement not started.
//! - **`LaunchError`**: the measurement script could not be spawned. Reported,
//!   never retried.
//! - **`SettingsError`**: the settings store could not be read or written.
//!   Persistence is best-effort, so callers log and continue.
//!
//! `RunnerError` consolidates them with `#[from]` so the `?` operator works
//! across layers.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the umbrella error type.
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

/// A text field could not be read as a finite number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{text}' is not a valid number")]
pub struct ParseError {
    /// The offending text, as typed by the operator.
    pub text: String,
}

impl ParseError {
    /// Creates a parse error for the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A derived quantity could not be computed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("resistance {0} Ohm cannot be used for conversion")]
    InvalidResistance(f64),

    #[error("conversion produced a non-finite value")]
    NonFinite,
}

/// A measurement was refused because its parameters break a rule.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please select a tab with the needed measurement")]
    NoMeasurementTab,

    #[error("Entered values are invalid, please correct them and try again")]
    NotReady {
        /// Resistance field parsed.
        resistance: bool,
        /// Voltage range/step parsed and converted.
        voltages: bool,
        /// Current range/step parsed and converted.
        currents: bool,
    },

    #[error("Voltage range {value} V is more than {device} can give ({ceiling} V)")]
    VoltageAboveDeviceLimit {
        value: f64,
        ceiling: f64,
        device: &'static str,
    },

    #[error("Voltage step {step} V is bigger than voltage range {range} V")]
    StepExceedsRange { step: f64, range: f64 },

    #[error("Final temperature {to} K is less than the starting value {from} K")]
    TemperatureNotMonotonic { from: f64, to: f64 },

    #[error("Temperature {value} K is above {ceiling} K; measurement is at your own risk")]
    TemperatureAboveCeiling {
        value: f64,
        ceiling: f64,
        /// The operator may acknowledge and retry.
        overridable: bool,
    },

    #[error("Too big {quantity}: {value} {unit}, maximum is {ceiling} {unit}")]
    AboveCeiling {
        quantity: &'static str,
        value: f64,
        ceiling: f64,
        unit: &'static str,
    },

    #[error("Parameter '{name}' has invalid value '{text}'")]
    InvalidNumber { name: &'static str, text: String },
}

impl ValidationError {
    /// True when the operator can acknowledge this error and start anyway.
    pub fn is_overridable(&self) -> bool {
        matches!(
            self,
            ValidationError::TemperatureAboveCeiling {
                overridable: true,
                ..
            }
        )
    }
}

/// The external measurement process could not be started.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Interpreter '{0}' not found in PATH")]
    InterpreterNotFound(String),

    #[error("Measurement script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The settings store failed. Always non-fatal for the caller.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings file {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings could not be encoded: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("Setting '{key}' has type {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Settings writer has shut down")]
    WriterClosed,
}

/// Umbrella error for the crate.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl From<figment::Error> for RunnerError {
    fn from(value: figment::Error) -> Self {
        RunnerError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_converts_into_runner_error() {
        let err: RunnerError = ValidationError::StepExceedsRange {
            step: 2.0,
            range: 1.0,
        }
        .into();
        assert!(matches!(
            err,
            RunnerError::Validation(ValidationError::StepExceedsRange { .. })
        ));
        assert!(err.to_string().contains("bigger than voltage range"));
    }

    #[test]
    fn only_confirmable_temperature_error_is_overridable() {
        let confirmable = ValidationError::TemperatureAboveCeiling {
            value: 2.0,
            ceiling: 1.7,
            overridable: true,
        };
        let blocking = ValidationError::TemperatureAboveCeiling {
            value: 2.0,
            ceiling: 1.7,
            overridable: false,
        };
        assert!(confirmable.is_overridable());
        assert!(!blocking.is_overridable());
        assert!(!ValidationError::NoMeasurementTab.is_overridable());
    }

    #[test]
    fn parse_error_reports_text() {
        let err = ParseError::new("abc");
        assert_eq!(err.to_string(), "'abc' is not a valid number");
    }
}
