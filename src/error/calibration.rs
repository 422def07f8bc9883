// Calibration error types and constants

use crate::error::ErrorCode;
use crate::types::Position;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2007
pub struct CalibrationErrorCodes;

impl CalibrationErrorCodes {
    /// Session elapsed without collecting a single reading
    pub const EMPTY_SAMPLE: i32 = 2001;

    /// Another calibration session is still sampling
    pub const ALREADY_IN_PROGRESS: i32 = 2002;

    /// No calibration session is active
    pub const NOT_IN_PROGRESS: i32 = 2003;

    /// Position cannot be calibrated through this command
    pub const INVALID_TARGET: i32 = 2004;

    /// Persisting a calibration value failed
    pub const PERSISTENCE: i32 = 2005;

    /// Calibration state lock was poisoned
    pub const STATE_POISONED: i32 = 2006;

    /// No sensor is bound to feed the session
    pub const SENSOR_UNAVAILABLE: i32 = 2007;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=Calibration, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// None of these are fatal to the tick loop; they are logged and the prior
/// calibration is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Session reached its duration with zero readings
    EmptySample { target: Position },

    /// A session for `active` is already sampling
    AlreadyInProgress { active: Position },

    /// Cancel or progress query without an active session
    NotInProgress,

    /// Position not accepted by the requested command
    InvalidTarget { target: Position },

    /// Backing key-value store rejected a write
    Persistence { reason: String },

    /// Calibration state lock was poisoned
    StatePoisoned,

    /// Session requested while no sensor is bound
    SensorUnavailable { target: Position },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::EmptySample { .. } => CalibrationErrorCodes::EMPTY_SAMPLE,
            CalibrationError::AlreadyInProgress { .. } => {
                CalibrationErrorCodes::ALREADY_IN_PROGRESS
            }
            CalibrationError::NotInProgress => CalibrationErrorCodes::NOT_IN_PROGRESS,
            CalibrationError::InvalidTarget { .. } => CalibrationErrorCodes::INVALID_TARGET,
            CalibrationError::Persistence { .. } => CalibrationErrorCodes::PERSISTENCE,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
            CalibrationError::SensorUnavailable { .. } => {
                CalibrationErrorCodes::SENSOR_UNAVAILABLE
            }
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::EmptySample { target } => {
                format!(
                    "No readings collected while calibrating {}; previous value kept",
                    target
                )
            }
            CalibrationError::AlreadyInProgress { active } => {
                format!("Calibration already in progress for {}", active)
            }
            CalibrationError::NotInProgress => "No calibration in progress".to_string(),
            CalibrationError::InvalidTarget { target } => {
                format!("{} cannot be calibrated with this command", target)
            }
            CalibrationError::Persistence { reason } => {
                format!("Failed to persist calibration: {}", reason)
            }
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
            CalibrationError::SensorUnavailable { target } => {
                format!("Cannot calibrate {} without a bound sensor", target)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::EmptySample {
                target: Position::Arriba
            }
            .code(),
            2001
        );
        assert_eq!(
            CalibrationError::AlreadyInProgress {
                active: Position::Centro
            }
            .code(),
            2002
        );
        assert_eq!(CalibrationError::NotInProgress.code(), 2003);
        assert_eq!(
            CalibrationError::InvalidTarget {
                target: Position::Ambiente
            }
            .code(),
            2004
        );
        assert_eq!(
            CalibrationError::Persistence {
                reason: "disk full".to_string()
            }
            .code(),
            2005
        );
        assert_eq!(CalibrationError::StatePoisoned.code(), 2006);
        assert_eq!(
            CalibrationError::SensorUnavailable {
                target: Position::Ambiente
            }
            .code(),
            2007
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::EmptySample {
            target: Position::Izquierda,
        };
        assert!(err.message().contains("Izquierda"));
        assert!(err.message().contains("previous value kept"));

        let err = CalibrationError::AlreadyInProgress {
            active: Position::Derecha,
        };
        assert_eq!(err.message(), "Calibration already in progress for Derecha");

        let err = CalibrationError::Persistence {
            reason: "read-only".to_string(),
        };
        assert_eq!(err.message(), "Failed to persist calibration: read-only");
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotInProgress;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
