// Sensor error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1003
pub struct SensorErrorCodes;

impl SensorErrorCodes {
    /// No sensor source is bound to the engine
    pub const MISSING_SENSOR: i32 = 1001;

    /// Sensor source reports it is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Sensor produced a NaN or infinite component
    pub const NON_FINITE_SAMPLE: i32 = 1003;
}

/// Log a sensor error with structured context
///
/// Sensor problems never stop the tick loop, so they are reported at warn level.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    warn!(
        "Sensor error in {}: code={}, component=SensorSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// No sensor source bound; ticks are no-ops
    MissingSensor,

    /// Sensor bound but its producer is stopped
    NotRunning,

    /// Reading contained a non-finite component
    NonFiniteSample,
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::MissingSensor => SensorErrorCodes::MISSING_SENSOR,
            SensorError::NotRunning => SensorErrorCodes::NOT_RUNNING,
            SensorError::NonFiniteSample => SensorErrorCodes::NON_FINITE_SAMPLE,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::MissingSensor => {
                "No sensor source bound. Call bind_sensor() first.".to_string()
            }
            SensorError::NotRunning => "Sensor source is not running".to_string(),
            SensorError::NonFiniteSample => "Sensor reading is not finite".to_string(),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_codes() {
        assert_eq!(SensorError::MissingSensor.code(), 1001);
        assert_eq!(SensorError::NotRunning.code(), 1002);
        assert_eq!(SensorError::NonFiniteSample.code(), 1003);
    }

    #[test]
    fn test_sensor_error_display() {
        let display = format!("{}", SensorError::MissingSensor);
        assert!(display.contains("code 1001"));
        assert!(display.contains("bind_sensor"));
    }
}
