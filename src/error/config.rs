// Configuration error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 3001-3002
pub struct ConfigErrorCodes;

impl ConfigErrorCodes {
    /// A tuning parameter lies outside its valid range
    pub const OUT_OF_RANGE: i32 = 3001;

    /// Config file could not be read or parsed
    pub const IO: i32 = 3002;
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `field` holds `value`, which is outside the accepted range
    OutOfRange { field: &'static str, value: f64 },

    /// Reading or parsing the config file failed
    Io { reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::OutOfRange { .. } => ConfigErrorCodes::OUT_OF_RANGE,
            ConfigError::Io { .. } => ConfigErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::OutOfRange { field, value } => {
                format!("Config value {} = {} is out of range", field, value)
            }
            ConfigError::Io { reason } => format!("Config unavailable: {}", reason),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
