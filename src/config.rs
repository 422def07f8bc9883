//! Configuration management for gesture tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling threshold tuning without recompilation. Each section maps to
//! one stage of the pipeline: smoothing, stability, classification,
//! emission and calibration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default on-disk location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "assets/gesture_config.json";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`]
pub const CONFIG_PATH_ENV: &str = "MAGNET_GESTURE_CONFIG";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub filter: FilterConfig,
    pub stability: StabilityConfig,
    pub classifier: ClassifierConfig,
    pub emitter: EmitterConfig,
    pub calibration: CalibrationConfig,
}

/// Low-pass smoothing and fallback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Exponential smoothing factor. Higher = faster, less smoothing
    pub low_pass_alpha: f32,
    /// Samples kept for the uncalibrated fallback heuristic
    pub sample_window: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_pass_alpha: 0.25,
            sample_window: 12,
        }
    }
}

/// Debounce counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Consecutive ticks required to confirm entering a position
    pub enter_frames: u32,
    /// Consecutive ticks tracked for leaving a position
    pub exit_frames: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            enter_frames: 3,
            exit_frames: 3,
        }
    }
}

/// Classifier thresholds (sensor units, typically µT)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum |delta| / |refDelta| for the magnitude branch of acceptance
    pub calibrated_magnitude_ratio: f32,
    /// Absolute distance under which a calibrated match is always accepted
    pub calibrated_abs_tolerance: f32,
    /// Fallback: minimum axis change for a directional gesture
    pub dir_threshold: f32,
    /// Fallback: maximum change allowed on the crossing axis
    pub cross_tolerance: f32,
    /// Fallback: minimum distance from baseline for an approach
    pub approach_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            calibrated_magnitude_ratio: 0.5,
            calibrated_abs_tolerance: 12.0,
            dir_threshold: 18.0,
            cross_tolerance: 10.0,
            approach_threshold: 35.0,
        }
    }
}

/// Gesture event rate limiting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Minimum seconds between two gesture events
    pub emit_cooldown_secs: f32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            emit_cooldown_secs: 0.2,
        }
    }
}

impl EmitterConfig {
    pub fn cooldown(&self) -> Duration {
        secs_to_duration(self.emit_cooldown_secs)
    }
}

/// Calibration procedure configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Seconds of sampling per calibration session
    pub sample_seconds: f32,
    /// Wipe persisted calibration when the engine starts
    pub clear_on_start: bool,
    /// JSON key-value file for persisted calibration (in-memory when absent)
    pub store_path: Option<PathBuf>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_seconds: 1.0,
            clear_on_start: false,
            store_path: None,
        }
    }
}

impl CalibrationConfig {
    pub fn sample_duration(&self) -> Duration {
        secs_to_duration(self.sample_seconds)
    }
}

/// Seconds to a microsecond-rounded duration so 0.2 maps to exactly 200ms
fn secs_to_duration(secs: f32) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((secs as f64 * 1_000_000.0).round() as u64)
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Never fails: a missing file, invalid JSON, or out-of-range values
    /// log a warning and return the default configuration.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] {} ({:?}). Using defaults.",
                    err,
                    path.as_ref()
                );
                Self::default()
            }
        }
    }

    /// Load and validate configuration, reporting why it was rejected
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
            reason: err.to_string(),
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|err| ConfigError::Io {
                reason: err.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `$MAGNET_GESTURE_CONFIG` or the default asset path
    pub fn load() -> Self {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_file(path)
    }

    /// Check every tunable against its accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(field: &'static str, value: f64) -> ConfigError {
            ConfigError::OutOfRange { field, value }
        }

        fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(out_of_range(field, value as f64))
            }
        }

        let alpha = self.filter.low_pass_alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(out_of_range("filter.low_pass_alpha", alpha as f64));
        }
        if self.filter.sample_window == 0 {
            return Err(out_of_range("filter.sample_window", 0.0));
        }
        if self.stability.enter_frames == 0 {
            return Err(out_of_range("stability.enter_frames", 0.0));
        }
        if self.stability.exit_frames == 0 {
            return Err(out_of_range("stability.exit_frames", 0.0));
        }

        let ratio = self.classifier.calibrated_magnitude_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(out_of_range(
                "classifier.calibrated_magnitude_ratio",
                ratio as f64,
            ));
        }
        non_negative(
            "classifier.calibrated_abs_tolerance",
            self.classifier.calibrated_abs_tolerance,
        )?;
        non_negative("classifier.dir_threshold", self.classifier.dir_threshold)?;
        non_negative("classifier.cross_tolerance", self.classifier.cross_tolerance)?;
        non_negative(
            "classifier.approach_threshold",
            self.classifier.approach_threshold,
        )?;
        non_negative("emitter.emit_cooldown_secs", self.emitter.emit_cooldown_secs)?;
        non_negative("calibration.sample_seconds", self.calibration.sample_seconds)?;

        Ok(())
    }
}
