// Magnet Gesture Core - magnetometer gesture recognition
// Per-tick pipeline: smoothing, calibration-relative classification,
// debounce and rate-limited gesture events

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod managers;
pub mod sensor;
pub mod types;

// Re-exports for convenience
pub use config::AppConfig;
pub use engine::GestureEngine;
pub use sensor::{AtomicSensor, SensorPublisher, SensorSource};
pub use types::{CalibrationEvent, GestureEvent, Position, Vector3};

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// `log` records from the library are forwarded through the same subscriber.
/// Calling this more than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
