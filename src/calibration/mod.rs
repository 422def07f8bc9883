// Calibration module - reference capture and persistence
//
// This module provides four components:
// 1. CalibrationMap: in-memory ambient baseline and position references
// 2. CalibrationStore: per-key persistence over a KeyValueStore backend
// 3. CalibrationSession: tick-driven averaging of sensor readings
// 4. CalibrationProgress: snapshot of the active session
//
// The calibration workflow:
// 1. Start a session for a position (or the ambient target)
// 2. Tick it with sensor readings until its duration elapses
// 3. Save the averaged reading; the classifier uses it on the next tick

pub mod progress;
pub mod session;
pub mod state;
pub mod store;

pub use progress::CalibrationProgress;
pub use session::{CalibrationSession, SessionStatus};
pub use state::CalibrationMap;
pub use store::{CalibrationStore, JsonFileStore, KeyValueStore, MemoryStore};
