//! Engine module housing the gesture composition root.
//!
//! `core` wires the sensor, the per-tick pipeline, calibration and event
//! channels into `GestureEngine`; `clock` provides the injectable time
//! sources it measures durations with.

pub mod clock;
pub mod core;

pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use self::core::GestureEngine;
