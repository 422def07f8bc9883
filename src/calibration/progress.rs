// Progress tracking for calibration sessions
//
// A snapshot of the active session, cheap to copy and safe to hand to UI
// code or serialize.

use crate::types::Position;

/// Progress information for the active calibration session
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Position being calibrated (`Ambiente` for the ambient baseline)
    pub target: Position,
    /// Readings accumulated so far
    pub samples_collected: u32,
    /// Time sampled so far
    pub elapsed_ms: u64,
    /// Total sampling time of the session
    pub duration_ms: u64,
}

impl CalibrationProgress {
    /// Create a new progress instance
    ///
    /// # Arguments
    /// * `target` - Position being calibrated
    /// * `samples_collected` - Readings accumulated so far
    /// * `elapsed_ms` - Time sampled so far
    /// * `duration_ms` - Total sampling time
    pub fn new(target: Position, samples_collected: u32, elapsed_ms: u64, duration_ms: u64) -> Self {
        Self {
            target,
            samples_collected,
            elapsed_ms,
            duration_ms,
        }
    }

    /// Whether the sampling time has fully elapsed
    pub fn is_complete(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    /// Get progress percentage (0-100)
    pub fn percentage(&self) -> u8 {
        if self.duration_ms == 0 {
            return 0;
        }
        let ratio = self.elapsed_ms as f64 / self.duration_ms as f64;
        (ratio.min(1.0) * 100.0) as u8
    }
}
