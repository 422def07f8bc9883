// CalibrationSession - resumable averaging of sensor readings
//
// The session is a plain state object advanced once per engine tick. It
// never sleeps or spawns: time only moves forward when `tick` is called
// with a later instant.
//
//   start(target, D, t0)            remaining = D, last_tick = t0
//   tick(reading, now)              remaining -= now - last_tick
//     remaining == 0                -> Completed(sum / count) or Aborted (count == 0)
//     otherwise                     -> accumulate reading, Sampling
//
// Ticking at the start instant therefore collects one reading, matching a
// loop that samples while `now < start + D`.

use std::time::{Duration, Instant};

use crate::calibration::progress::CalibrationProgress;
use crate::types::{Position, Vector3};

/// Outcome of advancing a session by one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionStatus {
    /// Still collecting readings
    Sampling(CalibrationProgress),
    /// Duration elapsed with readings; `reference` is their average
    Completed {
        target: Position,
        reference: Vector3,
        samples: u32,
    },
    /// Duration elapsed without a single reading
    Aborted { target: Position },
}

impl SessionStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, SessionStatus::Sampling(_))
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationSession {
    target: Position,
    duration: Duration,
    remaining: Duration,
    last_tick: Instant,
    sum: Vector3,
    count: u32,
}

impl CalibrationSession {
    /// Begin sampling for `target` at `now`
    pub fn start(target: Position, duration: Duration, now: Instant) -> Self {
        log::info!(
            "[CalibrationSession] Sampling {} for {:?}",
            target,
            duration
        );
        Self {
            target,
            duration,
            remaining: duration,
            last_tick: now,
            sum: Vector3::ZERO,
            count: 0,
        }
    }

    /// Advance by one tick
    ///
    /// `reading` is `None` when no usable sample is available this tick; the
    /// clock still advances. Once a finished status has been returned the
    /// session should be discarded.
    pub fn tick(&mut self, reading: Option<Vector3>, now: Instant) -> SessionStatus {
        let step = now.saturating_duration_since(self.last_tick);
        self.last_tick = self.last_tick.max(now);
        self.remaining = self.remaining.saturating_sub(step);

        if self.remaining.is_zero() {
            return self.finish();
        }

        if let Some(v) = reading.filter(Vector3::is_finite) {
            self.sum += v;
            self.count += 1;
        }
        SessionStatus::Sampling(self.progress())
    }

    fn finish(&self) -> SessionStatus {
        if self.count == 0 {
            SessionStatus::Aborted {
                target: self.target,
            }
        } else {
            SessionStatus::Completed {
                target: self.target,
                reference: self.sum / self.count as f32,
                samples: self.count,
            }
        }
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn samples_collected(&self) -> u32 {
        self.count
    }

    pub fn progress(&self) -> CalibrationProgress {
        let elapsed = self.duration.saturating_sub(self.remaining);
        CalibrationProgress::new(
            self.target,
            self.count,
            elapsed.as_millis() as u64,
            self.duration.as_millis() as u64,
        )
    }
}
