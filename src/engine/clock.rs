//! Time sources for the tick loop.
//!
//! Calibration durations and emitter cooldowns are measured against a
//! `TimeSource`, never against a host's scaled or pausable game clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Abstraction over a monotonic clock so tests can inject deterministic time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic time source for replays and tests.
///
/// Time only moves when `advance` or `set_offset` is called, so a recording
/// replayed at any speed yields the same events.
#[derive(Debug)]
pub struct ManualTimeSource {
    start: Instant,
    offset_us: AtomicU64,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, step: Duration) {
        self.offset_us
            .fetch_add(step.as_micros() as u64, Ordering::SeqCst);
    }

    /// Jump to an absolute offset from the start instant
    pub fn set_offset(&self, offset: Duration) {
        self.offset_us
            .store(offset.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn offset(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.start + self.offset()
    }
}
