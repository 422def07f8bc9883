//! Sensor source abstraction and lock-free latest-value publication.
//!
//! The hardware driver runs on its own thread and overwrites the latest
//! reading; the tick loop reads it without blocking and tolerates one tick
//! of staleness.
//!
//! ```text
//! driver thread ──► SensorPublisher::publish(v) ──► atomics ──► AtomicSensor::read()  [tick loop]
//! ```
//!
//! Each axis is stored as the bit pattern of an `f32` in an `AtomicU32`, and
//! a timestamp is bumped last with `Release` ordering. A reader can observe
//! axes from two consecutive publications; at magnetometer rates that mix is
//! within sensor noise and is accepted in exchange for never blocking.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::Vector3;

/// Contract consumed by the gesture engine
///
/// Implementations must be cheap and non-blocking: `read` is called once per
/// tick from the tick loop.
pub trait SensorSource: Send + Sync {
    /// Latest available reading
    fn read(&self) -> Vector3;

    /// Whether the producer is currently delivering samples
    fn is_running(&self) -> bool;
}

#[derive(Debug, Default)]
struct SharedReading {
    x: AtomicU32,
    y: AtomicU32,
    z: AtomicU32,
    timestamp_ms: AtomicU64,
    running: AtomicBool,
}

/// Reader half of a single-writer/single-reader latest-value cell
#[derive(Debug, Clone)]
pub struct AtomicSensor {
    shared: Arc<SharedReading>,
}

/// Writer half, owned by the driver thread
#[derive(Debug)]
pub struct SensorPublisher {
    shared: Arc<SharedReading>,
}

impl AtomicSensor {
    /// Create a connected reader/writer pair
    ///
    /// The cell starts at the zero vector with `is_running() == false`.
    pub fn new() -> (AtomicSensor, SensorPublisher) {
        let shared = Arc::new(SharedReading::default());
        (
            AtomicSensor {
                shared: Arc::clone(&shared),
            },
            SensorPublisher { shared },
        )
    }

    /// Milliseconds since UNIX epoch of the last publication (0 if none)
    pub fn latest_timestamp_ms(&self) -> u64 {
        self.shared.timestamp_ms.load(Ordering::Acquire)
    }
}

impl SensorSource for AtomicSensor {
    fn read(&self) -> Vector3 {
        // Acquire on the timestamp pairs with the Release in publish()
        let _ = self.shared.timestamp_ms.load(Ordering::Acquire);
        Vector3 {
            x: f32::from_bits(self.shared.x.load(Ordering::Relaxed)),
            y: f32::from_bits(self.shared.y.load(Ordering::Relaxed)),
            z: f32::from_bits(self.shared.z.load(Ordering::Relaxed)),
        }
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl SensorPublisher {
    /// Overwrite the latest reading, stamped with the wall clock
    pub fn publish(&self, v: Vector3) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.publish_at(v, now_ms);
    }

    /// Overwrite the latest reading with an explicit timestamp
    pub fn publish_at(&self, v: Vector3, timestamp_ms: u64) {
        self.shared.x.store(v.x.to_bits(), Ordering::Relaxed);
        self.shared.y.store(v.y.to_bits(), Ordering::Relaxed);
        self.shared.z.store(v.z.to_bits(), Ordering::Relaxed);
        self.shared.timestamp_ms.store(timestamp_ms, Ordering::Release);
    }

    /// Mark the producer as delivering (or no longer delivering) samples
    pub fn set_running(&self, running: bool) {
        self.shared.running.store(running, Ordering::Release);
    }
}

impl Drop for SensorPublisher {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
    }
}
