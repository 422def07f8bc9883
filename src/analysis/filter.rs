// Smoothing stage - exponential low-pass filter and bounded sample window
//
// The filter has no warm-up lag: the first sample passes through unchanged.
// The window keeps the last N smoothed samples so the uncalibrated fallback
// heuristic can measure movement against the oldest one.

use std::collections::VecDeque;

use crate::types::Vector3;

/// Exponential moving average over 3-axis samples
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    alpha: f32,
    ema: Option<Vector3>,
}

impl LowPassFilter {
    /// `alpha` is clamped to [0, 1] on every update
    pub fn new(alpha: f32) -> Self {
        Self { alpha, ema: None }
    }

    /// Feed a raw sample and return the smoothed value
    pub fn update(&mut self, raw: Vector3) -> Vector3 {
        let next = match self.ema {
            None => raw,
            Some(ema) => ema.lerp(raw, self.alpha.clamp(0.0, 1.0)),
        };
        self.ema = Some(next);
        next
    }

    /// Current smoothed value, `None` before the first sample
    pub fn value(&self) -> Option<Vector3> {
        self.ema
    }

    pub fn reset(&mut self) {
        self.ema = None;
    }
}

/// Fixed-capacity FIFO of smoothed samples
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Vector3>,
    capacity: usize,
}

impl SampleWindow {
    /// Capacity below 1 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append, evicting the oldest sample once over capacity
    pub fn push(&mut self, sample: Vector3) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn oldest(&self) -> Option<Vector3> {
        self.samples.front().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
