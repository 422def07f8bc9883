// Analysis module - per-tick gesture pipeline
//
// This module owns every stage that turns a raw magnetometer reading into
// a gesture event. All state is owned by the tick loop and updated
// synchronously; nothing here locks or blocks.
//
// Pipeline:
//   raw -> LowPassFilter -> SampleWindow -> Classifier -> StabilityFilter -> EventEmitter
//
// The classifier reads the calibration map passed in by the caller, so
// calibration changes take effect on the very next tick.

use std::time::Instant;

use crate::calibration::session::SessionStatus;
use crate::calibration::state::CalibrationMap;
use crate::config::AppConfig;
use crate::types::{GestureEvent, Position, Vector3};

pub mod classifier;
pub mod emitter;
pub mod filter;
pub mod stability;

use classifier::{Classifier, Detection};
use emitter::EventEmitter;
use filter::{LowPassFilter, SampleWindow};
use stability::StabilityFilter;

/// Result of running one sample through the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineStep {
    /// Smoothed sample used for classification
    pub ema: Vector3,
    /// Raw per-tick classification
    pub detection: Detection,
    /// Debounced position after this tick
    pub stable: Position,
    /// Position to announce, if the emitter fired
    pub emitted: Option<Position>,
}

/// What one engine tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No sensor bound; nothing was read or updated
    NoSensor,
    /// Sample processed (classification may be skipped on a bad first reading)
    Processed {
        detected: Option<Position>,
        stable: Position,
        emitted: Option<GestureEvent>,
        calibration: Option<SessionStatus>,
    },
}

impl TickOutcome {
    pub fn emitted(&self) -> Option<GestureEvent> {
        match self {
            TickOutcome::Processed { emitted, .. } => *emitted,
            TickOutcome::NoSensor => None,
        }
    }

    pub fn stable(&self) -> Option<Position> {
        match self {
            TickOutcome::Processed { stable, .. } => Some(*stable),
            TickOutcome::NoSensor => None,
        }
    }
}

/// Filter, classifier, debounce and emitter wired in tick order
#[derive(Debug, Clone)]
pub struct GesturePipeline {
    filter: LowPassFilter,
    window: SampleWindow,
    classifier: Classifier,
    stability: StabilityFilter,
    emitter: EventEmitter,
}

impl GesturePipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            filter: LowPassFilter::new(config.filter.low_pass_alpha),
            window: SampleWindow::new(config.filter.sample_window),
            classifier: Classifier::new(config.classifier.clone()),
            stability: StabilityFilter::new(&config.stability),
            emitter: EventEmitter::new(config.emitter.cooldown()),
        }
    }

    /// Run one raw reading through every stage
    ///
    /// A non-finite reading is dropped and the previous smoothed value is
    /// reused. Returns `None` only when no finite reading has been seen yet.
    pub fn process(
        &mut self,
        raw: Vector3,
        calibration: &CalibrationMap,
        now: Instant,
    ) -> Option<PipelineStep> {
        let ema = if raw.is_finite() {
            self.filter.update(raw)
        } else {
            log::debug!("[Pipeline] Dropping non-finite reading {}", raw);
            self.filter.value()?
        };

        self.window.push(ema);
        let detection = self
            .classifier
            .classify(ema, self.window.oldest(), calibration);
        let stable = self.stability.update(detection.position);
        let emitted = self.emitter.update(stable, now);

        Some(PipelineStep {
            ema,
            detection,
            stable,
            emitted,
        })
    }

    /// Stable position after the last tick
    pub fn current_position(&self) -> Position {
        self.stability.current()
    }

    /// Latest smoothed sample
    pub fn smoothed(&self) -> Option<Vector3> {
        self.filter.value()
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn stability(&self) -> &StabilityFilter {
        &self.stability
    }

    /// Return the stable and last emitted positions to `Centro`
    ///
    /// Debounce counters, the emitter cooldown and the smoothed signal are kept.
    pub fn reset_position(&mut self) {
        self.stability.reset_current();
        self.emitter.reset();
    }

    /// Reset every stage, including counters, the filter and the window
    pub fn reset(&mut self) {
        self.filter.reset();
        self.window.clear();
        self.stability.reset();
        self.emitter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.filter.low_pass_alpha = 1.0;
        config
    }

    #[test]
    fn test_uncalibrated_swipe_emits_once() {
        let mut pipeline = GesturePipeline::new(&fast_config());
        let map = CalibrationMap::new();
        let t0 = Instant::now();

        let step = pipeline.process(Vector3::ZERO, &map, t0).unwrap();
        assert_eq!(step.detection.position, Position::Centro);
        assert_eq!(step.emitted, None);

        let mut events = Vec::new();
        for i in 1..=5 {
            let now = t0 + Duration::from_millis(i * 20);
            let step = pipeline
                .process(Vector3::new(25.0, 0.0, 0.0), &map, now)
                .unwrap();
            if let Some(pos) = step.emitted {
                events.push(pos);
            }
        }

        assert_eq!(events, vec![Position::Derecha]);
        assert_eq!(pipeline.current_position(), Position::Derecha);
    }

    #[test]
    fn test_non_finite_reading_reuses_previous_ema() {
        let mut pipeline = GesturePipeline::new(&AppConfig::default());
        let map = CalibrationMap::new();
        let now = Instant::now();

        assert!(pipeline
            .process(Vector3::new(f32::NAN, 0.0, 0.0), &map, now)
            .is_none());

        pipeline.process(Vector3::new(4.0, 5.0, 6.0), &map, now);
        let step = pipeline
            .process(Vector3::new(f32::INFINITY, 0.0, 0.0), &map, now)
            .unwrap();
        assert_eq!(step.ema, Vector3::new(4.0, 5.0, 6.0));
        assert!(pipeline.smoothed().unwrap().is_finite());
    }

    #[test]
    fn test_reset_position_keeps_filter() {
        let mut pipeline = GesturePipeline::new(&fast_config());
        let map = CalibrationMap::new();
        let now = Instant::now();

        pipeline.process(Vector3::new(0.0, 0.0, 50.0), &map, now);
        for _ in 0..3 {
            pipeline.process(Vector3::new(0.0, 0.0, 50.0), &map, now);
        }
        assert_eq!(pipeline.current_position(), Position::Acercar);

        pipeline.reset_position();
        assert_eq!(pipeline.current_position(), Position::Centro);
        assert_eq!(pipeline.smoothed(), Some(Vector3::new(0.0, 0.0, 50.0)));
        assert_eq!(pipeline.stability().counters(Position::Acercar).enter, 3);

        pipeline.reset();
        assert_eq!(pipeline.smoothed(), None);
    }
}
