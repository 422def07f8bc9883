//! GestureEngine: composition root for the magnetometer gesture core.
//!
//! Owns the per-tick pipeline, the calibration manager, the event channels
//! and the bound sensor. The host drives it by calling `tick()` once per
//! frame (or fixed-rate clock); nothing inside spawns threads or blocks.

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::{GesturePipeline, TickOutcome};
use crate::calibration::{
    CalibrationMap, CalibrationProgress, CalibrationStore, JsonFileStore, KeyValueStore,
    MemoryStore, SessionStatus,
};
use crate::config::AppConfig;
use crate::engine::clock::{SystemTimeSource, TimeSource};
use crate::error::{log_calibration_error, log_sensor_error, CalibrationError, SensorError};
use crate::managers::{BroadcastChannelManager, CalibrationManager, Subscription};
use crate::sensor::SensorSource;
use crate::types::{CalibrationEvent, GestureEvent, Position, Vector3};

/// GestureEngine wires sensor, pipeline, calibration and event channels.
pub struct GestureEngine {
    config: AppConfig,
    pipeline: GesturePipeline,
    calibration: CalibrationManager,
    pub(crate) broadcasts: BroadcastChannelManager,
    sensor: Option<Arc<dyn SensorSource>>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
    missing_sensor_reported: bool,
    stopped_sensor_reported: bool,
}

impl GestureEngine {
    /// Create an engine using the store configured in `config.calibration`.
    ///
    /// A `store_path` selects a JSON file store; otherwise references live in
    /// memory for the lifetime of the engine.
    pub fn new(config: AppConfig) -> Self {
        let backend: Box<dyn KeyValueStore> = match &config.calibration.store_path {
            Some(path) => Box::new(JsonFileStore::open(path)),
            None => Box::new(MemoryStore::new()),
        };
        Self::with_store(config, backend)
    }

    /// Create an engine over an explicit persistence backend.
    pub fn with_store(config: AppConfig, backend: Box<dyn KeyValueStore>) -> Self {
        Self::with_time_source(config, backend, Arc::new(SystemTimeSource::default()))
    }

    /// Create an engine with an injected clock (replays, tests).
    pub fn with_time_source(
        config: AppConfig,
        backend: Box<dyn KeyValueStore>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        let store = CalibrationStore::new(backend);
        let calibration =
            CalibrationManager::new(store, config.calibration.sample_duration());

        if config.calibration.clear_on_start {
            if let Err(err) = calibration.clear_all() {
                log_calibration_error(&err, "engine_startup");
            }
        } else if let Ok(map) = calibration.snapshot() {
            tracing::info!(
                stored = map.len(),
                has_ambient = map.has(Position::Ambiente),
                "Loaded persisted calibration"
            );
        }

        let start_instant = time_source.now();

        Self {
            pipeline: GesturePipeline::new(&config),
            config,
            calibration,
            broadcasts: BroadcastChannelManager::new(),
            sensor: None,
            time_source,
            start_instant,
            missing_sensor_reported: false,
            stopped_sensor_reported: false,
        }
    }

    // ========================================================================
    // SENSOR BINDING
    // ========================================================================

    pub fn bind_sensor(&mut self, sensor: Arc<dyn SensorSource>) {
        tracing::info!(running = sensor.is_running(), "Sensor bound");
        self.sensor = Some(sensor);
        self.missing_sensor_reported = false;
        self.stopped_sensor_reported = false;
    }

    pub fn unbind_sensor(&mut self) -> Option<Arc<dyn SensorSource>> {
        let sensor = self.sensor.take();
        if sensor.is_some() {
            tracing::info!("Sensor unbound");
        }
        sensor
    }

    pub fn sensor_running(&self) -> bool {
        self.sensor
            .as_ref()
            .map(|sensor| sensor.is_running())
            .unwrap_or(false)
    }

    // ========================================================================
    // TICK LOOP
    // ========================================================================

    /// Run one tick at the time source's current instant.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.time_source.now();
        self.tick_at(now)
    }

    /// Run one tick at `now`.
    ///
    /// Without a bound sensor the tick is a no-op. Otherwise the latest
    /// reading goes through the pipeline, any active calibration session is
    /// advanced, and resulting events are published.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let Some(sensor) = self.sensor.as_ref() else {
            if !self.missing_sensor_reported {
                log_sensor_error(&SensorError::MissingSensor, "tick");
                self.missing_sensor_reported = true;
            }
            return TickOutcome::NoSensor;
        };

        if sensor.is_running() {
            self.stopped_sensor_reported = false;
        } else if !self.stopped_sensor_reported {
            tracing::debug!("{}", SensorError::NotRunning);
            self.stopped_sensor_reported = true;
        }

        let raw = sensor.read();
        let reading = if raw.is_finite() {
            Some(raw)
        } else {
            tracing::debug!(%raw, "{}", SensorError::NonFiniteSample);
            None
        };

        let pipeline = &mut self.pipeline;
        let step = match self
            .calibration
            .with_map(|map| pipeline.process(raw, map, now))
        {
            Ok(step) => step,
            Err(err) => {
                log_calibration_error(&err, "tick_classify");
                pipeline.process(raw, &CalibrationMap::new(), now)
            }
        };

        let emitted = step
            .and_then(|step| step.emitted)
            .map(|label| self.publish_gesture(label, now));

        let calibration = match self.calibration.tick(reading, now) {
            Ok(status) => status,
            Err(err) => {
                log_calibration_error(&err, "tick_calibration");
                None
            }
        };
        if let Some(SessionStatus::Completed {
            target, reference, ..
        }) = calibration
        {
            self.publish_calibration(target, reference, now);
        }

        TickOutcome::Processed {
            detected: step.map(|step| step.detection.position),
            stable: self.pipeline.current_position(),
            emitted,
            calibration,
        }
    }

    fn elapsed_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.start_instant).as_millis() as u64
    }

    fn publish_gesture(&self, label: Position, now: Instant) -> GestureEvent {
        let event = GestureEvent::new(label, self.elapsed_ms(now));
        let receivers = self.broadcasts.publish_gesture(event);
        tracing::info!(
            gesture = %label,
            timestamp_ms = event.timestamp_ms,
            receivers,
            "Gesture detected"
        );
        event
    }

    fn publish_calibration(&self, label: Position, reference: Vector3, now: Instant) {
        let event = CalibrationEvent {
            label,
            reference,
            timestamp_ms: self.elapsed_ms(now),
        };
        let receivers = self.broadcasts.publish_calibration(event);
        tracing::info!(
            position = %label,
            %reference,
            receivers,
            "Calibration complete"
        );
    }

    // ========================================================================
    // CALIBRATION COMMANDS
    // ========================================================================

    /// Start sampling the ambient field.
    ///
    /// Refused while no sensor is bound, since the session could never advance.
    pub fn calibrate_ambient(&self) -> Result<CalibrationProgress, CalibrationError> {
        self.require_sensor(Position::Ambiente, "calibrate_ambient")?;
        self.calibration
            .start(Position::Ambiente, self.time_source.now())
    }

    /// Start sampling the reference for `position`.
    ///
    /// `Ambiente` is rejected; use [`GestureEngine::calibrate_ambient`].
    pub fn calibrate_position(
        &self,
        position: Position,
    ) -> Result<CalibrationProgress, CalibrationError> {
        if position == Position::Ambiente {
            let err = CalibrationError::InvalidTarget { target: position };
            log_calibration_error(&err, "calibrate_position");
            return Err(err);
        }
        self.require_sensor(position, "calibrate_position")?;
        self.calibration.start(position, self.time_source.now())
    }

    fn require_sensor(&self, target: Position, context: &str) -> Result<(), CalibrationError> {
        if self.sensor.is_some() {
            return Ok(());
        }
        log_sensor_error(&SensorError::MissingSensor, context);
        Err(CalibrationError::SensorUnavailable { target })
    }

    /// Discard the active session without writing.
    pub fn cancel_calibration(&self) -> Result<Position, CalibrationError> {
        self.calibration.cancel()
    }

    /// Remove every reference and the ambient baseline.
    ///
    /// Also returns the stable and last emitted positions to `Centro`.
    pub fn clear_all_calibrations(&mut self) -> Result<(), CalibrationError> {
        self.calibration.clear_all()?;
        self.pipeline.reset_position();
        Ok(())
    }

    /// Cloneable handle for issuing calibration commands from another thread.
    pub fn calibration_handle(&self) -> CalibrationManager {
        self.calibration.clone()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn current_position(&self) -> Position {
        self.pipeline.current_position()
    }

    /// Ambient baseline (zero when never calibrated).
    pub fn ambient(&self) -> Vector3 {
        self.calibration
            .with_map(CalibrationMap::ambient)
            .unwrap_or(Vector3::ZERO)
    }

    pub fn has_ambient(&self) -> bool {
        self.has_calibration(Position::Ambiente)
    }

    pub fn has_calibration(&self, position: Position) -> bool {
        self.position_ref(position).is_some()
    }

    /// Stored reference for `position` (`Ambiente` returns the baseline).
    pub fn position_ref(&self, position: Position) -> Option<Vector3> {
        self.calibration
            .with_map(|map| map.get(position))
            .ok()
            .flatten()
    }

    pub fn calibration_snapshot(&self) -> CalibrationMap {
        self.calibration.snapshot().unwrap_or_default()
    }

    pub fn calibration_progress(&self) -> Option<CalibrationProgress> {
        self.calibration.progress()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_calibrating()
    }

    /// Latest smoothed sample.
    pub fn smoothed(&self) -> Option<Vector3> {
        self.pipeline.smoothed()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Milliseconds since the engine was created, per its time source.
    pub fn uptime_ms(&self) -> u64 {
        self.elapsed_ms(self.time_source.now())
    }

    // ========================================================================
    // EVENT SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_gestures(&self) -> Subscription<GestureEvent> {
        self.broadcasts.subscribe_gestures()
    }

    pub fn subscribe_calibration(&self) -> Subscription<CalibrationEvent> {
        self.broadcasts.subscribe_calibration()
    }
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl std::fmt::Debug for GestureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureEngine")
            .field("current_position", &self.current_position())
            .field("sensor_bound", &self.sensor.is_some())
            .field("calibration", &self.calibration)
            .finish_non_exhaustive()
    }
}

// ========================================================================
// TEST HELPERS
// ========================================================================
