//! Recording utilities for the deterministic CLI harness.
//!
//! This module discovers recorded magnetometer streams, loads CSV rows,
//! parses optional expectation JSON, and replays the rows through a fresh
//! `GestureEngine` driven by a manual clock. Replays are deterministic: the
//! recorded timestamps are the only notion of time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::analysis::TickOutcome;
use crate::calibration::{CalibrationMap, MemoryStore};
use crate::config::AppConfig;
use crate::engine::{GestureEngine, ManualTimeSource, TimeSource};
use crate::sensor::AtomicSensor;
use crate::types::{GestureEvent, Position, Vector3};

/// Default location for recording CSV/JSON assets.
pub const DEFAULT_RECORDING_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Metadata describing an available recording.
#[derive(Clone, Debug)]
pub struct RecordingMetadata {
    pub name: String,
    pub csv_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// One recorded sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordingRow {
    /// Milliseconds since the start of the recording
    pub t_ms: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RecordingRow {
    pub fn vector(&self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// Loaded recording with its rows and expectations.
pub struct Recording {
    pub metadata: RecordingMetadata,
    pub rows: Vec<RecordingRow>,
    pub expectations: Option<RecordingExpectations>,
}

impl Recording {
    /// Length of the recording in milliseconds
    pub fn duration_ms(&self) -> u64 {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => last.t_ms - first.t_ms,
            _ => 0,
        }
    }
}

/// JSON expectation schema for recording verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingExpectations {
    pub recording: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub events: Vec<ExpectedEvent>,
}

impl RecordingExpectations {
    pub fn verify(&self, actual: &[GestureEvent]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for (idx, expected) in self.events.iter().enumerate() {
            match actual.get(idx) {
                Some(event) => {
                    let delta = (event.timestamp_ms as f32 - expected.offset_ms).abs();
                    if event.label != expected.label || delta > expected.tolerance_ms {
                        failures.push(ExpectationFailure {
                            index: idx,
                            expected: Some(expected.clone()),
                            actual: Some(*event),
                            delta_ms: Some(delta),
                        });
                    }
                }
                None => failures.push(ExpectationFailure {
                    index: idx,
                    expected: Some(expected.clone()),
                    actual: None,
                    delta_ms: None,
                }),
            }
        }

        for (idx, event) in actual.iter().enumerate().skip(self.events.len()) {
            failures.push(ExpectationFailure {
                index: idx,
                expected: None,
                actual: Some(*event),
                delta_ms: None,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Expected gesture event definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedEvent {
    pub label: Position,
    pub offset_ms: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f32,
}

fn default_tolerance() -> f32 {
    50.0
}

/// Outcome of comparing actual events with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual": failure.actual,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
///
/// `expected` is `None` for an unexpected extra event.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: Option<ExpectedEvent>,
    pub actual: Option<GestureEvent>,
    pub delta_ms: Option<f32>,
}

/// Catalog responsible for discovering recordings on disk.
pub struct RecordingCatalog {
    root: PathBuf,
}

impl RecordingCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all recordings by their metadata.
    pub fn discover(&self) -> Result<Vec<RecordingMetadata>> {
        let mut recordings = Vec::new();
        if !self.root.exists() {
            return Ok(recordings);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("csv") {
                    recordings.push(self.metadata_for_path(&path)?);
                }
            }
        }

        recordings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recordings)
    }

    /// Load rows + expectations for provided name or path.
    pub fn load(&self, recording: &str, override_expect: Option<PathBuf>) -> Result<Recording> {
        let csv_path = self.resolve_recording_path(recording)?;
        let metadata = self.metadata_for_path(&csv_path)?;
        let rows = read_rows(&csv_path)?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(Recording {
            metadata,
            rows,
            expectations,
        })
    }

    fn resolve_recording_path(&self, recording: &str) -> Result<PathBuf> {
        let as_path = Path::new(recording);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{recording}.csv"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Recording '{recording}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, csv_path: &Path) -> Result<RecordingMetadata> {
        let name = csv_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid recording name for {}", csv_path.display()))?
            .to_string();
        let expect_path = csv_path.with_extension("expect.json");
        Ok(RecordingMetadata {
            name,
            csv_path: csv_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for RecordingCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_RECORDING_ROOT)
    }
}

/// Read a `t_ms,x,y,z` CSV with header; timestamps must not go backwards.
pub fn read_rows(path: &Path) -> Result<Vec<RecordingRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows: Vec<RecordingRow> = Vec::new();
    for (idx, result) in reader.deserialize().enumerate() {
        let row: RecordingRow =
            result.with_context(|| format!("row {} in {}", idx + 1, path.display()))?;
        if let Some(prev) = rows.last() {
            if row.t_ms < prev.t_ms {
                bail!(
                    "row {} in {} goes back in time ({} < {})",
                    idx + 1,
                    path.display(),
                    row.t_ms,
                    prev.t_ms
                );
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Executes recordings by feeding rows through a fresh engine, one tick per row.
pub struct RecordingProcessor {
    config: AppConfig,
    calibration: CalibrationMap,
}

impl RecordingProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            calibration: CalibrationMap::new(),
        }
    }

    /// Seed the replay engine with calibration references
    pub fn with_calibration(mut self, calibration: CalibrationMap) -> Self {
        self.calibration = calibration;
        self
    }

    /// Replay and return the emitted gesture events
    pub fn run(&self, recording: &Recording) -> Result<Vec<GestureEvent>> {
        Ok(self
            .replay(&recording.rows)?
            .into_iter()
            .filter_map(|outcome| outcome.emitted())
            .collect())
    }

    /// Replay and return every tick outcome, one per row
    pub fn replay(&self, rows: &[RecordingRow]) -> Result<Vec<TickOutcome>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };

        let mut config = self.config.clone();
        // Replays never touch persisted calibration
        config.calibration.clear_on_start = false;
        config.calibration.store_path = None;

        let clock = Arc::new(ManualTimeSource::new());
        let mut engine = GestureEngine::with_time_source(
            config,
            Box::new(MemoryStore::new()),
            Arc::clone(&clock) as Arc<dyn TimeSource>,
        );

        let calibration = engine.calibration_handle();
        for (position, reference) in self.calibration.iter() {
            calibration
                .save(position, reference)
                .map_err(|err| anyhow!("seeding calibration: {err}"))?;
        }

        let (sensor, publisher) = AtomicSensor::new();
        publisher.set_running(true);
        engine.bind_sensor(Arc::new(sensor));

        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            publisher.publish_at(row.vector(), row.t_ms);
            clock.set_offset(Duration::from_millis(row.t_ms.saturating_sub(first.t_ms)));
            outcomes.push(engine.tick());
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn swipe_rows() -> Vec<RecordingRow> {
        let mut rows = Vec::new();
        for i in 0..10u64 {
            let x = if i < 3 { 0.0 } else { 30.0 };
            rows.push(RecordingRow {
                t_ms: i * 50,
                x,
                y: 1.0,
                z: -2.0,
            });
        }
        rows
    }

    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.filter.low_pass_alpha = 1.0;
        config
    }

    #[test]
    fn test_catalog_discovers_recordings() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b_swipe.csv", "t_ms,x,y,z\n0,0,0,0\n");
        write(dir.path(), "a_rest.csv", "t_ms,x,y,z\n0,0,0,0\n");
        write(
            dir.path(),
            "a_rest.expect.json",
            r#"{"recording":"a_rest","events":[]}"#,
        );
        write(dir.path(), "notes.txt", "ignored");

        let catalog = RecordingCatalog::new(dir.path());
        let found = catalog.discover().unwrap();
        let names: Vec<_> = found.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a_rest", "b_swipe"]);
        assert!(found[0].expect_path.is_some());
        assert!(found[1].expect_path.is_none());
    }

    #[test]
    fn test_missing_root_is_empty() {
        let catalog = RecordingCatalog::new("/definitely/not/here");
        assert!(catalog.discover().unwrap().is_empty());
        assert!(catalog.load("nothing", None).is_err());
    }

    #[test]
    fn test_load_parses_rows_and_expectations() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "swipe.csv",
            "t_ms,x,y,z\n0, 1.5, -2, 40\n20,2.5,-2,40\n",
        );
        write(
            dir.path(),
            "swipe.expect.json",
            r#"{"recording":"swipe","events":[{"label":"Derecha","offset_ms":100}]}"#,
        );

        let recording = RecordingCatalog::new(dir.path()).load("swipe", None).unwrap();
        assert_eq!(recording.rows.len(), 2);
        assert_eq!(recording.rows[0].vector(), Vector3::new(1.5, -2.0, 40.0));
        assert_eq!(recording.duration_ms(), 20);
        let expectations = recording.expectations.unwrap();
        assert_eq!(expectations.events[0].label, Position::Derecha);
        assert_eq!(expectations.events[0].tolerance_ms, 50.0);
    }

    #[test]
    fn test_rows_must_be_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "t_ms,x,y,z\n10,0,0,0\n5,0,0,0\n");
        assert!(read_rows(&path).is_err());

        let path = write(dir.path(), "garbage.csv", "t_ms,x,y,z\n0,zero,0,0\n");
        assert!(read_rows(&path).is_err());
    }

    #[test]
    fn test_replay_emits_gesture_at_recorded_time() {
        let processor = RecordingProcessor::new(fast_config());
        let recording = Recording {
            metadata: RecordingMetadata {
                name: "swipe".into(),
                csv_path: PathBuf::from("swipe.csv"),
                expect_path: None,
            },
            rows: swipe_rows(),
            expectations: None,
        };

        let events = processor.run(&recording).unwrap();
        assert_eq!(events, vec![GestureEvent::new(Position::Derecha, 250)]);

        // Deterministic across runs
        assert_eq!(processor.run(&recording).unwrap(), events);
    }

    #[test]
    fn test_replay_with_calibration() {
        let mut calibration = CalibrationMap::new();
        calibration.insert(Position::Centro, Vector3::new(0.0, 1.0, -2.0));
        calibration.insert(Position::Derecha, Vector3::new(30.0, 1.0, -2.0));
        calibration.insert(Position::Izquierda, Vector3::new(-30.0, 1.0, -2.0));

        let outcomes = RecordingProcessor::new(fast_config())
            .with_calibration(calibration)
            .replay(&swipe_rows())
            .unwrap();

        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes[9].stable(), Some(Position::Derecha));
    }

    #[test]
    fn test_verify_reports_mismatches() {
        let expectations = RecordingExpectations {
            recording: "swipe".into(),
            notes: None,
            events: vec![ExpectedEvent {
                label: Position::Derecha,
                offset_ms: 250.0,
                tolerance_ms: 50.0,
            }],
        };

        assert!(expectations
            .verify(&[GestureEvent::new(Position::Derecha, 290)])
            .is_ok());

        let diff = expectations
            .verify(&[GestureEvent::new(Position::Izquierda, 250)])
            .unwrap_err();
        assert_eq!(diff.failures.len(), 1);

        let diff = expectations.verify(&[]).unwrap_err();
        assert!(diff.failures[0].actual.is_none());

        let diff = expectations
            .verify(&[
                GestureEvent::new(Position::Derecha, 250),
                GestureEvent::new(Position::Centro, 600),
            ])
            .unwrap_err();
        assert_eq!(diff.failures[0].index, 1);
        assert!(diff.failures[0].expected.is_none());
        assert!(diff.to_json()["failures"].is_array());
    }
}
