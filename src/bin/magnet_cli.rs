use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use magnet_gesture_core::calibration::{CalibrationStore, JsonFileStore, MemoryStore};
use magnet_gesture_core::engine::{GestureEngine, ManualTimeSource, TimeSource};
use magnet_gesture_core::fixtures::{ExpectationDiff, RecordingCatalog, RecordingProcessor};
use magnet_gesture_core::{AppConfig, AtomicSensor, GestureEvent, Position, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Resting field used by `simulate`, already close to the uncalibrated zero baseline
const SIMULATED_AMBIENT: Vector3 = Vector3::new(2.0, -1.5, 3.0);

#[derive(Parser, Debug)]
#[command(
    name = "magnet_cli",
    about = "Deterministic replay and simulation harness for the magnet gesture core"
)]
struct Cli {
    /// Override directory containing recordings (defaults to ./fixtures)
    #[arg(long, global = true)]
    recordings_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recording and optionally compare against expectations
    Replay {
        #[arg(long)]
        recording: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Config JSON (`$MAGNET_GESTURE_CONFIG` or the bundled asset when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seed the replay with references from a calibration store file
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Feed a synthetic gesture through the engine and print emitted events
    Simulate {
        #[arg(long, default_value = "Derecha")]
        gesture: Position,
        #[arg(long, default_value_t = 30)]
        ticks: u32,
        #[arg(long, default_value_t = 50)]
        tick_ms: u64,
        /// Uniform noise amplitude added to every axis
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Inspect or wipe a persisted calibration store
    Calibration {
        #[command(subcommand)]
        action: CalibrationAction,
    },
    /// List available recordings on disk
    List,
}

#[derive(Subcommand, Debug)]
enum CalibrationAction {
    /// Print stored references as JSON
    Show {
        #[arg(long)]
        store: PathBuf,
    },
    /// Remove every stored reference
    Clear {
        #[arg(long)]
        store: PathBuf,
    },
}

fn main() -> ExitCode {
    magnet_gesture_core::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .recordings_dir
        .map(RecordingCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Replay {
            recording,
            expect,
            output,
            config,
            store,
        } => run_replay(&catalog, &recording, expect, output, config, store),
        Commands::Simulate {
            gesture,
            ticks,
            tick_ms,
            noise,
            seed,
        } => run_simulate(gesture, ticks, tick_ms, noise, seed),
        Commands::Calibration { action } => run_calibration(action),
        Commands::List => run_list(&catalog),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::try_load_from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AppConfig::load()),
    }
}

fn run_replay(
    catalog: &RecordingCatalog,
    recording: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    store_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path.as_deref())?;
    let mut processor = RecordingProcessor::new(config);
    if let Some(path) = store_path {
        let store = CalibrationStore::new(Box::new(JsonFileStore::open(&path)));
        processor = processor.with_calibration(store.map().clone());
    }

    let data = catalog.load(recording, override_expect)?;
    let actual = processor
        .run(&data)
        .with_context(|| format!("replaying recording {}", recording))?;

    emit_report(&data.metadata.name, data.duration_ms(), &actual, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&actual) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

/// Field produced by holding the magnet at `gesture`
fn gesture_field(gesture: Position) -> Vector3 {
    let offset = match gesture {
        Position::Derecha => Vector3::new(30.0, 0.0, 0.0),
        Position::Izquierda => Vector3::new(-30.0, 0.0, 0.0),
        Position::Arriba => Vector3::new(0.0, 30.0, 0.0),
        Position::Abajo => Vector3::new(0.0, -30.0, 0.0),
        Position::Acercar => Vector3::new(0.0, 0.0, 50.0),
        Position::Centro | Position::Ambiente => Vector3::ZERO,
    };
    SIMULATED_AMBIENT + offset
}

fn run_simulate(
    gesture: Position,
    ticks: u32,
    tick_ms: u64,
    noise: f32,
    seed: u64,
) -> Result<ExitCode> {
    let clock = Arc::new(ManualTimeSource::new());
    let mut engine = GestureEngine::with_time_source(
        AppConfig::load(),
        Box::new(MemoryStore::new()),
        Arc::clone(&clock) as Arc<dyn TimeSource>,
    );
    let (sensor, publisher) = AtomicSensor::new();
    engine.bind_sensor(Arc::new(sensor));

    // Driver thread publishes one sample per request so the replay stays deterministic
    let (request_tx, request_rx) = mpsc::channel::<u32>();
    let (ack_tx, ack_rx) = mpsc::channel::<()>();
    let rest_ticks = ticks / 3;
    let noise = noise.abs();
    let producer = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(seed);
        publisher.set_running(true);
        for tick in request_rx {
            let field = if tick < rest_ticks {
                SIMULATED_AMBIENT
            } else {
                gesture_field(gesture)
            };
            let jitter = if noise > 0.0 {
                Vector3::new(
                    rng.gen_range(-noise..=noise),
                    rng.gen_range(-noise..=noise),
                    rng.gen_range(-noise..=noise),
                )
            } else {
                Vector3::ZERO
            };
            publisher.publish_at(field + jitter, u64::from(tick) * tick_ms);
            if ack_tx.send(()).is_err() {
                break;
            }
        }
    });

    let mut events = Vec::new();
    for tick in 0..ticks {
        request_tx.send(tick)?;
        ack_rx
            .recv()
            .map_err(|_| anyhow!("sensor thread exited early"))?;
        clock.set_offset(Duration::from_millis(u64::from(tick) * tick_ms));
        if let Some(event) = engine.tick().emitted() {
            println!("{}", serde_json::to_string(&event)?);
            events.push(event);
        }
    }
    drop(request_tx);
    producer
        .join()
        .map_err(|_| anyhow!("sensor thread panicked"))?;

    eprintln!(
        "{} event(s), final position {}",
        events.len(),
        engine.current_position()
    );
    Ok(ExitCode::from(0))
}

fn run_calibration(action: CalibrationAction) -> Result<ExitCode> {
    match action {
        CalibrationAction::Show { store } => {
            let store = CalibrationStore::new(Box::new(JsonFileStore::open(&store)));
            let json = serde_json::to_string_pretty(&CalibrationReport::from_store(&store))?;
            println!("{json}");
        }
        CalibrationAction::Clear { store: path } => {
            let mut store = CalibrationStore::new(Box::new(JsonFileStore::open(&path)));
            store
                .clear_all()
                .with_context(|| format!("clearing {}", path.display()))?;
            println!("Cleared calibration in {}", path.display());
        }
    }
    Ok(ExitCode::from(0))
}

fn run_list(catalog: &RecordingCatalog) -> Result<ExitCode> {
    let recordings = catalog.discover()?;
    if recordings.is_empty() {
        println!("No recordings found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in recordings {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(
    recording: &str,
    duration_ms: u64,
    events: &[GestureEvent],
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = ReplayReportPayload {
        recording,
        duration_ms,
        event_count: events.len(),
        events,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct ReplayReportPayload<'a> {
    recording: &'a str,
    duration_ms: u64,
    event_count: usize,
    #[serde(skip_serializing_if = "slice_empty")]
    events: &'a [GestureEvent],
}

fn slice_empty(events: &&[GestureEvent]) -> bool {
    events.is_empty()
}

#[derive(Serialize)]
struct CalibrationReport {
    keys: Vec<String>,
    references: Vec<StoredReference>,
}

#[derive(Serialize)]
struct StoredReference {
    position: Position,
    reference: Vector3,
}

impl CalibrationReport {
    fn from_store(store: &CalibrationStore) -> Self {
        Self {
            keys: store.keys(),
            references: store
                .map()
                .iter()
                .map(|(position, reference)| StoredReference {
                    position,
                    reference,
                })
                .collect(),
        }
    }
}
