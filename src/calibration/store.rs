// Calibration persistence - key-value backends and the calibration store
//
// Layout inside the backend:
//   "cal_ambient"          -> "x,y,z"
//   "cal_pos_<Position>"   -> "x,y,z"
//
// Values are written with Rust's float formatting, which always uses '.'
// as the decimal point, and parsed with `str::parse::<f32>`, which accepts
// only '.'. A value that does not parse into three finite components is
// treated as absent.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::state::CalibrationMap;
use crate::error::CalibrationError;
use crate::types::{Position, Vector3};

pub const AMBIENT_KEY: &str = "cal_ambient";
pub const POSITION_KEY_PREFIX: &str = "cal_pos_";

/// Minimal string key-value persistence
///
/// Writes are synchronous and independent per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), CalibrationError>;
    fn remove(&mut self, key: &str) -> Result<(), CalibrationError>;
    fn keys(&self) -> Vec<String>;
}

/// Volatile backend used when no store path is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CalibrationError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), CalibrationError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Flat JSON object on disk, rewritten on every change
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`
    ///
    /// A missing file starts empty. An unreadable or corrupt file also starts
    /// empty with a warning; it is overwritten on the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!(
                        "[CalibrationStore] Ignoring corrupt store {:?}: {}",
                        path,
                        err
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                log::warn!("[CalibrationStore] Cannot read {:?}: {}", path, err);
                BTreeMap::new()
            }
        };

        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CalibrationError> {
        let persistence = |reason: String| CalibrationError::Persistence { reason };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| persistence(err.to_string()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| persistence(err.to_string()))?;
        fs::write(&self.path, json).map_err(|err| persistence(err.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), CalibrationError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), CalibrationError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Backend key for a position
pub fn storage_key(position: Position) -> String {
    match position {
        Position::Ambiente => AMBIENT_KEY.to_string(),
        pos => format!("{}{}", POSITION_KEY_PREFIX, pos.label()),
    }
}

/// `"x,y,z"` with '.' decimal point
pub fn encode_vector(v: Vector3) -> String {
    format!("{},{},{}", v.x, v.y, v.z)
}

/// Parse `"x,y,z"`; `None` unless exactly three finite components
pub fn decode_vector(value: &str) -> Option<Vector3> {
    let mut parts = value.split(',').map(|part| part.trim().parse::<f32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }

    let v = Vector3::new(x, y, z);
    v.is_finite().then_some(v)
}

/// Persists calibration references and mirrors them in a [`CalibrationMap`]
///
/// Every operation is per key; partially calibrated stores are expected.
pub struct CalibrationStore {
    backend: Box<dyn KeyValueStore>,
    map: CalibrationMap,
}

impl CalibrationStore {
    /// Wrap a backend and load whatever it already holds
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        let mut store = Self {
            backend,
            map: CalibrationMap::new(),
        };
        store.reload();
        store
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Persist `reference`, replacing any prior value for `position`
    ///
    /// The in-memory map is updated even if the backend write fails, so the
    /// running engine uses the new reference either way.
    pub fn save(&mut self, position: Position, reference: Vector3) -> Result<(), CalibrationError> {
        self.map.insert(position, reference);
        self.backend
            .set(&storage_key(position), &encode_vector(reference))
    }

    /// Read a reference from the backend; malformed values are absent
    pub fn load(&self, position: Position) -> Option<Vector3> {
        let key = storage_key(position);
        let raw = self.backend.get(&key)?;
        let decoded = decode_vector(&raw);
        if decoded.is_none() {
            log::warn!(
                "[CalibrationStore] Malformed value for {}: {:?}, treating as absent",
                key,
                raw
            );
        }
        decoded
    }

    pub fn has(&self, position: Position) -> bool {
        self.load(position).is_some()
    }

    /// Remove the ambient baseline and every position reference
    pub fn clear_all(&mut self) -> Result<(), CalibrationError> {
        self.map.clear();
        let mut result = Ok(());
        for position in Position::ALL {
            if let Err(err) = self.backend.remove(&storage_key(position)) {
                result = Err(err);
            }
        }
        result
    }

    /// Rebuild the cached map from the backend
    pub fn reload(&mut self) {
        let mut map = CalibrationMap::new();
        for position in Position::ALL {
            if let Some(reference) = self.load(position) {
                map.insert(position, reference);
            }
        }
        self.map = map;
    }

    /// Cached references used by the classifier every tick
    pub fn map(&self) -> &CalibrationMap {
        &self.map
    }

    /// Raw backend keys, for diagnostics
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys()
    }
}

impl std::fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}
