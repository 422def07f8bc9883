// CalibrationMap - in-memory calibration references used by the classifier
//
// Holds the ambient baseline and at most one reference vector per position.
// Entries are independent: any subset may be present and partial
// calibration is a valid state.

use crate::types::{Position, Vector3};

/// Ambient baseline plus per-position reference vectors
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationMap {
    /// Ambient field; stored apart from the position references
    ambient: Option<Vector3>,
    /// Indexed by `Position::index()`; the `Ambiente` slot is never used
    refs: [Option<Vector3>; 7],
}

impl CalibrationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reference; `Ambiente` sets the ambient baseline
    pub fn insert(&mut self, position: Position, reference: Vector3) {
        match position {
            Position::Ambiente => self.ambient = Some(reference),
            pos => self.refs[pos.index()] = Some(reference),
        }
    }

    /// Stored reference; `Ambiente` returns the ambient baseline
    pub fn get(&self, position: Position) -> Option<Vector3> {
        match position {
            Position::Ambiente => self.ambient,
            pos => self.refs[pos.index()],
        }
    }

    pub fn has(&self, position: Position) -> bool {
        self.get(position).is_some()
    }

    /// Ambient baseline, zero when never calibrated
    pub fn ambient(&self) -> Vector3 {
        self.ambient.unwrap_or(Vector3::ZERO)
    }

    /// Whether any position reference (`Centro` included) exists
    ///
    /// Any such reference selects the calibrated classification path. The
    /// ambient baseline alone leaves the fallback heuristic active.
    pub fn has_position_refs(&self) -> bool {
        Position::ALL
            .iter()
            .any(|pos| *pos != Position::Ambiente && self.has(*pos))
    }

    /// Baseline all deltas are measured from: `Centro` if calibrated, else ambient
    pub fn base_reference(&self) -> Vector3 {
        self.get(Position::Centro).unwrap_or_else(|| self.ambient())
    }

    /// Number of stored entries, ambient included
    pub fn len(&self) -> usize {
        Position::ALL.iter().filter(|pos| self.has(**pos)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Stored entries in `Position::ALL` order
    pub fn iter(&self) -> impl Iterator<Item = (Position, Vector3)> + '_ {
        Position::ALL
            .into_iter()
            .filter_map(move |pos| self.get(pos).map(|v| (pos, v)))
    }
}
