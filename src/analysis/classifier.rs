// Classifier - calibration-relative nearest match with a heuristic fallback
//
// Every tick the smoothed sample is compared against the baseline
// (Centro reference if calibrated, otherwise the ambient field).
//
// Calibrated path (any position reference stored, Centro included):
//   for each candidate in Position::CANDIDATE_ORDER with a usable reference
//     refDelta = ref - base, refMag = |refDelta|        (refMag < 1e-3 skipped)
//     absDist  = |delta - refDelta|
//     score    = absDist + |1 - |delta|/refMag| * refMag * 0.5
//   best = lowest score, first candidate wins ties
//   accept best iff (|delta| >= refMag * ratio && absDist <= max(absTol, refMag/2))
//                   || absDist <= absTol
//   otherwise Centro
//
// Fallback path (no position reference, ambient alone at most):
//   deltaWindow = ema - oldest sample in the window
//   dominant X movement -> Derecha/Izquierda, dominant Y -> Arriba/Abajo,
//   large distance from baseline -> Acercar, otherwise Centro
//
// The classifier keeps no state between ticks.

use crate::calibration::state::CalibrationMap;
use crate::config::ClassifierConfig;
use crate::types::{Position, Vector3};

/// References shorter than this are degenerate and skipped for the tick
pub const MIN_REFERENCE_MAGNITUDE: f32 = 1e-3;

/// Which branch produced a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassificationPath {
    /// Nearest match against stored references
    Calibrated,
    /// Axis-delta heuristic over the sample window
    Heuristic,
}

/// Score details for the best calibrated candidate
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateScore {
    pub position: Position,
    pub score: f32,
    pub abs_dist: f32,
    pub ref_magnitude: f32,
    pub accepted: bool,
}

/// Result of classifying one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Raw detected position for this tick (never `Ambiente`)
    pub position: Position,
    pub path: ClassificationPath,
    /// Best calibrated candidate, if any reference was usable
    pub best: Option<CandidateScore>,
}

/// Stateless per-tick classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a smoothed sample
    ///
    /// # Arguments
    /// * `ema` - Smoothed sample for this tick
    /// * `oldest` - Oldest sample in the fallback window (`None` treated as `ema`)
    /// * `calibration` - Current ambient baseline and position references
    pub fn classify(
        &self,
        ema: Vector3,
        oldest: Option<Vector3>,
        calibration: &CalibrationMap,
    ) -> Detection {
        let base = calibration.base_reference();
        let delta = ema - base;

        if calibration.has_position_refs() {
            self.classify_calibrated(delta, base, calibration)
        } else {
            let window_delta = ema - oldest.unwrap_or(ema);
            Detection {
                position: self.classify_heuristic(delta, window_delta),
                path: ClassificationPath::Heuristic,
                best: None,
            }
        }
    }

    fn classify_calibrated(
        &self,
        delta: Vector3,
        base: Vector3,
        calibration: &CalibrationMap,
    ) -> Detection {
        let delta_mag = delta.magnitude();
        let mut best: Option<CandidateScore> = None;

        for position in Position::CANDIDATE_ORDER {
            let Some(reference) = calibration.get(position) else {
                continue;
            };
            let ref_delta = reference - base;
            let ref_magnitude = ref_delta.magnitude();
            if ref_magnitude < MIN_REFERENCE_MAGNITUDE {
                log::trace!("Skipping degenerate {} reference", position);
                continue;
            }

            let abs_dist = (delta - ref_delta).magnitude();
            let rel_ratio = delta_mag / ref_magnitude;
            let score = abs_dist + (1.0 - rel_ratio).abs() * ref_magnitude * 0.5;

            // Strict comparison keeps the earlier candidate on ties
            if best.map_or(true, |b| score < b.score) {
                best = Some(CandidateScore {
                    position,
                    score,
                    abs_dist,
                    ref_magnitude,
                    accepted: false,
                });
            }
        }

        let best = best.map(|mut candidate| {
            candidate.accepted = self.accepts(delta_mag, &candidate);
            candidate
        });

        let position = match best {
            Some(candidate) if candidate.accepted => candidate.position,
            _ => Position::Centro,
        };

        Detection {
            position,
            path: ClassificationPath::Calibrated,
            best,
        }
    }

    fn accepts(&self, delta_mag: f32, candidate: &CandidateScore) -> bool {
        let abs_tolerance = self.config.calibrated_abs_tolerance;
        let magnitude_ok =
            delta_mag >= candidate.ref_magnitude * self.config.calibrated_magnitude_ratio;
        let near_enough = candidate.abs_dist <= abs_tolerance.max(candidate.ref_magnitude * 0.5);

        (magnitude_ok && near_enough) || candidate.abs_dist <= abs_tolerance
    }

    fn classify_heuristic(&self, delta_from_base: Vector3, window_delta: Vector3) -> Position {
        let cfg = &self.config;
        let dx = window_delta.x;
        let dy = window_delta.y;

        if dx.abs() >= cfg.dir_threshold && dy.abs() <= cfg.cross_tolerance {
            if dx > 0.0 {
                Position::Derecha
            } else {
                Position::Izquierda
            }
        } else if dy.abs() >= cfg.dir_threshold && dx.abs() <= cfg.cross_tolerance {
            if dy > 0.0 {
                Position::Arriba
            } else {
                Position::Abajo
            }
        } else if delta_from_base.magnitude() >= cfg.approach_threshold {
            Position::Acercar
        } else {
            Position::Centro
        }
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
