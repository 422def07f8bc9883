// StabilityFilter - debounces raw detections into a stable position
//
// Each tick the detected position gains one enter count (capped at
// enter_frames) and every other position gains one exit count (capped at
// exit_frames) while losing its enter count. The stable position is the
// first one in Position::STABILITY_ORDER whose enter counter has reached
// enter_frames, or Centro when none has.
//
// Exit counters are maintained for inspection only; they do not take part
// in the transition decision.

use crate::config::StabilityConfig;
use crate::types::Position;

/// Per-position debounce counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub enter: u32,
    pub exit: u32,
}

#[derive(Debug, Clone)]
pub struct StabilityFilter {
    enter_frames: u32,
    exit_frames: u32,
    /// Indexed by `Position::index()`
    counters: [Counters; 7],
    current: Position,
}

impl StabilityFilter {
    pub fn new(config: &StabilityConfig) -> Self {
        Self {
            enter_frames: config.enter_frames,
            exit_frames: config.exit_frames,
            counters: [Counters::default(); 7],
            current: Position::Centro,
        }
    }

    /// Feed one raw detection and return the stable position
    pub fn update(&mut self, detected: Position) -> Position {
        for position in Position::ALL {
            let counters = &mut self.counters[position.index()];
            if position == detected {
                counters.enter = (counters.enter + 1).min(self.enter_frames);
                counters.exit = 0;
            } else {
                counters.exit = (counters.exit + 1).min(self.exit_frames);
                counters.enter = 0;
            }
        }

        let stable = Position::STABILITY_ORDER
            .into_iter()
            .find(|pos| self.counters[pos.index()].enter >= self.enter_frames)
            .unwrap_or(Position::Centro);

        if stable != self.current {
            log::debug!("[Stability] {} -> {}", self.current, stable);
        }
        self.current = stable;
        stable
    }

    /// Stable position after the last update (`Centro` initially)
    pub fn current(&self) -> Position {
        self.current
    }

    pub fn counters(&self, position: Position) -> Counters {
        self.counters[position.index()]
    }

    /// Return the stable position to `Centro`; counters are kept
    ///
    /// A position whose enter counter is still full is re-selected on the
    /// next update.
    pub fn reset_current(&mut self) {
        self.current = Position::Centro;
    }

    pub fn reset(&mut self) {
        self.counters = [Counters::default(); 7];
        self.current = Position::Centro;
    }
}
