// EventEmitter - rate-limited gesture transitions
//
// Fires when the stable position differs from the last emitted one and the
// cooldown since the previous emission has elapsed. Changes that happen
// inside the cooldown are not queued: whatever the stable position is on
// the first tick after expiry is what gets emitted.

use std::time::{Duration, Instant};

use crate::types::Position;

#[derive(Debug, Clone)]
pub struct EventEmitter {
    last_emitted: Position,
    /// `None` until the first emission, which is never rate limited
    last_emit_at: Option<Instant>,
    cooldown: Duration,
}

impl EventEmitter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_emitted: Position::Centro,
            last_emit_at: None,
            cooldown,
        }
    }

    /// Returns the position to emit for this tick, if any
    pub fn update(&mut self, current: Position, now: Instant) -> Option<Position> {
        if current == self.last_emitted {
            return None;
        }

        let past_cooldown = self
            .last_emit_at
            .map(|ts| now.saturating_duration_since(ts) >= self.cooldown)
            .unwrap_or(true);

        if past_cooldown {
            self.last_emitted = current;
            self.last_emit_at = Some(now);
            Some(current)
        } else {
            None
        }
    }

    pub fn last_emitted(&self) -> Position {
        self.last_emitted
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Return the last emitted position to `Centro`
    ///
    /// The time of the last emission is kept, so the cooldown still applies.
    pub fn reset(&mut self) {
        self.last_emitted = Position::Centro;
    }
}
