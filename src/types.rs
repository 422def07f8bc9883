// Core value types shared across the gesture pipeline
//
// Vector3 carries raw or smoothed magnetometer readings (no unit conversion).
// Position is the closed set of gesture zones; its orderings are significant
// and are exposed as explicit constants rather than relying on declaration order.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Three-axis vector as reported by the magnetometer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Linear interpolation towards `target`; `t` is clamped to [0, 1]
    pub fn lerp(self, target: Vector3, t: f32) -> Vector3 {
        let t = t.clamp(0.0, 1.0);
        Vector3 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vector3 {
    type Output = Vector3;

    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Vector3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;

    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;

    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vector3 {
    type Output = Vector3;

    fn div(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Discrete gesture zone
///
/// `Ambiente` is calibration-only and never produced by the classifier.
/// `Centro` is the neutral rest position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Ambiente,
    Centro,
    Izquierda,
    Derecha,
    Arriba,
    Abajo,
    Acercar,
}

impl Position {
    /// Every position, in declaration order
    pub const ALL: [Position; 7] = [
        Position::Ambiente,
        Position::Centro,
        Position::Izquierda,
        Position::Derecha,
        Position::Arriba,
        Position::Abajo,
        Position::Acercar,
    ];

    /// Candidates scored by the calibrated classifier; the first wins ties
    pub const CANDIDATE_ORDER: [Position; 5] = [
        Position::Izquierda,
        Position::Derecha,
        Position::Arriba,
        Position::Abajo,
        Position::Acercar,
    ];

    /// Order in which the stability filter looks for a confirmed position
    pub const STABILITY_ORDER: [Position; 7] = [
        Position::Centro,
        Position::Izquierda,
        Position::Derecha,
        Position::Arriba,
        Position::Abajo,
        Position::Acercar,
        Position::Ambiente,
    ];

    /// Dense index used for per-position tables
    pub const fn index(self) -> usize {
        match self {
            Position::Ambiente => 0,
            Position::Centro => 1,
            Position::Izquierda => 2,
            Position::Derecha => 3,
            Position::Arriba => 4,
            Position::Abajo => 5,
            Position::Acercar => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Position::Ambiente => "Ambiente",
            Position::Centro => "Centro",
            Position::Izquierda => "Izquierda",
            Position::Derecha => "Derecha",
            Position::Arriba => "Arriba",
            Position::Abajo => "Abajo",
            Position::Acercar => "Acercar",
        }
    }

    /// Whether the classifier can ever output this position
    pub fn is_gesture(self) -> bool {
        !matches!(self, Position::Ambiente)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Position {
    type Err = String;

    /// Case-insensitive label lookup
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|pos| pos.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown position '{}'", s))
    }
}

/// Emitted when the stable position changes (rate limited by the emitter cooldown)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    /// New stable position
    pub label: Position,
    /// Milliseconds since the engine was created
    pub timestamp_ms: u64,
    /// True for `Acercar`
    pub is_approach: bool,
}

impl GestureEvent {
    pub fn new(label: Position, timestamp_ms: u64) -> Self {
        Self {
            label,
            timestamp_ms,
            is_approach: label == Position::Acercar,
        }
    }
}

/// Emitted when a calibration session stores a new reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEvent {
    /// Calibrated position (`Ambiente` for the ambient baseline)
    pub label: Position,
    /// Averaged reading that was persisted
    pub reference: Vector3,
    /// Milliseconds since the engine was created
    pub timestamp_ms: u64,
}
