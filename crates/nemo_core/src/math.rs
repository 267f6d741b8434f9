//! Geometry and numeric utilities for the simulation.
//!
//! Kinematics (positions, angles, distances) use `f64` because platform
//! aiming needs trigonometry. Combat accounting (hit points, shields,
//! damage) uses fixed-point so that damage totals are exact and
//! order-independent across platforms.

use std::f64::consts::{PI, TAU};

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for hit points and damage.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// 2D vector in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` (radians, +x = 0, +y = π/2).
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    /// Squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Bearing of this vector, `atan2(y, x)`.
    #[must_use]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Bearing from `self` toward `other`.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f64 {
        (other - self).angle()
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or zero for a zero-length vector.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len <= f64::EPSILON || !len.is_finite() {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Scale the vector down so that its length does not exceed `max`.
    #[must_use]
    pub fn clamp_length(self, max: f64) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            self * (max / len)
        } else {
            self
        }
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Point at `distance` from `self` along `angle`.
    #[must_use]
    pub fn offset(self, angle: f64, distance: f64) -> Self {
        self + Self::from_angle(angle) * distance
    }

    /// Rotate the vector counter-clockwise by `angle`.
    #[must_use]
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Map any angle into `(-π, π]`.
///
/// Angles already in range are returned unchanged, which makes the
/// function idempotent bit-for-bit. Non-finite input maps to `0.0`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    if angle > -PI && angle <= PI {
        return angle;
    }

    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Shortest signed arc from `from` to `to`, in `(-π, π]`.
#[must_use]
pub fn angle_diff(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Interpolate along the shortest arc from `from` toward `to` by fraction `t`.
#[must_use]
pub fn lerp_angle(from: f64, to: f64, t: f64) -> f64 {
    normalize_angle(from + angle_diff(from, to) * t.clamp(0.0, 1.0))
}

/// Step `from` toward `to` by at most `max_step` radians.
///
/// Returns the new angle and whether `to` was reached.
#[must_use]
pub fn step_angle(from: f64, to: f64, max_step: f64) -> (f64, bool) {
    let diff = angle_diff(from, to);
    if diff.abs() <= max_step {
        (normalize_angle(to), true)
    } else {
        (normalize_angle(from + max_step.copysign(diff)), false)
    }
}

/// Clamp a ratio into `[0, 1]`, mapping NaN to `0`.
#[must_use]
pub fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Convert a fractional value to [`Fixed`], saturating and mapping NaN to zero.
#[must_use]
pub fn fixed_from_f64(value: f64) -> Fixed {
    if value.is_nan() {
        Fixed::ZERO
    } else {
        Fixed::saturating_from_num(value)
    }
}
