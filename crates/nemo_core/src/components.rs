//! Shared data types.
//!
//! Plain data with no behaviour beyond small helpers. The state
//! machines that operate on these live in [`crate::platform`],
//! [`crate::unit`] and [`crate::squad`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::math::Vec2;

/// Unique identifier for units. Assigned monotonically from 1.
pub type UnitId = u64;

/// Which side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Red team.
    Red,
    /// Blue team.
    Blue,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => f.write_str("red"),
            Self::Blue => f.write_str("blue"),
        }
    }
}

/// Locomotion category of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    /// Moved by the pull of its move platforms.
    #[default]
    Army,
    /// Self-propelled: turns, then advances.
    Unit,
}

/// Army sub-type. Heavier classes weigh more in squad size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArmyClass {
    /// Regular line unit.
    #[default]
    Standard,
    /// Heavy support unit. Always takes the rear line of a two-line
    /// formation.
    Heavy,
}

/// Kind tag of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    /// Locomotion appendage.
    Move,
    /// Weapon appendage.
    Attack,
}

impl FromStr for PlatformKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "move" => Ok(Self::Move),
            "attack" => Ok(Self::Attack),
            other => Err(SimError::UnknownPlatformKind(other.to_string())),
        }
    }
}

/// Motion state of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MotionMode {
    /// Resting.
    #[default]
    Idle,
    /// Swinging around the owner toward a newly commanded bearing.
    Orbit,
    /// Thrusting along the commanded angle.
    MoveOn,
    /// Decelerating back to the rest point.
    Return,
}

/// Aiming state of a weapon platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AimMode {
    /// Not aligned with a target.
    #[default]
    Idle,
    /// Aligned with the nearest enemy; may fire.
    AttackOn,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

impl Bounds {
    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Whether either side exceeds `extent`.
    #[must_use]
    pub fn exceeds(&self, extent: f64) -> bool {
        self.w > extent || self.h > extent
    }

    /// Smallest box enclosing squares of side `size` centered on each point.
    #[must_use]
    pub fn enclosing(points: impl IntoIterator<Item = (Vec2, f64)>) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for (p, size) in points {
            let half = size / 2.0;
            min_x = min_x.min(p.x - half);
            max_x = max_x.max(p.x + half);
            min_y = min_y.min(p.y - half);
            max_y = max_y.max(p.y + half);
        }

        if min_x > max_x {
            return Self::default();
        }

        Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x,
            h: max_y - min_y,
        }
    }
}

/// Transient effect emitted by a unit for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UnitEffect {
    /// The unit died at this position.
    Death {
        /// Where the unit died.
        position: Vec2,
    },
    /// The shield pool was just depleted.
    ShieldBroken,
}

/// An input command. The only way besides ticking to mutate the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Move a unit to a point.
    SetDestination {
        /// Unit to move.
        unit: UnitId,
        /// Target point.
        point: Vec2,
    },
    /// Advance toward targets (or a point), engaging enemies on the way.
    StartAttackMove {
        /// Unit receiving the order.
        unit: UnitId,
        /// Candidate targets, nearest live one is pursued.
        targets: Vec<UnitId>,
        /// Fallback point once targets are exhausted.
        point: Option<Vec2>,
    },
    /// Cancel attack-move.
    ClearAttackMove {
        /// Unit receiving the order.
        unit: UnitId,
    },
    /// Directional thrust input.
    MoveInput {
        /// Unit receiving the input.
        unit: UnitId,
        /// Input direction in radians.
        angle: f64,
        /// Back away while facing the opposite direction.
        reverse: bool,
    },
    /// Release directional input.
    ResetMoveInput {
        /// Unit receiving the input.
        unit: UnitId,
    },
    /// Give a squad a group destination.
    SetSquadDestination {
        /// Squad fingerprint (sorted member ids joined by `,`).
        fingerprint: String,
        /// Target point.
        point: Vec2,
    },
    /// Toggle unit selection.
    SelectUnit {
        /// Unit to (de)select.
        unit: UnitId,
        /// New selection state.
        selected: bool,
    },
    /// Toggle squad selection.
    SelectSquad {
        /// Squad fingerprint.
        fingerprint: String,
        /// New selection state.
        selected: bool,
    },
}

impl Command {
    /// The unit this command addresses, if it addresses a single unit.
    #[must_use]
    pub fn unit(&self) -> Option<UnitId> {
        match self {
            Self::SetDestination { unit, .. }
            | Self::StartAttackMove { unit, .. }
            | Self::ClearAttackMove { unit }
            | Self::MoveInput { unit, .. }
            | Self::ResetMoveInput { unit }
            | Self::SelectUnit { unit, .. } => Some(*unit),
            Self::SetSquadDestination { .. } | Self::SelectSquad { .. } => None,
        }
    }
}

/// FIFO of commands drained once per tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    /// Create an empty command queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: VecDeque::new(),
        }
    }

    /// Add a command to the back of the queue.
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Take every queued command in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.commands.drain(..)
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Get the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}
