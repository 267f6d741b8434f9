//! Error types for the simulation core.
//!
//! Degenerate game states (missing targets, dead units, zero-length
//! geometry) are recovered locally and never surface here. These errors
//! cover API misuse at the boundary: bad ids, bad spawn specs, bad tuning.

use thiserror::Error;

use crate::components::UnitId;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// No live unit with this id.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// No current squad with this fingerprint.
    #[error("Squad not found: [{0}]")]
    SquadNotFound(String),

    /// Platform tag was neither `"move"` nor `"attack"`.
    #[error("Unknown platform kind: {0:?}")]
    UnknownPlatformKind(String),

    /// Command or spawn arguments are unusable (non-finite coordinates).
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A unit was spawned without any platforms.
    #[error("Unit spec has no platforms")]
    EmptyLoadout,

    /// Tuning values are out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Tuning file failed to parse.
    #[error("Failed to parse config: {message}")]
    ConfigParse {
        /// Parser error message.
        message: String,
    },

    /// State could not be encoded for hashing.
    #[error("Failed to encode simulation state: {0}")]
    Encode(String),
}
