//! # Nemo Core
//!
//! Deterministic simulation core for Nemo squad combat.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - Fixed-point hit points and damage
//!
//! Units carry *platforms*: move platforms drag their owner around, attack
//! platforms aim and fire. Every tick, same-team units are regrouped into
//! squads that pick opponents and hold a formation.
//!
//! ## Crate Structure
//!
//! - [`components`] - Ids, enums, commands and effects
//! - [`config`] - Tuning loaded from RON
//! - [`math`] - Vectors, angles and fixed-point helpers
//! - [`combat`] - Shields and damage resolution
//! - [`platform`] - Move and attack platforms
//! - [`unit`] - Units and their per-tick behaviour
//! - [`squad`] - Clustering, fingerprints and formations
//! - [`squad_manager`] - Squad lifecycle and combat links
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod math;
pub mod platform;
pub mod simulation;
pub mod squad;
pub mod squad_manager;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{DamageEvent, DamageOutcome, Damageable, Hit, Shield};
    pub use crate::components::*;
    pub use crate::config::{FormationKind, SimConfig};
    pub use crate::error::{Result, SimError};
    pub use crate::math::{Fixed, Vec2};
    pub use crate::platform::{Mount, Platform, Weapon};
    pub use crate::simulation::{Simulation, TickEvents, WorldSnapshot};
    pub use crate::squad::{Squad, SquadClass};
    pub use crate::squad_manager::SquadManager;
    pub use crate::unit::{Unit, UnitSpec};
}
