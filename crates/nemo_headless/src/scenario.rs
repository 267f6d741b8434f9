//! Scenario loading and configuration.
//!
//! Scenarios define the starting armies and any scripted orders for a
//! headless battle. They are written in RON:
//!
//! ```ron
//! Scenario(
//!     name: "Line battle",
//!     ticks: 900,
//!     units: [
//!         (team: Red, x: 0.0, y: 0.0, platforms: ["move", "attack", "attack"], count: 4),
//!         (team: Blue, x: 600.0, y: 0.0, angle: 3.14159, platforms: ["move", "attack"], count: 4),
//!     ],
//!     orders: [
//!         (tick: 0, command: SetDestination(unit: 1, point: (x: 300.0, y: 0.0))),
//!     ],
//! )
//! ```

use std::path::Path;

use nemo_core::components::{ArmyClass, Category, Command, PlatformKind, Team};
use nemo_core::config::SimConfig;
use nemo_core::error::SimError;
use nemo_core::math::Vec2;
use nemo_core::simulation::Simulation;
use nemo_core::unit::UnitSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The simulation rejected the scenario contents.
    #[error("Invalid scenario: {0}")]
    Simulation(#[from] SimError),
}

fn default_ticks() -> u64 {
    600
}

fn default_count() -> u32 {
    1
}

fn default_spacing() -> f64 {
    60.0
}

/// One or more identical units placed in a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Owning team.
    pub team: Team,
    /// X of the first unit.
    pub x: f64,
    /// Y of the first unit.
    pub y: f64,
    /// Initial facing in radians.
    #[serde(default)]
    pub angle: f64,
    /// Platform tags, `"move"` or `"attack"`, in mount order.
    pub platforms: Vec<String>,
    /// Movement category.
    #[serde(default)]
    pub category: Category,
    /// Army sub-type.
    #[serde(default)]
    pub class: ArmyClass,
    /// Spawn with a shield.
    #[serde(default)]
    pub shielded: bool,
    /// Number of units in the column.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Gap between units along y.
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

impl UnitPlacement {
    /// Placement of a single unit.
    #[must_use]
    pub fn new(team: Team, x: f64, y: f64, platforms: &[&str]) -> Self {
        Self {
            team,
            x,
            y,
            angle: 0.0,
            platforms: platforms.iter().map(|tag| (*tag).to_string()).collect(),
            category: Category::default(),
            class: ArmyClass::default(),
            shielded: false,
            count: 1,
            spacing: default_spacing(),
        }
    }

    /// Column of `count` units.
    #[must_use]
    pub fn column(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Initial facing.
    #[must_use]
    pub fn facing(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Expand into one spec per unit.
    pub fn specs(&self) -> Result<Vec<UnitSpec>, ScenarioError> {
        let platforms = self
            .platforms
            .iter()
            .map(|tag| tag.parse::<PlatformKind>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut specs = Vec::with_capacity(self.count as usize);
        for i in 0..self.count {
            let position = Vec2::new(self.x, self.y + f64::from(i) * self.spacing);
            let mut spec = UnitSpec::new(self.team, position)
                .with_platforms(platforms.iter().copied())
                .category(self.category)
                .class(self.class)
                .facing(self.angle);
            if self.shielded {
                spec = spec.shielded();
            }
            specs.push(spec);
        }
        Ok(specs)
    }
}

/// A command queued just before `tick` runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOrder {
    /// Tick at which to queue the command.
    pub tick: u64,
    /// The command.
    pub command: Command,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Ticks to run unless overridden.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Starting units, spawned in order.
    pub units: Vec<UnitPlacement>,
    /// Scripted orders.
    #[serde(default)]
    pub orders: Vec<ScheduledOrder>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Two armed lines closing on each other.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Skirmish".to_string(),
            description: "Two lines of four armies with twin slot weapons".to_string(),
            ticks: 1800,
            units: vec![
                UnitPlacement::new(Team::Red, 0.0, 0.0, &["move", "attack", "attack"]).column(4),
                UnitPlacement::new(Team::Blue, 700.0, 0.0, &["move", "attack", "attack"])
                    .column(4)
                    .facing(std::f64::consts::PI),
            ],
            orders: Vec::new(),
        }
    }

    /// Total number of units the scenario spawns.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.iter().map(|p| p.count as usize).sum()
    }

    /// Spawn every placement into a new simulation.
    pub fn build(&self, config: &SimConfig) -> Result<Simulation, ScenarioError> {
        let mut sim = Simulation::with_config(config.clone())?;
        for placement in &self.units {
            for spec in placement.specs()? {
                sim.spawn_unit(&spec)?;
            }
        }
        tracing::debug!(
            scenario = %self.name,
            units = sim.unit_count(),
            "Scenario built"
        );
        Ok(sim)
    }

    /// Check the scenario spawns cleanly under `config`.
    pub fn validate(&self, config: &SimConfig) -> Result<(), ScenarioError> {
        self.build(config).map(|_| ())
    }
}

/// Load a tuning file, or the default tuning when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<SimConfig, ScenarioError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ScenarioError::FileNotFound(path.display().to_string()));
            }
            let contents = std::fs::read_to_string(path)?;
            Ok(SimConfig::from_ron_str(&contents)?)
        }
        None => Ok(SimConfig::default()),
    }
}
