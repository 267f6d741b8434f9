//! Core simulation loop.
//!
//! The simulation owns every unit, the squad manager and the command queue,
//! and advances them in a fixed phase order each tick.
//!
//! # Determinism
//!
//! - Units are stored in a `BTreeMap` and always visited in id order.
//! - Every unit reads the same immutable [`TargetSnapshot`] during the
//!   update phase; damage is buffered and committed afterwards.
//! - Hit points and damage use fixed-point via [`Fixed`].
//!
//! # Example
//!
//! ```
//! use nemo_core::components::{Command, Team};
//! use nemo_core::math::Vec2;
//! use nemo_core::simulation::Simulation;
//! use nemo_core::unit::UnitSpec;
//!
//! let mut sim = Simulation::new();
//! let spec = UnitSpec::from_tags(Team::Red, Vec2::ZERO, &["move", "attack"]).unwrap();
//! let unit = sim.spawn_unit(&spec).unwrap();
//!
//! sim.queue_command(Command::SetDestination {
//!     unit,
//!     point: Vec2::new(200.0, 0.0),
//! })
//! .unwrap();
//!
//! let events = sim.tick();
//! assert_eq!(events.tick, 1);
//! ```
//!
//! [`Fixed`]: crate::math::Fixed

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::combat::{DamageEvent, Damageable};
use crate::components::{
    AimMode, Bounds, Category, Command, CommandQueue, MotionMode, PlatformKind, Team, UnitEffect,
    UnitId,
};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::math::Vec2;
use crate::platform::ShotEffect;
use crate::squad::SquadClass;
use crate::squad_manager::SquadManager;
use crate::unit::{TargetSnapshot, Unit, UnitSpec};

/// Events generated during a simulation tick.
///
/// These events can be used by the game layer to trigger effects,
/// sounds, animations, etc.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number after this tick completed.
    pub tick: u64,
    /// Damage committed this tick, in hit order.
    pub damage_events: Vec<DamageEvent>,
    /// Units that died this tick.
    pub deaths: Vec<UnitId>,
    /// Visual effects emitted by units this tick.
    pub effects: Vec<(UnitId, UnitEffect)>,
}

/// Render view of one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformView {
    /// Kind tag.
    pub kind: PlatformKind,
    /// Position.
    pub position: Vec2,
    /// Angle.
    pub angle: f64,
    /// Motion state.
    pub mode: MotionMode,
    /// Lock-on state for weapons.
    pub aim: Option<AimMode>,
    /// Live shot traces for weapons.
    pub shots: Vec<ShotEffect>,
}

/// Render view of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    /// Unit id.
    pub id: UnitId,
    /// Team.
    pub team: Team,
    /// Category.
    pub category: Category,
    /// Position.
    pub position: Vec2,
    /// Facing.
    pub angle: f64,
    /// Footprint size.
    pub size: f64,
    /// Alive flag.
    pub alive: bool,
    /// Selection flag.
    pub selected: bool,
    /// Hit points as a fraction of the starting value.
    pub hp_ratio: f64,
    /// Shield pool as a fraction of its size.
    pub shield_ratio: f64,
    /// Shield-broken flash is showing.
    pub shield_flash: bool,
    /// Platforms in mount order.
    pub platforms: Vec<PlatformView>,
}

/// Render view of one squad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadView {
    /// Fingerprint.
    pub fingerprint: String,
    /// Team.
    pub team: Team,
    /// Bounding box.
    pub bounds: Bounds,
    /// Size class.
    pub class: SquadClass,
    /// Selection flag.
    pub selected: bool,
    /// Locked head-on with its primary target.
    pub head_on: bool,
    /// Smoothed facing.
    pub direction: f64,
}

/// Read-only world state for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Units in id order.
    pub units: Vec<UnitView>,
    /// Squads in leader order.
    pub squads: Vec<SquadView>,
}

/// The squad-combat simulation.
///
/// # Phase Order
///
/// Each tick runs, in order:
/// 1. **Commands** - drain the command queue
/// 2. **Snapshot** - capture every unit's position and liveness
/// 3. **Update** - update units in id order, collecting hits
/// 4. **Commit** - apply hits in order, then run death checks
/// 5. **Cleanup** - remove dead units
/// 6. **Squads** - recluster, link, smooth and assign formations
#[derive(Debug, Clone)]
pub struct Simulation {
    tick: u64,
    next_id: UnitId,
    config: SimConfig,
    units: BTreeMap<UnitId, Unit>,
    squads: SquadManager,
    commands: CommandQueue,
}

impl Simulation {
    /// Create an empty simulation with default tuning.
    ///
    /// # Example
    ///
    /// ```
    /// use nemo_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new();
    /// assert_eq!(sim.get_tick(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_id: 1,
            config: SimConfig::default(),
            units: BTreeMap::new(),
            squads: SquadManager::new(),
            commands: CommandQueue::new(),
        }
    }

    /// Create an empty simulation with validated tuning.
    pub fn with_config(config: SimConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Active tuning.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Number of live units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Mutable access to a unit, for scenario setup.
    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units.get_mut(&id).ok_or(SimError::UnitNotFound(id))
    }

    /// Squads as of the last tick.
    #[must_use]
    pub fn squads(&self) -> &SquadManager {
        &self.squads
    }

    /// Number of queued commands.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    /// Spawn a unit and return its id.
    ///
    /// # Errors
    ///
    /// [`SimError::EmptyLoadout`] for a spec with no platforms and
    /// [`SimError::InvalidCommand`] for a non-finite position.
    pub fn spawn_unit(&mut self, spec: &UnitSpec) -> Result<UnitId> {
        if !spec.position.is_finite() || !spec.angle.is_finite() {
            return Err(SimError::InvalidCommand(format!(
                "non-finite spawn at {:?}",
                spec.position
            )));
        }
        let id = self.next_id;
        let unit = Unit::from_spec(id, spec, &self.config)?;
        self.next_id += 1;
        self.units.insert(id, unit);
        tracing::debug!(unit = id, team = %spec.team, category = ?spec.category, "Unit spawned");
        Ok(id)
    }

    /// Queue a command for the next tick.
    ///
    /// Unit commands must address a live unit and squad commands a squad
    /// that exists as of the last tick.
    pub fn queue_command(&mut self, command: Command) -> Result<()> {
        if let Some(id) = command.unit() {
            if !self.units.get(&id).is_some_and(Damageable::is_alive) {
                return Err(SimError::UnitNotFound(id));
            }
        }
        let finite = match &command {
            Command::SetDestination { point, .. } | Command::SetSquadDestination { point, .. } => {
                point.is_finite()
            }
            Command::StartAttackMove { point, .. } => point.map_or(true, |p| p.is_finite()),
            Command::MoveInput { angle, .. } => angle.is_finite(),
            _ => true,
        };
        if !finite {
            return Err(SimError::InvalidCommand(format!(
                "non-finite argument in {command:?}"
            )));
        }
        if let Command::SetSquadDestination { fingerprint, .. }
        | Command::SelectSquad { fingerprint, .. } = &command
        {
            if self.squads.find(fingerprint).is_none() {
                return Err(SimError::SquadNotFound(fingerprint.clone()));
            }
        }
        self.commands.push(command);
        Ok(())
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickEvents {
        let mut events = TickEvents::default();

        // 1. Commands
        let commands: Vec<Command> = self.commands.drain().collect();
        for command in commands {
            if let Err(err) = self.apply_command(command) {
                tracing::warn!(tick = self.tick, error = %err, "Dropped command");
            }
        }

        // 2. Snapshot
        let targets = TargetSnapshot::capture(self.units.values());

        // 3. Update
        let mut hits = Vec::new();
        for unit in self.units.values_mut() {
            hits.extend(unit.update(&targets, &self.config));
        }

        // 4. Commit
        for hit in hits {
            let Some(target) = self.units.get_mut(&hit.target) else {
                continue;
            };
            if !target.is_alive() {
                continue;
            }
            let outcome = target.take_damage(hit.amount);
            events.damage_events.push(DamageEvent {
                attacker: hit.attacker,
                target: hit.target,
                outcome,
            });
        }
        for unit in self.units.values_mut() {
            if unit.check_death() {
                events.deaths.push(unit.id);
            }
            let id = unit.id;
            events
                .effects
                .extend(unit.take_effects().into_iter().map(|effect| (id, effect)));
        }

        // 5. Cleanup
        self.units.retain(|_, unit| !unit.dead);

        // 6. Squads
        self.squads.update(&mut self.units, &self.config);

        self.tick += 1;
        events.tick = self.tick;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Run `ticks` ticks and return every tick's events.
    pub fn run(&mut self, ticks: u64) -> Vec<TickEvents> {
        (0..ticks).map(|_| self.tick()).collect()
    }

    fn apply_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SetDestination { unit, point } => self.live_unit_mut(unit)?.set_destination(point),
            Command::StartAttackMove {
                unit,
                targets,
                point,
            } => self.live_unit_mut(unit)?.start_attack_move(targets, point),
            Command::ClearAttackMove { unit } => self.live_unit_mut(unit)?.clear_attack_move(),
            Command::MoveInput {
                unit,
                angle,
                reverse,
            } => self.live_unit_mut(unit)?.handle_move_input(angle, reverse),
            Command::ResetMoveInput { unit } => self.live_unit_mut(unit)?.reset_move_input(),
            Command::SelectUnit { unit, selected } => self.live_unit_mut(unit)?.selected = selected,
            Command::SetSquadDestination { fingerprint, point } => {
                self.squads.set_destination(&fingerprint, point)?;
            }
            Command::SelectSquad {
                fingerprint,
                selected,
            } => self.squads.set_selected(&fingerprint, selected)?,
        }
        Ok(())
    }

    fn live_unit_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units
            .get_mut(&id)
            .filter(|unit| !unit.dead)
            .ok_or(SimError::UnitNotFound(id))
    }

    /// Encode the tick and every unit with bincode.
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        let units: Vec<&Unit> = self.units.values().collect();
        bincode::serialize(&(self.tick, units))
            .map_err(|e| SimError::Encode(e.to_string()))
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.encode_state() {
            Ok(bytes) => bytes.hash(&mut hasher),
            Err(err) => {
                tracing::warn!(error = %err, "State hash fell back to tick only");
                self.tick.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Read-only view for the renderer.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let units = self
            .units
            .values()
            .map(|unit| UnitView {
                id: unit.id,
                team: unit.team,
                category: unit.category,
                position: unit.position,
                angle: unit.angle,
                size: unit.size,
                alive: !unit.dead,
                selected: unit.selected,
                hp_ratio: unit.hp_ratio(),
                shield_ratio: unit.shield.ratio(),
                shield_flash: unit.shield.is_flashing(),
                platforms: unit
                    .platforms
                    .iter()
                    .map(|platform| PlatformView {
                        kind: platform.kind(),
                        position: platform.position,
                        angle: platform.angle,
                        mode: platform.mode,
                        aim: platform.weapon().map(|w| w.aim),
                        shots: platform
                            .weapon()
                            .map(|w| w.effects.clone())
                            .unwrap_or_default(),
                    })
                    .collect(),
            })
            .collect();

        let squads = self
            .squads
            .squads()
            .iter()
            .map(|squad| SquadView {
                fingerprint: squad.fingerprint.clone(),
                team: squad.team,
                bounds: squad.bounds,
                class: squad.class,
                selected: squad.selected,
                head_on: squad.head_on,
                direction: squad.primary_direction,
            })
            .collect();

        WorldSnapshot {
            tick: self.tick,
            units,
            squads,
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
