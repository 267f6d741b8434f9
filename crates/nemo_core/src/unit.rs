//! Units: the controllable combat entities.
//!
//! A unit owns its platforms and runs the top-level state machine each
//! tick:
//!
//! 1. Refresh the nearest enemy from the tick's [`TargetSnapshot`].
//! 2. An idle armed unit with an enemy in range starts attack-moving on its
//!    own.
//! 3. Advance attack-move: prune dead targets, approach the nearest one and
//!    halt once every weapon can reach it.
//! 4. Step toward the destination, snapping on arrival.
//! 5. Update every platform, collecting pulls and shots.
//! 6. Integrate displacement: army units follow the pull of their move
//!    platforms, self-propelled units turn and then advance.
//! 7. Tick the shield flash.
//!
//! Damage is never applied during the update. Shots come back as [`Hit`]s
//! and the simulation commits them, together with the death check, once
//! every unit has moved.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::combat::{absorb, DamageOutcome, Damageable, Hit, Shield};
use crate::components::{ArmyClass, Category, PlatformKind, Team, UnitEffect, UnitId};
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::math::{fixed_serde, normalize_angle, step_angle, Fixed, Vec2};
use crate::platform::{EnemyContact, Mount, OwnerView, Platform, Weapon};

/// Everything needed to spawn a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Owning team.
    pub team: Team,
    /// Spawn position.
    pub position: Vec2,
    /// Initial facing.
    #[serde(default)]
    pub angle: f64,
    /// Platforms in mount order.
    pub platforms: Vec<PlatformKind>,
    /// Locomotion category.
    #[serde(default)]
    pub category: Category,
    /// Army sub-type.
    #[serde(default)]
    pub class: ArmyClass,
    /// Spawn with a shield.
    #[serde(default)]
    pub shielded: bool,
}

impl UnitSpec {
    /// Army unit with no platforms yet.
    #[must_use]
    pub fn new(team: Team, position: Vec2) -> Self {
        Self {
            team,
            position,
            angle: 0.0,
            platforms: Vec::new(),
            category: Category::Army,
            class: ArmyClass::Standard,
            shielded: false,
        }
    }

    /// Army unit whose platforms are given as `"move"` / `"attack"` tags.
    pub fn from_tags(team: Team, position: Vec2, tags: &[&str]) -> Result<Self> {
        let platforms = tags
            .iter()
            .map(|tag| tag.parse::<PlatformKind>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(team, position).with_platforms(platforms))
    }

    /// Set the platform loadout.
    #[must_use]
    pub fn with_platforms(mut self, platforms: impl IntoIterator<Item = PlatformKind>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    /// Set the locomotion category.
    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the army sub-type.
    #[must_use]
    pub fn class(mut self, class: ArmyClass) -> Self {
        self.class = class;
        self
    }

    /// Give the unit a shield.
    #[must_use]
    pub fn shielded(mut self) -> Self {
        self.shielded = true;
        self
    }

    /// Set the initial facing.
    #[must_use]
    pub fn facing(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }
}

/// One entry of the per-tick target snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInfo {
    /// Unit id.
    pub id: UnitId,
    /// Team.
    pub team: Team,
    /// Position at the start of the tick.
    pub position: Vec2,
    /// Footprint size.
    pub size: f64,
    /// Alive at the start of the tick.
    pub alive: bool,
}

/// Immutable view of every unit taken before the update phase.
///
/// Nearest-enemy searches and attack-move pruning read from this so that
/// no unit observes another unit's mid-tick movement.
#[derive(Debug, Clone, Default)]
pub struct TargetSnapshot {
    entries: Vec<TargetInfo>,
}

impl TargetSnapshot {
    /// Capture the given units, sorted by id.
    pub fn capture<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Self {
        let mut entries: Vec<TargetInfo> = units
            .into_iter()
            .map(|unit| TargetInfo {
                id: unit.id,
                team: unit.team,
                position: unit.position,
                size: unit.size,
                alive: !unit.dead,
            })
            .collect();
        entries.sort_by_key(|entry| entry.id);
        Self { entries }
    }

    /// Look up a unit.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&TargetInfo> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// All entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TargetInfo> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attack-move order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttackMove {
    /// Halted with every weapon in reach of the target.
    pub engaged: bool,
    /// Candidate targets.
    pub targets: Vec<UnitId>,
    /// Where to go once the targets are gone.
    pub point: Option<Vec2>,
}

/// Active directional input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Thrust direction.
    pub angle: f64,
    /// Face away from the thrust direction.
    pub reverse: bool,
}

impl MoveInput {
    /// Direction the unit body should face.
    #[must_use]
    pub fn facing(&self) -> f64 {
        if self.reverse {
            normalize_angle(self.angle + PI)
        } else {
            self.angle
        }
    }
}

/// A controllable combat entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique id.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Center position.
    pub position: Vec2,
    /// Body facing.
    pub angle: f64,
    /// Displacement cap per tick.
    pub max_speed: f64,
    /// Body rotation cap per tick.
    pub turn_rate: f64,
    /// Footprint size.
    pub size: f64,
    /// Locomotion category.
    pub category: Category,
    /// Army sub-type.
    pub class: ArmyClass,
    /// Hit points.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Starting hit points.
    #[serde(with = "fixed_serde")]
    pub max_hp: Fixed,
    /// Shield pool.
    pub shield: Shield,
    /// Destroyed.
    pub dead: bool,
    /// Selected in the UI.
    pub selected: bool,
    /// Point being moved to.
    pub destination: Option<Vec2>,
    /// Attack-move order.
    pub attack_move: Option<AttackMove>,
    /// Directional input.
    pub move_input: Option<MoveInput>,
    /// Mounted platforms.
    pub platforms: Vec<Platform>,
    #[serde(skip)]
    nearest_enemy: Option<EnemyContact>,
    #[serde(skip)]
    effects: Vec<UnitEffect>,
}

impl Unit {
    /// Build a unit from a spawn spec.
    pub fn from_spec(id: UnitId, spec: &UnitSpec, config: &SimConfig) -> Result<Self> {
        if spec.platforms.is_empty() {
            return Err(SimError::EmptyLoadout);
        }

        let tuning = config.unit_tuning(spec.category);
        let angle = normalize_angle(spec.angle);
        let weapon_count = spec
            .platforms
            .iter()
            .filter(|kind| **kind == PlatformKind::Attack)
            .count();

        let mut weapon_index = 0;
        let platforms = spec
            .platforms
            .iter()
            .map(|kind| match kind {
                PlatformKind::Move => Platform::new_move(spec.position, angle, &config.platform),
                PlatformKind::Attack => {
                    let mount = Mount::for_loadout(weapon_index, weapon_count, spec.category);
                    weapon_index += 1;
                    Platform::new_attack(spec.position, angle, mount, config)
                }
            })
            .collect();

        let shield = if spec.shielded {
            Shield::new(config.shield.max_hp, config.shield.strength)
                .with_flash(config.shield.flash_ticks)
        } else {
            Shield::NONE
        };

        Ok(Self {
            id,
            team: spec.team,
            position: spec.position,
            angle,
            max_speed: tuning.max_speed,
            turn_rate: tuning.turn_rate,
            size: tuning.size,
            category: spec.category,
            class: spec.class,
            hp: Fixed::from_num(tuning.hp),
            max_hp: Fixed::from_num(tuning.hp),
            shield,
            dead: false,
            selected: false,
            destination: None,
            attack_move: None,
            move_input: None,
            platforms,
            nearest_enemy: None,
            effects: Vec::new(),
        })
    }

    /// Nearest enemy found by the last update.
    #[must_use]
    pub fn nearest_enemy(&self) -> Option<EnemyContact> {
        self.nearest_enemy
    }

    /// Weapons in mount order.
    pub fn weapons(&self) -> impl Iterator<Item = &Weapon> {
        self.platforms.iter().filter_map(Platform::weapon)
    }

    /// Whether any attack platform is mounted.
    #[must_use]
    pub fn has_weapons(&self) -> bool {
        self.weapons().next().is_some()
    }

    /// No destination, no attack-move and no directional input.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.destination.is_none() && self.attack_move.is_none() && self.move_input.is_none()
    }

    /// Remaining hit points as a fraction of the starting value.
    #[must_use]
    pub fn hp_ratio(&self) -> f64 {
        if self.max_hp <= Fixed::ZERO {
            0.0
        } else {
            (self.hp / self.max_hp).to_num::<f64>().max(0.0)
        }
    }

    /// Pending visual effects.
    #[must_use]
    pub fn effects(&self) -> &[UnitEffect] {
        &self.effects
    }

    /// Take the pending visual effects.
    pub fn take_effects(&mut self) -> Vec<UnitEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Move to a point, cancelling attack-move and directional input.
    pub fn set_destination(&mut self, point: Vec2) {
        self.attack_move = None;
        self.move_input = None;
        self.destination = Some(point);
    }

    /// Formation slot assigned by the squad; leaves orders untouched.
    pub(crate) fn assign_formation_slot(&mut self, point: Vec2) {
        self.destination = Some(point);
    }

    /// Advance on the nearest of `targets`, then on `point`.
    pub fn start_attack_move(&mut self, targets: Vec<UnitId>, point: Option<Vec2>) {
        self.move_input = None;
        self.attack_move = Some(AttackMove {
            engaged: false,
            targets,
            point,
        });
    }

    /// Cancel attack-move and stop.
    pub fn clear_attack_move(&mut self) {
        if self.attack_move.take().is_some() && self.destination.take().is_some() {
            self.reset_move_platforms();
        }
    }

    /// Start directional input. Clears any destination or attack-move.
    pub fn handle_move_input(&mut self, angle: f64, reverse: bool) {
        let angle = normalize_angle(angle);
        self.destination = None;
        self.attack_move = None;
        self.move_input = Some(MoveInput { angle, reverse });
        for platform in &mut self.platforms {
            platform.key_input_angle(angle);
        }
    }

    /// Release directional input.
    pub fn reset_move_input(&mut self) {
        self.move_input = None;
        for platform in &mut self.platforms {
            platform.reset();
        }
    }

    /// Turn toward `target` by at most the turn rate. Returns whether the
    /// target angle was reached.
    pub fn rotate_towards(&mut self, target: f64) -> bool {
        let (angle, reached) = step_angle(self.angle, target, self.turn_rate);
        self.angle = angle;
        reached
    }

    /// Nearest live opposing unit strictly within `radius`.
    ///
    /// On equal distances the lowest id wins.
    #[must_use]
    pub fn find_nearest_enemy(&self, targets: &TargetSnapshot, radius: f64) -> Option<EnemyContact> {
        let mut nearest: Option<EnemyContact> = None;
        for target in targets.iter() {
            if target.id == self.id || target.team == self.team || !target.alive {
                continue;
            }
            let distance = self.position.distance(target.position);
            if distance >= radius {
                continue;
            }
            if nearest.map_or(true, |best| distance < best.distance) {
                nearest = Some(EnemyContact {
                    id: target.id,
                    position: target.position,
                    distance,
                });
            }
        }
        nearest
    }

    /// Distance at which every weapon reaches a target straight ahead.
    ///
    /// Slots that can never reach ahead are skipped. `None` for unarmed
    /// units and when no weapon reaches ahead at all.
    #[must_use]
    pub fn engagement_distance(&self) -> Option<f64> {
        self.platforms
            .iter()
            .filter_map(|platform| {
                platform
                    .weapon()
                    .and_then(|weapon| weapon.engagement_distance(platform.base_distance))
            })
            .reduce(f64::min)
    }

    /// Transition to dead. Returns `false` if the unit was already dead.
    pub fn destroy(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.dead = true;
        self.destination = None;
        self.attack_move = None;
        self.move_input = None;
        self.effects.push(UnitEffect::Death {
            position: self.position,
        });
        tracing::debug!(unit = self.id, team = %self.team, "Unit destroyed");
        true
    }

    /// Destroy the unit if its hit points are exhausted.
    pub fn check_death(&mut self) -> bool {
        self.hp <= Fixed::ZERO && self.destroy()
    }

    /// Run one tick against the snapshot. Returns the shots fired.
    pub fn update(&mut self, targets: &TargetSnapshot, config: &SimConfig) -> Vec<Hit> {
        if self.dead {
            return Vec::new();
        }

        self.nearest_enemy = self.find_nearest_enemy(targets, config.recognition_radius);

        if self.is_idle() && self.has_weapons() {
            if let Some(enemy) = self.nearest_enemy {
                tracing::trace!(unit = self.id, enemy = enemy.id, "Auto-engaging");
                self.start_attack_move(vec![enemy.id], None);
            }
        }
        self.update_attack_move(targets);
        self.seek_destination();

        let owner = OwnerView {
            id: self.id,
            position: self.position,
            angle: self.angle,
            max_speed: self.max_speed,
            driving: self.destination.is_some() || self.move_input.is_some(),
            enemy: self.nearest_enemy,
        };
        let mut pull = Vec2::ZERO;
        let mut hits = Vec::new();
        for platform in &mut self.platforms {
            let output = platform.update(&owner, config);
            pull += output.pull;
            hits.extend(output.hit);
        }

        match self.category {
            Category::Army => self.integrate_army(pull),
            Category::Unit => self.integrate_unit(),
        }
        self.shield.tick_flash();
        hits
    }

    fn reset_move_platforms(&mut self) {
        for platform in self.platforms.iter_mut().filter(|p| p.is_move()) {
            platform.reset();
        }
    }

    fn update_attack_move(&mut self, targets: &TargetSnapshot) {
        let Some(mut order) = self.attack_move.take() else {
            return;
        };

        order
            .targets
            .retain(|id| targets.get(*id).is_some_and(|t| t.alive && t.team != self.team));
        if order.targets.is_empty() && self.has_weapons() {
            if let Some(enemy) = self.nearest_enemy {
                order.targets.push(enemy.id);
            }
        }

        let mut nearest: Option<(f64, Vec2)> = None;
        for target in order.targets.iter().filter_map(|id| targets.get(*id)) {
            let distance = self.position.distance(target.position);
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, target.position));
            }
        }

        if let Some((distance, target)) = nearest {
            let halt = self.engagement_distance().unwrap_or(0.0);
            if distance <= halt {
                if self.destination.take().is_some() {
                    self.reset_move_platforms();
                }
                order.engaged = true;
            } else {
                self.destination = Some(target);
                order.engaged = false;
            }
            self.attack_move = Some(order);
            return;
        }

        match order.point {
            Some(point) if self.position.distance(point) > f64::EPSILON => {
                self.destination = Some(point);
                order.engaged = false;
                self.attack_move = Some(order);
            }
            _ => {
                if self.destination.take().is_some() {
                    self.reset_move_platforms();
                }
            }
        }
    }

    fn seek_destination(&mut self) {
        let Some(destination) = self.destination else {
            return;
        };
        if self.position.distance(destination) <= self.max_speed {
            self.position = destination;
            self.destination = None;
            self.reset_move_platforms();
            return;
        }
        if self.category == Category::Army {
            let bearing = self.position.angle_to(destination);
            for platform in self.platforms.iter_mut().filter(|p| p.is_move()) {
                platform.key_input_angle(bearing);
            }
        }
    }

    fn integrate_army(&mut self, pull: Vec2) {
        let has_drive = self.platforms.iter().any(Platform::is_move);
        let mut step = if has_drive {
            pull.clamp_length(self.max_speed)
        } else if let Some(destination) = self.destination {
            (destination - self.position).clamp_length(self.max_speed)
        } else if let Some(input) = self.move_input {
            Vec2::from_angle(input.angle) * self.max_speed
        } else {
            Vec2::ZERO
        };
        if let Some(destination) = self.destination {
            step = step.clamp_length(self.position.distance(destination));
        }
        self.position += step;

        let facing = if let Some(enemy) = self.nearest_enemy {
            Some(self.position.angle_to(enemy.position))
        } else if let Some(input) = self.move_input {
            Some(input.facing())
        } else if step.length() > f64::EPSILON {
            Some(step.angle())
        } else {
            None
        };
        if let Some(facing) = facing {
            self.rotate_towards(facing);
        }
    }

    fn integrate_unit(&mut self) {
        if let Some(input) = self.move_input {
            if self.rotate_towards(input.facing()) {
                self.position = self.position.offset(input.angle, self.max_speed);
            }
        } else if let Some(destination) = self.destination {
            let bearing = self.position.angle_to(destination);
            if self.rotate_towards(bearing) {
                let distance = self.position.distance(destination);
                self.position = self.position.offset(bearing, distance.min(self.max_speed));
            }
        } else if let Some(enemy) = self.nearest_enemy {
            self.rotate_towards(self.position.angle_to(enemy.position));
        }
    }
}

impl Damageable for Unit {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> f64 {
        self.size
    }

    fn team(&self) -> Team {
        self.team
    }

    fn hp(&self) -> Fixed {
        self.hp
    }

    fn is_alive(&self) -> bool {
        !self.dead
    }

    fn take_damage(&mut self, amount: Fixed) -> DamageOutcome {
        if self.dead {
            return DamageOutcome::default();
        }
        let outcome = absorb(&mut self.shield, &mut self.hp, amount);
        if outcome.shield_broken {
            self.shield.flash_ticks = self.shield.flash_duration;
            self.effects.push(UnitEffect::ShieldBroken);
        }
        outcome
    }
}
