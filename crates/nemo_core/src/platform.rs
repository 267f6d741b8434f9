//! Platforms: the move and attack appendages a unit owns.
//!
//! A platform is one enum-dispatched type. Shared kinematic state (position,
//! angle, distance from the owner, motion mode) lives on [`Platform`]; the
//! kind-specific state lives on [`PlatformVariant`].
//!
//! # Move platforms
//!
//! Move platforms are the drive mechanism of army units. They thrust away
//! from the owner along the commanded angle and, once extended past their
//! rest distance, pull the owner after them:
//!
//! ```text
//! |pull| = (current_distance - base_distance) * owner.max_speed / pull_divisor
//! ```
//!
//! The distance to the owner is clamped into `[base_distance, max_distance]`
//! after every update.
//!
//! # Attack platforms
//!
//! Attack platforms are re-mounted on the owner every tick, aim at the
//! owner's nearest enemy and fire hit-scan shots once locked on. They never
//! apply damage themselves: a shot is returned as a [`Hit`] and committed by
//! the simulation after every unit has updated.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::combat::{falloff_multiplier, Hit};
use crate::components::{AimMode, Category, MotionMode, PlatformKind, UnitId};
use crate::config::{PlatformTuning, SimConfig, WeaponTuning};
use crate::math::{
    angle_diff, fixed_from_f64, fixed_serde, lerp_angle, normalize_angle, step_angle, Fixed, Vec2,
};

/// Nearest opposing unit as seen from a unit this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyContact {
    /// Enemy id.
    pub id: UnitId,
    /// Enemy position.
    pub position: Vec2,
    /// Distance from the observing unit's center.
    pub distance: f64,
}

/// The owner state a platform needs for one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OwnerView {
    /// Owner id, used as the shot attacker.
    pub id: UnitId,
    /// Owner center.
    pub position: Vec2,
    /// Owner facing.
    pub angle: f64,
    /// Owner speed cap.
    pub max_speed: f64,
    /// Owner has a destination or active manual input.
    pub driving: bool,
    /// Owner's nearest enemy.
    pub enemy: Option<EnemyContact>,
}

/// What a platform produced this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlatformOutput {
    /// Pull applied to the owner (move platforms only).
    pub pull: Vec2,
    /// Shot fired (attack platforms only).
    pub hit: Option<Hit>,
}

/// Where an attack platform sits on its owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Mount {
    /// Held ahead of the owner; angle rigidly follows the owner.
    OnHand,
    /// Circles the owner at its own aim angle.
    Single,
    /// Fixed mount at this angle relative to the owner's facing.
    Slot(f64),
}

impl Mount {
    /// Mount for the `index`-th of `count` weapons on a unit.
    ///
    /// Two or more weapons are spread over fixed slots from `-π/2` to `π/2`.
    /// A lone weapon is held on-hand by self-propelled units and mounted
    /// free-aiming on army units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn for_loadout(index: usize, count: usize, category: Category) -> Self {
        if count >= 2 {
            Self::Slot(-FRAC_PI_2 + PI * index as f64 / (count - 1) as f64)
        } else if category == Category::Unit {
            Self::OnHand
        } else {
            Self::Single
        }
    }

    /// Fixed slot angle, if any.
    #[must_use]
    pub fn slot_angle(self) -> Option<f64> {
        match self {
            Self::Slot(angle) => Some(angle),
            Self::OnHand | Self::Single => None,
        }
    }
}

/// Transient shot trace kept for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotEffect {
    /// Muzzle position.
    pub origin: Vec2,
    /// Impact position.
    pub target: Vec2,
    /// Ticks until the trace disappears.
    pub ticks_left: u32,
}

/// Move-platform state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Drive {
    /// Pull produced by the last update.
    pub pull: Vec2,
}

/// Attack-platform state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Lock-on state.
    pub aim: AimMode,
    /// Maximum range.
    pub range: f64,
    /// Range up to which full power applies.
    pub effective_range: f64,
    /// Damage multiplier at maximum range.
    pub falloff_floor: f64,
    /// Damage per shot at full power.
    #[serde(with = "fixed_serde")]
    pub power: Fixed,
    /// Ticks between shots.
    pub cooldown_ticks: u32,
    /// Ticks until the next shot is allowed.
    pub cooldown_remaining: u32,
    /// Mounting.
    pub mount: Mount,
    /// Aim angle requested by manual input, used when no enemy is present.
    pub manual_aim: Option<f64>,
    /// Live shot traces.
    pub effects: Vec<ShotEffect>,
}

impl Weapon {
    /// Weapon with stats from tuning.
    #[must_use]
    pub fn from_config(config: &SimConfig, mount: Mount) -> Self {
        let tuning = &config.weapon;
        Self {
            aim: AimMode::Idle,
            range: tuning.range,
            effective_range: tuning.effective_range,
            falloff_floor: tuning.falloff_floor,
            power: Fixed::from_num(tuning.power),
            cooldown_ticks: config.cooldown_ticks(),
            cooldown_remaining: 0,
            mount,
            manual_aim: None,
            effects: Vec::new(),
        }
    }

    /// Damage of one shot at `distance`.
    #[must_use]
    pub fn damage_at(&self, distance: f64) -> Fixed {
        let multiplier = falloff_multiplier(
            distance,
            self.effective_range,
            self.range,
            self.falloff_floor,
        );
        self.power * fixed_from_f64(multiplier)
    }

    /// Farthest distance from the owner's center at which this weapon can
    /// reach a target straight ahead of the owner.
    ///
    /// A slot mount at forward offset `a` and lateral offset `b` reaches a
    /// point ahead at distance `d` when `(d - a)² + b² ≤ range²`, so the
    /// limit is `a + sqrt(range² - b²)`. Other mounts range from the owner
    /// center.
    ///
    /// `None` when the lateral offset alone exceeds the range: such a slot
    /// never reaches anything straight ahead.
    #[must_use]
    pub fn engagement_distance(&self, mount_distance: f64) -> Option<f64> {
        let Some(slot) = self.mount.slot_angle() else {
            return Some(self.range.max(0.0));
        };
        let forward = mount_distance * slot.cos();
        let lateral = mount_distance * slot.sin();
        if lateral.abs() > self.range {
            return None;
        }
        let reach = forward + (self.range * self.range - lateral * lateral).sqrt();
        Some(reach.max(0.0))
    }
}

/// Kind-specific platform state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlatformVariant {
    /// Locomotion appendage.
    Move(Drive),
    /// Weapon appendage.
    Attack(Weapon),
}

/// A platform mounted on a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    /// Absolute position.
    pub position: Vec2,
    /// Thrust angle (move) or aim angle (attack).
    pub angle: f64,
    /// Last commanded angle; the rest point lies along it.
    pub last_angle: f64,
    /// Distance from the owner after the last update.
    pub current_distance: f64,
    /// Rest distance.
    pub base_distance: f64,
    /// Maximum extension.
    pub max_distance: f64,
    /// Thrust speed.
    pub speed: f64,
    /// Motion state.
    pub mode: MotionMode,
    /// Kind-specific state.
    pub variant: PlatformVariant,
}

impl Platform {
    /// Move platform resting ahead of its owner.
    #[must_use]
    pub fn new_move(owner_position: Vec2, owner_angle: f64, tuning: &PlatformTuning) -> Self {
        let angle = normalize_angle(owner_angle);
        Self {
            position: owner_position.offset(angle, tuning.base_distance),
            angle,
            last_angle: angle,
            current_distance: tuning.base_distance,
            base_distance: tuning.base_distance,
            max_distance: tuning.max_distance,
            speed: 0.0,
            mode: MotionMode::Idle,
            variant: PlatformVariant::Move(Drive::default()),
        }
    }

    /// Attack platform on the given mount.
    #[must_use]
    pub fn new_attack(owner_position: Vec2, owner_angle: f64, mount: Mount, config: &SimConfig) -> Self {
        let distance = config.weapon.mount_distance;
        let angle = normalize_angle(owner_angle);
        let mount_angle = angle + mount.slot_angle().unwrap_or(0.0);
        Self {
            position: owner_position.offset(mount_angle, distance),
            angle,
            last_angle: angle,
            current_distance: distance,
            base_distance: distance,
            max_distance: distance,
            speed: 0.0,
            mode: MotionMode::Idle,
            variant: PlatformVariant::Attack(Weapon::from_config(config, mount)),
        }
    }

    /// Kind tag.
    #[must_use]
    pub fn kind(&self) -> PlatformKind {
        match self.variant {
            PlatformVariant::Move(_) => PlatformKind::Move,
            PlatformVariant::Attack(_) => PlatformKind::Attack,
        }
    }

    /// Whether this is a move platform.
    #[must_use]
    pub fn is_move(&self) -> bool {
        matches!(self.variant, PlatformVariant::Move(_))
    }

    /// Weapon state, for attack platforms.
    #[must_use]
    pub fn weapon(&self) -> Option<&Weapon> {
        match &self.variant {
            PlatformVariant::Attack(weapon) => Some(weapon),
            PlatformVariant::Move(_) => None,
        }
    }

    /// Mutable weapon state, for attack platforms.
    pub fn weapon_mut(&mut self) -> Option<&mut Weapon> {
        match &mut self.variant {
            PlatformVariant::Attack(weapon) => Some(weapon),
            PlatformVariant::Move(_) => None,
        }
    }

    /// Pull produced by the last update (zero for attack platforms).
    #[must_use]
    pub fn pull(&self) -> Vec2 {
        match &self.variant {
            PlatformVariant::Move(drive) => drive.pull,
            PlatformVariant::Attack(_) => Vec2::ZERO,
        }
    }

    /// Directional input.
    ///
    /// Move platforms start thrusting toward `angle`, orbiting first if they
    /// point elsewhere. Attack platforms take it as a manual aim unless they
    /// are locked on.
    pub fn key_input_angle(&mut self, angle: f64) {
        let angle = normalize_angle(angle);
        match &mut self.variant {
            PlatformVariant::Move(_) => {
                self.angle = angle;
                self.last_angle = angle;
                if matches!(self.mode, MotionMode::Idle | MotionMode::Return) {
                    self.mode = MotionMode::Orbit;
                }
            }
            PlatformVariant::Attack(weapon) => {
                if weapon.aim != AimMode::AttackOn {
                    weapon.manual_aim = Some(angle);
                }
            }
        }
    }

    /// Release input: move platforms return to rest, attack platforms drop
    /// any manual aim.
    pub fn reset(&mut self) {
        match &mut self.variant {
            PlatformVariant::Move(_) => self.mode = MotionMode::Return,
            PlatformVariant::Attack(weapon) => weapon.manual_aim = None,
        }
    }

    /// Advance one tick.
    pub fn update(&mut self, owner: &OwnerView, config: &SimConfig) -> PlatformOutput {
        if self.is_move() {
            PlatformOutput {
                pull: self.update_drive(owner, &config.platform),
                hit: None,
            }
        } else {
            PlatformOutput {
                pull: Vec2::ZERO,
                hit: self.update_weapon(owner, &config.weapon),
            }
        }
    }

    fn bearing_from(&self, origin: Vec2) -> f64 {
        let delta = self.position - origin;
        if delta.length() > f64::EPSILON {
            delta.angle()
        } else {
            self.last_angle
        }
    }

    fn update_drive(&mut self, owner: &OwnerView, tuning: &PlatformTuning) -> Vec2 {
        match self.mode {
            MotionMode::Idle => {}
            MotionMode::Orbit | MotionMode::MoveOn => {
                let bearing = self.bearing_from(owner.position);
                if angle_diff(bearing, self.angle).abs() > tuning.orbit_threshold {
                    self.mode = MotionMode::Orbit;
                }
                if self.mode == MotionMode::Orbit {
                    let (swung, reached) = step_angle(bearing, self.angle, tuning.orbit_speed);
                    self.position = owner.position.offset(swung, self.base_distance);
                    self.speed = 0.0;
                    if reached {
                        self.mode = MotionMode::MoveOn;
                    }
                } else {
                    self.speed = (self.speed + tuning.acceleration).min(tuning.max_speed);
                    self.position = self.position.offset(self.angle, self.speed);
                }
            }
            MotionMode::Return => {
                self.speed = (self.speed - tuning.deceleration).max(0.0);
                let rest = owner.position.offset(self.last_angle, self.base_distance);
                self.position = self.position.lerp(rest, tuning.return_lerp);
                if self.position.distance(rest) < tuning.return_epsilon {
                    self.mode = MotionMode::Idle;
                    self.speed = 0.0;
                }
            }
        }

        let distance = self.position.distance(owner.position);
        let bearing = self.bearing_from(owner.position);
        let clamped = distance.clamp(self.base_distance, self.max_distance);
        if distance < self.base_distance || distance > self.max_distance {
            self.position = owner.position.offset(bearing, clamped);
        }
        self.current_distance = clamped;

        let extension = clamped - self.base_distance;
        let pull = if owner.driving && extension > 0.0 {
            Vec2::from_angle(bearing) * (extension * owner.max_speed / tuning.pull_divisor)
        } else {
            Vec2::ZERO
        };
        if let PlatformVariant::Move(drive) = &mut self.variant {
            drive.pull = pull;
        }
        pull
    }

    fn update_weapon(&mut self, owner: &OwnerView, tuning: &WeaponTuning) -> Option<Hit> {
        let PlatformVariant::Attack(weapon) = &mut self.variant else {
            return None;
        };

        weapon.cooldown_remaining = weapon.cooldown_remaining.saturating_sub(1);
        weapon.effects.retain_mut(|effect| {
            effect.ticks_left = effect.ticks_left.saturating_sub(1);
            effect.ticks_left > 0
        });

        let mount_distance = self.base_distance;
        let (origin, rest) = match weapon.mount {
            Mount::OnHand | Mount::Single => (owner.position, owner.angle),
            Mount::Slot(slot) => {
                let mount_angle = normalize_angle(owner.angle + slot);
                (owner.position.offset(mount_angle, mount_distance), mount_angle)
            }
        };
        let target_angle = owner
            .enemy
            .map(|enemy| origin.angle_to(enemy.position))
            .or(weapon.manual_aim)
            .unwrap_or(rest);

        let on_hand = weapon.mount == Mount::OnHand;
        let current = if on_hand { owner.angle } else { self.angle };
        if owner.enemy.is_some() && angle_diff(current, target_angle).abs() <= tuning.aim_tolerance {
            weapon.aim = AimMode::AttackOn;
            if !on_hand {
                self.angle = normalize_angle(target_angle);
            }
        } else {
            weapon.aim = AimMode::Idle;
            if !on_hand {
                self.angle = lerp_angle(self.angle, target_angle, tuning.aim_lerp);
            }
        }
        if on_hand {
            self.angle = normalize_angle(owner.angle);
        }
        self.last_angle = self.angle;
        self.position = match weapon.mount {
            Mount::OnHand => owner.position.offset(owner.angle, mount_distance),
            Mount::Single => owner.position.offset(self.angle, mount_distance),
            Mount::Slot(_) => origin,
        };
        self.current_distance = mount_distance;

        let Some(enemy) = owner.enemy else {
            weapon.effects.clear();
            return None;
        };
        let distance = origin.distance(enemy.position);
        if distance > weapon.range {
            weapon.effects.clear();
            return None;
        }
        if weapon.aim != AimMode::AttackOn || weapon.cooldown_remaining > 0 {
            return None;
        }

        weapon.cooldown_remaining = weapon.cooldown_ticks;
        weapon.effects.push(ShotEffect {
            origin: self.position,
            target: enemy.position,
            ticks_left: tuning.effect_ticks,
        });
        let amount = weapon.damage_at(distance);
        tracing::trace!(
            attacker = owner.id,
            target = enemy.id,
            distance,
            damage = %amount,
            "Weapon fired"
        );
        Some(Hit {
            attacker: owner.id,
            target: enemy.id,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn owner_at(position: Vec2, driving: bool) -> OwnerView {
        OwnerView {
            id: 1,
            position,
            angle: 0.0,
            max_speed: 3.0,
            driving,
            enemy: None,
        }
    }

    fn enemy_at(id: UnitId, position: Vec2) -> Option<EnemyContact> {
        Some(EnemyContact {
            id,
            position,
            distance: position.length(),
        })
    }

    #[test]
    fn test_mount_for_loadout() {
        assert_eq!(Mount::for_loadout(0, 1, Category::Unit), Mount::OnHand);
        assert_eq!(Mount::for_loadout(0, 1, Category::Army), Mount::Single);
        assert_eq!(Mount::for_loadout(0, 2, Category::Army), Mount::Slot(-FRAC_PI_2));
        assert_eq!(Mount::for_loadout(1, 2, Category::Unit), Mount::Slot(FRAC_PI_2));
        let middle = Mount::for_loadout(1, 3, Category::Army).slot_angle().unwrap();
        assert!(middle.abs() < 1e-12);
    }

    #[test]
    fn test_move_on_accelerates_and_pulls_only_when_driving() {
        let config = SimConfig::default();
        let mut platform = Platform::new_move(Vec2::ZERO, 0.0, &config.platform);
        platform.key_input_angle(0.0);

        // First update promotes the aligned orbit to thrust.
        platform.update(&owner_at(Vec2::ZERO, true), &config);
        assert_eq!(platform.mode, MotionMode::MoveOn);

        let mut last_speed = 0.0;
        for _ in 0..5 {
            platform.update(&owner_at(Vec2::ZERO, true), &config);
            assert!(platform.speed >= last_speed);
            last_speed = platform.speed;
        }
        assert!(platform.speed <= config.platform.max_speed);
        assert!(platform.current_distance > config.platform.base_distance);
        let pull = platform.pull();
        assert!(pull.x > 0.0);
        assert!(pull.y.abs() < 1e-9);

        let idle_owner = platform.update(&owner_at(Vec2::ZERO, false), &config);
        assert_eq!(idle_owner.pull, Vec2::ZERO);
    }

    #[test]
    fn test_pull_magnitude_at_full_extension() {
        let config = SimConfig::default();
        let mut platform = Platform::new_move(Vec2::ZERO, 0.0, &config.platform);
        platform.key_input_angle(0.0);
        for _ in 0..100 {
            platform.update(&owner_at(Vec2::ZERO, true), &config);
        }
        assert!((platform.current_distance - config.platform.max_distance).abs() < 1e-9);
        // (120 - 60) * 3 / 50
        assert!((platform.pull().length() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_return_settles_to_idle_at_rest_point() {
        let config = SimConfig::default();
        let mut platform = Platform::new_move(Vec2::ZERO, 0.0, &config.platform);
        platform.key_input_angle(0.0);
        for _ in 0..30 {
            platform.update(&owner_at(Vec2::ZERO, false), &config);
        }
        platform.reset();
        assert_eq!(platform.mode, MotionMode::Return);
        for _ in 0..200 {
            platform.update(&owner_at(Vec2::ZERO, false), &config);
        }
        assert_eq!(platform.mode, MotionMode::Idle);
        assert_eq!(platform.speed, 0.0);
        let rest = Vec2::new(config.platform.base_distance, 0.0);
        assert!(platform.position.distance(rest) < config.platform.return_epsilon);
    }

    #[test]
    fn test_reversed_input_orbits_at_base_distance() {
        let config = SimConfig::default();
        let mut platform = Platform::new_move(Vec2::ZERO, 0.0, &config.platform);
        platform.key_input_angle(PI);
        platform.update(&owner_at(Vec2::ZERO, true), &config);
        assert_eq!(platform.mode, MotionMode::Orbit);
        assert!((platform.current_distance - config.platform.base_distance).abs() < 1e-9);

        let mut ticks = 1;
        while platform.mode == MotionMode::Orbit {
            platform.update(&owner_at(Vec2::ZERO, true), &config);
            assert!((platform.current_distance - config.platform.base_distance).abs() < 1e-9);
            ticks += 1;
            assert!(ticks < 100, "orbit never finished");
        }
        assert_eq!(platform.mode, MotionMode::MoveOn);
        assert!(platform.position.x < 0.0);
    }

    #[test]
    fn test_owner_at_platform_does_not_produce_nan() {
        let config = SimConfig::default();
        let mut platform = Platform::new_move(Vec2::ZERO, 0.5, &config.platform);
        let owner = owner_at(platform.position, true);
        platform.update(&owner, &config);
        assert!(platform.position.is_finite());
        assert!((platform.current_distance - config.platform.base_distance).abs() < 1e-9);
    }

    #[test]
    fn test_weapon_locks_and_fires_on_cadence() {
        let config = SimConfig::default();
        let mut platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::Single, &config);
        let mut owner = owner_at(Vec2::ZERO, false);
        owner.enemy = enemy_at(2, Vec2::new(100.0, 0.0));

        let first = platform.update(&owner, &config);
        assert_eq!(platform.weapon().unwrap().aim, AimMode::AttackOn);
        let hit = first.hit.expect("locked weapon fires immediately");
        assert_eq!(hit.target, 2);
        assert_eq!(hit.amount, Fixed::from_num(config.weapon.power));

        for _ in 1..config.cooldown_ticks() {
            assert!(platform.update(&owner, &config).hit.is_none());
        }
        assert!(platform.update(&owner, &config).hit.is_some());
    }

    #[test]
    fn test_weapon_turns_gradually_before_locking() {
        let config = SimConfig::default();
        let mut platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::Single, &config);
        let mut owner = owner_at(Vec2::ZERO, false);
        owner.enemy = enemy_at(2, Vec2::new(0.0, 100.0));

        let out = platform.update(&owner, &config);
        assert!(out.hit.is_none());
        assert_eq!(platform.weapon().unwrap().aim, AimMode::Idle);
        assert!((platform.angle - FRAC_PI_2 * config.weapon.aim_lerp).abs() < 1e-9);

        let mut fired = false;
        for _ in 0..100 {
            if platform.update(&owner, &config).hit.is_some() {
                fired = true;
                break;
            }
        }
        assert!(fired);
    }

    #[test]
    fn test_on_hand_follows_owner_angle() {
        let config = SimConfig::default();
        let mut platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::OnHand, &config);
        let mut owner = owner_at(Vec2::ZERO, false);
        owner.angle = 1.0;
        owner.enemy = enemy_at(2, Vec2::new(100.0, 0.0));

        let out = platform.update(&owner, &config);
        assert!(out.hit.is_none());
        assert!((platform.angle - 1.0).abs() < 1e-12);
        let expected = Vec2::ZERO.offset(1.0, config.weapon.mount_distance);
        assert!(platform.position.distance(expected) < 1e-9);
    }

    #[test]
    fn test_out_of_range_clears_effects() {
        let config = SimConfig::default();
        let mut platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::Single, &config);
        let mut owner = owner_at(Vec2::ZERO, false);
        owner.enemy = enemy_at(2, Vec2::new(100.0, 0.0));
        platform.update(&owner, &config);
        assert_eq!(platform.weapon().unwrap().effects.len(), 1);

        owner.enemy = enemy_at(2, Vec2::new(400.0, 0.0));
        platform.update(&owner, &config);
        assert!(platform.weapon().unwrap().effects.is_empty());
    }

    #[test]
    fn test_manual_aim_ignored_while_locked() {
        let config = SimConfig::default();
        let mut platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::Single, &config);
        let mut owner = owner_at(Vec2::ZERO, false);
        owner.enemy = enemy_at(2, Vec2::new(100.0, 0.0));
        platform.update(&owner, &config);

        platform.key_input_angle(2.0);
        assert_eq!(platform.weapon().unwrap().manual_aim, None);

        owner.enemy = None;
        platform.update(&owner, &config);
        platform.key_input_angle(2.0);
        assert_eq!(platform.weapon().unwrap().manual_aim, Some(2.0));
    }

    #[test]
    fn test_damage_falloff_applies() {
        let config = SimConfig::default();
        let platform = Platform::new_attack(Vec2::ZERO, 0.0, Mount::Single, &config);
        let weapon = platform.weapon().unwrap();
        assert_eq!(weapon.damage_at(100.0), Fixed::from_num(1));
        assert_eq!(weapon.damage_at(240.0), Fixed::from_num(0.75));
    }

    #[test]
    fn test_engagement_distance_for_side_slots() {
        let config = SimConfig::default();
        let mount = config.weapon.mount_distance;
        let mut weapon = Weapon::from_config(&config, Mount::Slot(FRAC_PI_2));
        weapon.range = 200.0;
        let expected = (200.0_f64 * 200.0 - mount * mount).sqrt();
        assert!((weapon.engagement_distance(mount).unwrap() - expected).abs() < 1e-9);

        weapon.range = mount;
        assert!(weapon.engagement_distance(mount).unwrap() < 1e-9);
        weapon.range = 10.0;
        assert_eq!(weapon.engagement_distance(mount), None);

        let single = Weapon::from_config(&config, Mount::Single);
        assert_eq!(single.engagement_distance(mount), Some(config.weapon.range));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Input(f64),
        Reset,
        MoveOwner(f64, f64),
        Tick,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-10.0f64..10.0).prop_map(Op::Input),
            Just(Op::Reset),
            (-8.0f64..8.0, -8.0f64..8.0).prop_map(|(x, y)| Op::MoveOwner(x, y)),
            Just(Op::Tick),
            Just(Op::Tick),
        ]
    }

    proptest! {
        #[test]
        fn prop_move_platform_distance_stays_clamped(ops in prop::collection::vec(op_strategy(), 1..200)) {
            let config = SimConfig::default();
            let mut platform = Platform::new_move(Vec2::ZERO, 0.0, &config.platform);
            let mut owner = owner_at(Vec2::ZERO, true);

            for op in ops {
                match op {
                    Op::Input(angle) => platform.key_input_angle(angle),
                    Op::Reset => platform.reset(),
                    Op::MoveOwner(dx, dy) => owner.position += Vec2::new(dx, dy),
                    Op::Tick => {}
                }
                platform.update(&owner, &config);
                prop_assert!(platform.current_distance >= config.platform.base_distance);
                prop_assert!(platform.current_distance <= config.platform.max_distance);
                prop_assert!(platform.position.is_finite());
                let live = platform.position.distance(owner.position);
                prop_assert!((live - platform.current_distance).abs() < 1e-6);
            }
        }
    }
}
