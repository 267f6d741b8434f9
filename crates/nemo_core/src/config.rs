//! Simulation tuning.
//!
//! All constants the state machines read live here so a scenario can
//! override them from a RON file. Every struct is `#[serde(default)]`,
//! so a tuning file only needs the values it changes.
//!
//! # Example RON
//!
//! ```ron
//! (
//!     tick_rate: 60,
//!     weapon: (
//!         range: 280.0,
//!         effective_range: 200.0,
//!         power: 1,
//!     ),
//!     squad: (
//!         link_cells: 15.0,
//!     ),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{ArmyClass, Category};
use crate::error::{Result, SimError};

/// Per-category unit stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTuning {
    /// Starting hit points.
    pub hp: u32,
    /// Maximum displacement per tick.
    pub max_speed: f64,
    /// Maximum body rotation per tick (radians).
    pub turn_rate: f64,
    /// Side length of the unit's square footprint.
    pub size: f64,
}

impl UnitTuning {
    fn army() -> Self {
        Self {
            hp: 45,
            max_speed: 3.0,
            turn_rate: 0.05,
            size: 50.0,
        }
    }

    fn unit() -> Self {
        Self {
            hp: 30,
            max_speed: 2.0,
            turn_rate: 0.1,
            size: 50.0,
        }
    }
}

impl Default for UnitTuning {
    fn default() -> Self {
        Self::army()
    }
}

/// Shield pool handed to units spawned with `shielded: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldTuning {
    /// Shield pool size.
    pub max_hp: u32,
    /// Per-hit threshold subtracted before the pool takes damage.
    pub strength: u32,
    /// Ticks the shield-broken flash stays visible.
    pub flash_ticks: u32,
}

impl Default for ShieldTuning {
    fn default() -> Self {
        Self {
            max_hp: 10,
            strength: 2,
            flash_ticks: 12,
        }
    }
}

/// Move platform kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformTuning {
    /// Rest distance from the owner.
    pub base_distance: f64,
    /// Maximum extension from the owner.
    pub max_distance: f64,
    /// Thrust speed cap.
    pub max_speed: f64,
    /// Speed gained per tick in `MoveOn`.
    pub acceleration: f64,
    /// Speed lost per tick in `Return`.
    pub deceleration: f64,
    /// Fraction of the remaining gap closed per tick in `Return`.
    pub return_lerp: f64,
    /// Distance to the rest point at which `Return` becomes `Idle`.
    pub return_epsilon: f64,
    /// Bearing error (radians) above which a thrust command orbits first.
    pub orbit_threshold: f64,
    /// Orbit angular speed (radians per tick).
    pub orbit_speed: f64,
    /// Pull magnitude is `(current - base) * owner_max_speed / pull_divisor`.
    pub pull_divisor: f64,
}

impl Default for PlatformTuning {
    fn default() -> Self {
        Self {
            base_distance: 60.0,
            max_distance: 120.0,
            max_speed: 5.0,
            acceleration: 0.7,
            deceleration: 0.3,
            return_lerp: 0.1,
            return_epsilon: 2.0,
            orbit_threshold: 0.1,
            orbit_speed: 0.1,
            pull_divisor: 50.0,
        }
    }
}

/// Weapon platform stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponTuning {
    /// Maximum range.
    pub range: f64,
    /// Range up to which full power applies.
    pub effective_range: f64,
    /// Damage multiplier at maximum range.
    pub falloff_floor: f64,
    /// Damage per shot at full power.
    pub power: u32,
    /// Shots per second.
    pub attacks_per_second: f64,
    /// Aim error (radians) within which the weapon locks on.
    pub aim_tolerance: f64,
    /// Fraction of the aim error closed per tick.
    pub aim_lerp: f64,
    /// Distance of the weapon mount from the owner's center.
    pub mount_distance: f64,
    /// Ticks a shot effect stays queued.
    pub effect_ticks: u32,
}

impl Default for WeaponTuning {
    fn default() -> Self {
        Self {
            range: 280.0,
            effective_range: 200.0,
            falloff_floor: 0.5,
            power: 1,
            attacks_per_second: 1.0,
            aim_tolerance: 6.0_f64.to_radians(),
            aim_lerp: 0.1,
            mount_distance: 30.0,
            effect_ticks: 6,
        }
    }
}

/// Squad rotation speed (fraction of the arc closed per tick) by size class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSpeeds {
    /// Smallest groups.
    pub squad: f64,
    /// Small groups.
    pub troop: f64,
    /// Medium groups.
    pub platoon: f64,
    /// Largest groups.
    pub company: f64,
}

impl Default for RotationSpeeds {
    fn default() -> Self {
        Self {
            squad: 0.2,
            troop: 0.12,
            platoon: 0.08,
            company: 0.04,
        }
    }
}

/// Formation a squad holds while moving to a group destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormationKind {
    /// Wedge behind the lowest-id member.
    #[default]
    Vee,
    /// Front and rear line abreast, heavy units in the rear.
    Lines,
}

/// Squad clustering, classification and formation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadTuning {
    /// Link distance in grid cells.
    pub link_cells: f64,
    /// Maximum bounding-box side in grid cells.
    pub max_group_cells: f64,
    /// Radius within which an opposing squad can be targeted.
    pub recognition_radius: f64,
    /// Classification weight of a standard unit.
    pub standard_weight: u32,
    /// Classification weight of a heavy unit.
    pub heavy_weight: u32,
    /// Minimum weight classed as a troop.
    pub troop_min_weight: u32,
    /// Minimum weight classed as a platoon.
    pub platoon_min_weight: u32,
    /// Minimum weight classed as a company.
    pub company_min_weight: u32,
    /// Direction smoothing per size class.
    pub rotation_speeds: RotationSpeeds,
    /// Formation used for group moves.
    pub formation: FormationKind,
    /// V-formation slot spacing in grid cells.
    pub formation_spacing_cells: f64,
    /// Width of each line in grid cells; members spread evenly across it.
    pub line_width_cells: f64,
    /// Gap between the front and rear line in grid cells.
    pub line_depth_cells: f64,
    /// Centroid movement below which the inertial direction is ignored.
    pub min_drift: f64,
}

impl Default for SquadTuning {
    fn default() -> Self {
        Self {
            link_cells: 15.0,
            max_group_cells: 40.0,
            recognition_radius: 800.0,
            standard_weight: 1,
            heavy_weight: 3,
            troop_min_weight: 5,
            platoon_min_weight: 13,
            company_min_weight: 37,
            rotation_speeds: RotationSpeeds::default(),
            formation: FormationKind::Vee,
            formation_spacing_cells: 1.2,
            line_width_cells: 5.0,
            line_depth_cells: 2.0,
            min_drift: 0.01,
        }
    }
}

/// Complete simulation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Grid cell size in world units.
    pub cell_size: f64,
    /// Radius within which a unit recognizes enemies.
    pub recognition_radius: f64,
    /// Platform-driven unit stats.
    pub army: UnitTuning,
    /// Self-propelled unit stats.
    pub unit: UnitTuning,
    /// Shield stats.
    pub shield: ShieldTuning,
    /// Move platform kinematics.
    pub platform: PlatformTuning,
    /// Weapon stats.
    pub weapon: WeaponTuning,
    /// Squad behaviour.
    pub squad: SquadTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            cell_size: 40.0,
            recognition_radius: 500.0,
            army: UnitTuning::army(),
            unit: UnitTuning::unit(),
            shield: ShieldTuning::default(),
            platform: PlatformTuning::default(),
            weapon: WeaponTuning::default(),
            squad: SquadTuning::default(),
        }
    }
}

impl SimConfig {
    /// Parse a (possibly partial) tuning file and validate it.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| SimError::ConfigParse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tuning that would make the state machines degenerate.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(SimError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        }

        if self.tick_rate == 0 {
            return Err(SimError::InvalidConfig("tick_rate must be non-zero".into()));
        }
        positive("cell_size", self.cell_size)?;
        positive("recognition_radius", self.recognition_radius)?;
        for (name, tuning) in [("army", &self.army), ("unit", &self.unit)] {
            positive(&format!("{name}.max_speed"), tuning.max_speed)?;
            positive(&format!("{name}.turn_rate"), tuning.turn_rate)?;
            positive(&format!("{name}.size"), tuning.size)?;
        }
        positive("platform.base_distance", self.platform.base_distance)?;
        if self.platform.max_distance < self.platform.base_distance {
            return Err(SimError::InvalidConfig(format!(
                "platform.max_distance ({}) is below base_distance ({})",
                self.platform.max_distance, self.platform.base_distance
            )));
        }
        positive("platform.pull_divisor", self.platform.pull_divisor)?;
        positive("weapon.range", self.weapon.range)?;
        positive("weapon.attacks_per_second", self.weapon.attacks_per_second)?;
        if !(0.0..=1.0).contains(&self.weapon.falloff_floor) {
            return Err(SimError::InvalidConfig(format!(
                "weapon.falloff_floor must be within [0, 1], got {}",
                self.weapon.falloff_floor
            )));
        }
        positive("squad.link_cells", self.squad.link_cells)?;
        positive("squad.max_group_cells", self.squad.max_group_cells)?;
        positive("squad.line_width_cells", self.squad.line_width_cells)?;
        positive("squad.line_depth_cells", self.squad.line_depth_cells)?;
        Ok(())
    }

    /// Ticks between two shots of a weapon.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cooldown_ticks(&self) -> u32 {
        let ticks = (f64::from(self.tick_rate) / self.weapon.attacks_per_second).round();
        (ticks as u32).max(1)
    }

    /// Stats for a unit category.
    #[must_use]
    pub fn unit_tuning(&self, category: Category) -> &UnitTuning {
        match category {
            Category::Army => &self.army,
            Category::Unit => &self.unit,
        }
    }

    /// Distance under which two same-team units belong to one squad.
    #[must_use]
    pub fn link_distance(&self) -> f64 {
        self.cell_size * self.squad.link_cells
    }

    /// Maximum squad bounding-box side.
    #[must_use]
    pub fn max_group(&self) -> f64 {
        self.cell_size * self.squad.max_group_cells
    }

    /// Spacing between formation slots.
    #[must_use]
    pub fn formation_spacing(&self) -> f64 {
        self.cell_size * self.squad.formation_spacing_cells
    }

    /// Width of a line in the two-line formation.
    #[must_use]
    pub fn line_width(&self) -> f64 {
        self.cell_size * self.squad.line_width_cells
    }

    /// Distance between the front and rear line.
    #[must_use]
    pub fn line_depth(&self) -> f64 {
        self.cell_size * self.squad.line_depth_cells
    }

    /// Classification weight of an army class.
    #[must_use]
    pub fn class_weight(&self, class: ArmyClass) -> u32 {
        match class {
            ArmyClass::Standard => self.squad.standard_weight,
            ArmyClass::Heavy => self.squad.heavy_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_derived_distances() {
        let config = SimConfig::default();
        assert_eq!(config.link_distance(), 600.0);
        assert_eq!(config.max_group(), 1600.0);
        assert_eq!(config.cooldown_ticks(), 60);
        assert_eq!(config.line_width(), 200.0);
        assert_eq!(config.line_depth(), 80.0);
    }

    #[test]
    fn test_formation_kind_from_ron() {
        assert_eq!(SimConfig::default().squad.formation, FormationKind::Vee);
        let config = SimConfig::from_ron_str("(squad: (formation: Lines))").unwrap();
        assert_eq!(config.squad.formation, FormationKind::Lines);
        assert_eq!(config.squad.line_width_cells, 5.0);
    }

    #[test]
    fn test_partial_ron_overrides_only_named_fields() {
        let config = SimConfig::from_ron_str("(tick_rate: 30, weapon: (range: 800.0))").unwrap();
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.weapon.range, 800.0);
        assert_eq!(config.weapon.power, WeaponTuning::default().power);
        assert_eq!(config.platform, PlatformTuning::default());
        assert_eq!(config.cooldown_ticks(), 30);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = SimConfig::from_ron_str("(tick_rate: \"fast\")").unwrap_err();
        assert!(matches!(err, SimError::ConfigParse { .. }));
    }

    #[test]
    fn test_validate_rejects_inverted_distances() {
        let mut config = SimConfig::default();
        config.platform.max_distance = 10.0;
        assert!(matches!(
            config.validate(),
            Err(SimError::InvalidConfig(msg)) if msg.contains("max_distance")
        ));
    }

    #[test]
    fn test_validate_rejects_zero_tick_rate() {
        let config = SimConfig {
            tick_rate: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_class_weights() {
        let config = SimConfig::default();
        assert_eq!(config.class_weight(ArmyClass::Standard), 1);
        assert_eq!(config.class_weight(ArmyClass::Heavy), 3);
    }
}
