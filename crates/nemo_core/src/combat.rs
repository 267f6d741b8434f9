//! Threshold-shield damage resolution and range falloff.
//!
//! Shields are not flat damage reduction. A shield has a depletable pool
//! and a per-hit strength threshold:
//! - while the pool is up, each hit is reduced by the strength and the
//!   remainder drains the pool
//! - damage that overflows the pool carries over to hit points
//! - once the pool is empty, hits land on hit points in full
//!
//! All accounting uses [`Fixed`] so that totals are exact.

use serde::{Deserialize, Serialize};

use crate::components::{Team, UnitId};
use crate::math::{clamp_ratio, fixed_serde, Fixed, Vec2};

/// Shield pool with a per-hit threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    /// Remaining pool.
    #[serde(with = "fixed_serde")]
    pub hp: Fixed,
    /// Pool size.
    #[serde(with = "fixed_serde")]
    pub max_hp: Fixed,
    /// Amount subtracted from every hit while the pool is up.
    #[serde(with = "fixed_serde")]
    pub strength: Fixed,
    /// Ticks left on the shield-broken flash.
    pub flash_ticks: u32,
    /// Flash length started when the pool breaks.
    pub flash_duration: u32,
}

impl Shield {
    /// No shield at all.
    pub const NONE: Self = Self {
        hp: Fixed::ZERO,
        max_hp: Fixed::ZERO,
        strength: Fixed::ZERO,
        flash_ticks: 0,
        flash_duration: 0,
    };

    /// Full shield with the given pool and threshold.
    #[must_use]
    pub fn new(max_hp: u32, strength: u32) -> Self {
        Self {
            hp: Fixed::from_num(max_hp),
            max_hp: Fixed::from_num(max_hp),
            strength: Fixed::from_num(strength),
            flash_ticks: 0,
            flash_duration: 0,
        }
    }

    /// Set how long the broken flash lasts.
    #[must_use]
    pub fn with_flash(mut self, ticks: u32) -> Self {
        self.flash_duration = ticks;
        self
    }

    /// Whether the broken flash is showing.
    #[must_use]
    pub fn is_flashing(&self) -> bool {
        self.flash_ticks > 0
    }

    /// Whether the pool still absorbs hits.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.hp > Fixed::ZERO
    }

    /// Remaining pool as a fraction of its size (0 for no shield).
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.max_hp <= Fixed::ZERO {
            0.0
        } else {
            (self.hp / self.max_hp).to_num::<f64>()
        }
    }

    /// Tick down the broken flash.
    pub fn tick_flash(&mut self) {
        self.flash_ticks = self.flash_ticks.saturating_sub(1);
    }
}

impl Default for Shield {
    fn default() -> Self {
        Self::NONE
    }
}

/// What a single hit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DamageOutcome {
    /// Damage taken by the shield pool.
    #[serde(with = "fixed_serde")]
    pub shield_absorbed: Fixed,
    /// Damage taken by hit points.
    #[serde(with = "fixed_serde")]
    pub hp_lost: Fixed,
    /// The pool reached zero on this hit.
    pub shield_broken: bool,
}

/// Apply `amount` to a shield and hit-point pool.
///
/// Non-positive amounts are ignored. The shield never goes below zero.
pub fn absorb(shield: &mut Shield, hp: &mut Fixed, amount: Fixed) -> DamageOutcome {
    let mut outcome = DamageOutcome::default();
    if amount <= Fixed::ZERO {
        return outcome;
    }

    if !shield.is_up() {
        *hp -= amount;
        outcome.hp_lost = amount;
        return outcome;
    }

    let effective = (amount - shield.strength).max(Fixed::ZERO);
    let remaining = shield.hp - effective;

    if remaining >= Fixed::ZERO {
        outcome.shield_absorbed = effective;
        shield.hp = remaining;
    } else {
        let excess = -remaining;
        outcome.shield_absorbed = shield.hp;
        outcome.hp_lost = excess;
        shield.hp = Fixed::ZERO;
        *hp -= excess;
    }
    outcome.shield_broken = shield.hp == Fixed::ZERO;
    outcome
}

/// Damage multiplier for a shot at `distance`.
///
/// Full power up to `effective_range`, then linear down to `floor` at
/// `max_range`. A degenerate span (max ≤ effective) applies the floor
/// beyond the effective range.
#[must_use]
pub fn falloff_multiplier(distance: f64, effective_range: f64, max_range: f64, floor: f64) -> f64 {
    if distance <= effective_range {
        return 1.0;
    }
    let span = max_range - effective_range;
    let t = if span > 0.0 {
        clamp_ratio((distance - effective_range) / span)
    } else {
        1.0
    };
    1.0 - (1.0 - clamp_ratio(floor)) * t
}

/// A resolved hit-scan shot waiting for the commit phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Firing unit.
    pub attacker: UnitId,
    /// Struck unit.
    pub target: UnitId,
    /// Damage after falloff.
    #[serde(with = "fixed_serde")]
    pub amount: Fixed,
}

/// Damage applied during a tick, reported to the game layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Firing unit.
    pub attacker: UnitId,
    /// Struck unit.
    pub target: UnitId,
    /// How the damage was split.
    pub outcome: DamageOutcome,
}

/// Anything an attack platform can shoot at.
///
/// Units implement this; other entity kinds can join combat by doing the same.
pub trait Damageable {
    /// World position.
    fn position(&self) -> Vec2;
    /// Footprint size.
    fn size(&self) -> f64;
    /// Owning team.
    fn team(&self) -> Team;
    /// Remaining hit points.
    fn hp(&self) -> Fixed;
    /// Whether the entity can still be targeted.
    fn is_alive(&self) -> bool;
    /// Apply one hit.
    fn take_damage(&mut self, amount: Fixed) -> DamageOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_shield_exactly_depleted_spares_hp() {
        // amount 5, strength 2, pool 3: effective 3 empties the pool exactly.
        let mut shield = Shield::new(3, 2);
        let mut hp = fx(20);
        let outcome = absorb(&mut shield, &mut hp, fx(5));

        assert_eq!(shield.hp, Fixed::ZERO);
        assert_eq!(hp, fx(20));
        assert_eq!(outcome.shield_absorbed, fx(3));
        assert_eq!(outcome.hp_lost, Fixed::ZERO);
        assert!(outcome.shield_broken);
    }

    #[test]
    fn test_shield_overflow_carries_to_hp() {
        // amount 5, strength 2, pool 1: 1 - 3 = -2, pool clamps, hp loses 2.
        let mut shield = Shield::new(10, 2);
        shield.hp = fx(1);
        let mut hp = fx(20);
        let outcome = absorb(&mut shield, &mut hp, fx(5));

        assert_eq!(shield.hp, Fixed::ZERO);
        assert_eq!(hp, fx(18));
        assert_eq!(outcome.hp_lost, fx(2));
        assert!(outcome.shield_broken);
    }

    #[test]
    fn test_hit_below_threshold_does_nothing() {
        let mut shield = Shield::new(10, 2);
        let mut hp = fx(20);
        let outcome = absorb(&mut shield, &mut hp, fx(2));

        assert_eq!(shield.hp, fx(10));
        assert_eq!(hp, fx(20));
        assert_eq!(outcome, DamageOutcome::default());
    }

    #[test]
    fn test_depleted_shield_lets_full_hit_through() {
        let mut shield = Shield::new(10, 2);
        shield.hp = Fixed::ZERO;
        let mut hp = fx(20);
        absorb(&mut shield, &mut hp, fx(5));
        assert_eq!(hp, fx(15));
    }

    #[test]
    fn test_no_shield() {
        let mut shield = Shield::NONE;
        let mut hp = fx(10);
        let outcome = absorb(&mut shield, &mut hp, fx(4));
        assert_eq!(hp, fx(6));
        assert!(!outcome.shield_broken);
        assert_eq!(shield.ratio(), 0.0);
    }

    #[test]
    fn test_negative_amount_ignored() {
        let mut shield = Shield::NONE;
        let mut hp = fx(10);
        absorb(&mut shield, &mut hp, fx(-4));
        assert_eq!(hp, fx(10));
    }

    #[test]
    fn test_falloff_curve() {
        assert_eq!(falloff_multiplier(100.0, 200.0, 280.0, 0.5), 1.0);
        assert_eq!(falloff_multiplier(200.0, 200.0, 280.0, 0.5), 1.0);
        assert!((falloff_multiplier(240.0, 200.0, 280.0, 0.5) - 0.75).abs() < 1e-12);
        assert!((falloff_multiplier(280.0, 200.0, 280.0, 0.5) - 0.5).abs() < 1e-12);
        assert!((falloff_multiplier(500.0, 200.0, 280.0, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_falloff_degenerate_span_is_finite() {
        let m = falloff_multiplier(300.0, 280.0, 280.0, 0.25);
        assert!(m.is_finite());
        assert!((m - 0.25).abs() < 1e-12);
    }
}
