//! Test fixtures and helpers.
//!
//! Pre-built unit specs and battle setups for consistent testing.

use nemo_core::components::{Category, PlatformKind, Team};
use nemo_core::math::{Fixed, Vec2};
use nemo_core::simulation::Simulation;
use nemo_core::unit::UnitSpec;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Army unit with one move platform and `weapons` attack platforms.
#[must_use]
pub fn army(team: Team, x: f64, y: f64, weapons: usize) -> UnitSpec {
    let mut platforms = vec![PlatformKind::Move];
    platforms.extend(std::iter::repeat(PlatformKind::Attack).take(weapons));
    UnitSpec::new(team, Vec2::new(x, y)).with_platforms(platforms)
}

/// Unarmed army unit.
#[must_use]
pub fn drone(team: Team, x: f64, y: f64) -> UnitSpec {
    army(team, x, y, 0)
}

/// Self-propelled unit with a single hand-held weapon.
#[must_use]
pub fn trooper(team: Team, x: f64, y: f64) -> UnitSpec {
    UnitSpec::new(team, Vec2::new(x, y))
        .with_platforms([PlatformKind::Attack])
        .category(Category::Unit)
}

/// Spawn every spec into a fresh simulation.
///
/// # Panics
///
/// Panics if any spec is rejected.
#[must_use]
pub fn spawn_all(specs: &[UnitSpec]) -> Simulation {
    let mut sim = Simulation::new();
    for spec in specs {
        sim.spawn_unit(spec).expect("fixture spec should spawn");
    }
    sim
}

/// Two facing lines of armed units, `per_side` each, `gap` apart.
#[must_use]
pub fn skirmish(per_side: u32, gap: f64) -> Simulation {
    let specs: Vec<UnitSpec> = (0..per_side)
        .flat_map(|i| {
            let y = f64::from(i) * 40.0;
            [army(Team::Red, 0.0, y, 2), army(Team::Blue, gap, y, 2)]
        })
        .collect();
    spawn_all(&specs)
}

/// Same-team units in a row `spacing` apart.
#[must_use]
pub fn column(team: Team, count: u32, spacing: f64) -> Vec<UnitSpec> {
    (0..count)
        .map(|i| drone(team, f64::from(i) * spacing, 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_army_loadout() {
        let spec = army(Team::Red, 0.0, 0.0, 2);
        assert_eq!(
            spec.platforms,
            vec![PlatformKind::Move, PlatformKind::Attack, PlatformKind::Attack]
        );
        assert_eq!(spec.category, Category::Army);
    }

    #[test]
    fn test_skirmish_spawns_both_sides() {
        let sim = skirmish(3, 500.0);
        assert_eq!(sim.unit_count(), 6);
        let red = sim.units().filter(|u| u.team == Team::Red).count();
        assert_eq!(red, 3);
    }
}
