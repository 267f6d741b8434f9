//! Per-tick squad rebuild.
//!
//! Squad membership is derived state. Every tick the manager:
//! 1. clusters live units by link distance and splits oversized groups
//! 2. matches the new squads to last tick's by fingerprint and carries
//!    selection, group destination and smoothed directions forward
//! 3. links opposing squads (primary/secondary targets, head-on pairs,
//!    defensive contacts)
//! 4. smooths each squad's directions
//! 5. advances group destinations and hands out formation slots, either a
//!    V behind the leader or two lines abreast
//!
//! Units never hold a reference to their squad; use
//! [`SquadManager::squad_of`] instead.

use std::collections::BTreeMap;

use crate::components::{ArmyClass, UnitId};
use crate::config::{FormationKind, SimConfig};
use crate::error::{Result, SimError};
use crate::math::{lerp_angle, Vec2};
use crate::squad::{cluster, enforce_max_extent, formation_slots, line_slots, Member, Squad};
use crate::unit::Unit;

/// Owns the current squads and the unit → squad index.
#[derive(Debug, Clone, Default)]
pub struct SquadManager {
    squads: Vec<Squad>,
    membership: BTreeMap<UnitId, usize>,
}

impl SquadManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current squads, ordered by leader id.
    #[must_use]
    pub fn squads(&self) -> &[Squad] {
        &self.squads
    }

    /// Squad containing `unit`.
    #[must_use]
    pub fn squad_of(&self, unit: UnitId) -> Option<&Squad> {
        self.membership
            .get(&unit)
            .and_then(|index| self.squads.get(*index))
    }

    /// Squad with this fingerprint.
    #[must_use]
    pub fn find(&self, fingerprint: &str) -> Option<&Squad> {
        self.squads.iter().find(|s| s.fingerprint == fingerprint)
    }

    fn find_mut(&mut self, fingerprint: &str) -> Result<&mut Squad> {
        self.squads
            .iter_mut()
            .find(|s| s.fingerprint == fingerprint)
            .ok_or_else(|| SimError::SquadNotFound(fingerprint.to_string()))
    }

    /// Give a squad a group destination.
    pub fn set_destination(&mut self, fingerprint: &str, point: Vec2) -> Result<()> {
        self.find_mut(fingerprint)?.set_destination(point);
        Ok(())
    }

    /// Toggle squad selection.
    pub fn set_selected(&mut self, fingerprint: &str, selected: bool) -> Result<()> {
        self.find_mut(fingerprint)?.selected = selected;
        Ok(())
    }

    /// Rebuild squads from the live units and assign formation slots.
    pub fn update(&mut self, units: &mut BTreeMap<UnitId, Unit>, config: &SimConfig) {
        let members: Vec<Member> = units
            .values()
            .filter(|unit| !unit.dead)
            .map(|unit| Member {
                id: unit.id,
                team: unit.team,
                position: unit.position,
                size: unit.size,
                weight: config.class_weight(unit.class),
                max_speed: unit.max_speed,
            })
            .collect();

        let mut squads: Vec<Squad> = cluster(&members, config.link_distance())
            .into_iter()
            .flat_map(|component| enforce_max_extent(component, config.max_group()))
            .map(|piece| Squad::from_members(&piece, &config.squad))
            .collect();
        squads.sort_by_key(Squad::leader);

        let previous = std::mem::take(&mut self.squads);
        let by_fingerprint: BTreeMap<&str, &Squad> = previous
            .iter()
            .map(|squad| (squad.fingerprint.as_str(), squad))
            .collect();
        for squad in &mut squads {
            if let Some(prev) = by_fingerprint.get(squad.fingerprint.as_str()) {
                squad.inherit(prev);
            } else {
                let facing = squad
                    .leader()
                    .and_then(|id| units.get(&id))
                    .map_or(0.0, |unit| unit.angle);
                squad.primary_direction = facing;
                squad.secondary_direction = facing;
            }
        }
        if squads.len() != previous.len() {
            tracing::debug!(
                before = previous.len(),
                after = squads.len(),
                "Squads regrouped"
            );
        }

        let links = link_squads(&mut squads, config.squad.recognition_radius);
        smooth_directions(&mut squads, &links, config);
        assign_formations(&mut squads, units, config);

        self.membership = squads
            .iter()
            .enumerate()
            .flat_map(|(index, squad)| squad.members.iter().map(move |id| (*id, index)))
            .collect();
        self.squads = squads;
    }
}

/// Index-based combat links for one tick.
struct Links {
    primary: Vec<Option<usize>>,
    contacts: Vec<Vec<usize>>,
}

fn link_squads(squads: &mut [Squad], radius: f64) -> Links {
    let count = squads.len();
    let mut primary = vec![None; count];
    let mut secondary = vec![None; count];

    for i in 0..count {
        let mut candidates: Vec<(f64, usize)> = (0..count)
            .filter(|&j| squads[j].team != squads[i].team)
            .map(|j| (squads[i].centroid.distance(squads[j].centroid), j))
            .filter(|(distance, _)| *distance <= radius)
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        primary[i] = candidates.first().map(|c| c.1);
        secondary[i] = candidates.get(1).map(|c| c.1);
    }

    let mut contacts = vec![Vec::new(); count];
    for (source, target) in secondary.iter().enumerate() {
        if let Some(target) = *target {
            if primary[target] != Some(source) {
                contacts[target].push(source);
            }
        }
    }

    let fingerprints: Vec<String> = squads.iter().map(|s| s.fingerprint.clone()).collect();
    for (i, squad) in squads.iter_mut().enumerate() {
        squad.primary_target = primary[i].map(|j| fingerprints[j].clone());
        squad.secondary_target = secondary[i].map(|j| fingerprints[j].clone());
        squad.head_on = primary[i].is_some_and(|j| primary[j] == Some(i));
        squad.defensive_contacts = contacts[i].iter().map(|&j| fingerprints[j].clone()).collect();
    }

    Links { primary, contacts }
}

fn smooth_directions(squads: &mut [Squad], links: &Links, config: &SimConfig) {
    let centroids: Vec<Vec2> = squads.iter().map(|s| s.centroid).collect();

    for (i, squad) in squads.iter_mut().enumerate() {
        let speed = squad.class.rotation_speed(&config.squad.rotation_speeds);
        let centroid = squad.centroid;

        let heading = if let Some(enemy) = links.primary[i] {
            Some(centroid.angle_to(centroids[enemy]))
        } else if let Some(last) = squad
            .last_centroid
            .filter(|last| last.distance(centroid) > config.squad.min_drift)
        {
            Some(last.angle_to(centroid))
        } else {
            squad.destination.map(|point| centroid.angle_to(point))
        };
        if let Some(heading) = heading {
            squad.primary_direction = lerp_angle(squad.primary_direction, heading, speed);
        }

        let flank = links.contacts[i]
            .first()
            .map_or(squad.primary_direction, |&j| centroid.angle_to(centroids[j]));
        squad.secondary_direction = lerp_angle(squad.secondary_direction, flank, speed);
    }
}

fn assign_formations(squads: &mut [Squad], units: &mut BTreeMap<UnitId, Unit>, config: &SimConfig) {
    for squad in squads.iter_mut() {
        let Some(lead) = squad.advance_virtual_point() else {
            continue;
        };
        let direction = squad.primary_direction;
        let slots = match config.squad.formation {
            FormationKind::Vee => {
                formation_slots(&squad.members, lead, direction, config.formation_spacing())
            }
            FormationKind::Lines => {
                let roster: Vec<(UnitId, ArmyClass)> = squad
                    .members
                    .iter()
                    .filter_map(|id| units.get(id).map(|unit| (*id, unit.class)))
                    .collect();
                line_slots(&roster, lead, direction, config.line_width(), config.line_depth())
            }
        };
        for (id, slot) in slots {
            if let Some(unit) = units.get_mut(&id) {
                if unit.attack_move.is_none() && unit.move_input.is_none() {
                    unit.assign_formation_slot(slot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Team;
    use crate::math::angle_diff;
    use crate::squad::{member_bounds, SquadClass};
    use crate::unit::UnitSpec;
    use std::collections::BTreeSet;
    use std::f64::consts::FRAC_PI_2;

    fn world(specs: &[(Team, f64, f64)]) -> BTreeMap<UnitId, Unit> {
        let config = SimConfig::default();
        specs
            .iter()
            .enumerate()
            .map(|(i, (team, x, y))| {
                let id = i as UnitId + 1;
                let spec = UnitSpec::from_tags(*team, Vec2::new(*x, *y), &["move"]).unwrap();
                (id, Unit::from_spec(id, &spec, &config).unwrap())
            })
            .collect()
    }

    #[test]
    fn test_update_builds_membership() {
        let config = SimConfig::default();
        let mut units = world(&[
            (Team::Red, 0.0, 0.0),
            (Team::Red, 100.0, 0.0),
            (Team::Blue, 50.0, 0.0),
        ]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);

        assert_eq!(manager.squads().len(), 2);
        assert_eq!(manager.squad_of(1).unwrap().fingerprint, "1,2");
        assert_eq!(manager.squad_of(2).unwrap().fingerprint, "1,2");
        assert_eq!(manager.squad_of(3).unwrap().fingerprint, "3");
        assert!(manager.squad_of(4).is_none());
    }

    #[test]
    fn test_heavy_units_weigh_more() {
        let config = SimConfig::default();
        let mut units = world(&[(Team::Red, 0.0, 0.0), (Team::Red, 60.0, 0.0)]);
        for unit in units.values_mut() {
            unit.class = ArmyClass::Heavy;
        }
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);
        let squad = &manager.squads()[0];
        assert_eq!(squad.weight, 6);
        assert_eq!(squad.class, SquadClass::Troop);
    }

    #[test]
    fn test_selection_follows_fingerprint() {
        let config = SimConfig::default();
        let mut units = world(&[(Team::Red, 0.0, 0.0), (Team::Red, 100.0, 0.0)]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);
        manager.set_selected("1,2", true).unwrap();

        manager.update(&mut units, &config);
        assert!(manager.find("1,2").unwrap().selected);

        units.get_mut(&2).unwrap().position = Vec2::new(5000.0, 0.0);
        manager.update(&mut units, &config);
        assert!(!manager.find("1").unwrap().selected);
        assert!(!manager.find("2").unwrap().selected);
    }

    #[test]
    fn test_unknown_squad_is_an_error() {
        let mut manager = SquadManager::new();
        assert!(matches!(
            manager.set_destination("9", Vec2::ZERO),
            Err(SimError::SquadNotFound(fp)) if fp == "9"
        ));
    }

    #[test]
    fn test_oversized_chain_is_split() {
        let config = SimConfig::default();
        let positions: Vec<(Team, f64, f64)> = (0..8)
            .map(|i| (Team::Red, f64::from(i) * 500.0, 0.0))
            .collect();
        let mut units = world(&positions);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);

        let mut seen = BTreeSet::new();
        for squad in manager.squads() {
            let members: Vec<Member> = squad
                .members
                .iter()
                .map(|id| {
                    let unit = &units[id];
                    Member {
                        id: *id,
                        team: unit.team,
                        position: unit.position,
                        size: unit.size,
                        weight: 1,
                        max_speed: unit.max_speed,
                    }
                })
                .collect();
            assert!(!member_bounds(&members).exceeds(config.max_group()));
            assert_eq!(squad.bounds, member_bounds(&members));
            for id in &squad.members {
                assert!(seen.insert(*id), "unit {id} in two squads");
            }
        }
        let all: BTreeSet<UnitId> = units.keys().copied().collect();
        assert_eq!(seen, all);
    }

    #[test]
    fn test_combat_links() {
        let config = SimConfig::default();
        // 1: blue X, 2: red A, 3: red B, 4: blue Y
        let mut units = world(&[
            (Team::Blue, 0.0, 0.0),
            (Team::Red, -700.0, 0.0),
            (Team::Red, 650.0, 0.0),
            (Team::Blue, -1300.0, 0.0),
        ]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);

        let x = manager.find("1").unwrap();
        let a = manager.find("2").unwrap();
        let b = manager.find("3").unwrap();
        let y = manager.find("4").unwrap();

        assert_eq!(x.primary_target.as_deref(), Some("3"));
        assert!(x.head_on && b.head_on);
        assert_eq!(a.primary_target.as_deref(), Some("4"));
        assert_eq!(a.secondary_target.as_deref(), Some("1"));
        assert!(a.head_on && y.head_on);
        // X and A hold each other as secondary while facing someone else.
        assert_eq!(x.defensive_contacts, vec!["2".to_string()]);
        assert_eq!(a.defensive_contacts, vec!["1".to_string()]);
        assert!(b.defensive_contacts.is_empty() && y.defensive_contacts.is_empty());
    }

    #[test]
    fn test_direction_turns_toward_enemy_gradually() {
        let config = SimConfig::default();
        let mut units = world(&[(Team::Red, 0.0, 0.0), (Team::Blue, 0.0, 700.0)]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);

        let red = manager.find("1").unwrap();
        let expected = std::f64::consts::FRAC_PI_2 * config.squad.rotation_speeds.squad;
        assert!((red.primary_direction - expected).abs() < 1e-9);
    }

    #[test]
    fn test_direction_follows_centroid_drift_without_enemies() {
        let config = SimConfig::default();
        let mut units = world(&[(Team::Red, 0.0, 0.0)]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);
        assert_eq!(manager.find("1").unwrap().primary_direction, 0.0);

        for _ in 0..40 {
            units.get_mut(&1).unwrap().position.y += 3.0;
            manager.update(&mut units, &config);
        }
        let squad = manager.find("1").unwrap();
        assert!(angle_diff(squad.primary_direction, FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_secondary_direction_turns_to_defensive_contact() {
        let config = SimConfig::default();
        // Same layout as the combat links test, with A lifted off the axis.
        let mut units = world(&[
            (Team::Blue, 0.0, 0.0),
            (Team::Red, -700.0, 100.0),
            (Team::Red, 650.0, 0.0),
            (Team::Blue, -1300.0, 0.0),
        ]);
        let mut manager = SquadManager::new();
        for _ in 0..60 {
            manager.update(&mut units, &config);
        }

        let x = manager.find("1").unwrap();
        assert_eq!(x.defensive_contacts, vec!["2".to_string()]);
        let toward_contact = Vec2::ZERO.angle_to(Vec2::new(-700.0, 100.0));
        assert!(angle_diff(x.secondary_direction, toward_contact).abs() < 1e-3);
        assert!(x.primary_direction.abs() < 1e-3);
    }

    #[test]
    fn test_company_turns_slower_than_squad() {
        let config = SimConfig::default();
        let error_after = |specs: &[(Team, f64, f64)], heavy: bool| {
            let mut units = world(specs);
            if heavy {
                for unit in units.values_mut().filter(|u| u.team == Team::Red) {
                    unit.class = ArmyClass::Heavy;
                }
            }
            let mut manager = SquadManager::new();
            for _ in 0..10 {
                manager.update(&mut units, &config);
            }
            let squad = manager.squad_of(1).unwrap();
            (squad.class, angle_diff(squad.primary_direction, FRAC_PI_2).abs())
        };

        let lone = [(Team::Red, 0.0, 0.0), (Team::Blue, 0.0, 700.0)];
        let mut line: Vec<(Team, f64, f64)> = (0..13)
            .map(|i| (Team::Red, -360.0 + 60.0 * f64::from(i), 0.0))
            .collect();
        line.push((Team::Blue, 0.0, 700.0));

        let (small_class, small_error) = error_after(&lone[..], false);
        let (large_class, large_error) = error_after(line.as_slice(), true);
        assert_eq!(small_class, SquadClass::Squad);
        assert_eq!(large_class, SquadClass::Company);
        assert!(large_error > small_error);
    }

    #[test]
    fn test_line_formation_puts_every_fourth_member_behind() {
        let mut config = SimConfig::default();
        config.squad.formation = FormationKind::Lines;
        let mut units = world(&[
            (Team::Red, 0.0, -60.0),
            (Team::Red, 0.0, 0.0),
            (Team::Red, 0.0, 60.0),
            (Team::Red, 0.0, 120.0),
        ]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);
        manager.set_destination("1,2,3,4", Vec2::new(1000.0, 30.0)).unwrap();
        manager.update(&mut units, &config);

        let center = units[&2].destination.unwrap();
        assert!(center.distance(Vec2::new(config.army.max_speed, 30.0)) < 1e-9);
        let left = units[&1].destination.unwrap();
        let right = units[&3].destination.unwrap();
        assert!((right.y - left.y - config.line_width()).abs() < 1e-9);
        let rear = units[&4].destination.unwrap();
        assert!(rear.distance(center - Vec2::new(config.line_depth(), 0.0)) < 1e-9);
    }

    #[test]
    fn test_formation_assigns_slots_to_free_members() {
        let config = SimConfig::default();
        let mut units = world(&[
            (Team::Red, 0.0, 0.0),
            (Team::Red, 0.0, 60.0),
            (Team::Red, 0.0, -60.0),
        ]);
        let mut manager = SquadManager::new();
        manager.update(&mut units, &config);
        manager.set_destination("1,2,3", Vec2::new(1000.0, 0.0)).unwrap();
        units.get_mut(&3).unwrap().start_attack_move(Vec::new(), Some(Vec2::new(0.0, -500.0)));

        manager.update(&mut units, &config);

        let lead = units[&1].destination.unwrap();
        assert!((lead.x - config.army.max_speed).abs() < 1e-9);
        assert!(lead.y.abs() < 1e-9);
        let wing = units[&2].destination.unwrap();
        assert!(wing.x < lead.x);
        assert!(units[&3].destination.is_none());
        assert!(manager.find("1,2,3").unwrap().destination.is_some());
    }
}
