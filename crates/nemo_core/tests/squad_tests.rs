//! Squad tests that drive the full tick loop.

use nemo_core::prelude::*;
use nemo_test_utils::fixtures::{column, drone, spawn_all};

fn fingerprints(sim: &Simulation) -> Vec<String> {
    sim.squads()
        .squads()
        .iter()
        .map(|s| s.fingerprint.clone())
        .collect()
}

#[test]
fn test_distant_units_form_separate_squads() {
    let mut sim = spawn_all(&[
        drone(Team::Red, 0.0, 0.0),
        drone(Team::Red, 100.0, 0.0),
        drone(Team::Red, 2000.0, 0.0),
        drone(Team::Blue, 50.0, 50.0),
    ]);
    sim.tick();
    assert_eq!(fingerprints(&sim), vec!["1,2", "3", "4"]);
}

#[test]
fn test_squads_merge_when_units_close_in() {
    let mut sim = spawn_all(&[
        drone(Team::Red, 0.0, 0.0),
        drone(Team::Red, 100.0, 0.0),
        drone(Team::Red, 1000.0, 0.0),
    ]);
    sim.tick();
    assert_eq!(fingerprints(&sim), vec!["1,2", "3"]);

    sim.queue_command(Command::SetDestination {
        unit: 3,
        point: Vec2::new(200.0, 0.0),
    })
    .unwrap();
    for _ in 0..600 {
        sim.tick();
    }
    assert_eq!(fingerprints(&sim), vec!["1,2,3"]);
}

#[test]
fn test_long_chain_is_split_by_extent() {
    let mut sim = spawn_all(&column(Team::Red, 5, 500.0));
    sim.tick();

    let squads = sim.squads().squads();
    assert!(squads.len() > 1);
    let max_group = sim.config().max_group();
    for squad in squads {
        assert!(squad.bounds.w <= max_group, "{} too wide", squad.fingerprint);
    }
    let total: usize = squads.iter().map(Squad::len).sum();
    assert_eq!(total, 5);
}

#[test]
fn test_squad_destination_moves_formation() {
    let mut sim = spawn_all(&column(Team::Red, 3, 60.0));
    sim.tick();
    assert_eq!(fingerprints(&sim), vec!["1,2,3"]);

    let target = Vec2::new(60.0, 900.0);
    sim.queue_command(Command::SetSquadDestination {
        fingerprint: "1,2,3".into(),
        point: target,
    })
    .unwrap();
    sim.queue_command(Command::SelectSquad {
        fingerprint: "1,2,3".into(),
        selected: true,
    })
    .unwrap();

    for _ in 0..1500 {
        sim.tick();
    }

    let squad = sim.squads().find("1,2,3").expect("formation held together");
    assert!(squad.selected);
    assert!(squad.destination.is_none());
    for unit in sim.units() {
        let distance = unit.position.distance(target);
        assert!(distance < 150.0, "unit {} ended {distance} away", unit.id);
    }
}

#[test]
fn test_opposing_squads_face_each_other() {
    let mut sim = spawn_all(&[drone(Team::Red, 0.0, 0.0), drone(Team::Blue, 0.0, 400.0)]);
    for _ in 0..200 {
        sim.tick();
    }

    let red = sim.squads().find("1").unwrap();
    let blue = sim.squads().find("2").unwrap();
    assert!(red.head_on && blue.head_on);
    assert_eq!(red.primary_target.as_deref(), Some("2"));
    let toward_blue = std::f64::consts::FRAC_PI_2;
    assert!(nemo_core::math::angle_diff(red.primary_direction, toward_blue).abs() < 0.05);
}
