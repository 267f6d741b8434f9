//! Headless battle runner.
//!
//! Runs a [`Scenario`] to completion and condenses the tick events into a
//! JSON-serializable [`BattleSummary`].

use std::collections::BTreeMap;

use nemo_core::components::{Team, UnitId};
use nemo_core::config::SimConfig;
use nemo_core::simulation::{Simulation, TickEvents, WorldSnapshot};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scenario::{Scenario, ScenarioError};

/// Per-team tally at the end of a battle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSummary {
    /// Units spawned.
    pub spawned: usize,
    /// Units still alive.
    pub alive: usize,
    /// Remaining hit points across survivors.
    pub hp_remaining: f64,
    /// Hits landed on the other team.
    pub hits: u64,
    /// Damage dealt to hit points.
    pub damage_dealt: f64,
    /// Damage soaked by enemy shields.
    pub damage_shielded: f64,
    /// Shields this team broke.
    pub shields_broken: u64,
}

/// Outcome of one headless battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Scenario name.
    pub scenario: String,
    /// Ticks actually simulated.
    pub ticks: u64,
    /// Tick at which one side was wiped out.
    pub decided_at: Option<u64>,
    /// Surviving team when the other was wiped out.
    pub winner: Option<Team>,
    /// Per-team tallies.
    pub teams: BTreeMap<Team, TeamSummary>,
    /// Deaths in order, with the tick they happened on.
    pub deaths: Vec<(u64, UnitId)>,
    /// Orders the simulation rejected.
    pub rejected_orders: usize,
    /// Squads alive at the end.
    pub squads: usize,
    /// Final state hash.
    pub state_hash: u64,
    /// Final world view, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<WorldSnapshot>,
}

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Override the scenario's tick count.
    pub ticks: Option<u64>,
    /// Keep running after one side is wiped out.
    pub run_to_end: bool,
    /// Include the final snapshot in the summary.
    pub snapshot: bool,
}

/// Drives a scenario and collects statistics.
pub struct HeadlessRunner {
    scenario: Scenario,
    sim: Simulation,
    teams: BTreeMap<Team, TeamSummary>,
    roster: BTreeMap<UnitId, Team>,
    deaths: Vec<(u64, UnitId)>,
    rejected_orders: usize,
}

impl HeadlessRunner {
    /// Build the scenario's starting state.
    pub fn new(scenario: Scenario, config: &SimConfig) -> Result<Self, ScenarioError> {
        let sim = scenario.build(config)?;
        let mut teams: BTreeMap<Team, TeamSummary> = BTreeMap::new();
        for team in [Team::Red, Team::Blue] {
            teams.insert(team, TeamSummary::default());
        }
        let roster: BTreeMap<UnitId, Team> = sim.units().map(|u| (u.id, u.team)).collect();
        for team in roster.values() {
            teams.entry(*team).or_default().spawned += 1;
        }
        Ok(Self {
            scenario,
            sim,
            teams,
            roster,
            deaths: Vec::new(),
            rejected_orders: 0,
        })
    }

    /// The running simulation.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Queue this tick's orders, tick once and record the events.
    pub fn step(&mut self) -> TickEvents {
        let tick = self.sim.get_tick();
        for order in self.scenario.orders.iter().filter(|o| o.tick == tick) {
            if let Err(err) = self.sim.queue_command(order.command.clone()) {
                tracing::warn!(tick, error = %err, "Scenario order rejected");
                self.rejected_orders += 1;
            }
        }

        let events = self.sim.tick();
        self.record(&events);
        events
    }

    fn record(&mut self, events: &TickEvents) {
        for damage in &events.damage_events {
            let Some(&team) = self.roster.get(&damage.attacker) else {
                continue;
            };
            let entry = self.teams.entry(team).or_default();
            entry.hits += 1;
            entry.damage_dealt += damage.outcome.hp_lost.to_num::<f64>();
            entry.damage_shielded += damage.outcome.shield_absorbed.to_num::<f64>();
            if damage.outcome.shield_broken {
                entry.shields_broken += 1;
            }
        }
        for id in &events.deaths {
            self.deaths.push((events.tick, *id));
        }
    }

    fn survivors(&self, team: Team) -> usize {
        self.sim.units().filter(|u| u.team == team).count()
    }

    /// Team left standing, if the other side has been wiped out.
    #[must_use]
    pub fn winner(&self) -> Option<Team> {
        [Team::Red, Team::Blue].into_iter().find(|team| {
            let enemy = team.opponent();
            self.survivors(*team) > 0
                && self.survivors(enemy) == 0
                && self.teams.get(&enemy).is_some_and(|t| t.spawned > 0)
        })
    }

    /// Run to completion and summarize.
    pub fn run(mut self, options: &RunOptions) -> BattleSummary {
        let ticks = options.ticks.unwrap_or(self.scenario.ticks);
        let mut decided_at = None;

        tracing::info!(scenario = %self.scenario.name, ticks, "Battle started");
        for _ in 0..ticks {
            self.step();
            if decided_at.is_none() && self.winner().is_some() {
                decided_at = Some(self.sim.get_tick());
                tracing::info!(tick = self.sim.get_tick(), winner = ?self.winner(), "Battle decided");
                if !options.run_to_end {
                    break;
                }
            }
        }

        let winner = self.winner();
        let mut teams = std::mem::take(&mut self.teams);
        for unit in self.sim.units() {
            let entry = teams.entry(unit.team).or_default();
            entry.alive += 1;
            entry.hp_remaining += unit.hp.to_num::<f64>();
        }

        BattleSummary {
            scenario: self.scenario.name.clone(),
            ticks: self.sim.get_tick(),
            decided_at,
            winner,
            teams,
            deaths: self.deaths,
            rejected_orders: self.rejected_orders,
            squads: self.sim.squads().squads().len(),
            state_hash: self.sim.state_hash(),
            snapshot: options.snapshot.then(|| self.sim.snapshot()),
        }
    }
}

/// Run a scenario once.
pub fn run_scenario(
    scenario: &Scenario,
    config: &SimConfig,
    options: &RunOptions,
) -> Result<BattleSummary, ScenarioError> {
    Ok(HeadlessRunner::new(scenario.clone(), config)?.run(options))
}

/// Run a scenario `runs` times in parallel and return each final hash.
pub fn verify_determinism(
    scenario: &Scenario,
    config: &SimConfig,
    runs: usize,
) -> Result<Vec<u64>, ScenarioError> {
    let options = RunOptions {
        run_to_end: true,
        ..RunOptions::default()
    };
    (0..runs)
        .into_par_iter()
        .map(|_| run_scenario(scenario, config, &options).map(|summary| summary.state_hash))
        .collect()
}
