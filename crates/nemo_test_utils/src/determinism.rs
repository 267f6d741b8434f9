//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism the harness is meant to catch:
//!
//! - **Map iteration order**: units and squads must be visited in id order.
//! - **Update order leaking into combat**: every unit reads the same target
//!   snapshot and damage is committed after all units have moved.
//! - **Hidden state**: anything not captured by
//!   [`Simulation::state_hash`](nemo_core::simulation::Simulation::state_hash)
//!   that still steers behaviour.

use std::thread;

use nemo_core::components::Command;
use nemo_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "Simulation is non-deterministic!\n\
             Runs: {}\n\
             Ticks: {}\n\
             Unique hashes: {} (expected 1)\n\
             All hashes: {:?}",
            self.hashes.len(),
            self.ticks,
            self.unique_hashes().len(),
            self.hashes
        );
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Example
///
/// ```
/// use nemo_test_utils::determinism::verify_determinism;
/// use nemo_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,
///     50,
///     || skirmish(2, 400.0),
///     |sim| {
///         sim.tick();
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run the same setup twice and compare final state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Replay a scripted command list against a fresh simulation.
///
/// `script` pairs a tick number with a command queued just before that tick
/// runs. Commands the simulation rejects are logged at debug level and
/// skipped, the same way a client would drop an invalid order.
pub fn run_script<F>(setup_fn: F, script: &[(u64, Command)], num_ticks: u64) -> u64
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for tick in 0..num_ticks {
        for (_, command) in script.iter().filter(|(at, _)| *at == tick) {
            if let Err(err) = sim.queue_command(command.clone()) {
                tracing::debug!(tick, error = %err, "Scripted command rejected");
            }
        }
        sim.tick();
    }
    sim.state_hash()
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for determinism testing.
pub mod strategies {
    use nemo_core::components::{Command, Team, UnitId};
    use nemo_core::math::Vec2;
    use nemo_core::unit::UnitSpec;
    use proptest::prelude::*;

    use crate::fixtures::army;

    /// Position within a 2000x2000 battlefield centred on the origin.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (-1000.0..1000.0f64, -1000.0..1000.0f64).prop_map(|(x, y)| Vec2::new(x, y))
    }

    /// Army unit of either team with up to three weapons.
    pub fn arb_unit_spec() -> impl Strategy<Value = UnitSpec> {
        (any::<bool>(), arb_position(), 0usize..=3).prop_map(|(red, p, weapons)| {
            let team = if red { Team::Red } else { Team::Blue };
            army(team, p.x, p.y, weapons)
        })
    }

    /// Unit-level command addressed to an id in `1..=max_id`.
    pub fn arb_command(max_id: UnitId) -> impl Strategy<Value = Command> {
        let unit = 1..=max_id;
        prop_oneof![
            (unit.clone(), arb_position())
                .prop_map(|(unit, point)| Command::SetDestination { unit, point }),
            (
                unit.clone(),
                proptest::collection::vec(1..=max_id, 0..3),
                proptest::option::of(arb_position()),
            )
                .prop_map(|(unit, targets, point)| Command::StartAttackMove {
                    unit,
                    targets,
                    point
                }),
            unit.clone().prop_map(|unit| Command::ClearAttackMove { unit }),
            (unit.clone(), -3.0..3.0f64, any::<bool>())
                .prop_map(|(unit, angle, reverse)| Command::MoveInput { unit, angle, reverse }),
            unit.prop_map(|unit| Command::ResetMoveInput { unit }),
        ]
    }
}
