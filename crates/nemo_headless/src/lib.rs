//! Headless battle runner for scenario testing and CI verification.
//!
//! Loads a RON [`Scenario`] plus optional RON tuning, runs the simulation
//! without graphics and reports a JSON [`BattleSummary`].
//!
//! # Example
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p nemo_headless -- run
//!
//! # Run a scenario file with custom tuning and keep the final snapshot
//! cargo run -p nemo_headless -- run --scenario line.ron --config tuning.ron --snapshot
//!
//! # Verify determinism
//! cargo run -p nemo_headless -- verify --scenario line.ron --runs 8
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod runner;
pub mod scenario;

pub use runner::{run_scenario, verify_determinism, BattleSummary, HeadlessRunner, RunOptions};
pub use scenario::{load_config, Scenario, ScenarioError, ScheduledOrder, UnitPlacement};
