//! Headless Nemo battle runner.
//!
//! Runs battles without graphics. Summaries go to stdout as JSON, logs go
//! to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p nemo_headless -- run
//!
//! # Run a scenario for a fixed number of ticks and save the summary
//! cargo run -p nemo_headless -- run --scenario line.ron --ticks 3600 --output summary.json
//!
//! # Check scenario and tuning files without running them
//! cargo run -p nemo_headless -- validate --scenario line.ron --config tuning.ron
//!
//! # Run the same scenario several times and compare hashes
//! cargo run -p nemo_headless -- verify --scenario line.ron --runs 8
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nemo_core::config::SimConfig;
use nemo_headless::{load_config, run_scenario, verify_determinism, RunOptions, Scenario};

#[derive(Parser)]
#[command(name = "nemo_headless")]
#[command(about = "Headless Nemo battle runner for scenario testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single battle
    Run {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Tuning file to load
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the scenario's tick count
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Keep running after one side is wiped out
        #[arg(long)]
        run_to_end: bool,

        /// Include the final world snapshot
        #[arg(long)]
        snapshot: bool,

        /// Write the summary here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check scenario and tuning files
    Validate {
        /// Scenario file to check
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Tuning file to check
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Tuning file to load
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for summaries)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            config,
            ticks,
            run_to_end,
            snapshot,
            output,
        }) => {
            let options = RunOptions {
                ticks,
                run_to_end,
                snapshot,
            };
            cmd_run(scenario.as_deref(), config.as_deref(), &options, output);
        }
        Some(Commands::Validate { scenario, config }) => {
            cmd_validate(scenario.as_deref(), config.as_deref());
        }
        Some(Commands::Verify {
            scenario,
            config,
            runs,
        }) => {
            cmd_verify(scenario.as_deref(), config.as_deref(), runs);
        }
        None => {
            cmd_run(None, None, &RunOptions::default(), None);
        }
    }
}

/// Load the scenario and tuning, exiting on failure.
fn load_inputs(scenario: Option<&Path>, config: Option<&Path>) -> (Scenario, SimConfig) {
    let scenario = match scenario {
        Some(path) => {
            tracing::info!("Loading scenario from: {}", path.display());
            match Scenario::load(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Failed to load scenario: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => Scenario::skirmish(),
    };

    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    (scenario, config)
}

/// Run a single battle
fn cmd_run(
    scenario: Option<&Path>,
    config: Option<&Path>,
    options: &RunOptions,
    output: Option<PathBuf>,
) {
    let (scenario, config) = load_inputs(scenario, config);

    let summary = match run_scenario(&scenario, &config, options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to run scenario: {e}");
            std::process::exit(1);
        }
    };

    let json = match serde_json::to_string_pretty(&summary) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Failed to encode summary: {e}");
            std::process::exit(1);
        }
    };

    if let Some(out_path) = output {
        if let Err(e) = std::fs::write(&out_path, &json) {
            eprintln!("Failed to write summary: {e}");
            std::process::exit(1);
        }
        eprintln!("Summary saved to: {}", out_path.display());
    } else {
        println!("{json}");
    }
}

/// Check scenario and tuning files
fn cmd_validate(scenario: Option<&Path>, config: Option<&Path>) {
    let (scenario, config) = load_inputs(scenario, config);

    match scenario.validate(&config) {
        Ok(()) => eprintln!(
            "OK: {} ({} units, {} orders)",
            scenario.name,
            scenario.unit_count(),
            scenario.orders.len()
        ),
        Err(e) => {
            eprintln!("Invalid scenario: {e}");
            std::process::exit(1);
        }
    }
}

/// Verify determinism across repeated runs
fn cmd_verify(scenario: Option<&Path>, config: Option<&Path>, runs: usize) {
    let (scenario, config) = load_inputs(scenario, config);
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    let hashes = match verify_determinism(&scenario, &config, runs) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to run scenario: {e}");
            std::process::exit(1);
        }
    };

    if hashes.windows(2).all(|w| w[0] == w[1]) {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected! Hashes: {hashes:?}");
        std::process::exit(1);
    }
}
