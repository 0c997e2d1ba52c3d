//! tally-cli: run reward distributions from JSON scenario files.
//!
//! Loads a scenario (engine config, window, pools with schedules and stake
//! events), runs one distribution per pool, aggregates the pools into a
//! rewards list and writes the export as JSON.

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use tally_core::{Timestamp, TokenId, VestingSource};
use tally_engine::{RewardsList, RewardsRecord};

use crate::scenario::Scenario;

/// Vesting-stream distribution by multiplier-weighted share-seconds.
#[derive(Parser, Debug)]
#[command(name = "tally-cli", version, about)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one reward cycle and write the rewards list.
    Distribute(DistributeArgs),
    /// Print the cumulative vested amount of a token.
    Vested(VestedArgs),
    /// Print per-tranche unlock progress.
    Schedules(SchedulesArgs),
}

#[derive(Args, Debug)]
struct DistributeArgs {
    /// Scenario file.
    #[arg(short, long)]
    scenario: PathBuf,

    /// Output file (default: stdout).
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Reward cycle number recorded in the output.
    #[arg(short, long, default_value_t = 0)]
    cycle: u64,
}

#[derive(Args, Debug)]
struct VestedArgs {
    #[arg(short, long)]
    scenario: PathBuf,

    #[arg(short, long)]
    token: String,

    /// Timestamp in seconds.
    #[arg(long, allow_hyphen_values = true)]
    at: Timestamp,
}

#[derive(Args, Debug)]
struct SchedulesArgs {
    #[arg(short, long)]
    scenario: PathBuf,

    /// Timestamp in seconds.
    #[arg(long, allow_hyphen_values = true)]
    at: Timestamp,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Distribute(args) => cmd_distribute(args),
        Commands::Vested(args) => cmd_vested(args),
        Commands::Schedules(args) => cmd_schedules(args),
    }
}

fn cmd_distribute(args: DistributeArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let record = run_cycle(&scenario, args.cycle)?;
    let json = record.to_json().context("failed to serialize rewards list")?;

    match args.out {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote rewards list");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Distribute every pool of `scenario` and aggregate the results.
fn run_cycle(scenario: &Scenario, cycle: u64) -> Result<RewardsRecord> {
    let config = config::from_env(scenario.config.clone())?;
    let tokens = scenario.tokens();
    let window = scenario.window;
    let mut list = RewardsList::new(cycle);

    for (name, engine) in scenario.engines(&config)? {
        let result = engine
            .run_distribution(window.start(), window.end(), &tokens)
            .with_context(|| format!("distribution failed for pool {name}"))?;
        for discrepancy in result.discrepancies() {
            warn!(pool = %name, %discrepancy, "unallocated dust");
        }
        list.add_source(name, result)?;
    }

    info!(cycle, pools = list.sources().len(), users = list.claims().len(), "cycle complete");
    Ok(list.export())
}

fn cmd_vested(args: VestedArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let config = config::from_env(scenario.config.clone())?;
    let token = TokenId::new(args.token);

    let mut total: u128 = 0;
    for (name, engine) in scenario.engines(&config)? {
        let vested = engine.schedules().vested_amount(&token, args.at);
        let locked = engine.schedules().total_locked(&token);
        println!("{name}: {vested} / {locked} {token}");
        total = total.checked_add(vested).context("vested total overflows")?;
    }
    println!("total: {total} {token} at {}", args.at);
    Ok(())
}

fn cmd_schedules(args: SchedulesArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let config = config::from_env(scenario.config.clone())?;

    for (name, engine) in scenario.engines(&config)? {
        println!("=== {name} ===");
        for token in engine.schedules().tokens() {
            for status in engine.schedules().schedule_status(&token, args.at) {
                println!(
                    "  {token} #{}: {:?}  {} / {}  ({:.2}% of {}s)",
                    status.index,
                    status.phase,
                    status.vested,
                    status.initial_amount,
                    status.percent_elapsed,
                    status.duration,
                );
            }
        }
    }
    Ok(())
}

fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // logs go to stderr so stdout stays clean JSON
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tally_core::UserId;

    fn scenario_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const TWO_POOLS: &str = r#"{
        "config": { "curve": { "ramp_duration_secs": 1, "end_multiplier_bps": 10000 }, "dust_tolerance": 5 },
        "window": { "start": 0, "end": 1000 },
        "tokens": ["BADGER"],
        "pools": [
            {
                "name": "a",
                "schedules": { "BADGER": [ { "initial_amount": 900, "start_time": 0, "duration": 1000 } ] },
                "events": [
                    { "user": "alice", "action": "stake", "amount": 1000, "at": 0 },
                    { "user": "bob", "action": "stake", "amount": 1000, "at": 500 }
                ]
            },
            {
                "name": "b",
                "schedules": { "BADGER": [ { "initial_amount": 100, "start_time": 0, "duration": 1000 } ] },
                "events": [ { "user": "alice", "action": "stake", "amount": 1, "at": 0 } ]
            }
        ]
    }"#;

    #[test]
    fn cycle_aggregates_pools() {
        let file = scenario_file(TWO_POOLS);
        let scenario = Scenario::load(file.path()).unwrap();
        let record = run_cycle(&scenario, 4).unwrap();
        assert_eq!(record.cycle, 4);
        assert_eq!(record.claims[&UserId::from("alice")][&TokenId::from("BADGER")], "700");
        assert_eq!(record.claims[&UserId::from("bob")][&TokenId::from("BADGER")], "300");
        assert_eq!(record.totals[&TokenId::from("BADGER")], "1000");
        assert_eq!(record.sources.len(), 2);
    }

    #[test]
    fn cycle_output_round_trips_through_file() {
        let file = scenario_file(TWO_POOLS);
        let out = tempfile::NamedTempFile::new().unwrap();
        cmd_distribute(DistributeArgs {
            scenario: file.path().to_path_buf(),
            out: Some(out.path().to_path_buf()),
            cycle: 1,
        })
        .unwrap();
        let written = std::fs::read_to_string(out.path()).unwrap();
        let back: RewardsRecord = serde_json::from_str(&written).unwrap();
        assert_eq!(back.cycle, 1);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "tally-cli",
            "--log-format",
            "json",
            "vested",
            "--scenario",
            "s.json",
            "--token",
            "BADGER",
            "--at",
            "-5",
        ])
        .unwrap();
        assert_eq!(cli.log_format, "json");
        match cli.command {
            Commands::Vested(args) => {
                assert_eq!(args.at, -5);
                assert_eq!(args.token, "BADGER");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
