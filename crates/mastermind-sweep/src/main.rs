//! Mastermind Sweep CLI.
//!
//! Commands:
//! - sweep: Run every strategy pair on every hidden state and export the statistics table
//! - trace: Parse a saved simulator log into rounds
//! - states: List the hidden states for a board size

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dialogue_kernel::{
    condense, enumerate_states, parse_trace_file, ConfigOverrides, CsvStore, SweepConfig,
};
use mastermind_sweep::results::format_duration;
use mastermind_sweep::{derive_prefix, Simulator, SweepReport, SweepRunner};

#[derive(Parser)]
#[command(name = "mastermind-sweep")]
#[command(version)]
#[command(about = "Aggregates strategy statistics for Mastermind speaker/listener simulations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all strategy pairs on all hidden states
    Sweep {
        /// Path to a Mastermind simulation script
        script_fp: PathBuf,

        /// Number of pins in a game state [default: 4]
        #[arg(long = "num_pins", alias = "num-pins")]
        num_pins: Option<usize>,

        /// Number of colors per pin [default: 2]
        #[arg(long = "num_colors", alias = "num-colors")]
        num_colors: Option<usize>,

        /// Program that runs the script [default: webppl]
        #[arg(long, env = "SIMULATOR_RUNNER")]
        runner: Option<String>,

        /// Directory for cached per-state tables [default: statistics]
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Directory for the statistics table and report [default: .]
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Simulator processes to run at once [default: 1]
        #[arg(long)]
        jobs: Option<usize>,

        /// Kill a simulator run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// JSON file with sweep settings; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse a saved simulator log
    Trace {
        /// Log file produced by the simulator
        log_file: PathBuf,

        /// Print rounds as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every hidden state
    States {
        #[arg(long = "num_pins", alias = "num-pins", default_value = "4")]
        num_pins: usize,

        #[arg(long = "num_colors", alias = "num-colors", default_value = "2")]
        num_colors: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins unless --verbose is given
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sweep {
            script_fp,
            num_pins,
            num_colors,
            runner,
            cache_dir,
            output_dir,
            jobs,
            timeout_secs,
            config,
        } => {
            let overrides = ConfigOverrides {
                num_pins,
                num_colors,
                runner,
                cache_dir,
                output_dir,
                jobs,
                timeout_secs,
            };
            let config = SweepConfig::resolve(config.as_deref(), overrides)?;
            run_sweep(&script_fp, &config).await?;
        }

        Commands::Trace { log_file, json } => {
            let rounds = parse_trace_file(&log_file)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rounds)?);
                return Ok(());
            }

            println!("{:>5} {:>9} {:>14} {:>14}", "Round", "Beliefs", "Prediction", "Utterance");
            for round in &rounds {
                println!(
                    "{:>5} {:>9} {:>14} {:>14}",
                    round.round, round.n_beliefs, round.prediction, round.utterance
                );
            }

            let summary = condense(&rounds);
            println!("\nRounds: {}", summary.n_rounds);
            for (column, count) in &summary.utterances {
                println!("  {}: {}", column, count);
            }
        }

        Commands::States {
            num_pins,
            num_colors,
        } => {
            SweepConfig {
                num_pins,
                num_colors,
                ..Default::default()
            }
            .validate()?;

            let states = enumerate_states(num_pins, num_colors);
            info!(num_pins, num_colors, states = states.len(), "Enumerated states");
            for state in &states {
                println!("{}", state);
            }
        }
    }

    Ok(())
}

async fn run_sweep(script_fp: &Path, config: &SweepConfig) -> Result<()> {
    let prefix = derive_prefix(script_fp);

    println!(
        "Aggregating strategy statistics for {} Mastermind simulation with numPins {} and numColors {} ...",
        prefix, config.num_pins, config.num_colors
    );

    let simulator = Simulator::new(&config.runner, script_fp)
        .with_timeout(config.timeout_secs.map(Duration::from_secs));
    let store = Arc::new(CsvStore::new(&config.cache_dir));
    let runner = SweepRunner::new(simulator, store, &prefix, config);

    let started_at = Utc::now();
    let start_time = Instant::now();
    let table = runner.run_sweep().await?;
    let duration_ms = start_time.elapsed().as_millis() as u64;
    let stats = runner.stats();

    std::fs::create_dir_all(&config.output_dir)?;
    let csv_path = config
        .output_dir
        .join(format!("{}_strategy_stats.csv", prefix));
    let report_path = csv_path.with_extension("json");

    println!("Exporting results to {} ...", csv_path.display());
    table.save_csv(&csv_path)?;

    let report = SweepReport {
        prefix: prefix.clone(),
        script: script_fp.to_path_buf(),
        num_pins: config.num_pins,
        num_colors: config.num_colors,
        started_at,
        ended_at: Utc::now(),
        duration_ms,
        stats,
        table,
    };
    report.save(&report_path)?;

    println!("\n=== Sweep Complete ===");
    println!("Results saved to: {}", csv_path.display());
    println!("Report saved to: {}", report_path.display());
    println!(
        "Duration: {} ({} simulator runs, {} cached pairs)",
        format_duration(duration_ms),
        stats.simulator_calls,
        stats.cache_hits
    );
    println!("\nSummary:");
    for row in &report.table.rows {
        println!(
            "  {:>16} -> {:<16} mean_rounds={:.2}",
            row.speaker.name(),
            row.listener.name(),
            row.mean_rounds
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sweep_flags_stay_unset() {
        let cli = Cli::try_parse_from([
            "mastermind-sweep",
            "sweep",
            "pragmatic_mastermind.wppl",
            "--num_pins",
            "2",
            "--config",
            "sweep.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Sweep {
                num_pins,
                num_colors,
                jobs,
                timeout_secs,
                config,
                ..
            } => {
                assert_eq!(num_pins, Some(2));
                assert_eq!(num_colors, None);
                assert_eq!(jobs, None);
                assert_eq!(timeout_secs, None);
                assert_eq!(config, Some(PathBuf::from("sweep.json")));
            }
            _ => panic!("expected the sweep command"),
        }
    }

    #[test]
    fn test_dimension_flag_aliases() {
        let cli = Cli::try_parse_from(["mastermind-sweep", "states", "--num-pins", "3"]).unwrap();
        match cli.command {
            Commands::States {
                num_pins,
                num_colors,
            } => {
                assert_eq!(num_pins, 3);
                assert_eq!(num_colors, 2);
            }
            _ => panic!("expected the states command"),
        }
    }
}
