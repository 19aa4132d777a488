//! Tomoscope CLI - drive and inspect progress tracking for long operations.

mod simulation;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use simulation::SimulationConfig;
use tomoscope_progress::{format_hms, TrackerConfig, STEPS_TO_AVERAGE};

#[derive(Parser)]
#[command(name = "tomoscope")]
#[command(about = "Progress tracking harness for imaging operations", long_about = None)]
struct Cli {
    /// Log every progress update
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated operation split across worker threads
    Simulate {
        /// Total number of steps
        #[arg(long, default_value = "100")]
        steps: u32,
        /// Number of worker threads
        #[arg(long, default_value = "4")]
        workers: u32,
        /// Milliseconds each step takes
        #[arg(long, default_value = "10")]
        delay_ms: u64,
        /// Log a status line every N percent
        #[arg(long, default_value = "10")]
        report_every: u32,
        /// Task name shown in logs
        #[arg(long, default_value = "Task")]
        task_name: String,
        /// Number of recent updates used for the ETA
        #[arg(long, default_value_t = STEPS_TO_AVERAGE)]
        average_over: usize,
        /// Print the final history as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            steps,
            workers,
            delay_ms,
            report_every,
            task_name,
            average_over,
            json,
        } => {
            let config = SimulationConfig {
                steps,
                workers,
                step_delay: Duration::from_millis(delay_ms),
                report_every,
            };
            let tracker_config = TrackerConfig {
                task_name,
                steps_to_average: average_over,
            };

            let tracker = simulation::run(config, tracker_config).await?;
            let snapshot = tracker.snapshot();

            info!(
                "Finished {}: {}/{} steps in {}",
                tracker.task_name(),
                snapshot.current_step,
                snapshot.end_step,
                format_hms(tracker.execution_time())
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&tracker.history())?);
            } else {
                println!("{tracker}");
            }
        }
    }

    Ok(())
}
