use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use airshed::{
    config::{Config, LoggingConfig},
    snapshot::GridSnapshot,
    web, Intervention, Simulator,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Gridded emissions baseline and intervention simulator")]
struct Cli {
    /// Path to the YAML configuration (built-in NYC defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print or write the baseline snapshot
    Baseline {
        /// Write the snapshot JSON here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Include cells outside every region boundary
        #[arg(long)]
        unfiltered: bool,
    },
    /// Apply a structured intervention JSON file to the baseline
    Simulate {
        #[arg(long)]
        intervention: PathBuf,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_yaml(path)?,
        None => Config::nyc(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Command::Baseline { out, unfiltered } => {
            let simulator = Simulator::from_config(config);
            let baseline = if simulator.cache().has_measurement_source() {
                simulator.refresh().await
            } else {
                simulator.baseline().await
            };
            let snapshot = if unfiltered {
                GridSnapshot::unfiltered(&baseline.grid, baseline.built_at)
            } else {
                GridSnapshot::capture(&baseline.grid, simulator.regions(), baseline.built_at)
            };
            emit(&snapshot, out.as_deref())?;
        }
        Command::Simulate { intervention, out } => {
            let text = std::fs::read_to_string(&intervention)
                .with_context(|| format!("Failed to read {}", intervention.display()))?;
            let parsed = Intervention::from_json(&text)
                .with_context(|| format!("Invalid intervention in {}", intervention.display()))?;
            let simulator = Simulator::from_config(config);
            if simulator.cache().has_measurement_source() {
                simulator.refresh().await;
            }
            let report = simulator.simulate(parsed).await;
            eprintln!(
                "Change: {:+.2}% ({:+.1} over {} cells)",
                report.totals.percent_change,
                report.totals.absolute_change,
                report.totals.cells_changed
            );
            emit(&report, out.as_deref())?;
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            web::run(config).await?;
        }
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn emit<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
