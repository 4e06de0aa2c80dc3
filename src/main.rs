//! CLI entry point for smu-sweep
//!
//! # Usage
//!
//! List instrument addresses:
//! ```bash
//! smu-sweep list
//! ```
//!
//! Run setup and a sweep from a config file:
//! ```bash
//! smu-sweep sweep --config config/sweep.toml --csv results/iv.csv
//! ```
//!
//! Try it without hardware (1 kΩ simulated load):
//! ```bash
//! smu-sweep sweep --simulate
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smu_sweep::config::Settings;
use smu_sweep::{export, logging, run, SweepReport};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "smu-sweep")]
#[command(about = "Source-measure unit setup and IV sweeps", long_about = None)]
#[command(version)]
struct Cli {
    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available instrument addresses
    List,

    /// Configure the instrument and run one sweep
    Sweep {
        /// Config file (defaults to config/sweep.toml when present)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Instrument address, overriding the config
        #[arg(long)]
        address: Option<String>,

        /// Use the simulated instrument
        #[arg(long)]
        simulate: bool,

        /// Write results to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            let mut settings = Settings::load().context("failed to load configuration")?;
            apply_log_override(&mut settings, cli.log_level);
            logging::init_from_settings(&settings)?;
            list_addresses()
        }
        Commands::Sweep {
            config,
            address,
            simulate,
            csv,
        } => {
            let mut settings = match &config {
                Some(path) => Settings::load_from(path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => Settings::load().context("failed to load configuration")?,
            };
            apply_log_override(&mut settings, cli.log_level);
            if address.is_some() {
                settings.instrument.address = address;
            }
            if csv.is_some() {
                settings.output.csv_path = csv;
            }

            logging::init_from_settings(&settings)?;
            settings.validate().context("invalid configuration")?;
            sweep(settings, simulate).await
        }
    }
}

fn apply_log_override(settings: &mut Settings, level: Option<String>) {
    if let Some(level) = level {
        settings.application.log_level = level;
    }
}

#[cfg(feature = "instrument_serial")]
fn list_addresses() -> Result<()> {
    let ports = smu_core::serial::SerialDiscovery
        .list_ports()
        .context("failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No instrument addresses found");
        return Ok(());
    }
    for port in ports {
        println!("{:<40} {}", port.address, port.description);
    }
    Ok(())
}

#[cfg(not(feature = "instrument_serial"))]
fn list_addresses() -> Result<()> {
    anyhow::bail!(smu_sweep::AppError::FeatureNotEnabled(
        "instrument_serial".to_string()
    ))
}

async fn sweep(settings: Settings, simulate: bool) -> Result<()> {
    let session = run::acquire_session(&settings, simulate)
        .await
        .context("failed to open instrument session")?;
    let address = session.address().to_string();
    let smu = run::attach(&settings, session)
        .await
        .context("failed to attach driver")?;

    let report = tokio::select! {
        result = run::execute(&settings, smu.as_ref(), &address) => {
            result.with_context(|| format!("sweep on {} failed", address))?
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, disabling output");
            if let Err(e) = smu.disable_output().await {
                error!(error = %e, "failed to disable output after interrupt");
            }
            anyhow::bail!("sweep interrupted");
        }
    };

    print_report(&report);

    if let Some(path) = &settings.output.csv_path {
        export::write_csv_file(path, &report)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    info!(points = report.records.len(), "done");
    Ok(())
}

fn print_report(report: &SweepReport) {
    if let Some(idn) = &report.identity {
        println!("Instrument: {}", idn);
    }
    println!("Address:    {}", report.address);
    println!();
    println!(
        "{:>5}  {:>14}  {:>14}",
        "#",
        format!("{} source", report.setup.source),
        format!("{} reading", report.setup.measure)
    );
    for record in &report.records {
        println!(
            "{:>5}  {:>14.6e}  {:>14.6e}",
            record.index, record.level, record.reading
        );
    }
}
