//! CLI entry point for the laser panel.
//!
//! Provides:
//! - `simulate`: run the panel against the simulated laser. Commands are read
//!   from stdin and the view is printed whenever it changes.
//! - `classify`: print the label for a status code.
//!
//! # Usage
//!
//! ```bash
//! laser-panel simulate --ready
//! laser-panel --config config/laser_panel.toml simulate
//! laser-panel classify 25
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use laser_panel::config::{PanelConfig, DEFAULT_CONFIG_PATH};
use laser_panel::logging;
use laser_panel::{status, MockLaserController, PanelAction, PanelHandle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;

#[derive(Parser)]
#[command(name = "laser-panel")]
#[command(about = "Spectra-Physics laser control panel", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the panel against the simulated laser, reading commands from stdin
    Simulate {
        /// Skip the simulated warm-up and start ready to turn on
        #[arg(long)]
        ready: bool,
    },

    /// Print the label for a status code
    Classify {
        /// Raw status code
        #[arg(allow_negative_numbers = true)]
        code: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = PanelConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
        config.validate()?;
    }
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Simulate { ready } => simulate(config, ready).await,
        Commands::Classify { code } => {
            println!("{}", status::describe(code));
            Ok(())
        }
    }
}

async fn simulate(config: PanelConfig, ready: bool) -> Result<()> {
    let mut simulation = config.simulation.clone();
    if ready {
        simulation.warmup_secs = 0.0;
    }

    let controller = Arc::new(MockLaserController::with_config(simulation));
    let handle = PanelHandle::spawn(controller, &config.polling, config.display.history_chars);
    let mut views = handle.subscribe();

    println!("{}", config.application.name);
    println!("Commands: power | pump | ir | mode | wl <nm> | mtr <pos> | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if matches!(line, "quit" | "exit") {
                    break;
                }
                match line.parse::<PanelAction>() {
                    Ok(action) => handle
                        .send(action)
                        .await
                        .context("Panel task has stopped")?,
                    Err(e) => eprintln!("{}", e),
                }
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                println!("\n{}", view);
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    let panel = handle.shutdown().await.context("Panel task failed")?;
    info!(
        last_status = ?panel.read_status(),
        last_wavelength = ?panel.read_wavelength(),
        "Laser panel closed"
    );
    Ok(())
}
