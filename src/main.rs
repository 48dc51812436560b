//! procsim CLI entry point.
//!
//! ```bash
//! procsim run --preset pumping-station -v
//! procsim run --config station.toml
//! procsim example tank-system > station.toml
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use procsim::core::logging::init_tracing;
use procsim::station::{presets, Station, StationConfig};
use procsim::Result;

/// Simulated process-variable server
#[derive(Parser, Debug)]
#[command(name = "procsim", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a station until Ctrl+C
    Run {
        #[command(flatten)]
        source: ConfigSource,

        /// Increase log verbosity (-v debug, -vv trace)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// List built-in presets
    Presets,

    /// Print a preset configuration
    Example {
        /// Preset name
        #[arg(default_value = "pumping-station")]
        name: String,
    },

    /// Validate a configuration file and print its tags
    Check {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct ConfigSource {
    /// Built-in preset name
    #[arg(short, long)]
    preset: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self) -> Result<StationConfig> {
        match (&self.preset, &self.config) {
            (_, Some(path)) => StationConfig::load(path),
            (Some(name), None) => presets::get(name)?.config(),
            (None, None) => presets::get("pumping-station")?.config(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { source, verbose } => {
            init_tracing(verbose);
            let config = source.load()?;
            let station = Station::from_config(config)?;
            station
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    }
                })
                .await?;
            info!("Bye");
        }
        Commands::Presets => list_presets(),
        Commands::Example { name } => {
            print!("{}", presets::get(&name)?.source);
        }
        Commands::Check { config } => {
            let config = StationConfig::load(&config)?;
            print_tags(&config);
        }
    }

    Ok(())
}

fn list_presets() {
    println!("Built-in presets:");
    println!();
    for preset in presets::PRESETS {
        println!("  {:<16} {}", preset.name, preset.description);
    }
    println!();
    println!("Run one with:");
    println!("  procsim run --preset <name>");
}

fn print_tags(config: &StationConfig) {
    println!(
        "{}: {} tags, tick {} ms",
        config.station.name,
        config.tags.len(),
        config.station.tick_interval_ms
    );
    println!();
    println!("  {:<20} {:<26} {:<6} {:<10} writable", "name", "browse name", "kind", "initial");
    for tag in &config.tags {
        println!(
            "  {:<20} {:<26} {:<6} {:<10} {}",
            tag.name,
            tag.display_name(),
            tag.kind().to_string(),
            tag.initial.to_string(),
            tag.writable
        );
    }
}
