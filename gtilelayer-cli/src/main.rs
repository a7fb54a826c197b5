//! gtilelayer CLI - Command-line interface
//!
//! Drives the Google Map Tiles layer from the command line: create a session,
//! resolve and download tiles, and look up viewport attribution.

mod commands;
mod error;
mod host;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::attribution::AttributionArgs;
use commands::common::LayerArgs;
use commands::tile::TileArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "gtilelayer")]
#[command(version, about = "Google Map Tiles layer tools", long_about = None)]
struct Cli {
    /// Config file (default: ~/.gtilelayer/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    layer: LayerArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session and print its token and expiry
    Session,

    /// Resolve the URL of the tile containing a location
    Tile {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Zoom level (0-22)
        #[arg(long, default_value = "15")]
        zoom: u8,

        /// Download the tile image to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the attribution for a viewport
    Attribution {
        /// Northern edge latitude
        #[arg(long, allow_hyphen_values = true)]
        north: f64,

        /// Southern edge latitude
        #[arg(long, allow_hyphen_values = true)]
        south: f64,

        /// Eastern edge longitude
        #[arg(long, allow_hyphen_values = true)]
        east: f64,

        /// Western edge longitude
        #[arg(long, allow_hyphen_values = true)]
        west: f64,

        /// Zoom level (0-22)
        #[arg(long)]
        zoom: u8,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let runner = CliRunner::new(cli.config, cli.verbose)?;

    match cli.command {
        Commands::Session => commands::session::run(&runner, &cli.layer).await,
        Commands::Tile {
            lat,
            lon,
            zoom,
            output,
        } => {
            let args = TileArgs {
                lat,
                lon,
                zoom,
                output,
            };
            commands::tile::run(&runner, &cli.layer, args).await
        }
        Commands::Attribution {
            north,
            south,
            east,
            west,
            zoom,
        } => {
            let args = AttributionArgs {
                north,
                south,
                east,
                west,
                zoom,
            };
            commands::attribution::run(&runner, &cli.layer, args).await
        }
    }
}
