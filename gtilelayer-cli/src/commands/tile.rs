//! Tile command - resolve a tile URL and optionally download it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use gtilelayer::coord::to_tile_coords;
use gtilelayer::http::{AsyncHttpClient, ReqwestClient};
use gtilelayer::tile::{TileDone, TileImage, TileLoadError};
use gtilelayer::TileLayer;

use super::common::LayerArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the tile command.
pub struct TileArgs {
    pub lat: f64,
    pub lon: f64,
    pub zoom: u8,
    pub output: Option<PathBuf>,
}

/// Run the tile command.
pub async fn run(
    runner: &CliRunner,
    layer_args: &LayerArgs,
    args: TileArgs,
) -> Result<(), CliError> {
    runner.log_startup("tile");

    let coords = to_tile_coords(args.lat, args.lon, args.zoom)
        .map_err(|e| CliError::Coordinates(e.to_string()))?;

    println!("Resolving tile for:");
    println!("  Location: {}, {}", args.lat, args.lon);
    println!("  Tile: {}", coords);
    println!();

    let layer = runner.create_layer(layer_args)?;

    // Surface session errors here instead of leaving the tile unresolved
    layer.acquire_session().await?;

    let tile = layer.create_tile(coords, report_outcome());
    let url = tile.wait_for_source().await;
    println!("URL: {}", url);

    let Some(output) = args.output else {
        return Ok(());
    };

    let client = ReqwestClient::new().map_err(CliError::HttpClient)?;
    let start = Instant::now();
    let bytes = match client.get(&url).await {
        Ok(bytes) => {
            tile.notify_loaded();
            bytes
        }
        Err(e) => {
            tile.notify_error(e.to_string());
            return Err(CliError::Download(e));
        }
    };
    println!(
        "Downloaded {} bytes in {:.2}s",
        bytes.len(),
        start.elapsed().as_secs_f64()
    );

    std::fs::write(&output, &bytes).map_err(|e| CliError::FileWrite {
        path: output.display().to_string(),
        error: e,
    })?;
    println!("Saved to {}", output.display());

    Ok(())
}

fn report_outcome() -> TileDone {
    Box::new(|error: Option<TileLoadError>, tile: Arc<TileImage>| match error {
        None => info!(tile = %tile.coords(), "Tile loaded"),
        Some(e) => warn!(error = %e, "Tile failed to load"),
    })
}
