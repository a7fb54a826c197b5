//! Attribution command - attach the layer to a headless map and print the
//! copyright string for its viewport.

use gtilelayer::coord::to_tile_coords;
use gtilelayer::{LatLngBounds, TileLayer};
use tracing::debug;

use super::common::LayerArgs;
use crate::error::CliError;
use crate::host::HeadlessMap;
use crate::runner::CliRunner;

/// Arguments for the attribution command.
pub struct AttributionArgs {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub zoom: u8,
}

/// Checks the viewport against the projection's limits.
fn viewport(args: &AttributionArgs) -> Result<LatLngBounds, CliError> {
    // Corner conversion applies the same latitude, longitude and zoom limits
    to_tile_coords(args.north, args.east, args.zoom)
        .and_then(|_| to_tile_coords(args.south, args.west, args.zoom))
        .map_err(|e| CliError::Coordinates(e.to_string()))?;

    if args.south > args.north {
        return Err(CliError::Coordinates(format!(
            "south ({}) is above north ({})",
            args.south, args.north
        )));
    }

    Ok(LatLngBounds::new(args.south, args.west, args.north, args.east))
}

/// Run the attribution command.
pub async fn run(
    runner: &CliRunner,
    layer_args: &LayerArgs,
    args: AttributionArgs,
) -> Result<(), CliError> {
    runner.log_startup("attribution");

    let bounds = viewport(&args)?;
    let layer = runner.create_layer(layer_args)?;
    layer.acquire_session().await?;

    let map = HeadlessMap::new(args.zoom, bounds);
    layer.on_add(map.clone());
    layer.wait_for_initial_attribution().await;

    let displayed = map.attribution().entries();
    layer.on_remove(map.as_ref());
    debug!(
        subscribers = map.subscriber_count(),
        remaining = ?map.attribution().entries(),
        "Layer detached from headless map"
    );

    match displayed.first() {
        Some(text) => println!("{}", text),
        None => println!("(no attribution for this viewport)"),
    }
    Ok(())
}
