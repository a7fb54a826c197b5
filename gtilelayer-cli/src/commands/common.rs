//! Common types shared across CLI commands.

use clap::{Args, ValueEnum};
use gtilelayer::MapType;

/// Map type selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MapTypeArg {
    /// Standard road map
    Roadmap,
    /// Satellite imagery
    Satellite,
}

impl From<MapTypeArg> for MapType {
    fn from(arg: MapTypeArg) -> Self {
        match arg {
            MapTypeArg::Roadmap => MapType::Roadmap,
            MapTypeArg::Satellite => MapType::Satellite,
        }
    }
}

/// Layer settings that override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct LayerArgs {
    /// Google Map Tiles API key (overrides GOOGLE_TILE_API_KEY and config file)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Imagery style
    #[arg(long, value_enum, global = true)]
    pub map_type: Option<MapTypeArg>,

    /// Language tag for map labels (e.g. en-GB)
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Region code (e.g. gb)
    #[arg(long, global = true)]
    pub region: Option<String>,
}
