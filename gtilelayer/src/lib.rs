//! gtilelayer - Google Map Tiles layer for slippy-map hosts
//!
//! This library plugs Google's session-based Map Tiles API into a host map's
//! tile-layer extension point. It acquires and renews session tokens, builds
//! tile URLs once a session exists, and keeps the host's attribution display
//! in sync with the visible viewport.
//!
//! # High-Level API
//!
//! [`layer::GoogleTileLayer`] implements [`host::TileLayer`]:
//!
//! ```ignore
//! use gtilelayer::config::{LayerConfig, MapType};
//! use gtilelayer::http::ReqwestClient;
//! use gtilelayer::layer::GoogleTileLayer;
//!
//! let config = LayerConfig::new(api_key).with_map_type(MapType::Satellite);
//! let layer = GoogleTileLayer::new(config, ReqwestClient::new()?)?;
//!
//! // The host drives the layer
//! layer.on_add(map.clone());
//! let tile = layer.create_tile(coords, done);
//! layer.on_remove(map.as_ref());
//! ```

pub mod attribution;
pub mod config;
pub mod coord;
pub mod endpoints;
pub mod error;
pub mod host;
pub mod http;
pub mod layer;
pub mod logging;
pub mod session;
pub mod tile;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{LayerConfig, MapType, RefreshPolicy};
pub use coord::{LatLngBounds, TileCoord};
pub use error::{AcquisitionError, AttributionError, ConfigError};
pub use host::{AttributionControl, MapHost, TileLayer};
pub use layer::GoogleTileLayer;
pub use session::Session;
pub use tile::TileImage;
