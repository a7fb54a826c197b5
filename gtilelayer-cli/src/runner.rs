//! CLI runner for common setup.
//!
//! Encapsulates logging initialization, configuration resolution and layer
//! creation so command handlers only deal with their own work.

use std::path::PathBuf;

use tracing::info;

use gtilelayer::config::{config_file_path, ConfigFile};
use gtilelayer::http::ReqwestClient;
use gtilelayer::logging::{default_log_dir, default_log_file, init_logging, LoggingGuard};
use gtilelayer::{GoogleTileLayer, LayerConfig};

use crate::commands::common::LayerArgs;
use crate::error::CliError;

/// Environment variable that supplies the API key.
pub const API_KEY_ENV: &str = "GOOGLE_TILE_API_KEY";

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config_path: PathBuf,
}

impl CliRunner {
    /// Initialize logging. `verbose` raises the default level to debug.
    pub fn new(config_path: Option<PathBuf>, verbose: bool) -> Result<Self, CliError> {
        let default_filter = if verbose { "debug" } else { "info" };
        let logging_guard = init_logging(&default_log_dir(), default_log_file(), default_filter)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config_path: config_path.unwrap_or_else(config_file_path),
        })
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("gtilelayer v{}", gtilelayer::VERSION);
        info!(config = %self.config_path.display(), "gtilelayer CLI: {} command", command);
    }

    /// Resolves the layer configuration from file, environment and flags.
    pub fn layer_config(&self, args: &LayerArgs) -> Result<LayerConfig, CliError> {
        let file = ConfigFile::load_from(&self.config_path)?;
        let env_key = std::env::var(API_KEY_ENV).ok();
        resolve_layer_config(file, args, env_key)
    }

    /// Builds a layer with a production HTTP client.
    pub fn create_layer(
        &self,
        args: &LayerArgs,
    ) -> Result<GoogleTileLayer<ReqwestClient>, CliError> {
        let config = self.layer_config(args)?;
        let client = ReqwestClient::new().map_err(CliError::HttpClient)?;
        info!(map_type = %config.map_type, "Creating Google tile layer");
        Ok(GoogleTileLayer::new(config, client)?)
    }
}

/// Layers flag values over the environment key over the config file.
///
/// Precedence for the key: `--api-key`, then `env_key`, then the file.
pub fn resolve_layer_config(
    mut file: ConfigFile,
    args: &LayerArgs,
    env_key: Option<String>,
) -> Result<LayerConfig, CliError> {
    if let Some(map_type) = args.map_type {
        file.map_type = map_type.into();
    }
    if let Some(language) = &args.language {
        file.language = language.clone();
    }
    if let Some(region) = &args.region {
        file.region = region.clone();
    }

    let key_override = args
        .api_key
        .clone()
        .or(env_key.filter(|key| !key.trim().is_empty()));

    Ok(file.into_layer_config(key_override)?)
}
