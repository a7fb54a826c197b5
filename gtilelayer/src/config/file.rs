//! Configuration file handling for ~/.gtilelayer/config.ini.
//!
//! ```ini
//! [layer]
//! api_key = YOUR_API_KEY
//! map_type = satellite
//! language = en-GB
//! region = gb
//! cross_origin = false
//!
//! [refresh]
//! fraction = 0.9
//! min_delay_secs = 60
//! fallback_secs = 3600
//! ```

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::{LayerConfig, MapType, RefreshPolicy, DEFAULT_LANGUAGE, DEFAULT_REGION};
use crate::error::ConfigError;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// The file parsed but does not describe a usable layer.
    #[error("Invalid layer configuration: {0}")]
    Layer(#[from] ConfigError),
}

/// Settings loaded from the INI file.
///
/// The API key is optional here so that it can be supplied later from the
/// command line or environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub api_key: Option<String>,
    pub map_type: MapType,
    pub language: String,
    pub region: String,
    pub cross_origin: bool,
    pub refresh: RefreshPolicy,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            api_key: None,
            map_type: MapType::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
            cross_origin: false,
            refresh: RefreshPolicy::default(),
        }
    }
}

impl ConfigFile {
    /// Load configuration from the default path (~/.gtilelayer/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Turns the file settings into a validated [`LayerConfig`].
    ///
    /// `api_key_override` wins over the key stored in the file.
    pub fn into_layer_config(
        self,
        api_key_override: Option<String>,
    ) -> Result<LayerConfig, ConfigFileError> {
        let api_key = api_key_override
            .or(self.api_key)
            .ok_or(ConfigError::MissingApiKey)?;

        let config = LayerConfig::new(api_key)
            .with_map_type(self.map_type)
            .with_language(self.language)
            .with_region(self.region)
            .with_cross_origin(self.cross_origin)
            .with_refresh_policy(self.refresh);
        config.validate()?;
        Ok(config)
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [layer] section
    if let Some(section) = ini.section(Some("layer")) {
        if let Some(v) = section.get("api_key") {
            let v = v.trim();
            if !v.is_empty() {
                config.api_key = Some(v.to_string());
            }
        }
        if let Some(v) = section.get("map_type") {
            config.map_type = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "layer".to_string(),
                key: "map_type".to_string(),
                value: v.to_string(),
                reason: "must be one of: roadmap, satellite".to_string(),
            })?;
        }
        if let Some(v) = section.get("language") {
            config.language = v.trim().to_string();
        }
        if let Some(v) = section.get("region") {
            config.region = v.trim().to_string();
        }
        if let Some(v) = section.get("cross_origin") {
            config.cross_origin = parse_bool(v);
        }
    }

    // [refresh] section
    if let Some(section) = ini.section(Some("refresh")) {
        if let Some(v) = section.get("fraction") {
            config.refresh.fraction = v
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| *f > 0.0 && *f <= 1.0)
                .ok_or_else(|| ConfigFileError::InvalidValue {
                    section: "refresh".to_string(),
                    key: "fraction".to_string(),
                    value: v.to_string(),
                    reason: "expected a number greater than 0 and at most 1".to_string(),
                })?;
        }
        if let Some(v) = section.get("min_delay_secs") {
            config.refresh.min_delay = parse_secs("min_delay_secs", v)?;
        }
        if let Some(v) = section.get("fallback_secs") {
            config.refresh.fallback = parse_secs("fallback_secs", v)?;
        }
    }

    Ok(config)
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigFileError> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigFileError::InvalidValue {
            section: "refresh".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a positive number of seconds".to_string(),
        })
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Get the path to the config directory (~/.gtilelayer).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gtilelayer")
}

/// Get the path to the config file (~/.gtilelayer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
