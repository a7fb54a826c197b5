//! Layer configuration.
//!
//! [`LayerConfig`] is fixed once a layer is constructed. It can be built in
//! code with the `with_*` methods or loaded from `~/.gtilelayer/config.ini`
//! through [`ConfigFile`].

mod file;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default language tag sent when creating a session.
pub const DEFAULT_LANGUAGE: &str = "en-GB";

/// Default region tag sent when creating a session.
pub const DEFAULT_REGION: &str = "gb";

/// Imagery style requested from the Map Tiles API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapType {
    #[default]
    Roadmap,
    Satellite,
}

impl MapType {
    /// Every supported map type.
    pub const ALL: [MapType; 2] = [MapType::Roadmap, MapType::Satellite];

    /// The value sent in the `mapType` field of a session request.
    pub fn as_str(&self) -> &'static str {
        match self {
            MapType::Roadmap => "roadmap",
            MapType::Satellite => "satellite",
        }
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MapType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ConfigError::InvalidMapType(s.to_string()))
    }
}

/// When to renew a session ahead of its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshPolicy {
    /// Fraction of the remaining lifetime to wait before refreshing (0, 1].
    pub fraction: f64,
    /// Shortest delay ever scheduled between refreshes.
    pub min_delay: Duration,
    /// Delay used when the API did not report an expiry.
    pub fallback: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            fraction: 0.9,
            min_delay: Duration::from_secs(60),
            fallback: Duration::from_secs(3600),
        }
    }
}

impl RefreshPolicy {
    /// Checks that the fraction is usable and the delays are non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(ConfigError::InvalidRefreshPolicy(format!(
                "fraction must be in (0, 1], got {}",
                self.fraction
            )));
        }
        if self.min_delay.is_zero() || self.fallback.is_zero() {
            return Err(ConfigError::InvalidRefreshPolicy(
                "delays must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a [`GoogleTileLayer`](crate::layer::GoogleTileLayer).
///
/// # Example
///
/// ```
/// use gtilelayer::config::{LayerConfig, MapType};
///
/// let config = LayerConfig::new("YOUR_API_KEY")
///     .with_map_type(MapType::Satellite)
///     .with_language("en-US")
///     .with_region("us");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    /// Google Map Tiles API key. Required.
    pub api_key: String,
    pub map_type: MapType,
    /// IETF language tag for labels, e.g. `en-GB`.
    pub language: String,
    /// CLDR region code, e.g. `gb`.
    pub region: String,
    /// Mark tile placeholders for anonymous cross-origin loading.
    pub cross_origin: bool,
    pub refresh: RefreshPolicy,
}

impl LayerConfig {
    /// Creates a config with the given API key and default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            map_type: MapType::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
            cross_origin: false,
            refresh: RefreshPolicy::default(),
        }
    }

    pub fn with_map_type(mut self, map_type: MapType) -> Self {
        self.map_type = map_type;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_cross_origin(mut self, cross_origin: bool) -> Self {
        self.cross_origin = cross_origin;
        self
    }

    pub fn with_refresh_policy(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    /// Validates the configuration.
    ///
    /// Fails with [`ConfigError::MissingApiKey`] when the key is empty or
    /// whitespace. Map type membership is guaranteed by [`MapType`] itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        self.refresh.validate()
    }
}
