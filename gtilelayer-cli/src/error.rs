//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use gtilelayer::config::ConfigFileError;
use gtilelayer::error::{AcquisitionError, ConfigError};
use gtilelayer::http::HttpError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to create the HTTP client
    HttpClient(HttpError),
    /// Failed to obtain a session
    Session(AcquisitionError),
    /// Invalid coordinates or viewport
    Coordinates(String),
    /// Failed to download tile bytes
    Download(HttpError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Session(AcquisitionError::Http(HttpError::Status { .. })) => {
                eprintln!();
                eprintln!("Make sure:");
                eprintln!("  1. Map Tiles API is enabled in Google Cloud Console");
                eprintln!("  2. Billing is enabled for your project");
                eprintln!("  3. Your API key is valid and allowed to call the Map Tiles API");
            }
            CliError::Config(ConfigFileError::Layer(ConfigError::MissingApiKey)) => {
                eprintln!();
                eprintln!("Provide a key with one of:");
                eprintln!("  --api-key <KEY>");
                eprintln!("  GOOGLE_TILE_API_KEY=<KEY>");
                eprintln!("  api_key = <KEY> in the [layer] section of the config file");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::HttpClient(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Session(e) => write!(f, "Failed to create session: {}", e),
            CliError::Coordinates(msg) => write!(f, "Invalid coordinates: {}", msg),
            CliError::Download(e) => write!(f, "Failed to download tile: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::HttpClient(e) => Some(e),
            CliError::Session(e) => Some(e),
            CliError::Download(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(ConfigFileError::Layer(e))
    }
}

impl From<AcquisitionError> for CliError {
    fn from(e: AcquisitionError) -> Self {
        CliError::Session(e)
    }
}
