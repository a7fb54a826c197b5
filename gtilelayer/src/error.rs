//! Error types for the tile layer.
//!
//! Only [`ConfigError`] is fatal. Everything else is recovered inside the
//! layer: it is logged and the affected tile or attribution update is
//! abandoned for that attempt.

use thiserror::Error;

use crate::http::HttpError;

/// Invalid layer configuration. Returned synchronously from construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No API key, or an empty one, was supplied.
    #[error("Must supply a Google Map Tiles API key")]
    MissingApiKey,

    /// The map type is not one of the supported imagery styles.
    #[error("'{0}' is an invalid map type (expected one of: roadmap, satellite)")]
    InvalidMapType(String),

    /// A refresh policy value is out of range.
    #[error("Invalid refresh policy: {0}")]
    InvalidRefreshPolicy(String),
}

/// Failure to obtain a session credential.
///
/// Cloneable because a single outcome is shared with every caller waiting
/// on the same in-flight acquisition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    /// The session endpoint could not be reached or answered with non-200.
    #[error("Session request failed: {0}")]
    Http(#[from] HttpError),

    /// The session endpoint answered 200 with a body we could not use.
    #[error("Malformed session response: {0}")]
    MalformedResponse(String),

    /// The acquisition was discarded before it completed (refresh or detach).
    #[error("Session acquisition was cancelled")]
    Cancelled,
}

/// Failure to look up the attribution for the current viewport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributionError {
    /// No session could be obtained for the lookup.
    #[error("No session for attribution lookup: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// The viewport endpoint could not be reached or answered with non-200.
    #[error("Attribution request failed: {0}")]
    Http(#[from] HttpError),

    /// The viewport endpoint answered 200 with a body we could not use.
    #[error("Malformed attribution response: {0}")]
    MalformedResponse(String),
}
