//! HTTP client abstraction for testability

use std::future::Future;

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors returned by [`AsyncHttpClient`] implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The server answered with something other than 200 OK.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The response body could not be read.
    #[error("Failed to read response: {0}")]
    Body(String),
}

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests. Implementations must treat any
/// status other than 200 as [`HttpError::Status`].
pub trait AsyncHttpClient: Send + Sync + 'static {
    /// Performs an async HTTP GET request.
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;

    /// Performs an async HTTP POST request with a JSON body.
    ///
    /// The request carries `Content-Type: application/json`.
    fn post_json(
        &self,
        url: &str,
        json_body: &str,
    ) -> impl Future<Output = Result<Vec<u8>, HttpError>> + Send;
}

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(concat!("gtilelayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn read_ok(response: reqwest::Response, url: &str) -> Result<Vec<u8>, HttpError> {
        let status = response.status();
        debug!(url = url, status = status.as_u16(), "HTTP response received");

        if status != reqwest::StatusCode::OK {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(HttpError::Body(e.to_string()))
            }
        }
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        trace!(url = url, "HTTP GET request starting");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                url = url,
                error = %e,
                is_connect = e.is_connect(),
                is_timeout = e.is_timeout(),
                "HTTP request failed"
            );
            HttpError::Transport(e.to_string())
        })?;

        Self::read_ok(response, url).await
    }

    async fn post_json(&self, url: &str, json_body: &str) -> Result<Vec<u8>, HttpError> {
        trace!(url = url, "HTTP POST request starting");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json_body.to_string())
            .send()
            .await
            .map_err(|e| {
                warn!(url = url, error = %e, "HTTP POST request failed");
                HttpError::Transport(e.to_string())
            })?;

        Self::read_ok(response, url).await
    }
}
