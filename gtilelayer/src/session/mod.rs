//! Session credential management.
//!
//! Every tile and viewport request to the Map Tiles API must carry a session
//! token obtained from `POST /createSession`. The [`SessionManager`] owns the
//! current token and guarantees that at most one creation request is in
//! flight per layer: concurrent callers join the same
//! [`futures::future::Shared`] future and all observe the same outcome.
//!
//! # State transitions
//!
//! ```text
//!            acquire()                 200 + valid body
//!   Empty ─────────────► Pending ─────────────────────► Current
//!     ▲                    │                               │
//!     │    non-200 / bad   │                               │ expired,
//!     └────────────────────┘                               │ expire() or
//!     ▲                                                    │ invalidate()
//!     └────────────────────────────────────────────────────┘
//! ```
//!
//! `expire()` only drops the cached session, so a request already underway
//! keeps its waiters and becomes the next current session. `invalidate()`
//! also bumps a generation counter. A creation request that
//! completes after its generation was invalidated does not touch the state
//! and reports [`AcquisitionError::Cancelled`] to its waiters.

mod refresh;

pub use refresh::refresh_delay;
pub(crate) use refresh::run_refresh_loop;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LayerConfig;
use crate::endpoints::Endpoints;
use crate::error::AcquisitionError;
use crate::http::AsyncHttpClient;

/// A short-lived Map Tiles API credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    /// When the API reported the token expires, if it did.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// True if the session had expired at `now`. Sessions without a reported
    /// expiry never expire on their own.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Body of `POST /createSession`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    map_type: &'a str,
    language: &'a str,
    region: &'a str,
    overlay: bool,
    scale: &'a str,
}

/// Response of `POST /createSession`. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session: String,
    #[serde(default)]
    expiry: Option<ExpiryField>,
}

/// `expiry` has been seen both as a JSON number and as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiryField {
    Seconds(f64),
    Text(String),
}

impl ExpiryField {
    /// Epoch seconds (number or numeric string) or an RFC 3339 timestamp.
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ExpiryField::Seconds(secs) => DateTime::from_timestamp(*secs as i64, 0),
            ExpiryField::Text(text) => {
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(secs) => DateTime::from_timestamp(secs, 0),
                    Err(_) => DateTime::parse_from_rfc3339(text)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc)),
                }
            }
        }
    }
}

/// Parses a `createSession` response body.
fn parse_session_response(body: &[u8]) -> Result<Session, AcquisitionError> {
    let response: CreateSessionResponse = serde_json::from_slice(body)
        .map_err(|e| AcquisitionError::MalformedResponse(e.to_string()))?;

    if response.session.is_empty() {
        return Err(AcquisitionError::MalformedResponse(
            "empty session token".to_string(),
        ));
    }

    let expires_at = match &response.expiry {
        Some(field) => {
            let parsed = field.to_datetime();
            if parsed.is_none() {
                warn!(expiry = ?field, "Ignoring unparseable session expiry");
            }
            parsed
        }
        None => None,
    };

    Ok(Session::new(response.session, expires_at))
}

type SharedAcquisition = Shared<BoxFuture<'static, Result<Session, AcquisitionError>>>;

/// A session request that is underway.
struct PendingAcquisition {
    generation: u64,
    future: SharedAcquisition,
}

#[derive(Default)]
struct SessionState {
    current: Option<Session>,
    pending: Option<PendingAcquisition>,
    generation: u64,
}

struct Inner<C: AsyncHttpClient> {
    client: Arc<C>,
    config: Arc<LayerConfig>,
    endpoints: Arc<Endpoints>,
    state: Mutex<SessionState>,
}

/// What `acquire` found when it looked at the state.
enum Lookup {
    Cached(Session),
    InFlight(SharedAcquisition),
}

/// Acquires, caches and invalidates the layer's session.
///
/// Cloning is cheap and clones share state.
pub struct SessionManager<C: AsyncHttpClient> {
    inner: Arc<Inner<C>>,
}

impl<C: AsyncHttpClient> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: AsyncHttpClient> SessionManager<C> {
    /// Creates a manager with no session. Nothing is fetched until the first
    /// call to [`acquire`](Self::acquire).
    pub fn new(client: Arc<C>, config: Arc<LayerConfig>, endpoints: Arc<Endpoints>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                config,
                endpoints,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Returns a valid session, creating one if needed.
    ///
    /// A cached, unexpired session is returned without I/O. Otherwise the
    /// caller joins the in-flight request, or starts one if there is none.
    pub async fn acquire(&self) -> Result<Session, AcquisitionError> {
        match self.lookup() {
            Lookup::Cached(session) => Ok(session),
            Lookup::InFlight(future) => future.await,
        }
    }

    fn lookup(&self) -> Lookup {
        let mut state = self.inner.state.lock();

        if let Some(session) = state.current.as_ref().filter(|s| !s.is_expired()) {
            return Lookup::Cached(session.clone());
        }

        if let Some(pending) = &state.pending {
            debug!(
                generation = pending.generation,
                "Joining in-flight session request"
            );
            return Lookup::InFlight(pending.future.clone());
        }

        let generation = state.generation;
        let future = Self::create_session(Arc::clone(&self.inner), generation)
            .boxed()
            .shared();
        state.pending = Some(PendingAcquisition {
            generation,
            future: future.clone(),
        });
        debug!(generation = generation, "Starting session request");
        Lookup::InFlight(future)
    }

    async fn create_session(
        inner: Arc<Inner<C>>,
        generation: u64,
    ) -> Result<Session, AcquisitionError> {
        let result = inner.request_session().await;
        inner.complete(generation, result)
    }

    /// The cached session, if any. May be expired.
    pub fn current(&self) -> Option<Session> {
        self.inner.state.lock().current.clone()
    }

    /// True while a session request is underway.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Drops the cached session so the next [`acquire`](Self::acquire)
    /// fetches a new one.
    ///
    /// A request already in flight is kept: its waiters still receive its
    /// outcome and a successful response becomes the current session.
    pub fn expire(&self) {
        let mut state = self.inner.state.lock();
        state.current = None;
        debug!(
            in_flight = state.pending.is_some(),
            "Cached session expired for renewal"
        );
    }

    /// Discards the cached session and any in-flight request.
    ///
    /// Waiters on a discarded request receive [`AcquisitionError::Cancelled`].
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.current = None;
        state.pending = None;
        debug!(generation = state.generation, "Session invalidated");
    }
}

impl<C: AsyncHttpClient> Inner<C> {
    async fn request_session(&self) -> Result<Session, AcquisitionError> {
        let url = self.endpoints.create_session(&self.config.api_key);
        let body = serde_json::to_string(&CreateSessionRequest {
            map_type: self.config.map_type.as_str(),
            language: &self.config.language,
            region: &self.config.region,
            overlay: true,
            scale: "scaleFactor1x",
        })
        .map_err(|e| AcquisitionError::MalformedResponse(e.to_string()))?;

        let response = self.client.post_json(&url, &body).await?;
        parse_session_response(&response)
    }

    /// Records the outcome of the request started for `generation`.
    fn complete(
        &self,
        generation: u64,
        result: Result<Session, AcquisitionError>,
    ) -> Result<Session, AcquisitionError> {
        let mut state = self.state.lock();

        if state.generation != generation {
            debug!(
                generation = generation,
                current_generation = state.generation,
                "Discarding session response from an invalidated request"
            );
            return Err(AcquisitionError::Cancelled);
        }

        state.pending = None;
        match &result {
            Ok(session) => {
                info!(expires_at = ?session.expires_at, "Session acquired");
                state.current = Some(session.clone());
            }
            Err(e) => {
                warn!(error = %e, "Session request failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapType;
    use crate::http::tests::MockAsyncHttpClient;
    use crate::http::HttpError;

    fn manager(client: &MockAsyncHttpClient) -> SessionManager<MockAsyncHttpClient> {
        let config = LayerConfig::new("TestKey").with_map_type(MapType::Satellite);
        SessionManager::new(
            Arc::new(client.clone()),
            Arc::new(config),
            Arc::new(Endpoints::default()),
        )
    }

    #[tokio::test]
    async fn test_acquire_returns_token() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"valid-token"}"#);
        let manager = manager(&client);

        let session = manager.acquire().await.unwrap();

        assert_eq!(session.token, "valid-token");
        assert_eq!(session.expires_at, None);
        assert_eq!(manager.current(), Some(session));
        assert!(!manager.is_pending());
    }

    #[tokio::test]
    async fn test_request_shape() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"X"}"#);
        let manager = manager(&client);

        manager.acquire().await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            requests[0].url,
            "https://www.googleapis.com/tile/v1/createSession?key=TestKey"
        );
        let body: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "mapType": "satellite",
                "language": "en-GB",
                "region": "gb",
                "overlay": true,
                "scale": "scaleFactor1x"
            })
        );
    }

    #[tokio::test]
    async fn test_no_eager_fetch() {
        let client = MockAsyncHttpClient::new();
        let manager = manager(&client);

        assert!(manager.current().is_none());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cached_session_is_reused() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"X"}"#);
        let manager = manager(&client);

        manager.acquire().await.unwrap();
        manager.acquire().await.unwrap();

        assert_eq!(client.count_matching("/createSession"), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_refetched() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"session":"old","expiry":1000}"#);
        let manager = manager(&client);

        let first = manager.acquire().await.unwrap();
        assert!(first.is_expired());

        client.route_json("/createSession", r#"{"session":"new"}"#);
        let second = manager.acquire().await.unwrap();

        assert_eq!(second.token, "new");
        assert_eq!(client.count_matching("/createSession"), 2);
    }

    /// Releases one gated response once a request is waiting on the gate.
    fn release_when_waiting(client: &MockAsyncHttpClient) -> tokio::task::JoinHandle<()> {
        let client = client.clone();
        tokio::spawn(async move {
            while client.in_flight() == 0 {
                tokio::task::yield_now().await;
            }
            client.release(1);
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let client = MockAsyncHttpClient::gated();
        client.route_json("/createSession", r#"{"session":"shared"}"#);
        let manager = manager(&client);

        let releaser = release_when_waiting(&client);
        // join_all polls every caller before the gated response is released
        let results = futures::future::join_all((0..8).map(|_| manager.acquire())).await;
        releaser.await.unwrap();

        assert_eq!(results.len(), 8);
        for result in results {
            assert_eq!(result.unwrap().token, "shared");
        }
        assert_eq!(client.count_matching("/createSession"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failure_then_retry() {
        let client = MockAsyncHttpClient::gated();
        client.route(
            "/createSession",
            Err(HttpError::Status {
                status: 403,
                url: "createSession".to_string(),
            }),
        );
        let manager = manager(&client);

        let releaser = release_when_waiting(&client);
        let results = futures::future::join_all((0..4).map(|_| manager.acquire())).await;
        releaser.await.unwrap();

        for result in results {
            assert!(matches!(
                result,
                Err(AcquisitionError::Http(HttpError::Status { status: 403, .. }))
            ));
        }
        assert_eq!(client.count_matching("/createSession"), 1);
        assert!(!manager.is_pending());
        assert!(manager.current().is_none());

        // The failed request is cleared, so the next call retries
        client.route_json("/createSession", r#"{"session":"retry"}"#);
        client.release(1);
        let session = manager.acquire().await.unwrap();
        assert_eq!(session.token, "retry");
        assert_eq!(client.count_matching("/createSession"), 2);
    }

    #[tokio::test]
    async fn test_malformed_response_rejects() {
        let client = MockAsyncHttpClient::new();
        client.route_json("/createSession", r#"{"token":"wrong-field"}"#);
        let manager = manager(&client);

        let result = manager.acquire().await;
        assert!(matches!(result, Err(AcquisitionError::MalformedResponse(_))));
        assert!(!manager.is_pending());
    }

    #[tokio::test]
    async fn test_invalidate_discards_in_flight_request() {
        let client = MockAsyncHttpClient::gated();
        client.route_json("/createSession", r#"{"session":"stale"}"#);
        let manager = manager(&client);

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };
        while client.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        manager.invalidate();
        client.release(1);

        assert_eq!(waiter.await.unwrap(), Err(AcquisitionError::Cancelled));
        assert!(manager.current().is_none());
        assert!(!manager.is_pending());
    }

    #[tokio::test]
    async fn test_expire_keeps_in_flight_request() {
        let client = MockAsyncHttpClient::gated();
        client.route_json("/createSession", r#"{"session":"first"}"#);
        let manager = manager(&client);

        client.release(1);
        manager.acquire().await.unwrap();

        client.route_json("/createSession", r#"{"session":"second"}"#);
        manager.expire();
        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };
        while client.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        // Expiring again while the request is held does not orphan the waiter
        manager.expire();
        assert!(manager.is_pending());
        let joined = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };
        tokio::task::yield_now().await;
        client.release(1);

        assert_eq!(waiter.await.unwrap().unwrap().token, "second");
        assert_eq!(joined.await.unwrap().unwrap().token, "second");
        assert_eq!(manager.current().unwrap().token, "second");
        assert_eq!(client.count_matching("/createSession"), 2);
    }

    #[test]
    fn test_parse_expiry_formats() {
        let numeric = parse_session_response(br#"{"session":"a","expiry":1700000000}"#).unwrap();
        assert_eq!(numeric.expires_at, DateTime::from_timestamp(1_700_000_000, 0));

        let string = parse_session_response(br#"{"session":"a","expiry":"1700000000"}"#).unwrap();
        assert_eq!(string.expires_at, DateTime::from_timestamp(1_700_000_000, 0));

        let rfc3339 =
            parse_session_response(br#"{"session":"a","expiry":"2025-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(
            rfc3339.expires_at,
            DateTime::from_timestamp(1_735_689_600, 0)
        );

        let garbage = parse_session_response(br#"{"session":"a","expiry":"soon"}"#).unwrap();
        assert_eq!(garbage.expires_at, None);
    }

    #[test]
    fn test_parse_rejects_empty_token() {
        assert!(matches!(
            parse_session_response(br#"{"session":""}"#),
            Err(AcquisitionError::MalformedResponse(_))
        ));
        assert!(parse_session_response(b"not json").is_err());
    }
}
