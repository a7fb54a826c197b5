//! Google Map Tiles layer.
//!
//! [`GoogleTileLayer`] implements the host's [`TileLayer`] extension point:
//!
//! ```text
//! host                          GoogleTileLayer
//! ────                          ───────────────
//! new(config) ────────────────► validate config (no I/O)
//! on_add(map) ────────────────► subscribe view changes
//!                               map.layer_added()
//!                               spawn refresh loop ──► SessionManager
//!                               spawn attribution sync
//! create_tile(z/x/y, done) ───► TileImage (returned at once)
//!                               spawn: acquire session → set_source(url)
//! view change ────────────────► spawn attribution sync
//! on_remove(map) ─────────────► unsubscribe, cancel refresh loop,
//!                               drop session, remove attribution,
//!                               map.layer_removed()
//! ```
//!
//! `on_add`, `create_tile` and view-change handlers spawn work on the Tokio
//! runtime that was current when the layer was attached.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attribution::AttributionSync;
use crate::config::LayerConfig;
use crate::coord::TileCoord;
use crate::endpoints::Endpoints;
use crate::error::{AcquisitionError, ConfigError};
use crate::host::{MapHost, SubscriptionId, TileLayer, ViewChangeHandler};
use crate::http::AsyncHttpClient;
use crate::session::{run_refresh_loop, Session, SessionManager};
use crate::tile::{TileDone, TileImage};

/// Layer state that exists only while attached to a map.
struct Attachment {
    map: Arc<dyn MapHost>,
    subscription: SubscriptionId,
    /// Cancelled on detach. Guards the refresh loop and attribution updates.
    active: CancellationToken,
    /// The attribution sync started by `on_add`, until someone waits on it.
    initial_sync: Option<JoinHandle<()>>,
}

struct LayerInner<C: AsyncHttpClient> {
    config: Arc<LayerConfig>,
    endpoints: Arc<Endpoints>,
    sessions: SessionManager<C>,
    attribution: AttributionSync<C>,
    attachment: Mutex<Option<Attachment>>,
}

/// Tile layer backed by the Google Map Tiles API.
///
/// # Example
///
/// ```no_run
/// use gtilelayer::config::{LayerConfig, MapType};
/// use gtilelayer::http::ReqwestClient;
/// use gtilelayer::layer::GoogleTileLayer;
///
/// let config = LayerConfig::new("YOUR_API_KEY").with_map_type(MapType::Satellite);
/// let layer = GoogleTileLayer::new(config, ReqwestClient::new().unwrap())
///     .expect("valid configuration");
/// // Hand `layer` to the map host, which calls on_add / create_tile / on_remove.
/// ```
pub struct GoogleTileLayer<C: AsyncHttpClient> {
    inner: Arc<LayerInner<C>>,
}

impl<C: AsyncHttpClient> GoogleTileLayer<C> {
    /// Creates a layer against the production API.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the API key is missing or the refresh policy is
    /// invalid. No network request is made.
    pub fn new(config: LayerConfig, client: C) -> Result<Self, ConfigError> {
        Self::with_endpoints(config, client, Endpoints::default())
    }

    /// Creates a layer against a custom API base URL.
    pub fn with_endpoints(
        config: LayerConfig,
        client: C,
        endpoints: Endpoints,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = Arc::new(client);
        let config = Arc::new(config);
        let endpoints = Arc::new(endpoints);
        let sessions = SessionManager::new(
            Arc::clone(&client),
            Arc::clone(&config),
            Arc::clone(&endpoints),
        );
        let attribution = AttributionSync::new(
            client,
            Arc::clone(&config),
            Arc::clone(&endpoints),
            sessions.clone(),
        );

        debug!(
            map_type = %config.map_type,
            language = %config.language,
            region = %config.region,
            "Google tile layer created"
        );

        Ok(Self {
            inner: Arc::new(LayerInner {
                config,
                endpoints,
                sessions,
                attribution,
                attachment: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &LayerConfig {
        &self.inner.config
    }

    /// The cached session, if one has been acquired.
    pub fn session(&self) -> Option<Session> {
        self.inner.sessions.current()
    }

    /// Returns a valid session, sharing any request already in flight.
    pub async fn acquire_session(&self) -> Result<Session, AcquisitionError> {
        self.inner.sessions.acquire().await
    }

    /// URL for `coords` using the cached session.
    ///
    /// `None` while no unexpired session is cached: a URL is never built
    /// without a valid token.
    pub fn tile_url(&self, coords: TileCoord) -> Option<String> {
        self.inner
            .sessions
            .current()
            .filter(|session| !session.is_expired())
            .map(|session| self.inner.tile_url(coords, &session))
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attachment.lock().is_some()
    }

    /// Looks up the attribution for the current viewport and displays it.
    ///
    /// Does nothing when detached or when the map has no attribution control.
    pub async fn resync_attribution(&self) {
        self.inner.resync_attribution().await;
    }

    /// Waits for the attribution sync that `on_add` started.
    ///
    /// Returns at once when detached or when the sync was already awaited.
    pub async fn wait_for_initial_attribution(&self) {
        let handle = self
            .inner
            .attachment
            .lock()
            .as_mut()
            .and_then(|a| a.initial_sync.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Initial attribution sync did not complete");
            }
        }
    }
}

impl<C: AsyncHttpClient> LayerInner<C> {
    fn tile_url(&self, coords: TileCoord, session: &Session) -> String {
        self.endpoints
            .tile(coords, &session.token, &self.config.api_key)
    }

    async fn resync_attribution(&self) {
        let attached = self
            .attachment
            .lock()
            .as_ref()
            .map(|a| (Arc::clone(&a.map), a.active.clone()));
        let Some((map, active)) = attached else {
            debug!("Attribution sync skipped, layer not attached");
            return;
        };
        let Some(control) = map.attribution_control() else {
            debug!("Attribution sync skipped, map has no attribution control");
            return;
        };

        let zoom = map.zoom();
        let bounds = map.bounds();

        match self.attribution.lookup(zoom, &bounds).await {
            Ok(text) => {
                let applied =
                    self.attribution
                        .apply(control.as_ref(), text, || !active.is_cancelled());
                if applied {
                    debug!(
                        zoom = zoom,
                        attribution = ?self.attribution.current(),
                        "Attribution updated"
                    );
                }
            }
            Err(e) => {
                warn!(
                    zoom = zoom,
                    error = %e,
                    "Attribution lookup failed, keeping previous attribution"
                );
            }
        }
    }

    fn spawn_resync(self: &Arc<Self>, runtime: &Handle) -> JoinHandle<()> {
        let inner = Arc::clone(self);
        runtime.spawn(async move { inner.resync_attribution().await })
    }
}

impl<C: AsyncHttpClient> Drop for LayerInner<C> {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.get_mut().take() {
            attachment.active.cancel();
            attachment
                .map
                .unsubscribe_view_change(attachment.subscription);
        }
    }
}

impl<C: AsyncHttpClient> TileLayer for GoogleTileLayer<C> {
    fn create_tile(&self, coords: TileCoord, done: TileDone) -> Arc<TileImage> {
        let tile = TileImage::new(coords, self.inner.config.cross_origin, done);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                error!(tile = %coords, "create_tile called outside a Tokio runtime");
                return tile;
            }
        };

        let inner = Arc::clone(&self.inner);
        let pending = Arc::clone(&tile);
        runtime.spawn(async move {
            match inner.sessions.acquire().await {
                Ok(session) => pending.set_source(inner.tile_url(coords, &session)),
                // The host's load machinery reports the unresolved tile
                Err(e) => warn!(tile = %coords, error = %e, "No session for tile"),
            }
        });

        tile
    }

    fn get_attribution(&self) -> Option<String> {
        self.inner.attribution.current()
    }

    fn on_add(&self, map: Arc<dyn MapHost>) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                error!("on_add called outside a Tokio runtime, layer not attached");
                return;
            }
        };

        let mut attachment = self.inner.attachment.lock();
        if attachment.is_some() {
            warn!("Layer is already attached to a map");
            return;
        }

        let weak: Weak<LayerInner<C>> = Arc::downgrade(&self.inner);
        let handler_runtime = runtime.clone();
        let handler: ViewChangeHandler = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.spawn_resync(&handler_runtime);
            }
        });
        let subscription = map.subscribe_view_change(handler);

        map.layer_added();

        let active = CancellationToken::new();
        runtime.spawn(run_refresh_loop(
            self.inner.sessions.clone(),
            self.inner.config.refresh.clone(),
            active.clone(),
        ));

        *attachment = Some(Attachment {
            map,
            subscription,
            active,
            initial_sync: None,
        });
        drop(attachment);

        info!(map_type = %self.inner.config.map_type, "Google tile layer attached");
        let sync = self.inner.spawn_resync(&runtime);
        if let Some(attachment) = self.inner.attachment.lock().as_mut() {
            attachment.initial_sync = Some(sync);
        }
    }

    fn on_remove(&self, map: &dyn MapHost) {
        let Some(attachment) = self.inner.attachment.lock().take() else {
            debug!("on_remove called on a detached layer");
            return;
        };

        map.unsubscribe_view_change(attachment.subscription);
        attachment.active.cancel();
        self.inner.sessions.invalidate();
        self.inner
            .attribution
            .clear(map.attribution_control().as_deref());
        map.layer_removed();

        info!("Google tile layer detached");
    }
}
