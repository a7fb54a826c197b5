//! Viewport attribution lookup.
//!
//! The copyright string for Map Tiles imagery depends on what is on screen.
//! After every view change the layer asks `/viewport` for the current string
//! and swaps it into the host's attribution control. A failed lookup keeps
//! the previous string displayed.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::config::LayerConfig;
use crate::coord::LatLngBounds;
use crate::endpoints::Endpoints;
use crate::error::AttributionError;
use crate::host::AttributionControl;
use crate::http::AsyncHttpClient;
use crate::session::SessionManager;

#[derive(Debug, Deserialize)]
struct ViewportResponse {
    copyright: String,
}

fn parse_viewport_response(body: &[u8]) -> Result<String, AttributionError> {
    serde_json::from_slice::<ViewportResponse>(body)
        .map(|response| response.copyright)
        .map_err(|e| AttributionError::MalformedResponse(e.to_string()))
}

/// Looks up and tracks the attribution shown for this layer.
pub struct AttributionSync<C: AsyncHttpClient> {
    client: Arc<C>,
    config: Arc<LayerConfig>,
    endpoints: Arc<Endpoints>,
    sessions: SessionManager<C>,
    /// The string currently on the host's control, if any.
    displayed: Mutex<Option<String>>,
    /// Held across host calls in `apply` and `clear`. `displayed` is not, so
    /// a control may read [`current`](Self::current) while being updated.
    updates: Mutex<()>,
}

impl<C: AsyncHttpClient> AttributionSync<C> {
    pub fn new(
        client: Arc<C>,
        config: Arc<LayerConfig>,
        endpoints: Arc<Endpoints>,
        sessions: SessionManager<C>,
    ) -> Self {
        Self {
            client,
            config,
            endpoints,
            sessions,
            displayed: Mutex::new(None),
            updates: Mutex::new(()),
        }
    }

    /// Fetches the copyright string for a viewport.
    pub async fn lookup(
        &self,
        zoom: u8,
        bounds: &LatLngBounds,
    ) -> Result<String, AttributionError> {
        let session = self.sessions.acquire().await?;
        let url = self
            .endpoints
            .viewport(&session.token, zoom, bounds, &self.config.api_key);

        let body = self.client.get(&url).await?;
        parse_viewport_response(&body)
    }

    /// Replaces the displayed string with `text`.
    ///
    /// `still_attached` is checked under the same lock [`clear`](Self::clear)
    /// takes, so a lookup that finishes after detach never reaches the
    /// control. The control must not call back into `apply` or `clear`.
    /// Returns whether the control was updated.
    pub fn apply(
        &self,
        control: &dyn AttributionControl,
        text: String,
        still_attached: impl FnOnce() -> bool,
    ) -> bool {
        let _updates = self.updates.lock();
        if !still_attached() {
            debug!("Layer detached during attribution lookup, discarding result");
            return false;
        }

        let old = {
            let mut displayed = self.displayed.lock();
            if displayed.as_deref() == Some(text.as_str()) {
                return true;
            }
            if text.is_empty() {
                displayed.take()
            } else {
                displayed.replace(text.clone())
            }
        };

        if text.is_empty() {
            if let Some(old) = old {
                control.remove_attribution(&old);
            }
        } else {
            control.replace_attribution(old.as_deref(), &text);
        }
        true
    }

    /// Removes the displayed string from `control` and forgets it.
    pub fn clear(&self, control: Option<&dyn AttributionControl>) {
        let _updates = self.updates.lock();
        let old = self.displayed.lock().take();
        if let (Some(old), Some(control)) = (old, control) {
            control.remove_attribution(&old);
        }
    }

    /// The string currently displayed for this layer.
    pub fn current(&self) -> Option<String> {
        self.displayed.lock().clone()
    }
}
