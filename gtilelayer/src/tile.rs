//! Tile placeholders handed to the host.
//!
//! A [`TileImage`] is created synchronously when the host asks for a tile and
//! receives its source URL later, once a session exists. The host watches for
//! the source, loads the image however it renders, and reports the outcome
//! through [`TileImage::notify_loaded`] or [`TileImage::notify_error`], which
//! runs the host's completion callback exactly once.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

use crate::coord::TileCoord;

/// A tile image failed to load. Reported by the host, passed back to it
/// unchanged through the [`TileDone`] callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tile {coords} failed to load: {reason}")]
pub struct TileLoadError {
    pub coords: TileCoord,
    pub reason: String,
}

/// Host callback invoked once a tile has loaded or failed.
pub type TileDone = Box<dyn FnOnce(Option<TileLoadError>, Arc<TileImage>) + Send + 'static>;

/// Opaque displayable tile resource.
pub struct TileImage {
    coords: TileCoord,
    /// Alternative text. Always empty so screen readers skip the raw URL.
    alt: String,
    /// `Some("")` requests anonymous cross-origin loading.
    cross_origin: Option<String>,
    source: watch::Sender<Option<String>>,
    done: Mutex<Option<TileDone>>,
}

impl fmt::Debug for TileImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileImage")
            .field("coords", &self.coords)
            .field("alt", &self.alt)
            .field("cross_origin", &self.cross_origin)
            .field("source", &*self.source.borrow())
            .finish_non_exhaustive()
    }
}

impl TileImage {
    pub(crate) fn new(coords: TileCoord, cross_origin: bool, done: TileDone) -> Arc<Self> {
        let (source, _) = watch::channel(None);
        Arc::new(Self {
            coords,
            alt: String::new(),
            cross_origin: cross_origin.then(String::new),
            source,
            done: Mutex::new(Some(done)),
        })
    }

    pub fn coords(&self) -> TileCoord {
        self.coords
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

    pub fn cross_origin(&self) -> Option<&str> {
        self.cross_origin.as_deref()
    }

    /// The tile URL, once assigned.
    pub fn source(&self) -> Option<String> {
        self.source.borrow().clone()
    }

    /// Assigns the tile URL. The host starts loading when it sees this.
    pub(crate) fn set_source(&self, url: String) {
        self.source.send_replace(Some(url));
    }

    /// Waits until a URL is assigned.
    ///
    /// Never completes if no session can be obtained; hosts should apply
    /// their own load timeout as they would for any image.
    pub async fn wait_for_source(&self) -> String {
        let mut rx = self.source.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(url) = current {
                return url;
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender
                std::future::pending::<()>().await;
            }
        }
    }

    /// True once the host has reported the outcome.
    pub fn is_settled(&self) -> bool {
        self.done.lock().is_none()
    }

    /// Host reports that the image loaded.
    pub fn notify_loaded(self: &Arc<Self>) {
        self.settle(None);
    }

    /// Host reports that the image failed to load.
    pub fn notify_error(self: &Arc<Self>, reason: impl Into<String>) {
        let error = TileLoadError {
            coords: self.coords,
            reason: reason.into(),
        };
        self.settle(Some(error));
    }

    fn settle(self: &Arc<Self>, error: Option<TileLoadError>) {
        // Take the callback before calling it so a re-entrant notify is a no-op
        let done = self.done.lock().take();
        if let Some(done) = done {
            done(error, Arc::clone(self));
        }
    }
}
