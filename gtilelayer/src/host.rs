//! The map host's tile-layer extension point.
//!
//! The host owns rendering, input and the attribution widget. These traits
//! describe the small surface a tile layer needs from it, and the callbacks
//! the host drives on the layer.

use std::sync::Arc;

use crate::coord::{LatLngBounds, TileCoord};
use crate::tile::{TileDone, TileImage};

/// Handler registered for view-change (move end / zoom end) notifications.
pub type ViewChangeHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Token returned by [`MapHost::subscribe_view_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// The host's attribution display.
pub trait AttributionControl: Send + Sync {
    fn add_attribution(&self, text: &str);

    fn remove_attribution(&self, text: &str);

    /// Swaps `old` for `new`. Hosts that can update the widget in one step
    /// should override this.
    fn replace_attribution(&self, old: Option<&str>, new: &str) {
        if let Some(old) = old {
            self.remove_attribution(old);
        }
        self.add_attribution(new);
    }
}

/// What a tile layer can ask of the map it is attached to.
pub trait MapHost: Send + Sync {
    /// Registers `handler` to run after every pan or zoom.
    fn subscribe_view_change(&self, handler: ViewChangeHandler) -> SubscriptionId;

    fn unsubscribe_view_change(&self, id: SubscriptionId);

    fn zoom(&self) -> u8;

    /// The visible viewport.
    fn bounds(&self) -> LatLngBounds;

    /// The attribution display, if the map has one.
    fn attribution_control(&self) -> Option<Arc<dyn AttributionControl>>;

    /// Base attach behavior, run while a layer is being added.
    fn layer_added(&self) {}

    /// Base detach behavior, run while a layer is being removed.
    fn layer_removed(&self) {}
}

/// Callbacks a tile layer implements for the host.
pub trait TileLayer: Send + Sync {
    /// Creates the placeholder for one tile. Must return immediately.
    fn create_tile(&self, coords: TileCoord, done: TileDone) -> Arc<TileImage>;

    /// Attribution to show when the layer is first displayed.
    fn get_attribution(&self) -> Option<String>;

    fn on_add(&self, map: Arc<dyn MapHost>);

    fn on_remove(&self, map: &dyn MapHost);
}
