//! Headless map host.
//!
//! Stands in for a rendering map so the layer can be attached from the
//! command line. The viewport is fixed, so view-change handlers never fire,
//! and the attribution display is a plain list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use gtilelayer::host::{AttributionControl, MapHost, SubscriptionId, ViewChangeHandler};
use gtilelayer::LatLngBounds;

/// Attribution strings currently displayed, in insertion order.
#[derive(Default)]
pub struct HeadlessAttribution {
    entries: Mutex<Vec<String>>,
}

impl HeadlessAttribution {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl AttributionControl for HeadlessAttribution {
    fn add_attribution(&self, text: &str) {
        debug!(attribution = text, "Attribution added");
        self.entries.lock().push(text.to_string());
    }

    fn remove_attribution(&self, text: &str) {
        debug!(attribution = text, "Attribution removed");
        self.entries.lock().retain(|e| e != text);
    }
}

/// A map with a fixed viewport and no renderer.
pub struct HeadlessMap {
    zoom: u8,
    bounds: LatLngBounds,
    handlers: Mutex<HashMap<u64, ViewChangeHandler>>,
    next_id: AtomicU64,
    attribution: Arc<HeadlessAttribution>,
}

impl HeadlessMap {
    pub fn new(zoom: u8, bounds: LatLngBounds) -> Arc<Self> {
        Arc::new(Self {
            zoom,
            bounds,
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            attribution: Arc::new(HeadlessAttribution::default()),
        })
    }

    pub fn attribution(&self) -> &HeadlessAttribution {
        &self.attribution
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

impl MapHost for HeadlessMap {
    fn subscribe_view_change(&self, handler: ViewChangeHandler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, handler);
        SubscriptionId(id)
    }

    fn unsubscribe_view_change(&self, id: SubscriptionId) {
        self.handlers.lock().remove(&id.0);
    }

    fn zoom(&self) -> u8 {
        self.zoom
    }

    fn bounds(&self) -> LatLngBounds {
        self.bounds
    }

    fn attribution_control(&self) -> Option<Arc<dyn AttributionControl>> {
        let control: Arc<dyn AttributionControl> = self.attribution.clone();
        Some(control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn bounds() -> LatLngBounds {
        LatLngBounds::new(51.3, -0.5, 51.7, 0.3)
    }

    #[test]
    fn test_attribution_list() {
        let map = HeadlessMap::new(10, bounds());
        let control = map.attribution_control().unwrap();

        control.add_attribution("A");
        control.replace_attribution(Some("A"), "B");

        assert_eq!(map.attribution().entries(), vec!["B".to_string()]);
    }

    #[test]
    fn test_remove_keeps_other_entries() {
        let map = HeadlessMap::new(10, bounds());
        let control = map.attribution_control().unwrap();

        control.add_attribution("Other");
        control.add_attribution("Mine");
        control.remove_attribution("Mine");

        assert_eq!(map.attribution().entries(), vec!["Other".to_string()]);
    }

    #[test]
    fn test_subscriptions() {
        let map = HeadlessMap::new(10, bounds());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let first = map.subscribe_view_change(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let second = map.subscribe_view_change(Arc::new(|| {}));
        assert_ne!(first, second);
        assert_eq!(map.subscriber_count(), 2);

        map.unsubscribe_view_change(first);
        map.unsubscribe_view_change(second);

        assert_eq!(map.subscriber_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(map.zoom(), 10);
    }
}
