//! Map Tiles API endpoint construction.
//!
//! All three endpoints hang off one base URL. The key and session token are
//! passed as query parameters.

use crate::coord::{LatLngBounds, TileCoord};

/// Production base URL of the Map Tiles API.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/tile/v1";

/// Endpoint templates for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Endpoints {
    /// Creates endpoints rooted at `base_url`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    /// `POST {base}/createSession?key={api_key}`
    pub fn create_session(&self, api_key: &str) -> String {
        format!("{}/createSession?key={}", self.base_url, api_key)
    }

    /// `GET {base}/tiles/{z}/{x}/{y}?session={session}&orientation=0&key={api_key}`
    pub fn tile(&self, coords: TileCoord, session: &str, api_key: &str) -> String {
        format!(
            "{}/tiles/{}/{}/{}?session={}&orientation=0&key={}",
            self.base_url, coords.z, coords.x, coords.y, session, api_key
        )
    }

    /// `GET {base}/viewport?session=..&zoom=..&north=..&south=..&east=..&west=..&key=..`
    pub fn viewport(
        &self,
        session: &str,
        zoom: u8,
        bounds: &LatLngBounds,
        api_key: &str,
    ) -> String {
        format!(
            "{}/viewport?session={}&zoom={}&north={}&south={}&east={}&west={}&key={}",
            self.base_url,
            session,
            zoom,
            bounds.north,
            bounds.south,
            bounds.east,
            bounds.west,
            api_key
        )
    }
}
