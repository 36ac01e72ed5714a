//! Geocoding adapter configuration.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    concat!("pricemap/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Nominatim's usage policy allows one request per second.
const fn default_min_interval_ms() -> u64 {
    1000
}

/// A hand-curated coordinate for an address the remote service gets wrong.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OverrideEntry {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeocoderConfig {
    /// Nominatim-compatible search endpoint root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Minimum pause between two remote lookups, in milliseconds.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Consulted before any remote lookup.
    #[serde(default)]
    pub overrides: Vec<OverrideEntry>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            min_interval_ms: default_min_interval_ms(),
            overrides: Vec::new(),
        }
    }
}
