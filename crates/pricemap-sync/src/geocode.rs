//! Geocoding adapter: manual corrections first, then a rate-limited remote
//! Nominatim lookup.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use pricemap_core::{Coordinates, Geocoder, Resolution, ResolutionSource};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::SyncError;

/// Address fragments that confuse the remote search and are dropped.
const NOISE_TOKENS: &[&str] = &["г.", "ул.", "пр-т", "тр-т"];

/// Immutable `address → coordinates` table, matched on the exact address.
#[derive(Debug, Clone, Default)]
pub struct ManualCorrections {
    table: HashMap<String, Coordinates>,
}

impl ManualCorrections {
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Coordinates)>,
    {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, address: &str) -> Option<Coordinates> {
        self.table.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Normalise an address for the remote search engine.
///
/// Drops street-type abbreviations and turns building suffixes written with a
/// slash (`13/1`) into the `к` form (`13 к1`) the search index understands.
pub fn clean_address(address: &str) -> String {
    let mut cleaned = address.to_string();
    for token in NOISE_TOKENS {
        cleaned = cleaned.replace(token, "");
    }
    cleaned = cleaned.replace('/', " к");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Enforces a minimum gap between the end of one call and the start of the
/// next. Calls are serialised through the internal lock.
pub struct Throttle {
    min_interval: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_finished: Mutex::new(None),
        }
    }

    pub async fn run<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last = self.last_finished.lock().await;
        if let Some(finished) = *last {
            sleep_until(finished + self.min_interval).await;
        }
        let output = call.await;
        *last = Some(Instant::now());
        output
    }
}

/// A remote address search.
///
/// `Ok(None)` means the service answered but found nothing.
#[async_trait]
pub trait RemoteLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>, SyncError>;
}

#[derive(Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Parse a Nominatim `/search?format=json` body, taking the first hit.
pub fn parse_search_response(body: &str) -> Result<Option<Coordinates>, SyncError> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)?;
    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };
    let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|_| SyncError::Malformed(format!("latitude {:?}", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|_| SyncError::Malformed(format!("longitude {:?}", hit.lon)))?;
    // `f64::from_str` accepts "NaN" and "inf".
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(SyncError::Malformed(format!(
            "non-finite position {:?}, {:?}",
            hit.lat, hit.lon
        )));
    }
    debug!(display_name = %hit.display_name, latitude, longitude, "search hit");
    Ok(Some(Coordinates::new(latitude, longitude)))
}

/// Nominatim search API client.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    /// `base_url` should be like `https://nominatim.openstreetmap.org`.
    /// Nominatim requires an identifying `User-Agent`.
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RemoteLookup for NominatimClient {
    async fn lookup(&self, query: &str) -> Result<Option<Coordinates>, SyncError> {
        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        parse_search_response(&body)
    }
}

/// [`Geocoder`] that checks the correction table before going remote.
///
/// Remote lookups go through a [`Throttle`]; correction hits never wait.
pub struct GeocodingAdapter<R> {
    corrections: ManualCorrections,
    remote: R,
    throttle: Throttle,
}

impl<R: RemoteLookup> GeocodingAdapter<R> {
    pub fn new(corrections: ManualCorrections, remote: R, min_interval: Duration) -> Self {
        Self {
            corrections,
            remote,
            throttle: Throttle::new(min_interval),
        }
    }
}

#[async_trait]
impl<R: RemoteLookup> Geocoder for GeocodingAdapter<R> {
    async fn resolve(&self, address: &str) -> Option<Resolution> {
        if let Some(coordinates) = self.corrections.get(address) {
            info!(address, "using manual correction");
            return Some(Resolution {
                coordinates,
                source: ResolutionSource::Override,
            });
        }

        let query = clean_address(address);
        match self.throttle.run(self.remote.lookup(&query)).await {
            Ok(Some(coordinates)) => {
                debug!(address, query = %query, "geocoded");
                Some(Resolution {
                    coordinates,
                    source: ResolutionSource::Remote,
                })
            }
            Ok(None) => {
                warn!(address, query = %query, "geocoder found nothing");
                None
            }
            Err(error) => {
                warn!(address, %error, "geocoding failed");
                None
            }
        }
    }
}
