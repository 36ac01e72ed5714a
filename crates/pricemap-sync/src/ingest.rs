//! Offer sources and their combination into one ingestion outcome.

use std::path::PathBuf;

use async_trait::async_trait;
use pricemap_core::{IngestOutcome, RawOffer};
use tracing::{debug, info, warn};

use crate::SyncError;

/// Discount text some sites use for shops that are shut today.
const CLOSED_MARKER: &str = "не работает";

/// Anything that can produce a list of raw offers.
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Short label used in logs and failure reports.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<RawOffer>, SyncError>;
}

/// A URL serving a JSON array of offers.
pub struct FeedSource {
    client: reqwest::Client,
    url: String,
}

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl OfferSource for FeedSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<RawOffer>, SyncError> {
        info!(url = %self.url, "fetching offer feed");
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let offers: Vec<RawOffer> = resp.json().await?;
        info!(count = offers.len(), url = %self.url, "fetched offers");
        Ok(offers)
    }
}

/// A local JSON file with the same shape as a feed.
pub struct FileSource {
    path: PathBuf,
    label: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }
}

#[async_trait]
impl OfferSource for FileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<RawOffer>, SyncError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SyncError::Io {
                path: self.path.clone(),
                source,
            })?;
        let offers: Vec<RawOffer> = serde_json::from_str(&text)?;
        info!(count = offers.len(), path = %self.label, "read offers");
        Ok(offers)
    }
}

/// Drop offers that cannot describe a live shop: blank address, blank or
/// placeholder discount, or a shop marked closed.
pub fn retain_live_offers(offers: Vec<RawOffer>) -> Vec<RawOffer> {
    let before = offers.len();
    let live: Vec<RawOffer> = offers
        .into_iter()
        .filter(|o| {
            let discount = o.discount_text.trim();
            !o.address.trim().is_empty()
                && !discount.is_empty()
                && discount != "-"
                && !discount.to_lowercase().contains(CLOSED_MARKER)
        })
        .collect();
    if live.len() < before {
        debug!(dropped = before - live.len(), "filtered offers");
    }
    live
}

/// Fetch every source in order and combine the results.
///
/// The batch is only usable as a full snapshot if every source answered, so
/// a single failing source fails the whole outcome. No sources at all is
/// also a failure: an empty snapshot would wipe the registry.
pub async fn collect_offers(sources: &[Box<dyn OfferSource>]) -> IngestOutcome {
    if sources.is_empty() {
        return IngestOutcome::Failed {
            source: "config".into(),
            reason: "no offer sources configured".into(),
        };
    }

    let mut all = Vec::new();
    for source in sources {
        match source.fetch().await {
            Ok(offers) => all.extend(retain_live_offers(offers)),
            Err(error) => {
                warn!(source = source.name(), %error, "offer source failed");
                return IngestOutcome::Failed {
                    source: source.name().to_string(),
                    reason: error.to_string(),
                };
            }
        }
    }

    info!(count = all.len(), sources = sources.len(), "ingestion complete");
    IngestOutcome::Fetched(all)
}
