//! Ingest → reconcile → commit.

use anyhow::Context;
use chrono::Utc;
use pricemap_config::{IngestConfig, PricemapConfig};
use pricemap_core::{Coordinates, Geocoder, IngestOutcome, ReconcileReport, plan_reconciliation};
use pricemap_store::DuckStore;
use pricemap_sync::{
    FeedSource, FileSource, GeocodingAdapter, ManualCorrections, NominatimClient, OfferSource,
    collect_offers,
};
use tracing::{info, warn};

/// Feeds first, then files, in config order.
pub fn build_sources(ingest: &IngestConfig) -> Vec<Box<dyn OfferSource>> {
    let feeds = ingest
        .feeds
        .iter()
        .map(|url| Box::new(FeedSource::new(url.clone())) as Box<dyn OfferSource>);
    let files = ingest
        .files
        .iter()
        .map(|path| Box::new(FileSource::new(path.clone())) as Box<dyn OfferSource>);
    feeds.chain(files).collect()
}

pub fn build_geocoder(
    config: &PricemapConfig,
) -> anyhow::Result<GeocodingAdapter<NominatimClient>> {
    let corrections = ManualCorrections::new(config.geocoder.overrides.iter().map(|entry| {
        (
            entry.address.clone(),
            Coordinates::new(entry.latitude, entry.longitude),
        )
    }));
    let remote = NominatimClient::new(&config.geocoder.base_url, &config.geocoder.user_agent)
        .context("failed to build geocoding client")?;
    info!(
        overrides = corrections.len(),
        base_url = %config.geocoder.base_url,
        "geocoder ready"
    );
    Ok(GeocodingAdapter::new(
        corrections,
        remote,
        config.min_geocode_interval(),
    ))
}

/// Run one reconciliation cycle.
///
/// Returns `None` when ingestion failed; the registry is then left exactly as
/// it was. A commit failure is an error and also leaves nothing written.
pub async fn update_registry(
    store: &mut DuckStore,
    sources: &[Box<dyn OfferSource>],
    geocoder: &dyn Geocoder,
    dry_run: bool,
) -> anyhow::Result<Option<ReconcileReport>> {
    let batch = match collect_offers(sources).await {
        IngestOutcome::Fetched(batch) => batch,
        IngestOutcome::Failed { source, reason } => {
            warn!(%source, %reason, "ingestion failed, registry left untouched");
            return Ok(None);
        }
    };

    let current = store
        .load_registry()
        .context("failed to read the current registry")?;
    let plan = plan_reconciliation(&current, batch, geocoder, Utc::now()).await;

    if dry_run {
        info!(report = %plan.report, "dry run, nothing written");
    } else {
        store
            .apply(&plan)
            .context("reconciliation commit failed, registry unchanged")?;
    }
    Ok(Some(plan.report))
}
