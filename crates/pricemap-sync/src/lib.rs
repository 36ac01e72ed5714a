//! Network edge: offer ingestion sources and the geocoding adapter.

pub mod error;
pub mod geocode;
pub mod ingest;

pub use error::SyncError;
pub use geocode::{GeocodingAdapter, ManualCorrections, NominatimClient, RemoteLookup, Throttle};
pub use ingest::{FeedSource, FileSource, OfferSource, collect_offers};
