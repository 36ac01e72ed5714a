//! Geocoding boundary used by reconciliation.

use async_trait::async_trait;

use crate::shop::Coordinates;

/// Where a resolved coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Hand-curated correction table; no network call was made.
    Override,
    /// Remote geocoding service.
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub coordinates: Coordinates,
    pub source: ResolutionSource,
}

/// Address → coordinates oracle.
///
/// Implementations never fail hard: lookup errors and empty answers both
/// come back as `None` and are logged by the implementation.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<Resolution>;
}
