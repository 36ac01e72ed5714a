//! Store, ingestion, and partitioning configuration.

use std::path::PathBuf;

use pricemap_core::UnboundedPolicy;
use serde::{Deserialize, Serialize};

fn default_db_path() -> PathBuf {
    PathBuf::from("shops.duckdb")
}

/// Margin in degrees; about 5 km at city latitudes.
const fn default_margin() -> f64 {
    0.05
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// DuckDB database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Where offer batches come from. All sources together form one snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IngestConfig {
    /// URLs serving a JSON array of offers.
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Local JSON files with the same shape.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl IngestConfig {
    pub fn is_configured(&self) -> bool {
        !self.feeds.is_empty() || !self.files.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartitionConfig {
    /// Expansion of the shops' bounding box on every side.
    #[serde(default = "default_margin")]
    pub margin: f64,

    #[serde(default)]
    pub unbounded: UnboundedPolicy,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            unbounded: UnboundedPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(StoreConfig::default().path, PathBuf::from("shops.duckdb"));
        assert!(!IngestConfig::default().is_configured());
        let partition = PartitionConfig::default();
        assert_eq!(partition.margin, 0.05);
        assert_eq!(partition.unbounded, UnboundedPolicy::Drop);
    }
}
