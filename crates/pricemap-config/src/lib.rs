//! # pricemap-config
//!
//! Layered configuration loading using figment.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`PRICEMAP_*` prefix, `__` as separator)
//! 2. Project-level `pricemap.toml` (or the file passed with `--config`)
//! 3. User-level `~/.config/pricemap/config.toml`
//! 4. Built-in defaults
//!
//! `PRICEMAP_STORE__PATH` maps to `store.path`,
//! `PRICEMAP_PARTITION__MARGIN` to `partition.margin`, and so on.

mod error;
mod geocoder;
mod sections;

pub use error::ConfigError;
pub use geocoder::{GeocoderConfig, OverrideEntry};
pub use sections::{IngestConfig, PartitionConfig, StoreConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

/// Project-local config file name.
pub const LOCAL_CONFIG_FILE: &str = "pricemap.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PricemapConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

impl PricemapConfig {
    /// Load from all sources and validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(LOCAL_CONFIG_FILE))
    }

    /// Like [`load`](Self::load) but with an explicit project config file.
    pub fn load_from(local: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(local).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env` from the working directory first, then everything else.
    pub fn load_with_dotenv(local: &Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load_from(local)
    }

    /// The provider chain, exposed so tests can extract from it directly.
    pub fn figment(local: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        if local.exists() {
            figment = figment.merge(Toml::file(local));
        }

        figment.merge(Env::prefixed("PRICEMAP_").split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pricemap").join("config.toml"))
    }

    /// Reject values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let margin = self.partition.margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "partition.margin".into(),
                reason: format!("must be a finite, non-negative number (got {margin})"),
            });
        }

        for entry in &self.geocoder.overrides {
            if !entry.latitude.is_finite() || !entry.longitude.is_finite() {
                return Err(ConfigError::InvalidValue {
                    field: "geocoder.overrides".into(),
                    reason: format!("non-finite coordinates for {:?}", entry.address),
                });
            }
        }

        if self.geocoder.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "geocoder.base_url".into(),
                reason: "must not be empty".into(),
            });
        }

        Ok(())
    }

    pub fn min_geocode_interval(&self) -> Duration {
        Duration::from_millis(self.geocoder.min_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PricemapConfig::default();
        config.validate().unwrap();
        assert_eq!(config.min_geocode_interval(), Duration::from_secs(1));
    }

    #[test]
    fn negative_margin_rejected() {
        let mut config = PricemapConfig::default();
        config.partition.margin = -0.1;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "partition.margin"
        ));
    }

    #[test]
    fn nan_margin_rejected() {
        let mut config = PricemapConfig::default();
        config.partition.margin = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_override_rejected() {
        let mut config = PricemapConfig::default();
        config.geocoder.overrides.push(OverrideEntry {
            address: "x".into(),
            latitude: f64::INFINITY,
            longitude: 0.0,
        });
        assert!(config.validate().is_err());
    }
}
