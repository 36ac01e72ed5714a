//! Registry record types shared between ingestion, the store, and the engines.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shop name used when an ingestion record does not carry one.
pub const DEFAULT_SHOP_NAME: &str = "Unknown";

/// Map colour assigned to a shop from its current offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    Green,
    Orange,
    Red,
    #[default]
    Gray,
}

impl ColorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Gray => "gray",
        }
    }
}

impl fmt::Display for ColorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown color class: {0:?}")]
pub struct UnknownColor(pub String);

impl FromStr for ColorClass {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "orange" => Ok(Self::Orange),
            "red" => Ok(Self::Red),
            "gray" | "grey" => Ok(Self::Gray),
            _ => Err(UnknownColor(s.to_string())),
        }
    }
}

/// Registry identity: `(shop_name, address)`, compared byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShopKey {
    pub shop_name: String,
    pub address: String,
}

impl ShopKey {
    pub fn new(shop_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for ShopKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.shop_name, self.address)
    }
}

/// Planar coordinates in storage order (latitude first).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A persisted shop with its current offer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopRecord {
    pub shop_name: String,
    pub address: String,
    pub discount_text: String,
    pub color_class: ColorClass,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

impl ShopRecord {
    pub fn key(&self) -> ShopKey {
        ShopKey::new(&self.shop_name, &self.address)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// One offer as produced by an ingestion source.
///
/// Wire names follow the feed format: `discount` and `color` are the raw
/// field names, `shop_name` and `color` are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_name: Option<String>,
    pub address: String,
    #[serde(rename = "discount")]
    pub discount_text: String,
    #[serde(default, rename = "color", skip_serializing_if = "Option::is_none")]
    pub color_hint: Option<String>,
}

impl RawOffer {
    pub fn new(shop_name: &str, address: &str, discount_text: &str) -> Self {
        Self {
            shop_name: Some(shop_name.to_string()),
            address: address.to_string(),
            discount_text: discount_text.to_string(),
            color_hint: None,
        }
    }

    /// Shop name, or [`DEFAULT_SHOP_NAME`] when the source omitted it.
    pub fn shop_name(&self) -> &str {
        self.shop_name.as_deref().unwrap_or(DEFAULT_SHOP_NAME)
    }

    /// Colour hint from the source; missing or unrecognised hints are gray.
    pub fn color_hint(&self) -> ColorClass {
        self.color_hint
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    pub fn key(&self) -> ShopKey {
        ShopKey::new(self.shop_name(), &self.address)
    }
}

/// Result of one ingestion run.
///
/// A failed fetch is kept distinct from a successful fetch that found no
/// offers: only the latter may empty the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Fetched(Vec<RawOffer>),
    Failed { source: String, reason: String },
}

impl IngestOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
