//! Service-area types shared by the partitioning engine and configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shop::{ColorClass, ShopRecord};

/// What to do with a Voronoi cell that extends to infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnboundedPolicy {
    /// Omit unbounded cells. Shops on the convex hull get no zone.
    #[default]
    Drop,
    /// Intersect unbounded cells with the bounding frame.
    Clip,
}

impl fmt::Display for UnboundedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drop => "drop",
            Self::Clip => "clip",
        })
    }
}

impl FromStr for UnboundedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "clip" => Ok(Self::Clip),
            other => Err(format!(
                "unknown unbounded-cell policy {other:?} (expected drop or clip)"
            )),
        }
    }
}

/// Properties a zone inherits from the shop that generates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneProperties {
    pub shop_name: String,
    pub address: String,
    pub color_class: ColorClass,
}

impl From<&ShopRecord> for ZoneProperties {
    fn from(record: &ShopRecord) -> Self {
        Self {
            shop_name: record.shop_name.clone(),
            address: record.address.clone(),
            color_class: record.color_class,
        }
    }
}
