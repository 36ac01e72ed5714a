//! Read-only point view of the registry for map clients.

use serde::{Deserialize, Serialize};

use crate::geojson::{Feature, FeatureCollection, Geometry};
use crate::shop::ShopRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointProperties {
    pub address: String,
    pub discount: String,
}

/// One point feature per record, straight from the stored values.
pub fn point_collection(records: &[ShopRecord]) -> FeatureCollection<PointProperties> {
    let features = records
        .iter()
        .map(|r| Feature {
            geometry: Geometry::Point {
                coordinates: [r.longitude, r.latitude],
            },
            properties: PointProperties {
                address: r.address.clone(),
                discount: r.discount_text.clone(),
            },
        })
        .collect();
    FeatureCollection::new(features)
}
