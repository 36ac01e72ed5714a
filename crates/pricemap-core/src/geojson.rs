//! Minimal GeoJSON (RFC 7946) shapes for map output.
//!
//! Positions are `[longitude, latitude]`, the reverse of the registry's
//! storage order.

use serde::{Deserialize, Serialize};

/// A GeoJSON position: `[lon, lat]`.
pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    /// Outer ring first; rings are explicitly closed (last == first).
    Polygon { coordinates: Vec<Vec<Position>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature<P> {
    pub geometry: Geometry,
    pub properties: P,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection<P> {
    pub features: Vec<Feature<P>>,
}

impl<P> FeatureCollection<P> {
    pub fn new(features: Vec<Feature<P>>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl<P> Default for FeatureCollection<P> {
    fn default() -> Self {
        Self {
            features: Vec::new(),
        }
    }
}
