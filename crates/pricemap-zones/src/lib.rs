//! Nearest-shop service areas.
//!
//! Splits the plane around the registry's shops into Voronoi cells, one per
//! distinct location, restricted to the shops' bounding box grown by a margin.
//! Latitude and longitude are treated as planar `x` and `y`; output polygons
//! are in GeoJSON `(longitude, latitude)` order.

mod cell;

use std::collections::HashSet;
use std::fmt;

use geo::orient::{Direction, Orient};
use geo::{Area, Coord, LineString, MapCoords, Polygon};
use pricemap_core::geojson::{Feature, FeatureCollection, Geometry};
use pricemap_core::{ShopRecord, UnboundedPolicy, ZoneProperties};
use tracing::{debug, info};

pub const DEFAULT_MARGIN: f64 = 0.05;

/// Cells smaller than this fraction of the frame are treated as empty.
const DEGENERATE_AREA_RATIO: f64 = 1e-12;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PartitionError {
    #[error("frame margin must be finite and non-negative, got {0}")]
    InvalidMargin(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionOptions {
    /// Degrees added on every side of the shops' bounding box.
    pub margin: f64,
    pub policy: UnboundedPolicy,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
            policy: UnboundedPolicy::default(),
        }
    }
}

/// One shop's service area.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceAreaFeature {
    /// Counter-clockwise exterior, `x` = longitude, `y` = latitude.
    pub polygon: Polygon<f64>,
    pub properties: ZoneProperties,
}

impl ServiceAreaFeature {
    pub fn to_feature(&self) -> Feature<ZoneProperties> {
        let ring = self
            .polygon
            .exterior()
            .coords()
            .map(|c| [c.x, c.y])
            .collect();
        Feature {
            geometry: Geometry::Polygon {
                coordinates: vec![ring],
            },
            properties: self.properties.clone(),
        }
    }
}

/// Counts of what happened to each input record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionReport {
    pub cells: usize,
    pub dropped_unbounded: usize,
    pub degenerate: usize,
    /// Records sharing an earlier record's exact location.
    pub coincident: usize,
    /// Records with non-finite coordinates.
    pub invalid: usize,
}

impl fmt::Display for PartitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells, {} unbounded dropped, {} degenerate, {} coincident, {} invalid",
            self.cells, self.dropped_unbounded, self.degenerate, self.coincident, self.invalid
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub features: Vec<ServiceAreaFeature>,
    pub report: PartitionReport,
}

impl Partition {
    pub fn to_feature_collection(&self) -> FeatureCollection<ZoneProperties> {
        FeatureCollection::new(self.features.iter().map(|f| f.to_feature()).collect())
    }
}

/// Compute service areas for `records`.
///
/// Fewer than two distinct locations yield an empty partition. Every emitted
/// polygon lies inside the frame; with [`UnboundedPolicy::Drop`] the cells of
/// shops on the convex hull are omitted.
pub fn partition(
    records: &[ShopRecord],
    options: &PartitionOptions,
) -> Result<Partition, PartitionError> {
    if !options.margin.is_finite() || options.margin < 0.0 {
        return Err(PartitionError::InvalidMargin(options.margin));
    }

    let mut report = PartitionReport::default();
    let mut seen = HashSet::new();
    let mut sites = Vec::with_capacity(records.len());
    let mut owners = Vec::with_capacity(records.len());
    for record in records {
        if !record.latitude.is_finite() || !record.longitude.is_finite() {
            debug!(shop = %record.key(), "skipping non-finite coordinates");
            report.invalid += 1;
            continue;
        }
        // `+ 0.0` folds -0.0 into 0.0 so the bit patterns compare as values.
        let bits = ((record.latitude + 0.0).to_bits(), (record.longitude + 0.0).to_bits());
        if !seen.insert(bits) {
            debug!(shop = %record.key(), "location already taken");
            report.coincident += 1;
            continue;
        }
        sites.push(Coord {
            x: record.latitude,
            y: record.longitude,
        });
        owners.push(record);
    }

    if sites.len() < 2 {
        info!(sites = sites.len(), "too few distinct locations to partition");
        return Ok(Partition {
            features: Vec::new(),
            report,
        });
    }

    let Some(frame) = cell::bounding_frame(&sites, options.margin) else {
        return Ok(Partition::default());
    };
    let min_area = frame.unsigned_area() * DEGENERATE_AREA_RATIO;

    let mut features = Vec::new();
    for (i, (&site, owner)) in sites.iter().zip(&owners).enumerate() {
        if options.policy == UnboundedPolicy::Drop && cell::is_unbounded(site, &sites) {
            debug!(shop = %owner.key(), "dropping unbounded cell");
            report.dropped_unbounded += 1;
            continue;
        }

        let mut ring = cell::frame_ring(&frame);
        for (j, &other) in sites.iter().enumerate() {
            if i == j {
                continue;
            }
            ring = cell::clip_to_bisector(&ring, site, other);
            if ring.len() < 3 {
                break;
            }
        }

        let polygon = Polygon::new(LineString::from(ring), vec![]);
        if polygon.exterior().0.len() < 4 || polygon.unsigned_area() <= min_area {
            debug!(shop = %owner.key(), "skipping degenerate cell");
            report.degenerate += 1;
            continue;
        }

        let polygon = polygon
            .map_coords(|c| Coord { x: c.y, y: c.x })
            .orient(Direction::Default);
        features.push(ServiceAreaFeature {
            polygon,
            properties: ZoneProperties::from(*owner),
        });
    }

    report.cells = features.len();
    info!(policy = %options.policy, %report, "partitioned service areas");
    Ok(Partition { features, report })
}
