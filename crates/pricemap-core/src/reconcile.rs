//! Three-way diff between the persisted registry and a fresh offer batch.
//!
//! [`plan_reconciliation`] produces a [`ReconcilePlan`]; the store applies it
//! in a single transaction. Planning never touches the store, so a plan that
//! fails to commit leaves nothing behind.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::color::offer_color;
use crate::geocode::{Geocoder, ResolutionSource};
use crate::shop::{ColorClass, RawOffer, ShopKey, ShopRecord};

/// In-place change to an existing record. Coordinates are never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopUpdate {
    pub key: ShopKey,
    pub discount_text: String,
    pub color_class: ColorClass,
    pub updated_at: DateTime<Utc>,
}

/// Counters for one reconciliation run. Observational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records in the batch before deduplication.
    pub received: usize,
    pub duplicates: usize,
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
    pub geocode_failed: usize,
    /// Geocoder answers that needed the remote service.
    pub remote_lookups: usize,
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {}, duplicates {}, updated {}, inserted {}, deleted {}, geocoding failed {}",
            self.received,
            self.duplicates,
            self.updated,
            self.inserted,
            self.deleted,
            self.geocode_failed
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub inserts: Vec<ShopRecord>,
    pub updates: Vec<ShopUpdate>,
    pub deletes: Vec<ShopKey>,
    pub report: ReconcileReport,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Fold a batch into unique keys, keeping the first occurrence of each.
///
/// Returns the surviving offers in batch order and the number discarded.
pub fn dedup_batch(batch: Vec<RawOffer>) -> (Vec<RawOffer>, usize) {
    let mut seen: HashSet<ShopKey> = HashSet::with_capacity(batch.len());
    let mut unique = Vec::with_capacity(batch.len());
    let mut duplicates = 0;

    for offer in batch {
        let key = offer.key();
        if seen.contains(&key) {
            warn!(key = %key, "duplicate offer in batch, keeping first occurrence");
            duplicates += 1;
            continue;
        }
        seen.insert(key);
        unique.push(offer);
    }

    (unique, duplicates)
}

/// Diff `batch` against `current` and geocode new keys.
///
/// - keys already stored become updates (discount, colour, timestamp)
/// - new keys are geocoded; those that resolve become inserts, the rest are
///   counted in `geocode_failed` and left for the next run
/// - stored keys missing from the batch become deletes
///
/// An empty batch therefore deletes every stored record; callers must not
/// pass the result of a failed ingestion here.
pub async fn plan_reconciliation(
    current: &[ShopRecord],
    batch: Vec<RawOffer>,
    geocoder: &dyn Geocoder,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let received = batch.len();
    let (unique, duplicates) = dedup_batch(batch);

    let existing: HashSet<ShopKey> = current.iter().map(ShopRecord::key).collect();
    info!(
        stored = existing.len(),
        received,
        unique = unique.len(),
        "planning reconciliation"
    );

    let mut plan = ReconcilePlan {
        report: ReconcileReport {
            received,
            duplicates,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut seen: HashSet<ShopKey> = HashSet::with_capacity(unique.len());

    for offer in unique {
        let key = offer.key();
        let color_class = offer_color(&offer);

        if existing.contains(&key) {
            plan.updates.push(ShopUpdate {
                key: key.clone(),
                discount_text: offer.discount_text,
                color_class,
                updated_at: now,
            });
            seen.insert(key);
            continue;
        }

        debug!(key = %key, "new shop, geocoding");
        match geocoder.resolve(&offer.address).await {
            Some(resolution) => {
                if resolution.source == ResolutionSource::Remote {
                    plan.report.remote_lookups += 1;
                }
                plan.inserts.push(ShopRecord {
                    shop_name: key.shop_name.clone(),
                    address: key.address.clone(),
                    discount_text: offer.discount_text,
                    color_class,
                    latitude: resolution.coordinates.latitude,
                    longitude: resolution.coordinates.longitude,
                    updated_at: now,
                });
            }
            None => {
                warn!(key = %key, "no coordinates for new shop, skipping until next run");
                plan.report.geocode_failed += 1;
            }
        }
        seen.insert(key);
    }

    for record in current {
        let key = record.key();
        if !seen.contains(&key) {
            debug!(key = %key, "shop no longer listed");
            plan.deletes.push(key);
        }
    }

    plan.report.updated = plan.updates.len();
    plan.report.inserted = plan.inserts.len();
    plan.report.deleted = plan.deletes.len();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::Resolution;
    use crate::shop::Coordinates;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Geocoder backed by a fixed table; records every address it is asked for.
    struct TableGeocoder {
        table: HashMap<String, Coordinates>,
        calls: Mutex<Vec<String>>,
    }

    impl TableGeocoder {
        fn new(entries: &[(&str, f64, f64)]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(a, lat, lon)| (a.to_string(), Coordinates::new(*lat, *lon)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn resolve(&self, address: &str) -> Option<Resolution> {
            self.calls.lock().unwrap().push(address.to_string());
            self.table.get(address).map(|c| Resolution {
                coordinates: *c,
                source: ResolutionSource::Remote,
            })
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn record(name: &str, address: &str, discount: &str, lat: f64, lon: f64) -> ShopRecord {
        ShopRecord {
            shop_name: name.into(),
            address: address.into(),
            discount_text: discount.into(),
            color_class: crate::classify_discount(discount),
            latitude: lat,
            longitude: lon,
            updated_at: ts("2026-01-01T00:00:00Z"),
        }
    }

    fn store_abc() -> Vec<ShopRecord> {
        vec![
            record("A", "a street", "50%", 0.0, 0.0),
            record("B", "b street", "45 per-kg", 10.0, 0.0),
            record("C", "c street", "10%", 5.0, 10.0),
        ]
    }

    #[tokio::test]
    async fn scenario_update_delete_insert() {
        let geocoder = TableGeocoder::new(&[("new address", 3.0, 4.0)]);
        let now = ts("2026-02-01T12:00:00Z");
        let batch = vec![
            RawOffer::new("A", "a street", "70%"),
            RawOffer::new("B", "b street", "45 per-kg"),
            RawOffer::new("D", "new address", "25 per-kg"),
        ];

        let plan = plan_reconciliation(&store_abc(), batch, &geocoder, now).await;

        assert_eq!(
            plan.updates,
            vec![
                ShopUpdate {
                    key: ShopKey::new("A", "a street"),
                    discount_text: "70%".into(),
                    color_class: ColorClass::Green,
                    updated_at: now,
                },
                ShopUpdate {
                    key: ShopKey::new("B", "b street"),
                    discount_text: "45 per-kg".into(),
                    color_class: ColorClass::Orange,
                    updated_at: now,
                },
            ]
        );
        assert_eq!(plan.deletes, vec![ShopKey::new("C", "c street")]);
        assert_eq!(plan.inserts.len(), 1);
        let d = &plan.inserts[0];
        assert_eq!(d.key(), ShopKey::new("D", "new address"));
        assert_eq!(d.coordinates(), Coordinates::new(3.0, 4.0));
        assert_eq!(d.color_class, ColorClass::Green);
        assert_eq!(geocoder.calls(), vec!["new address".to_string()]);
        assert_eq!(
            plan.report,
            ReconcileReport {
                received: 3,
                duplicates: 0,
                updated: 2,
                inserted: 1,
                deleted: 1,
                geocode_failed: 0,
                remote_lookups: 1,
            }
        );
    }

    #[tokio::test]
    async fn geocoding_failure_skips_and_counts() {
        let geocoder = TableGeocoder::new(&[]);
        let batch = vec![
            RawOffer::new("A", "a street", "50%"),
            RawOffer::new("D", "nowhere", "25 per-kg"),
        ];

        let plan = plan_reconciliation(&store_abc(), batch, &geocoder, Utc::now()).await;

        assert!(plan.inserts.is_empty());
        assert_eq!(plan.report.geocode_failed, 1);
        // A failed candidate is not a stored key, so it never shows up as a delete.
        assert!(!plan.deletes.contains(&ShopKey::new("D", "nowhere")));
        assert_eq!(plan.report.deleted, 2);
    }

    #[tokio::test]
    async fn updates_never_geocode() {
        let geocoder = TableGeocoder::new(&[("a street", 99.0, 99.0)]);
        let batch = vec![RawOffer::new("A", "a street", "totally different")];

        let plan = plan_reconciliation(&store_abc(), batch, &geocoder, Utc::now()).await;

        assert!(geocoder.calls().is_empty());
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].color_class, ColorClass::Gray);
    }

    #[tokio::test]
    async fn duplicates_first_wins() {
        let geocoder = TableGeocoder::new(&[("x", 1.0, 1.0)]);
        let batch = vec![
            RawOffer::new("N", "x", "first 60%"),
            RawOffer::new("N", "x", "second 10%"),
            RawOffer::new("N", "x", "third"),
        ];

        let plan = plan_reconciliation(&[], batch, &geocoder, Utc::now()).await;

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].discount_text, "first 60%");
        assert_eq!(plan.report.duplicates, 2);
        assert_eq!(plan.report.received, 3);
        assert_eq!(geocoder.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_shop_name_defaults_for_identity() {
        let geocoder = TableGeocoder::new(&[]);
        let current = vec![record("Unknown", "a street", "50%", 1.0, 2.0)];
        let offer = RawOffer {
            shop_name: None,
            address: "a street".into(),
            discount_text: "60%".into(),
            color_hint: None,
        };

        let plan = plan_reconciliation(&current, vec![offer], &geocoder, Utc::now()).await;

        assert_eq!(plan.updates.len(), 1);
        assert!(plan.deletes.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_deletes_everything() {
        let geocoder = TableGeocoder::new(&[]);
        let plan = plan_reconciliation(&store_abc(), Vec::new(), &geocoder, Utc::now()).await;

        assert_eq!(plan.deletes.len(), 3);
        assert!(plan.updates.is_empty());
        assert!(plan.inserts.is_empty());
    }

    #[tokio::test]
    async fn same_batch_twice_only_refreshes_timestamps() {
        let geocoder = TableGeocoder::new(&[]);
        let current = store_abc();
        let batch: Vec<RawOffer> = current
            .iter()
            .map(|r| RawOffer::new(&r.shop_name, &r.address, &r.discount_text))
            .collect();

        let plan = plan_reconciliation(&current, batch, &geocoder, Utc::now()).await;

        assert_eq!(plan.report.inserted, 0);
        assert_eq!(plan.report.deleted, 0);
        for (update, stored) in plan.updates.iter().zip(&current) {
            assert_eq!(update.key, stored.key());
            assert_eq!(update.discount_text, stored.discount_text);
            assert_eq!(update.color_class, stored.color_class);
        }
    }

    #[test]
    fn dedup_preserves_order() {
        let batch = vec![
            RawOffer::new("B", "1", "x"),
            RawOffer::new("A", "1", "x"),
            RawOffer::new("B", "1", "y"),
            RawOffer::new("A", "2", "x"),
        ];
        let (unique, dups) = dedup_batch(batch);
        let keys: Vec<ShopKey> = unique.iter().map(RawOffer::key).collect();
        assert_eq!(
            keys,
            vec![
                ShopKey::new("B", "1"),
                ShopKey::new("A", "1"),
                ShopKey::new("A", "2"),
            ]
        );
        assert_eq!(dups, 1);
    }
}
