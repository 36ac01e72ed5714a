//! DuckDB storage for the shop registry.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::{Connection, params};
use pricemap_core::{ColorClass, ReconcilePlan, ShopKey, ShopRecord};
use tracing::{debug, info};

use crate::StoreError;

const CREATE_SHOPS: &str = "CREATE TABLE IF NOT EXISTS shops (
    shop_name     VARCHAR NOT NULL,
    address       VARCHAR NOT NULL,
    discount_text VARCHAR NOT NULL,
    color_class   VARCHAR NOT NULL,
    latitude      DOUBLE  NOT NULL,
    longitude     DOUBLE  NOT NULL,
    updated_at    VARCHAR NOT NULL,
    PRIMARY KEY (shop_name, address)
)";

const SELECT_SHOPS: &str = "SELECT shop_name, address, discount_text, color_class, \
     latitude, longitude, updated_at FROM shops";

/// Rows written by one committed reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// DuckDB store holding the `shops` table.
///
/// One row per `(shop_name, address)`. Writes only happen through
/// [`apply`](Self::apply), which takes `&mut self`, so a handle can have at
/// most one reconciliation in flight. Read-only consumers can take their own
/// handle with [`reader`](Self::reader).
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory database with the schema in place.
    pub fn open() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open or create a persistent database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.ensure_schema()?;
        info!(path = %path.display(), "opened registry");
        Ok(store)
    }

    /// Another handle on the same database, for read-only consumers.
    pub fn reader(&self) -> Result<Self, StoreError> {
        Ok(Self {
            conn: self.conn.try_clone()?,
        })
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(CREATE_SHOPS)?;
        Ok(())
    }

    /// Number of shops in the registry.
    pub fn shop_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM shops", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Full registry snapshot, ordered by key.
    pub fn load_registry(&self) -> Result<Vec<ShopRecord>, StoreError> {
        let sql = format!("{SELECT_SHOPS} ORDER BY shop_name, address");
        self.query_records(&sql, [])
    }

    /// Fetch one shop by key.
    pub fn get_shop(&self, key: &ShopKey) -> Result<Option<ShopRecord>, StoreError> {
        let sql = format!("{SELECT_SHOPS} WHERE shop_name = ? AND address = ?");
        let mut records = self.query_records(&sql, params![key.shop_name, key.address])?;
        Ok(records.pop())
    }

    fn query_records<P: duckdb::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ShopRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(RawRow {
                    shop_name: row.get(0)?,
                    address: row.get(1)?,
                    discount_text: row.get(2)?,
                    color_class: row.get(3)?,
                    latitude: row.get(4)?,
                    longitude: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Apply a reconciliation plan as one transaction.
    ///
    /// Deletes run first, then updates, then inserts. Every delete and update
    /// must hit exactly one row; anything else means the plan is stale and
    /// the whole transaction is rolled back. A failing insert (for example a
    /// key that already exists) rolls back the same way.
    pub fn apply(&mut self, plan: &ReconcilePlan) -> Result<CommitSummary, StoreError> {
        let tx = self.conn.transaction()?;

        for key in &plan.deletes {
            let affected = tx.execute(
                "DELETE FROM shops WHERE shop_name = ? AND address = ?",
                params![key.shop_name, key.address],
            )?;
            expect_one("delete", key, affected)?;
        }

        for update in &plan.updates {
            let affected = tx.execute(
                "UPDATE shops SET discount_text = ?, color_class = ?, updated_at = ? \
                 WHERE shop_name = ? AND address = ?",
                params![
                    update.discount_text,
                    update.color_class.as_str(),
                    format_timestamp(update.updated_at),
                    update.key.shop_name,
                    update.key.address,
                ],
            )?;
            expect_one("update", &update.key, affected)?;
        }

        for record in &plan.inserts {
            tx.execute(
                "INSERT INTO shops (shop_name, address, discount_text, color_class, \
                 latitude, longitude, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.shop_name,
                    record.address,
                    record.discount_text,
                    record.color_class.as_str(),
                    record.latitude,
                    record.longitude,
                    format_timestamp(record.updated_at),
                ],
            )?;
        }

        tx.commit()?;

        let summary = CommitSummary {
            inserted: plan.inserts.len(),
            updated: plan.updates.len(),
            deleted: plan.deletes.len(),
        };
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "reconciliation committed"
        );
        Ok(summary)
    }

    /// The registry as Arrow record batches, for tabular display.
    pub fn registry_arrow(&self) -> Result<Vec<RecordBatch>, StoreError> {
        self.query_arrow(&format!("{SELECT_SHOPS} ORDER BY shop_name, address"))
    }

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        debug!(sql, "query_arrow");
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }
}

fn expect_one(op: &'static str, key: &ShopKey, affected: usize) -> Result<(), StoreError> {
    if affected == 1 {
        Ok(())
    } else {
        Err(StoreError::StaleSnapshot {
            op,
            key: key.to_string(),
            affected,
        })
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawRow {
    shop_name: String,
    address: String,
    discount_text: String,
    color_class: String,
    latitude: f64,
    longitude: f64,
    updated_at: String,
}

impl RawRow {
    fn into_record(self) -> Result<ShopRecord, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptRow {
            key: format!("{} @ {}", self.shop_name, self.address),
            reason,
        };
        let color_class = self
            .color_class
            .parse::<ColorClass>()
            .map_err(|e| corrupt(e.to_string()))?;
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| corrupt(format!("updated_at {:?}: {e}", self.updated_at)))?
            .with_timezone(&Utc);

        Ok(ShopRecord {
            shop_name: self.shop_name,
            address: self.address,
            discount_text: self.discount_text,
            color_class,
            latitude: self.latitude,
            longitude: self.longitude,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricemap_core::ShopUpdate;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn shop(name: &str, address: &str, lat: f64, lon: f64) -> ShopRecord {
        ShopRecord {
            shop_name: name.into(),
            address: address.into(),
            discount_text: "-30%".into(),
            color_class: ColorClass::Orange,
            latitude: lat,
            longitude: lon,
            updated_at: ts("2026-03-01T08:00:00Z"),
        }
    }

    fn seeded(records: Vec<ShopRecord>) -> DuckStore {
        let mut store = DuckStore::open().unwrap();
        store
            .apply(&ReconcilePlan {
                inserts: records,
                ..Default::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn open_in_memory_is_empty() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.shop_count().unwrap(), 0);
        assert!(store.load_registry().unwrap().is_empty());
    }

    #[test]
    fn insert_and_read_back() {
        let store = seeded(vec![shop("B", "2", 53.9, 27.5), shop("A", "1", 53.8, 27.6)]);
        let registry = store.load_registry().unwrap();
        assert_eq!(registry.len(), 2);
        // Ordered by key.
        assert_eq!(registry[0].shop_name, "A");
        assert_eq!(registry[1], shop("B", "2", 53.9, 27.5));
    }

    #[test]
    fn update_leaves_coordinates() {
        let mut store = seeded(vec![shop("A", "1", 53.8, 27.6)]);
        let key = ShopKey::new("A", "1");
        store
            .apply(&ReconcilePlan {
                updates: vec![ShopUpdate {
                    key: key.clone(),
                    discount_text: "75 per-kg".into(),
                    color_class: ColorClass::Red,
                    updated_at: ts("2026-03-02T08:00:00Z"),
                }],
                ..Default::default()
            })
            .unwrap();

        let record = store.get_shop(&key).unwrap().unwrap();
        assert_eq!(record.discount_text, "75 per-kg");
        assert_eq!(record.color_class, ColorClass::Red);
        assert_eq!(record.updated_at, ts("2026-03-02T08:00:00Z"));
        assert_eq!((record.latitude, record.longitude), (53.8, 27.6));
    }

    #[test]
    fn duplicate_insert_rolls_back_everything() {
        let mut store = seeded(vec![shop("A", "1", 1.0, 1.0), shop("B", "2", 2.0, 2.0)]);
        let before = store.load_registry().unwrap();

        let result = store.apply(&ReconcilePlan {
            deletes: vec![ShopKey::new("B", "2")],
            inserts: vec![shop("C", "3", 3.0, 3.0), shop("A", "1", 9.0, 9.0)],
            ..Default::default()
        });

        assert!(matches!(result, Err(StoreError::DuckDb(_))));
        assert_eq!(store.load_registry().unwrap(), before);
    }

    #[test]
    fn stale_delete_rolls_back() {
        let mut store = seeded(vec![shop("A", "1", 1.0, 1.0)]);

        let result = store.apply(&ReconcilePlan {
            inserts: vec![shop("B", "2", 2.0, 2.0)],
            deletes: vec![ShopKey::new("gone", "nowhere")],
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(StoreError::StaleSnapshot { op: "delete", affected: 0, .. })
        ));
        assert_eq!(store.shop_count().unwrap(), 1);
    }

    #[test]
    fn stale_update_rolls_back() {
        let mut store = seeded(vec![shop("A", "1", 1.0, 1.0)]);

        let result = store.apply(&ReconcilePlan {
            deletes: vec![ShopKey::new("A", "1")],
            updates: vec![ShopUpdate {
                key: ShopKey::new("A", "1"),
                discount_text: "x".into(),
                color_class: ColorClass::Gray,
                updated_at: Utc::now(),
            }],
            ..Default::default()
        });

        assert!(matches!(
            result,
            Err(StoreError::StaleSnapshot { op: "update", .. })
        ));
        assert_eq!(store.shop_count().unwrap(), 1);
    }

    #[test]
    fn corrupt_color_reported() {
        let store = DuckStore::open().unwrap();
        store
            .conn
            .execute_batch(
                "INSERT INTO shops VALUES ('A', '1', 'x', 'purple', 1.0, 1.0, '2026-03-01T08:00:00Z')",
            )
            .unwrap();
        assert!(matches!(
            store.load_registry(),
            Err(StoreError::CorruptRow { .. })
        ));
    }

    #[test]
    fn reader_sees_committed_state() {
        let mut store = DuckStore::open().unwrap();
        let reader = store.reader().unwrap();
        store
            .apply(&ReconcilePlan {
                inserts: vec![shop("A", "1", 1.0, 1.0)],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(reader.shop_count().unwrap(), 1);
    }

    #[test]
    fn registry_arrow_has_all_columns() {
        let store = seeded(vec![shop("A", "1", 1.0, 1.0)]);
        let batches = store.registry_arrow().unwrap();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
        assert_eq!(batches[0].num_columns(), 7);
        assert_eq!(batches[0].schema().field(0).name(), "shop_name");
    }

    #[test]
    fn persistent_reopen_keeps_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("shops.duckdb");

        let mut store = DuckStore::open_persistent(&db_path).unwrap();
        store
            .apply(&ReconcilePlan {
                inserts: vec![shop("A", "1", 53.9, 27.5)],
                ..Default::default()
            })
            .unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert_eq!(store.shop_count().unwrap(), 1);
        assert_eq!(
            store.get_shop(&ShopKey::new("A", "1")).unwrap().unwrap().latitude,
            53.9
        );
    }
}
