pub mod color;
pub mod geocode;
pub mod geojson;
pub mod projection;
pub mod reconcile;
pub mod shop;
pub mod zone;

pub use color::{classify_discount, offer_color};
pub use geocode::{Geocoder, Resolution, ResolutionSource};
pub use projection::{PointProperties, point_collection};
pub use reconcile::{ReconcilePlan, ReconcileReport, ShopUpdate, dedup_batch, plan_reconciliation};
pub use shop::{
    ColorClass, Coordinates, DEFAULT_SHOP_NAME, IngestOutcome, RawOffer, ShopKey, ShopRecord,
};
pub use zone::{UnboundedPolicy, ZoneProperties};
