//! Storage layer: the shop registry in DuckDB.

mod duck;
mod error;

pub use duck::{CommitSummary, DuckStore};
pub use error::StoreError;
