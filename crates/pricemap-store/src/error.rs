use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    /// The plan was built against a registry state that no longer holds.
    #[error("registry changed since snapshot: {op} affected {affected} rows for {key}")]
    StaleSnapshot {
        op: &'static str,
        key: String,
        affected: usize,
    },

    #[error("corrupt row for {key}: {reason}")]
    CorruptRow { key: String, reason: String },
}
