//! Materialized read store: per-projection rows, disposable and rebuildable.

mod r#trait;

pub mod in_memory;
pub mod postgres;
pub mod sqlite;

pub use in_memory::InMemoryReadStore;
pub use postgres::PostgresReadStore;
pub use r#trait::{ProjectedRow, ReadStore, ReadStoreError};
pub use sqlite::SqliteReadStore;
