//! Event ledger: append-only, per-aggregate ordered event streams.
//!
//! This module provides:
//! - the [`Ledger`] trait and its record types
//! - an in-memory engine (tests/dev)
//! - SQLite and PostgreSQL engines backed by `sqlx`

mod r#trait;

pub mod in_memory;
pub mod postgres;
pub mod sqlite;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use r#trait::{Ledger, LedgerError, StoredEvent, UncommittedEvent};
pub use sqlite::SqliteLedger;

use tania_core::AggregateKind;
use tania_events::EventKind as _;

use crate::event_model::EventKind;

/// Map a `sqlx` error to a ledger error.
///
/// | sqlx error | LedgerError |
/// |---|---|
/// | unique violation | `Concurrency` |
/// | other database error (check, trigger) | `InvalidAppend` |
/// | pool, IO, TLS, protocol, timeout | `StoreUnavailable` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if db_err.is_unique_violation() {
                LedgerError::Concurrency(msg)
            } else {
                LedgerError::InvalidAppend(msg)
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            LedgerError::Corrupt(format!("undecodable row in {operation}: {err}"))
        }
        other => {
            tracing::error!(operation, error = %other, "ledger store unavailable");
            LedgerError::StoreUnavailable(format!("{operation}: {other}"))
        }
    }
}

/// Parse the stored kind columns of a ledger row.
pub(crate) fn parse_kinds(
    aggregate_type: &str,
    event_type: &str,
) -> Result<(AggregateKind, EventKind), LedgerError> {
    let aggregate_kind: AggregateKind = aggregate_type
        .parse()
        .map_err(|_| LedgerError::Corrupt(format!("unknown aggregate type '{aggregate_type}'")))?;
    let event_kind = EventKind::from_code(event_type)
        .ok_or_else(|| LedgerError::Corrupt(format!("unknown event type '{event_type}'")))?;

    if event_kind.aggregate_kind() != aggregate_kind {
        return Err(LedgerError::Corrupt(format!(
            "event type '{event_type}' does not belong to aggregate type '{aggregate_type}'"
        )));
    }
    Ok((aggregate_kind, event_kind))
}
