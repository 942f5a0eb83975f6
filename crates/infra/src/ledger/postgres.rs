//! PostgreSQL-backed ledger.
//!
//! ## Serialization of appends
//!
//! Every append runs in one transaction that first takes
//! `pg_advisory_xact_lock(hashtextextended(aggregate_id, 0))`. Writers to the
//! same aggregate queue on that lock; writers to different aggregates do not
//! block each other. The primary key on `(aggregate_id, sequence_number)` is
//! the backstop: a duplicate sequence surfaces as `Concurrency`.
//!
//! ## Error mapping
//!
//! | sqlx error | Postgres code | LedgerError |
//! |---|---|---|
//! | unique violation | `23505` | `Concurrency` |
//! | check / trigger violation | `23514`, `P0001` | `InvalidAppend` |
//! | pool closed, IO, TLS, timeout | n/a | `StoreUnavailable` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use tania_core::{AggregateId, AggregateKind, ExpectedVersion};
use tania_events::EventKind as _;

use super::r#trait::{
    Ledger, LedgerError, StoredEvent, UncommittedEvent, batch_target, check_expected,
    check_stream_kind,
};
use super::{map_sqlx_error, parse_kinds};

#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// The schema must already be bootstrapped (see [`crate::schema`]).
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    #[instrument(
        skip(self, events),
        fields(
            event_count = events.len(),
            expected_version = ?expected_version,
            committed_events = tracing::field::Empty
        ),
        err
    )]
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, LedgerError> {
        let Some((aggregate_id, kind)) = batch_target(&events)? else {
            return Ok(vec![]);
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(aggregate_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        let (current_version, existing_kind) = check_stream_version(&mut tx, aggregate_id).await?;
        check_stream_kind(aggregate_id, existing_kind, kind)?;
        check_expected(expected_version, current_version)?;

        let mut stored_events = Vec::with_capacity(events.len());
        for (event, next_sequence) in events.into_iter().zip(current_version + 1..) {
            sqlx::query(
                r#"
                INSERT INTO event_ledger (
                    aggregate_id,
                    sequence_number,
                    event_id,
                    aggregate_type,
                    event_type,
                    event_version,
                    occurred_at,
                    payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(aggregate_id.as_uuid())
            .bind(next_sequence as i64)
            .bind(event.event_id)
            .bind(kind.as_str())
            .bind(event.event_kind.code())
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| match map_sqlx_error("insert_event", e) {
                LedgerError::Concurrency(_) => LedgerError::Concurrency(format!(
                    "concurrent append detected: sequence_number {next_sequence} already exists"
                )),
                other => other,
            })?;

            stored_events.push(event.into_stored(next_sequence));
        }

        // Dropping `tx` on an early return above rolls back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_events", stored_events.len());
        Ok(stored_events)
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    async fn read_all(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM event_ledger
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_all", e))?;

        decode_rows(&rows)
    }

    #[instrument(skip(self), fields(kind = %kind), err)]
    async fn read_kind(&self, kind: AggregateKind) -> Result<Vec<StoredEvent>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM event_ledger
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC, sequence_number ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_kind", e))?;

        decode_rows(&rows)
    }
}

/// Current version and stored kind of a stream, read under the advisory lock.
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<AggregateKind>), LedgerError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) AS version,
            MIN(aggregate_type) AS aggregate_type
        FROM event_ledger
        WHERE aggregate_id = $1
        "#,
    )
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let version: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("check_stream_version", e))?;
    let existing: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let existing = existing
        .map(|code| {
            code.parse::<AggregateKind>()
                .map_err(|_| LedgerError::Corrupt(format!("unknown aggregate type '{code}'")))
        })
        .transpose()?;

    Ok((version as u64, existing))
}

fn decode_rows(rows: &[sqlx::postgres::PgRow]) -> Result<Vec<StoredEvent>, LedgerError> {
    rows.iter()
        .map(|row| {
            let row = LedgerRow::from_row(row).map_err(|e| map_sqlx_error("decode_row", e))?;
            StoredEvent::try_from(row)
        })
        .collect()
}

#[derive(Debug)]
struct LedgerRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for LedgerRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(LedgerRow {
            event_id: row.try_get("event_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl TryFrom<LedgerRow> for StoredEvent {
    type Error = LedgerError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let (aggregate_kind, event_kind) = parse_kinds(&row.aggregate_type, &row.event_type)?;
        Ok(StoredEvent {
            event_id: row.event_id,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_kind,
            sequence_number: u64::try_from(row.sequence_number).map_err(|_| {
                LedgerError::Corrupt(format!("negative sequence number {}", row.sequence_number))
            })?,
            event_kind,
            event_version: u32::try_from(row.event_version).map_err(|_| {
                LedgerError::Corrupt(format!("negative event version {}", row.event_version))
            })?,
            occurred_at: row.occurred_at,
            payload: row.payload,
        })
    }
}
