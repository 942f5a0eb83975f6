//! SQLite-backed ledger (embedded, file-backed).
//!
//! Appends run inside a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock up front: the version read and the inserts of one
//! append cannot interleave with any other writer. The primary key on
//! `(aggregate_id, sequence_number)` backs this up, and triggers installed by
//! the schema bootstrap reject `UPDATE` and `DELETE`.
//!
//! Identifiers are stored as hyphenated UUID text, timestamps as RFC 3339
//! text and payloads as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::instrument;
use uuid::Uuid;

use tania_core::{AggregateId, AggregateKind, ExpectedVersion};
use tania_events::EventKind as _;

use super::r#trait::{
    Ledger, LedgerError, StoredEvent, UncommittedEvent, batch_target, check_expected,
    check_stream_kind,
};
use super::{map_sqlx_error, parse_kinds};

const READ_STREAM: &str = "SELECT event_id, aggregate_id, aggregate_type, sequence_number, \
     event_type, event_version, occurred_at, payload FROM event_ledger \
     WHERE aggregate_id = ?1 ORDER BY sequence_number ASC";

const READ_KIND: &str = "SELECT event_id, aggregate_id, aggregate_type, sequence_number, \
     event_type, event_version, occurred_at, payload FROM event_ledger \
     WHERE aggregate_type = ?1 ORDER BY aggregate_id ASC, sequence_number ASC";

#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// The schema must already be bootstrapped (see [`crate::schema`]).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn append_locked(
        conn: &mut SqliteConnection,
        aggregate_id: AggregateId,
        kind: AggregateKind,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, LedgerError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(sequence_number), 0) AS version, MIN(aggregate_type) AS aggregate_type \
             FROM event_ledger WHERE aggregate_id = ?1",
        )
        .bind(aggregate_id.to_string())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("stream_version", e))?;

        let current: i64 = row
            .try_get("version")
            .map_err(|e| map_sqlx_error("stream_version", e))?;
        let existing: Option<String> = row
            .try_get("aggregate_type")
            .map_err(|e| map_sqlx_error("stream_version", e))?;
        let existing = existing
            .map(|code| {
                code.parse::<AggregateKind>()
                    .map_err(|_| LedgerError::Corrupt(format!("unknown aggregate type '{code}'")))
            })
            .transpose()?;

        check_stream_kind(aggregate_id, existing, kind)?;
        let current = current as u64;
        check_expected(expected_version, current)?;

        let mut stored = Vec::with_capacity(events.len());
        for (event, seq) in events.into_iter().zip(current + 1..) {
            sqlx::query(
                "INSERT INTO event_ledger (aggregate_id, sequence_number, event_id, aggregate_type, \
                 event_type, event_version, occurred_at, payload) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(aggregate_id.to_string())
            .bind(seq as i64)
            .bind(event.event_id.to_string())
            .bind(kind.as_str())
            .bind(event.event_kind.code())
            .bind(i64::from(event.event_version))
            .bind(event.occurred_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .bind(event.payload.to_string())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("insert_event", e))?;

            stored.push(event.into_stored(seq));
        }
        Ok(stored)
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    #[instrument(
        skip(self, events),
        fields(event_count = events.len(), expected_version = ?expected_version),
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

        // Rolls back on drop, including when the append future is cancelled.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| map_sqlx_error("begin_immediate", e))?;

        let stored = Self::append_locked(&mut tx, aggregate_id, kind, events, expected_version).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(stored)
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    async fn read_all(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, LedgerError> {
        let rows = sqlx::query(READ_STREAM)
            .bind(aggregate_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_all", e))?;

        rows.iter().map(stored_from_row).collect()
    }

    #[instrument(skip(self), fields(kind = %kind), err)]
    async fn read_kind(&self, kind: AggregateKind) -> Result<Vec<StoredEvent>, LedgerError> {
        let rows = sqlx::query(READ_KIND)
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("read_kind", e))?;

        rows.iter().map(stored_from_row).collect()
    }
}

fn stored_from_row(row: &SqliteRow) -> Result<StoredEvent, LedgerError> {
    let text = |column: &str| -> Result<String, LedgerError> {
        row.try_get::<String, _>(column)
            .map_err(|e| map_sqlx_error("decode_row", e))
    };
    let int = |column: &str| -> Result<i64, LedgerError> {
        row.try_get::<i64, _>(column)
            .map_err(|e| map_sqlx_error("decode_row", e))
    };

    let (aggregate_kind, event_kind) = parse_kinds(&text("aggregate_type")?, &text("event_type")?)?;
    let corrupt = |what: &str, e: &dyn core::fmt::Display| {
        LedgerError::Corrupt(format!("invalid {what}: {e}"))
    };

    let aggregate_id: AggregateId = text("aggregate_id")?
        .parse()
        .map_err(|e| corrupt("aggregate_id", &e))?;
    let event_id = Uuid::parse_str(&text("event_id")?).map_err(|e| corrupt("event_id", &e))?;
    let occurred_at = DateTime::parse_from_rfc3339(&text("occurred_at")?)
        .map_err(|e| corrupt("occurred_at", &e))?
        .with_timezone(&Utc);
    let payload = serde_json::from_str(&text("payload")?).map_err(|e| corrupt("payload", &e))?;
    let sequence_number = u64::try_from(int("sequence_number")?)
        .map_err(|e| corrupt("sequence_number", &e))?;
    let event_version =
        u32::try_from(int("event_version")?).map_err(|e| corrupt("event_version", &e))?;

    Ok(StoredEvent {
        event_id,
        aggregate_id,
        aggregate_kind,
        sequence_number,
        event_kind,
        event_version,
        occurred_at,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use tania_tasks::{TaskCategory, TaskCreated, TaskDomain, TaskEvent, TaskId, TaskPriority, TaskStatus};

    use super::*;
    use crate::config::TaniaConfig;
    use crate::engine::Engine;

    async fn single_connection_pool(path: &std::path::Path) -> SqlitePool {
        let mut config = TaniaConfig::sqlite(path).persistence;
        config.sqlite.max_connections = 1;
        match Engine::open(&config).await.unwrap() {
            Engine::Sqlite { pool } => pool,
            other => panic!("expected a sqlite engine, got {}", other.kind()),
        }
    }

    fn created(task_id: TaskId, n: usize) -> UncommittedEvent {
        UncommittedEvent::from_typed(
            task_id.aggregate_id(),
            TaskEvent::TaskCreated(TaskCreated {
                task_id,
                title: format!("task {n}"),
                description: String::new(),
                created_date: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
                due_date: None,
                priority: TaskPriority::Normal,
                status: TaskStatus::Active,
                domain: TaskDomain::General,
                category: TaskCategory::General,
                is_due: false,
                asset_id: None,
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn cancelled_append_leaves_the_connection_usable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tania.db");
        let ledger = SqliteLedger::new(single_connection_pool(&path).await);

        let big = TaskId::generate();
        let batch: Vec<_> = (0..20_000).map(|n| created(big, n)).collect();
        let outcome = tokio::time::timeout(
            Duration::from_millis(30),
            ledger.append(batch, ExpectedVersion::Exact(0)),
        )
        .await;

        // Whole batch or nothing, whichever way the race went.
        let expected = match outcome {
            Ok(stored) => stored.unwrap().len() as u64,
            Err(_elapsed) => 0,
        };
        assert_eq!(ledger.stream_version(big.aggregate_id()).await.unwrap(), expected);

        let other = TaskId::generate();
        assert_eq!(ledger.append_one(created(other, 0)).await.unwrap(), 1);
        ledger.pool.close().await;

        let reopened = SqliteLedger::new(single_connection_pool(&path).await);
        assert_eq!(reopened.stream_version(big.aggregate_id()).await.unwrap(), expected);
        assert_eq!(reopened.stream_version(other.aggregate_id()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejected_append_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(single_connection_pool(&dir.path().join("tania.db")).await);
        let task_id = TaskId::generate();

        let err = ledger
            .append(vec![created(task_id, 0)], ExpectedVersion::Exact(3))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Concurrency(_)), "got {err:?}");
        assert_eq!(ledger.append_one(created(task_id, 1)).await.unwrap(), 1);
    }
}
