//! Fixed, versionless schema for the SQL engines.
//!
//! The DDL script runs once, in a single transaction, when the sentinel table
//! `event_ledger` is absent. An existing database is never altered.

use sqlx::{PgPool, Row, SqlitePool};
use tracing::info;

use crate::engine::EngineError;

/// Table whose presence marks a bootstrapped database.
pub const SENTINEL_TABLE: &str = "event_ledger";

pub const SQLITE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS event_ledger (
    aggregate_id    TEXT    NOT NULL,
    sequence_number INTEGER NOT NULL CHECK (sequence_number > 0),
    event_id        TEXT    NOT NULL UNIQUE,
    aggregate_type  TEXT    NOT NULL,
    event_type      TEXT    NOT NULL,
    event_version   INTEGER NOT NULL,
    occurred_at     TEXT    NOT NULL,
    payload         TEXT    NOT NULL,
    recorded_at     TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (aggregate_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS event_ledger_by_kind
    ON event_ledger (aggregate_type, aggregate_id, sequence_number);

CREATE TRIGGER IF NOT EXISTS event_ledger_no_update
BEFORE UPDATE ON event_ledger
BEGIN
    SELECT RAISE(ABORT, 'event_ledger is append-only');
END;

CREATE TRIGGER IF NOT EXISTS event_ledger_no_delete
BEFORE DELETE ON event_ledger
BEGIN
    SELECT RAISE(ABORT, 'event_ledger is append-only');
END;

CREATE TABLE IF NOT EXISTS read_models (
    projection    TEXT    NOT NULL,
    aggregate_id  TEXT    NOT NULL,
    last_sequence INTEGER NOT NULL,
    data          TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (projection, aggregate_id)
);
"#;

pub const POSTGRES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS event_ledger (
    aggregate_id    UUID        NOT NULL,
    sequence_number BIGINT      NOT NULL CHECK (sequence_number > 0),
    event_id        UUID        NOT NULL UNIQUE,
    aggregate_type  TEXT        NOT NULL,
    event_type      TEXT        NOT NULL,
    event_version   INTEGER     NOT NULL,
    occurred_at     TIMESTAMPTZ NOT NULL,
    payload         JSONB       NOT NULL,
    recorded_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (aggregate_id, sequence_number)
);

CREATE INDEX IF NOT EXISTS event_ledger_by_kind
    ON event_ledger (aggregate_type, aggregate_id, sequence_number);

CREATE OR REPLACE FUNCTION event_ledger_reject_mutation() RETURNS trigger AS $$
BEGIN
    RAISE EXCEPTION 'event_ledger is append-only';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS event_ledger_append_only ON event_ledger;
CREATE TRIGGER event_ledger_append_only
    BEFORE UPDATE OR DELETE ON event_ledger
    FOR EACH ROW EXECUTE FUNCTION event_ledger_reject_mutation();

CREATE TABLE IF NOT EXISTS read_models (
    projection    TEXT        NOT NULL,
    aggregate_id  UUID        NOT NULL,
    last_sequence BIGINT      NOT NULL,
    data          JSONB       NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (projection, aggregate_id)
);
"#;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    Created,
    AlreadyPresent,
}

pub async fn bootstrap_sqlite(pool: &SqlitePool) -> Result<Bootstrap, EngineError> {
    let present = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .bind(SENTINEL_TABLE)
        .fetch_optional(pool)
        .await
        .map_err(|e| EngineError::schema("sentinel_lookup", e))?
        .is_some();
    if present {
        return Ok(Bootstrap::AlreadyPresent);
    }

    let mut tx = pool.begin().await.map_err(|e| EngineError::schema("begin", e))?;
    sqlx::raw_sql(SQLITE_SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(|e| EngineError::schema("create", e))?;
    tx.commit().await.map_err(|e| EngineError::schema("commit", e))?;

    info!(engine = "sqlite", "schema created");
    Ok(Bootstrap::Created)
}

pub async fn bootstrap_postgres(pool: &PgPool) -> Result<Bootstrap, EngineError> {
    let present: bool = sqlx::query("SELECT to_regclass($1) IS NOT NULL AS present")
        .bind(SENTINEL_TABLE)
        .fetch_one(pool)
        .await
        .map_err(|e| EngineError::schema("sentinel_lookup", e))?
        .try_get("present")
        .map_err(|e| EngineError::schema("sentinel_lookup", e))?;
    if present {
        return Ok(Bootstrap::AlreadyPresent);
    }

    let mut tx = pool.begin().await.map_err(|e| EngineError::schema("begin", e))?;
    sqlx::raw_sql(POSTGRES_SCHEMA)
        .execute(&mut *tx)
        .await
        .map_err(|e| EngineError::schema("create", e))?;
    tx.commit().await.map_err(|e| EngineError::schema("commit", e))?;

    info!(engine = "postgres", "schema created");
    Ok(Bootstrap::Created)
}
