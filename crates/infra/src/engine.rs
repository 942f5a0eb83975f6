//! Persistence engine selector.
//!
//! The only place that branches on the configured engine: everything above
//! it sees `Arc<dyn Ledger>` and `Arc<dyn ReadStore<P>>`.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use thiserror::Error;
use tracing::{info, instrument};

use tania_events::Projection;

use crate::config::{EngineKind, PersistenceConfig, PostgresConfig, SqliteConfig};
use crate::ledger::{InMemoryLedger, Ledger, PostgresLedger, SqliteLedger};
use crate::read_model::{InMemoryReadStore, PostgresReadStore, ReadStore, SqliteReadStore};
use crate::schema::{self, Bootstrap};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot connect to {engine}: {reason}")]
    Connect { engine: EngineKind, reason: String },

    #[error("schema bootstrap failed during {operation}: {reason}")]
    Schema { operation: &'static str, reason: String },
}

impl EngineError {
    pub(crate) fn schema(operation: &'static str, err: sqlx::Error) -> Self {
        Self::Schema {
            operation,
            reason: err.to_string(),
        }
    }

    fn connect(engine: EngineKind, err: sqlx::Error) -> Self {
        Self::Connect {
            engine,
            reason: err.to_string(),
        }
    }
}

/// An opened storage engine: one ledger plus the read stores sharing its pool.
#[derive(Debug, Clone)]
pub enum Engine {
    InMemory { ledger: Arc<InMemoryLedger> },
    Sqlite { pool: SqlitePool },
    Postgres { pool: PgPool },
}

impl Engine {
    /// Connect and bootstrap the schema when the database is new.
    #[instrument(skip_all, fields(engine = %config.engine))]
    pub async fn open(config: &PersistenceConfig) -> Result<Self, EngineError> {
        let engine = match config.engine {
            EngineKind::InMemory => Engine::in_memory(),
            EngineKind::Sqlite => Engine::Sqlite {
                pool: connect_sqlite(&config.sqlite).await?,
            },
            EngineKind::Postgres => Engine::Postgres {
                pool: connect_postgres(&config.postgres).await?,
            },
        };
        let bootstrap = engine.bootstrap().await?;
        info!(?bootstrap, "persistence engine ready");
        Ok(engine)
    }

    pub fn in_memory() -> Self {
        Engine::InMemory {
            ledger: Arc::new(InMemoryLedger::new()),
        }
    }

    /// Create the schema if the sentinel table is missing.
    pub async fn bootstrap(&self) -> Result<Bootstrap, EngineError> {
        match self {
            Engine::InMemory { .. } => Ok(Bootstrap::AlreadyPresent),
            Engine::Sqlite { pool } => schema::bootstrap_sqlite(pool).await,
            Engine::Postgres { pool } => schema::bootstrap_postgres(pool).await,
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            Engine::InMemory { .. } => EngineKind::InMemory,
            Engine::Sqlite { .. } => EngineKind::Sqlite,
            Engine::Postgres { .. } => EngineKind::Postgres,
        }
    }

    pub fn ledger(&self) -> Arc<dyn Ledger> {
        match self {
            Engine::InMemory { ledger } => ledger.clone(),
            Engine::Sqlite { pool } => Arc::new(SqliteLedger::new(pool.clone())),
            Engine::Postgres { pool } => Arc::new(PostgresLedger::new(pool.clone())),
        }
    }

    /// Row storage for projection `P`. In-memory stores are fresh on every call.
    pub fn read_store<P: Projection>(&self) -> Arc<dyn ReadStore<P>> {
        match self {
            Engine::InMemory { .. } => Arc::new(InMemoryReadStore::<P>::new()),
            Engine::Sqlite { pool } => Arc::new(SqliteReadStore::<P>::new(pool.clone())),
            Engine::Postgres { pool } => Arc::new(PostgresReadStore::<P>::new(pool.clone())),
        }
    }

    /// Close pooled connections (no-op in memory).
    pub async fn close(&self) {
        match self {
            Engine::InMemory { .. } => {}
            Engine::Sqlite { pool } => pool.close().await,
            Engine::Postgres { pool } => pool.close().await,
        }
    }
}

async fn connect_sqlite(config: &SqliteConfig) -> Result<SqlitePool, EngineError> {
    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(|e| EngineError::connect(EngineKind::Sqlite, e))
}

async fn connect_postgres(config: &PostgresConfig) -> Result<PgPool, EngineError> {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.dbname)
        .username(&config.username)
        .password(&config.password);

    PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(|e| EngineError::connect(EngineKind::Postgres, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaniaConfig;

    #[tokio::test]
    async fn sqlite_schema_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = TaniaConfig::sqlite(dir.path().join("farm.db"));

        let engine = Engine::open(&config.persistence).await.unwrap();
        assert_eq!(engine.kind(), EngineKind::Sqlite);
        assert_eq!(engine.bootstrap().await.unwrap(), Bootstrap::AlreadyPresent);
        engine.close().await;

        let reopened = Engine::open(&config.persistence).await.unwrap();
        assert_eq!(reopened.bootstrap().await.unwrap(), Bootstrap::AlreadyPresent);
    }

    #[tokio::test]
    async fn in_memory_engine_hands_out_one_shared_ledger() {
        use chrono::Utc;
        use tania_tasks::{TaskCancelled, TaskEvent, TaskId};

        use crate::ledger::UncommittedEvent;

        let engine = Engine::open(&TaniaConfig::in_memory().persistence).await.unwrap();
        let task_id = TaskId::generate();
        let event = TaskEvent::TaskCancelled(TaskCancelled {
            task_id,
            cancelled_date: Utc::now(),
        });

        engine
            .ledger()
            .append_one(UncommittedEvent::from_typed(task_id.aggregate_id(), event).unwrap())
            .await
            .unwrap();
        assert_eq!(engine.ledger().stream_version(task_id.aggregate_id()).await.unwrap(), 1);
    }
}
