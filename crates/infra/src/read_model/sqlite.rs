use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use tania_core::AggregateId;
use tania_events::Projection;

use super::r#trait::{ProjectedRow, ReadStore, ReadStoreError};

/// SQLite read store: rows of every projection share the `read_models` table,
/// keyed by `(projection, aggregate_id)` with the model as JSON text.
#[derive(Debug)]
pub struct SqliteReadStore<P> {
    pool: SqlitePool,
    _projection: PhantomData<fn() -> P>,
}

impl<P> SqliteReadStore<P> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _projection: PhantomData,
        }
    }
}

fn decode<P: Projection>(row: &SqliteRow) -> Result<ProjectedRow<P>, ReadStoreError> {
    let aggregate_id: String = row
        .try_get("aggregate_id")
        .map_err(|e| ReadStoreError::from_sqlx("decode_row", e))?;
    let last_sequence: i64 = row
        .try_get("last_sequence")
        .map_err(|e| ReadStoreError::from_sqlx("decode_row", e))?;
    let data: String = row
        .try_get("data")
        .map_err(|e| ReadStoreError::from_sqlx("decode_row", e))?;

    let aggregate_id: AggregateId = aggregate_id
        .parse()
        .map_err(|e| ReadStoreError::Corrupt(format!("{}: {e}", P::NAME)))?;
    let model: P = serde_json::from_str(&data)
        .map_err(|e| ReadStoreError::Corrupt(format!("{} {aggregate_id}: {e}", P::NAME)))?;

    Ok(ProjectedRow {
        aggregate_id,
        last_sequence: last_sequence.max(0) as u64,
        model,
    })
}

#[async_trait]
impl<P: Projection> ReadStore<P> for SqliteReadStore<P> {
    #[instrument(skip(self), fields(projection = P::NAME, aggregate_id = %aggregate_id), err)]
    async fn get(&self, aggregate_id: AggregateId) -> Result<Option<ProjectedRow<P>>, ReadStoreError> {
        let row = sqlx::query(
            "SELECT aggregate_id, last_sequence, data FROM read_models \
             WHERE projection = ?1 AND aggregate_id = ?2",
        )
        .bind(P::NAME)
        .bind(aggregate_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReadStoreError::from_sqlx("get", e))?;

        row.as_ref().map(decode::<P>).transpose()
    }

    #[instrument(skip(self), fields(projection = P::NAME), err)]
    async fn list(&self) -> Result<Vec<ProjectedRow<P>>, ReadStoreError> {
        let rows = sqlx::query(
            "SELECT aggregate_id, last_sequence, data FROM read_models \
             WHERE projection = ?1 ORDER BY aggregate_id ASC",
        )
        .bind(P::NAME)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ReadStoreError::from_sqlx("list", e))?;

        rows.iter().map(decode::<P>).collect()
    }

    #[instrument(
        skip(self, row),
        fields(projection = P::NAME, aggregate_id = %row.aggregate_id, last_sequence = row.last_sequence),
        err
    )]
    async fn upsert(&self, row: ProjectedRow<P>) -> Result<(), ReadStoreError> {
        let data = serde_json::to_string(&row.model)
            .map_err(|e| ReadStoreError::Corrupt(format!("{}: {e}", P::NAME)))?;

        sqlx::query(
            "INSERT INTO read_models (projection, aggregate_id, last_sequence, data) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (projection, aggregate_id) DO UPDATE SET \
                 last_sequence = excluded.last_sequence, \
                 data = excluded.data, \
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(P::NAME)
        .bind(row.aggregate_id.to_string())
        .bind(row.last_sequence as i64)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| ReadStoreError::from_sqlx("upsert", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(projection = P::NAME), err)]
    async fn clear(&self) -> Result<(), ReadStoreError> {
        sqlx::query("DELETE FROM read_models WHERE projection = ?1")
            .bind(P::NAME)
            .execute(&self.pool)
            .await
            .map_err(|e| ReadStoreError::from_sqlx("clear", e))?;
        Ok(())
    }
}
