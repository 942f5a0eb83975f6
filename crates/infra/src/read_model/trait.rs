use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tania_core::AggregateId;
use tania_events::Projection;

/// One materialized row plus the ledger position it reflects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRow<P> {
    pub aggregate_id: AggregateId,
    /// Sequence number of the last event folded into `model`.
    pub last_sequence: u64,
    pub model: P,
}

#[derive(Debug, Error)]
pub enum ReadStoreError {
    #[error("read store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt read model row: {0}")]
    Corrupt(String),
}

impl ReadStoreError {
    pub(crate) fn from_sqlx(operation: &str, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                ReadStoreError::Corrupt(format!("{operation}: {err}"))
            }
            other => {
                tracing::error!(operation, error = %other, "read store unavailable");
                ReadStoreError::Unavailable(format!("{operation}: {other}"))
            }
        }
    }
}

/// Storage for one projection's rows.
///
/// Only projection handlers write through this trait; it holds disposable
/// state that a rebuild recreates from the ledger.
#[async_trait]
pub trait ReadStore<P: Projection>: Send + Sync {
    async fn get(&self, aggregate_id: AggregateId) -> Result<Option<ProjectedRow<P>>, ReadStoreError>;

    /// Every row, ordered by aggregate id.
    async fn list(&self) -> Result<Vec<ProjectedRow<P>>, ReadStoreError>;

    async fn upsert(&self, row: ProjectedRow<P>) -> Result<(), ReadStoreError>;

    /// Drop every row of this projection (rebuild support).
    async fn clear(&self) -> Result<(), ReadStoreError>;
}

#[async_trait]
impl<P, S> ReadStore<P> for Arc<S>
where
    P: Projection,
    S: ReadStore<P> + ?Sized,
{
    async fn get(&self, aggregate_id: AggregateId) -> Result<Option<ProjectedRow<P>>, ReadStoreError> {
        (**self).get(aggregate_id).await
    }

    async fn list(&self) -> Result<Vec<ProjectedRow<P>>, ReadStoreError> {
        (**self).list().await
    }

    async fn upsert(&self, row: ProjectedRow<P>) -> Result<(), ReadStoreError> {
        (**self).upsert(row).await
    }

    async fn clear(&self) -> Result<(), ReadStoreError> {
        (**self).clear().await
    }
}
