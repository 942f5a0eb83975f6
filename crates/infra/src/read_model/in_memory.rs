use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use tania_core::AggregateId;
use tania_events::Projection;

use super::r#trait::{ProjectedRow, ReadStore, ReadStoreError};

/// In-memory read store for tests/dev and for scratch replays.
#[derive(Debug)]
pub struct InMemoryReadStore<P> {
    rows: RwLock<BTreeMap<AggregateId, ProjectedRow<P>>>,
    _projection: PhantomData<fn() -> P>,
}

impl<P> InMemoryReadStore<P> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            _projection: PhantomData,
        }
    }
}

impl<P> Default for InMemoryReadStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P: Projection> ReadStore<P> for InMemoryReadStore<P> {
    async fn get(&self, aggregate_id: AggregateId) -> Result<Option<ProjectedRow<P>>, ReadStoreError> {
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&aggregate_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ProjectedRow<P>>, ReadStoreError> {
        Ok(self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn upsert(&self, row: ProjectedRow<P>) -> Result<(), ReadStoreError> {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(row.aggregate_id, row);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ReadStoreError> {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}
