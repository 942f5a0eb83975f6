use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use tania_core::{AggregateId, AggregateKind};
use tania_events::{EventEnvelope, EventHandler, Projection, ProjectionError, Queryable};

use crate::event_model::{AggregateEvent, DomainEnvelope};
use crate::read_model::{InMemoryReadStore, ProjectedRow, ReadStore, ReadStoreError};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no row for aggregate {0}")]
    NotFound(AggregateId),

    #[error(transparent)]
    Store(#[from] ReadStoreError),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Store(#[from] ReadStoreError),
}

/// What [`ProjectionHandler::apply`] did with an envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Already folded (sequence at or below the row's last sequence).
    Skipped,
}

/// The only writer of one projection's rows.
///
/// Applies envelopes idempotently: each row remembers the last sequence it
/// folded, replays at or below it are skipped, and a gap is an error that
/// leaves the row untouched.
pub struct ProjectionHandler<P: Projection> {
    store: Arc<dyn ReadStore<P>>,
}

impl<P: Projection> core::fmt::Debug for ProjectionHandler<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProjectionHandler")
            .field("projection", &P::NAME)
            .finish()
    }
}

impl<P: Projection> ProjectionHandler<P> {
    pub fn new(store: Arc<dyn ReadStore<P>>) -> Self {
        Self { store }
    }

    /// Handler over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryReadStore::<P>::new()))
    }

    #[instrument(
        skip_all,
        fields(
            projection = P::NAME,
            aggregate_id = %envelope.aggregate_id(),
            sequence = envelope.sequence_number()
        )
    )]
    pub async fn apply(&self, envelope: &EventEnvelope<P::Ev>) -> Result<ApplyOutcome, ApplyError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let current = self.store.get(aggregate_id).await?;
        let last = current.as_ref().map_or(0, |row| row.last_sequence);

        if seq == 0 || seq > last + 1 {
            warn!(last, found = seq, "sequence gap; row left untouched");
            return Err(ProjectionError::NonMonotonicSequence {
                aggregate_id,
                last,
                found: seq,
            }
            .into());
        }
        if seq <= last {
            debug!(last, "already applied");
            return Ok(ApplyOutcome::Skipped);
        }

        let model = P::fold(current.map(|row| row.model), envelope)?;
        self.store
            .upsert(ProjectedRow {
                aggregate_id,
                last_sequence: seq,
                model,
            })
            .await?;
        Ok(ApplyOutcome::Applied)
    }

    pub async fn get(&self, aggregate_id: AggregateId) -> Result<P, QueryError> {
        self.store
            .get(aggregate_id)
            .await?
            .map(|row| row.model)
            .ok_or(QueryError::NotFound(aggregate_id))
    }

    /// The row with its bookkeeping, if present.
    pub async fn row(&self, aggregate_id: AggregateId) -> Result<Option<ProjectedRow<P>>, QueryError> {
        Ok(self.store.get(aggregate_id).await?)
    }

    /// Every row, ordered by aggregate id.
    pub async fn list(&self) -> Result<Vec<P>, QueryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(|row| row.model)
            .collect())
    }

    pub async fn clear(&self) -> Result<(), ReadStoreError> {
        self.store.clear().await
    }
}

impl<P: Queryable> ProjectionHandler<P> {
    /// Rows matching `filter`, ordered by aggregate id.
    pub async fn query(&self, filter: &P::Filter) -> Result<Vec<P>, QueryError> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .map(|row| row.model)
            .filter(|model| model.matches(filter))
            .collect())
    }
}

impl<P> ProjectionHandler<P>
where
    P: Projection,
    P::Ev: AggregateEvent,
{
    async fn apply_domain(&self, envelope: &DomainEnvelope) -> Result<ApplyOutcome, ApplyError> {
        match <P::Ev as AggregateEvent>::narrow(envelope.payload()) {
            Some(event) => self.apply(&envelope.with_payload(event.clone())).await,
            None => Ok(ApplyOutcome::Skipped),
        }
    }
}

#[async_trait]
impl<P> EventHandler<DomainEnvelope> for ProjectionHandler<P>
where
    P: Projection,
    P::Ev: AggregateEvent,
{
    fn name(&self) -> &str {
        P::NAME
    }

    async fn handle(&self, message: &DomainEnvelope) -> anyhow::Result<()> {
        self.apply_domain(message).await?;
        Ok(())
    }
}

/// A projection the read side can reset, replay and check.
#[async_trait]
pub trait Rebuildable: Send + Sync {
    fn name(&self) -> &'static str;

    /// Aggregate kind whose events feed this projection.
    fn source(&self) -> AggregateKind;

    async fn reset(&self) -> Result<(), ReadStoreError>;

    async fn replay(&self, envelope: &DomainEnvelope) -> Result<(), ApplyError>;

    /// Aggregate ids whose live row differs from a scratch replay of `envelopes`:
    /// missing, stale, or present without any events.
    async fn diverging(&self, envelopes: &[DomainEnvelope]) -> Result<Vec<AggregateId>, ApplyError>;
}

#[async_trait]
impl<P> Rebuildable for ProjectionHandler<P>
where
    P: Projection,
    P::Ev: AggregateEvent,
{
    fn name(&self) -> &'static str {
        P::NAME
    }

    fn source(&self) -> AggregateKind {
        <P::Ev as AggregateEvent>::AGGREGATE
    }

    async fn reset(&self) -> Result<(), ReadStoreError> {
        self.clear().await
    }

    async fn replay(&self, envelope: &DomainEnvelope) -> Result<(), ApplyError> {
        self.apply_domain(envelope).await.map(|_| ())
    }

    async fn diverging(&self, envelopes: &[DomainEnvelope]) -> Result<Vec<AggregateId>, ApplyError> {
        let scratch = ProjectionHandler::<P>::in_memory();
        for envelope in envelopes {
            scratch.apply_domain(envelope).await?;
        }

        let expected: BTreeMap<AggregateId, ProjectedRow<P>> = scratch
            .store
            .list()
            .await?
            .into_iter()
            .map(|row| (row.aggregate_id, row))
            .collect();
        let mut actual: BTreeMap<AggregateId, ProjectedRow<P>> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|row| (row.aggregate_id, row))
            .collect();

        let mut diverging = Vec::new();
        for (id, row) in &expected {
            if actual.remove(id).as_ref() != Some(row) {
                diverging.push(*id);
            }
        }
        diverging.extend(actual.into_keys());
        diverging.sort();
        Ok(diverging)
    }
}
