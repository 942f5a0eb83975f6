use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tania_core::{AggregateId, AggregateKind, ExpectedVersion};
use tania_events::Event;

use crate::event_model::{AggregateEvent, DomainEnvelope, DomainEvent, EventKind};

/// An event ready to be appended (no sequence number yet).
///
/// Built from a typed domain event with [`UncommittedEvent::from_domain`],
/// which serializes the per-aggregate payload and captures the metadata the
/// ledger writes next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_kind: AggregateKind,
    pub event_kind: EventKind,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    pub fn from_domain(
        aggregate_id: AggregateId,
        event_id: Uuid,
        event: &DomainEvent,
    ) -> Result<Self, LedgerError> {
        let payload = event
            .to_payload()
            .map_err(|e| LedgerError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_kind: event.aggregate_kind(),
            event_kind: event.kind(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    /// Convenience for a typed per-aggregate event with a fresh v7 event id.
    pub fn from_typed<E: AggregateEvent>(
        aggregate_id: AggregateId,
        event: E,
    ) -> Result<Self, LedgerError> {
        Self::from_domain(aggregate_id, Uuid::now_v7(), &event.into())
    }

    pub(crate) fn into_stored(self, sequence_number: u64) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_kind: self.aggregate_kind,
            sequence_number,
            event_kind: self.event_kind,
            event_version: self.event_version,
            occurred_at: self.occurred_at,
            payload: self.payload,
        }
    }
}

/// A ledger record: an appended event with its position in the aggregate stream.
///
/// Sequence numbers start at 1, grow by exactly 1 per event, and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_kind: AggregateKind,
    pub sequence_number: u64,
    pub event_kind: EventKind,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl StoredEvent {
    /// Decode into the envelope the bus carries.
    pub fn decode(&self) -> Result<DomainEnvelope, LedgerError> {
        let event = DomainEvent::from_payload(self.aggregate_kind, &self.payload)
            .map_err(|e| self.corrupt(format!("payload does not decode: {e}")))?;

        if event.kind() != self.event_kind {
            return Err(self.corrupt(format!(
                "payload is a {} but the record says {}",
                event.kind(),
                self.event_kind
            )));
        }

        Ok(DomainEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_kind,
            self.sequence_number,
            event,
        ))
    }

    /// Decode the payload as one aggregate's own event type.
    pub fn decode_as<E: AggregateEvent>(&self) -> Result<E, LedgerError> {
        if self.aggregate_kind != E::AGGREGATE {
            return Err(self.corrupt(format!(
                "stream belongs to {}, not {}",
                self.aggregate_kind,
                E::AGGREGATE
            )));
        }
        E::deserialize_from(&self.payload)
            .map_err(|e| self.corrupt(format!("payload does not decode: {e}")))
    }

    fn corrupt(&self, detail: String) -> LedgerError {
        LedgerError::Corrupt(format!(
            "{} #{}: {detail}",
            self.aggregate_id, self.sequence_number
        ))
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("ledger unavailable: {0}")]
    StoreUnavailable(String),

    #[error("corrupt ledger record: {0}")]
    Corrupt(String),
}

/// Append-only event ledger, the source of truth.
///
/// Implementations must:
/// - append a batch for one aggregate atomically, assigning `current + 1 ..`
/// - serialize appends to the same aggregate
/// - never update or delete a record
/// - return streams ordered by sequence number
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a batch for one aggregate.
    ///
    /// `ExpectedVersion::Exact(v)` fails with [`LedgerError::Concurrency`] when
    /// the stream is not at `v`.
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, LedgerError>;

    /// Full ordered stream of one aggregate; empty for unknown ids.
    async fn read_all(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, LedgerError>;

    /// Every event of one aggregate kind, ordered by `(aggregate_id, sequence_number)`.
    async fn read_kind(&self, kind: AggregateKind) -> Result<Vec<StoredEvent>, LedgerError>;

    /// Append a single event unconditionally and return its sequence number.
    async fn append_one(&self, event: UncommittedEvent) -> Result<u64, LedgerError> {
        let stored = self.append(vec![event], ExpectedVersion::Any).await?;
        stored
            .last()
            .map(|e| e.sequence_number)
            .ok_or_else(|| LedgerError::InvalidAppend("append returned no record".to_string()))
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<u64, LedgerError> {
        Ok(self
            .read_all(aggregate_id)
            .await?
            .last()
            .map_or(0, |e| e.sequence_number))
    }
}

#[async_trait]
impl<L> Ledger for Arc<L>
where
    L: Ledger + ?Sized,
{
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, LedgerError> {
        (**self).append(events, expected_version).await
    }

    async fn read_all(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, LedgerError> {
        (**self).read_all(aggregate_id).await
    }

    async fn read_kind(&self, kind: AggregateKind) -> Result<Vec<StoredEvent>, LedgerError> {
        (**self).read_kind(kind).await
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<u64, LedgerError> {
        (**self).stream_version(aggregate_id).await
    }
}

/// Check a batch targets exactly one stream of one kind.
///
/// Returns `None` for an empty batch.
pub(crate) fn batch_target(
    events: &[UncommittedEvent],
) -> Result<Option<(AggregateId, AggregateKind)>, LedgerError> {
    let Some(first) = events.first() else {
        return Ok(None);
    };
    let target = (first.aggregate_id, first.aggregate_kind);

    for (idx, e) in events.iter().enumerate() {
        if e.aggregate_id != target.0 {
            return Err(LedgerError::InvalidAppend(format!(
                "batch contains multiple aggregate ids (index {idx})"
            )));
        }
        if e.aggregate_kind != target.1 {
            return Err(LedgerError::InvalidAppend(format!(
                "batch contains multiple aggregate kinds (index {idx})"
            )));
        }
        if e.event_kind.aggregate_kind() != e.aggregate_kind {
            return Err(LedgerError::InvalidAppend(format!(
                "{} is not a {} event (index {idx})",
                e.event_kind, e.aggregate_kind
            )));
        }
    }

    Ok(Some(target))
}

/// Check the stored kind of an existing stream against the batch.
pub(crate) fn check_stream_kind(
    aggregate_id: AggregateId,
    existing: Option<AggregateKind>,
    batch: AggregateKind,
) -> Result<(), LedgerError> {
    match existing {
        Some(kind) if kind != batch => Err(LedgerError::InvalidAppend(format!(
            "stream {aggregate_id} holds {kind} events, cannot append {batch} events"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn check_expected(
    expected_version: ExpectedVersion,
    current: u64,
) -> Result<(), LedgerError> {
    if expected_version.matches(current) {
        Ok(())
    } else {
        Err(LedgerError::Concurrency(format!(
            "expected {expected_version:?}, found {current}"
        )))
    }
}
