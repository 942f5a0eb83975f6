use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use tania_core::AggregateId;

use crate::envelope::EventEnvelope;
use crate::event::{Event, EventKind};

/// A projection folds one aggregate's event stream into a read-model row.
///
/// The fold is **pure**: it sees the current row (if any) and one envelope,
/// never other aggregates and never the clock. Replaying a stream from
/// sequence 1 into an empty store therefore reproduces exactly the row that
/// incremental application built.
///
/// Storage, idempotency bookkeeping (last applied sequence) and querying live
/// in the infrastructure crate; a projection only describes the fold.
pub trait Projection:
    Clone + PartialEq + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Ev: Event;

    /// Stable name; also the key the SQL read stores file rows under.
    const NAME: &'static str;

    /// Event kinds this projection subscribes to. Defaults to all of them.
    fn topics() -> Vec<<Self::Ev as Event>::Kind> {
        <<Self::Ev as Event>::Kind as EventKind>::all().to_vec()
    }

    /// Fold one event into the row.
    ///
    /// `current` is `None` until the aggregate's creation event has been applied.
    fn fold(current: Option<Self>, envelope: &EventEnvelope<Self::Ev>) -> Result<Self, ProjectionError>;
}

/// A projection whose rows can be filtered by secondary fields.
pub trait Queryable: Projection {
    type Filter: Default + core::fmt::Debug + Send + Sync;

    fn matches(&self, filter: &Self::Filter) -> bool;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("{event_type} (sequence {sequence}) for {aggregate_id} arrived before the aggregate was created")]
    MissingRow {
        aggregate_id: AggregateId,
        sequence: u64,
        event_type: &'static str,
    },

    #[error("{aggregate_id} was already created; {event_type} at sequence {sequence} is out of place")]
    DuplicateCreate {
        aggregate_id: AggregateId,
        sequence: u64,
        event_type: &'static str,
    },

    #[error("non-monotonic sequence for {aggregate_id} (last applied: {last}, found: {found})")]
    NonMonotonicSequence {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },

    #[error("{event_type} for {aggregate_id} cannot be folded: {reason}")]
    Rejected {
        aggregate_id: AggregateId,
        event_type: &'static str,
        reason: String,
    },
}

impl ProjectionError {
    pub fn missing_row<E: Event>(envelope: &EventEnvelope<E>) -> Self {
        Self::MissingRow {
            aggregate_id: envelope.aggregate_id(),
            sequence: envelope.sequence_number(),
            event_type: envelope.payload().event_type(),
        }
    }

    pub fn duplicate_create<E: Event>(envelope: &EventEnvelope<E>) -> Self {
        Self::DuplicateCreate {
            aggregate_id: envelope.aggregate_id(),
            sequence: envelope.sequence_number(),
            event_type: envelope.payload().event_type(),
        }
    }

    pub fn rejected<E: Event>(envelope: &EventEnvelope<E>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            aggregate_id: envelope.aggregate_id(),
            event_type: envelope.payload().event_type(),
            reason: reason.into(),
        }
    }
}

/// Fold a complete, ordered stream from scratch.
///
/// Returns `None` for an empty stream.
pub fn replay<'a, P, I>(envelopes: I) -> Result<Option<P>, ProjectionError>
where
    P: Projection,
    I: IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
{
    let mut row: Option<P> = None;
    for envelope in envelopes {
        row = Some(P::fold(row, envelope)?);
    }
    Ok(row)
}
