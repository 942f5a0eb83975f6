use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tania_core::{AggregateId, AggregateKind};

/// An event together with its stream metadata.
///
/// Envelopes are what the ledger hands back after an append and what the bus
/// carries to projections. `sequence_number` is the event's position in its
/// aggregate stream: starts at 1, increases by 1, never has gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    aggregate_id: AggregateId,
    aggregate_kind: AggregateKind,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: AggregateId,
        aggregate_kind: AggregateKind,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_kind,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_kind(&self) -> AggregateKind {
        self.aggregate_kind
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Same metadata, different payload (e.g. narrowing a workspace-wide
    /// event union down to one aggregate's event type).
    pub fn with_payload<F>(&self, payload: F) -> EventEnvelope<F> {
        EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_kind: self.aggregate_kind,
            sequence_number: self.sequence_number,
            payload,
        }
    }
}
