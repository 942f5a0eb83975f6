//! Workspace-wide event catalog.
//!
//! Each bounded context owns its own event sum type. The ledger stores the
//! per-aggregate event as JSON and the bus carries the union [`DomainEvent`],
//! routed on the union kind [`EventKind`].

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use tania_assets::{
    AreaEvent, AreaEventKind, FarmEvent, FarmEventKind, MaterialEvent, MaterialEventKind,
    ReservoirEvent, ReservoirEventKind,
};
use tania_core::AggregateKind;
use tania_events::{Event, EventEnvelope, EventKind as _};
use tania_growth::{CropEvent, CropEventKind};
use tania_tasks::{TaskEvent, TaskEventKind};

/// What the bus carries.
pub type DomainEnvelope = EventEnvelope<DomainEvent>;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Farm(FarmEvent),
    Reservoir(ReservoirEvent),
    Area(AreaEvent),
    Material(MaterialEvent),
    Crop(CropEvent),
    Task(TaskEvent),
}

/// Union of every per-aggregate event kind. Codes are unique across the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Farm(FarmEventKind),
    Reservoir(ReservoirEventKind),
    Area(AreaEventKind),
    Material(MaterialEventKind),
    Crop(CropEventKind),
    Task(TaskEventKind),
}

static ALL_KINDS: LazyLock<Vec<EventKind>> = LazyLock::new(|| {
    let mut all = Vec::new();
    all.extend(FarmEventKind::all().iter().copied().map(EventKind::Farm));
    all.extend(ReservoirEventKind::all().iter().copied().map(EventKind::Reservoir));
    all.extend(AreaEventKind::all().iter().copied().map(EventKind::Area));
    all.extend(MaterialEventKind::all().iter().copied().map(EventKind::Material));
    all.extend(CropEventKind::all().iter().copied().map(EventKind::Crop));
    all.extend(TaskEventKind::all().iter().copied().map(EventKind::Task));
    all
});

impl EventKind {
    pub fn aggregate_kind(&self) -> AggregateKind {
        match self {
            EventKind::Farm(_) => AggregateKind::Farm,
            EventKind::Reservoir(_) => AggregateKind::Reservoir,
            EventKind::Area(_) => AggregateKind::Area,
            EventKind::Material(_) => AggregateKind::Material,
            EventKind::Crop(_) => AggregateKind::Crop,
            EventKind::Task(_) => AggregateKind::Task,
        }
    }
}

impl tania_events::EventKind for EventKind {
    fn code(&self) -> &'static str {
        match self {
            EventKind::Farm(k) => k.code(),
            EventKind::Reservoir(k) => k.code(),
            EventKind::Area(k) => k.code(),
            EventKind::Material(k) => k.code(),
            EventKind::Crop(k) => k.code(),
            EventKind::Task(k) => k.code(),
        }
    }

    fn all() -> &'static [Self] {
        ALL_KINDS.as_slice()
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(tania_events::EventKind::code(self))
    }
}

impl Event for DomainEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Farm(e) => EventKind::Farm(e.kind()),
            DomainEvent::Reservoir(e) => EventKind::Reservoir(e.kind()),
            DomainEvent::Area(e) => EventKind::Area(e.kind()),
            DomainEvent::Material(e) => EventKind::Material(e.kind()),
            DomainEvent::Crop(e) => EventKind::Crop(e.kind()),
            DomainEvent::Task(e) => EventKind::Task(e.kind()),
        }
    }

    fn version(&self) -> u32 {
        match self {
            DomainEvent::Farm(e) => e.version(),
            DomainEvent::Reservoir(e) => e.version(),
            DomainEvent::Area(e) => e.version(),
            DomainEvent::Material(e) => e.version(),
            DomainEvent::Crop(e) => e.version(),
            DomainEvent::Task(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::Farm(e) => e.occurred_at(),
            DomainEvent::Reservoir(e) => e.occurred_at(),
            DomainEvent::Area(e) => e.occurred_at(),
            DomainEvent::Material(e) => e.occurred_at(),
            DomainEvent::Crop(e) => e.occurred_at(),
            DomainEvent::Task(e) => e.occurred_at(),
        }
    }
}

impl DomainEvent {
    pub fn aggregate_kind(&self) -> AggregateKind {
        self.kind().aggregate_kind()
    }

    /// JSON of the inner per-aggregate event, as stored in the ledger.
    pub fn to_payload(&self) -> Result<JsonValue, serde_json::Error> {
        match self {
            DomainEvent::Farm(e) => serde_json::to_value(e),
            DomainEvent::Reservoir(e) => serde_json::to_value(e),
            DomainEvent::Area(e) => serde_json::to_value(e),
            DomainEvent::Material(e) => serde_json::to_value(e),
            DomainEvent::Crop(e) => serde_json::to_value(e),
            DomainEvent::Task(e) => serde_json::to_value(e),
        }
    }

    /// Inverse of [`DomainEvent::to_payload`]; the aggregate kind selects the decoder.
    pub fn from_payload(
        kind: AggregateKind,
        payload: &JsonValue,
    ) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            AggregateKind::Farm => DomainEvent::Farm(FarmEvent::deserialize_from(payload)?),
            AggregateKind::Reservoir => {
                DomainEvent::Reservoir(ReservoirEvent::deserialize_from(payload)?)
            }
            AggregateKind::Area => DomainEvent::Area(AreaEvent::deserialize_from(payload)?),
            AggregateKind::Material => {
                DomainEvent::Material(MaterialEvent::deserialize_from(payload)?)
            }
            AggregateKind::Crop => DomainEvent::Crop(CropEvent::deserialize_from(payload)?),
            AggregateKind::Task => DomainEvent::Task(TaskEvent::deserialize_from(payload)?),
        })
    }
}

/// A per-aggregate event type that is a member of [`DomainEvent`].
pub trait AggregateEvent: Event + Serialize + DeserializeOwned + Into<DomainEvent> {
    const AGGREGATE: AggregateKind;

    /// Borrow this aggregate's event out of the union, if it is one.
    fn narrow(event: &DomainEvent) -> Option<&Self>;

    fn wrap_kind(kind: Self::Kind) -> EventKind;

    fn deserialize_from(payload: &JsonValue) -> Result<Self, serde_json::Error> {
        <Self as serde::Deserialize>::deserialize(payload)
    }
}

macro_rules! aggregate_event {
    ($variant:ident, $event:ty, $kind:ty) => {
        impl From<$event> for DomainEvent {
            fn from(event: $event) -> Self {
                DomainEvent::$variant(event)
            }
        }

        impl From<$kind> for EventKind {
            fn from(kind: $kind) -> Self {
                EventKind::$variant(kind)
            }
        }

        impl AggregateEvent for $event {
            const AGGREGATE: AggregateKind = AggregateKind::$variant;

            fn narrow(event: &DomainEvent) -> Option<&Self> {
                match event {
                    DomainEvent::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn wrap_kind(kind: $kind) -> EventKind {
                EventKind::$variant(kind)
            }
        }
    };
}

aggregate_event!(Farm, FarmEvent, FarmEventKind);
aggregate_event!(Reservoir, ReservoirEvent, ReservoirEventKind);
aggregate_event!(Area, AreaEvent, AreaEventKind);
aggregate_event!(Material, MaterialEvent, MaterialEventKind);
aggregate_event!(Crop, CropEvent, CropEventKind);
aggregate_event!(Task, TaskEvent, TaskEventKind);

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use tania_tasks::{TaskDue, TaskId};

    use super::*;

    #[test]
    fn codes_are_unique_across_the_catalog() {
        let all = <EventKind as tania_events::EventKind>::all();
        let codes: HashSet<&str> = all
            .iter()
            .map(tania_events::EventKind::code)
            .collect();
        assert_eq!(codes.len(), all.len());
        assert_eq!(
            <EventKind as tania_events::EventKind>::from_code("CropBatchMoved"),
            Some(EventKind::Crop(CropEventKind::Moved))
        );
    }

    #[test]
    fn payload_decodes_with_the_aggregate_kind() {
        let event = DomainEvent::from(TaskEvent::TaskDue(TaskDue {
            task_id: TaskId::generate(),
            flagged_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
        }));
        let payload = event.to_payload().unwrap();

        let decoded = DomainEvent::from_payload(AggregateKind::Task, &payload).unwrap();
        assert_eq!(decoded, event);
        assert!(DomainEvent::from_payload(AggregateKind::Farm, &payload).is_err());
    }

    #[test]
    fn narrowing_only_matches_the_own_variant() {
        let event = DomainEvent::from(TaskEvent::TaskDue(TaskDue {
            task_id: TaskId::generate(),
            flagged_at: Utc::now(),
        }));
        assert!(TaskEvent::narrow(&event).is_some());
        assert!(CropEvent::narrow(&event).is_none());
        assert_eq!(event.aggregate_kind(), AggregateKind::Task);
    }
}
