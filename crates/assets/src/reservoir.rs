use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

use crate::farm::FarmId;
use crate::rules;

typed_id!(
    /// Water reservoir identifier.
    ReservoirId
);

/// Where a reservoir's water comes from.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaterSource {
    Bucket { capacity_litres: f64 },
    Tap,
}

impl WaterSource {
    fn validate(&self) -> Result<(), DomainError> {
        match self {
            WaterSource::Bucket { capacity_litres } => {
                rules::positive("bucket capacity", *capacity_litres)
            }
            WaterSource::Tap => Ok(()),
        }
    }
}

/// Aggregate root: Reservoir.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservoir {
    id: ReservoirId,
    farm_id: Option<FarmId>,
    name: String,
    water_source: WaterSource,
    version: u64,
    created: bool,
}

impl Reservoir {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ReservoirId) -> Self {
        Self {
            id,
            farm_id: None,
            name: String::new(),
            water_source: WaterSource::Tap,
            version: 0,
            created: false,
        }
    }

    pub fn farm_id(&self) -> Option<FarmId> {
        self.farm_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn water_source(&self) -> WaterSource {
        self.water_source
    }
}

impl AggregateRoot for Reservoir {
    type Id = ReservoirId;

    const KIND: AggregateKind = AggregateKind::Reservoir;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateReservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReservoir {
    pub reservoir_id: ReservoirId,
    pub farm_id: FarmId,
    pub name: String,
    pub water_source: WaterSource,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameReservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameReservoir {
    pub reservoir_id: ReservoirId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeWaterSource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeWaterSource {
    pub reservoir_id: ReservoirId,
    pub water_source: WaterSource,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReservoirCommand {
    Create(CreateReservoir),
    Rename(RenameReservoir),
    ChangeWaterSource(ChangeWaterSource),
}

impl Command for ReservoirCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            ReservoirCommand::Create(c) => c.reservoir_id,
            ReservoirCommand::Rename(c) => c.reservoir_id,
            ReservoirCommand::ChangeWaterSource(c) => c.reservoir_id,
        };
        id.aggregate_id()
    }
}

/// Event: ReservoirCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirCreated {
    pub reservoir_id: ReservoirId,
    pub farm_id: FarmId,
    pub name: String,
    pub water_source: WaterSource,
    pub created_date: DateTime<Utc>,
}

/// Event: ReservoirNameChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirNameChanged {
    pub reservoir_id: ReservoirId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservoirWaterSourceChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirWaterSourceChanged {
    pub reservoir_id: ReservoirId,
    pub water_source: WaterSource,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReservoirEvent {
    ReservoirCreated(ReservoirCreated),
    ReservoirNameChanged(ReservoirNameChanged),
    ReservoirWaterSourceChanged(ReservoirWaterSourceChanged),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReservoirEventKind {
    Created,
    NameChanged,
    WaterSourceChanged,
}

impl EventKind for ReservoirEventKind {
    fn code(&self) -> &'static str {
        match self {
            ReservoirEventKind::Created => "ReservoirCreated",
            ReservoirEventKind::NameChanged => "ReservoirNameChanged",
            ReservoirEventKind::WaterSourceChanged => "ReservoirWaterSourceChanged",
        }
    }

    fn all() -> &'static [Self] {
        &[
            ReservoirEventKind::Created,
            ReservoirEventKind::NameChanged,
            ReservoirEventKind::WaterSourceChanged,
        ]
    }
}

impl Event for ReservoirEvent {
    type Kind = ReservoirEventKind;

    fn kind(&self) -> ReservoirEventKind {
        match self {
            ReservoirEvent::ReservoirCreated(_) => ReservoirEventKind::Created,
            ReservoirEvent::ReservoirNameChanged(_) => ReservoirEventKind::NameChanged,
            ReservoirEvent::ReservoirWaterSourceChanged(_) => ReservoirEventKind::WaterSourceChanged,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReservoirEvent::ReservoirCreated(e) => e.created_date,
            ReservoirEvent::ReservoirNameChanged(e) => e.occurred_at,
            ReservoirEvent::ReservoirWaterSourceChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Reservoir {
    type Command = ReservoirCommand;
    type Event = ReservoirEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReservoirEvent::ReservoirCreated(e) => {
                self.id = e.reservoir_id;
                self.farm_id = Some(e.farm_id);
                self.name = e.name.clone();
                self.water_source = e.water_source;
                self.created = true;
            }
            ReservoirEvent::ReservoirNameChanged(e) => self.name = e.name.clone(),
            ReservoirEvent::ReservoirWaterSourceChanged(e) => self.water_source = e.water_source,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReservoirCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("reservoir already exists"));
                }
                let name = rules::name("reservoir", &cmd.name)?;
                cmd.water_source.validate()?;
                Ok(vec![ReservoirEvent::ReservoirCreated(ReservoirCreated {
                    reservoir_id: cmd.reservoir_id,
                    farm_id: cmd.farm_id,
                    name,
                    water_source: cmd.water_source,
                    created_date: cmd.occurred_at,
                })])
            }
            ReservoirCommand::Rename(cmd) => {
                self.ensure_exists(cmd.reservoir_id)?;
                let name = rules::name("reservoir", &cmd.name)?;
                Ok(vec![ReservoirEvent::ReservoirNameChanged(ReservoirNameChanged {
                    reservoir_id: cmd.reservoir_id,
                    name,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ReservoirCommand::ChangeWaterSource(cmd) => {
                self.ensure_exists(cmd.reservoir_id)?;
                cmd.water_source.validate()?;
                Ok(vec![ReservoirEvent::ReservoirWaterSourceChanged(
                    ReservoirWaterSourceChanged {
                        reservoir_id: cmd.reservoir_id,
                        water_source: cmd.water_source,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }
}

impl Reservoir {
    fn ensure_exists(&self, reservoir_id: ReservoirId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != reservoir_id {
            return Err(DomainError::invariant("reservoir_id mismatch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tania_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn bucket_needs_a_positive_capacity() {
        let id = ReservoirId::generate();
        let reservoir = Reservoir::empty(id);
        let err = reservoir
            .handle(&ReservoirCommand::Create(CreateReservoir {
                reservoir_id: id,
                farm_id: FarmId::generate(),
                name: "Rain barrel".into(),
                water_source: WaterSource::Bucket {
                    capacity_litres: 0.0,
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn water_source_can_switch_to_tap() {
        let id = ReservoirId::generate();
        let farm_id = FarmId::generate();
        let mut reservoir = Reservoir::empty(id);
        execute(
            &mut reservoir,
            &ReservoirCommand::Create(CreateReservoir {
                reservoir_id: id,
                farm_id,
                name: "Rain barrel".into(),
                water_source: WaterSource::Bucket {
                    capacity_litres: 200.0,
                },
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut reservoir,
            &ReservoirCommand::ChangeWaterSource(ChangeWaterSource {
                reservoir_id: id,
                water_source: WaterSource::Tap,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(reservoir.water_source(), WaterSource::Tap);
        assert_eq!(reservoir.farm_id(), Some(farm_id));
        assert_eq!(reservoir.version(), 2);
    }

    #[test]
    fn water_source_is_tagged_in_json() {
        let json = serde_json::to_value(WaterSource::Bucket {
            capacity_litres: 12.5,
        })
        .unwrap();
        assert_eq!(json["kind"], "bucket");
        assert_eq!(json["capacity_litres"], 12.5);
    }
}
