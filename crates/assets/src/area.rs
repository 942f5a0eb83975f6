use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

use crate::farm::FarmId;
use crate::reservoir::ReservoirId;
use crate::rules;

typed_id!(
    /// Cultivation area identifier.
    AreaId
);

/// Seeding areas host nursery batches; growing areas host transplanted ones.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    Seeding,
    Growing,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaLocation {
    Indoor,
    Outdoor,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    SquareMeter,
    Hectare,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSize {
    pub value: f64,
    pub unit: AreaUnit,
}

/// Aggregate root: Area.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    id: AreaId,
    farm_id: Option<FarmId>,
    reservoir_id: Option<ReservoirId>,
    name: String,
    area_type: AreaType,
    location: AreaLocation,
    size: AreaSize,
    version: u64,
    created: bool,
}

impl Area {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AreaId) -> Self {
        Self {
            id,
            farm_id: None,
            reservoir_id: None,
            name: String::new(),
            area_type: AreaType::Growing,
            location: AreaLocation::Outdoor,
            size: AreaSize {
                value: 0.0,
                unit: AreaUnit::SquareMeter,
            },
            version: 0,
            created: false,
        }
    }

    pub fn farm_id(&self) -> Option<FarmId> {
        self.farm_id
    }

    pub fn reservoir_id(&self) -> Option<ReservoirId> {
        self.reservoir_id
    }

    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    pub fn size(&self) -> AreaSize {
        self.size
    }
}

impl AggregateRoot for Area {
    type Id = AreaId;

    const KIND: AggregateKind = AggregateKind::Area;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateArea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateArea {
    pub area_id: AreaId,
    pub farm_id: FarmId,
    pub reservoir_id: Option<ReservoirId>,
    pub name: String,
    pub area_type: AreaType,
    pub location: AreaLocation,
    pub size: AreaSize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameArea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameArea {
    pub area_id: AreaId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResizeArea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeArea {
    pub area_id: AreaId,
    pub size: AreaSize,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeAreaType.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAreaType {
    pub area_id: AreaId,
    pub area_type: AreaType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeAreaLocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAreaLocation {
    pub area_id: AreaId,
    pub location: AreaLocation,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignAreaReservoir. `None` detaches the current reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignAreaReservoir {
    pub area_id: AreaId,
    pub reservoir_id: Option<ReservoirId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaCommand {
    Create(CreateArea),
    Rename(RenameArea),
    Resize(ResizeArea),
    ChangeType(ChangeAreaType),
    ChangeLocation(ChangeAreaLocation),
    AssignReservoir(AssignAreaReservoir),
}

impl Command for AreaCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            AreaCommand::Create(c) => c.area_id,
            AreaCommand::Rename(c) => c.area_id,
            AreaCommand::Resize(c) => c.area_id,
            AreaCommand::ChangeType(c) => c.area_id,
            AreaCommand::ChangeLocation(c) => c.area_id,
            AreaCommand::AssignReservoir(c) => c.area_id,
        };
        id.aggregate_id()
    }
}

/// Event: AreaCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaCreated {
    pub area_id: AreaId,
    pub farm_id: FarmId,
    pub reservoir_id: Option<ReservoirId>,
    pub name: String,
    pub area_type: AreaType,
    pub location: AreaLocation,
    pub size: AreaSize,
    pub created_date: DateTime<Utc>,
}

/// Event: AreaNameChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaNameChanged {
    pub area_id: AreaId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AreaSizeChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSizeChanged {
    pub area_id: AreaId,
    pub size: AreaSize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AreaTypeChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaTypeChanged {
    pub area_id: AreaId,
    pub area_type: AreaType,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AreaLocationChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaLocationChanged {
    pub area_id: AreaId,
    pub location: AreaLocation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AreaReservoirChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaReservoirChanged {
    pub area_id: AreaId,
    pub reservoir_id: Option<ReservoirId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaEvent {
    AreaCreated(AreaCreated),
    AreaNameChanged(AreaNameChanged),
    AreaSizeChanged(AreaSizeChanged),
    AreaTypeChanged(AreaTypeChanged),
    AreaLocationChanged(AreaLocationChanged),
    AreaReservoirChanged(AreaReservoirChanged),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AreaEventKind {
    Created,
    NameChanged,
    SizeChanged,
    TypeChanged,
    LocationChanged,
    ReservoirChanged,
}

impl EventKind for AreaEventKind {
    fn code(&self) -> &'static str {
        match self {
            AreaEventKind::Created => "AreaCreated",
            AreaEventKind::NameChanged => "AreaNameChanged",
            AreaEventKind::SizeChanged => "AreaSizeChanged",
            AreaEventKind::TypeChanged => "AreaTypeChanged",
            AreaEventKind::LocationChanged => "AreaLocationChanged",
            AreaEventKind::ReservoirChanged => "AreaReservoirChanged",
        }
    }

    fn all() -> &'static [Self] {
        &[
            AreaEventKind::Created,
            AreaEventKind::NameChanged,
            AreaEventKind::SizeChanged,
            AreaEventKind::TypeChanged,
            AreaEventKind::LocationChanged,
            AreaEventKind::ReservoirChanged,
        ]
    }
}

impl Event for AreaEvent {
    type Kind = AreaEventKind;

    fn kind(&self) -> AreaEventKind {
        match self {
            AreaEvent::AreaCreated(_) => AreaEventKind::Created,
            AreaEvent::AreaNameChanged(_) => AreaEventKind::NameChanged,
            AreaEvent::AreaSizeChanged(_) => AreaEventKind::SizeChanged,
            AreaEvent::AreaTypeChanged(_) => AreaEventKind::TypeChanged,
            AreaEvent::AreaLocationChanged(_) => AreaEventKind::LocationChanged,
            AreaEvent::AreaReservoirChanged(_) => AreaEventKind::ReservoirChanged,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AreaEvent::AreaCreated(e) => e.created_date,
            AreaEvent::AreaNameChanged(e) => e.occurred_at,
            AreaEvent::AreaSizeChanged(e) => e.occurred_at,
            AreaEvent::AreaTypeChanged(e) => e.occurred_at,
            AreaEvent::AreaLocationChanged(e) => e.occurred_at,
            AreaEvent::AreaReservoirChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Area {
    type Command = AreaCommand;
    type Event = AreaEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AreaEvent::AreaCreated(e) => {
                self.id = e.area_id;
                self.farm_id = Some(e.farm_id);
                self.reservoir_id = e.reservoir_id;
                self.name = e.name.clone();
                self.area_type = e.area_type;
                self.location = e.location;
                self.size = e.size;
                self.created = true;
            }
            AreaEvent::AreaNameChanged(e) => self.name = e.name.clone(),
            AreaEvent::AreaSizeChanged(e) => self.size = e.size,
            AreaEvent::AreaTypeChanged(e) => self.area_type = e.area_type,
            AreaEvent::AreaLocationChanged(e) => self.location = e.location,
            AreaEvent::AreaReservoirChanged(e) => self.reservoir_id = e.reservoir_id,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AreaCommand::Create(cmd) => self.handle_create(cmd),
            AreaCommand::Rename(cmd) => {
                self.ensure_exists(cmd.area_id)?;
                Ok(vec![AreaEvent::AreaNameChanged(AreaNameChanged {
                    area_id: cmd.area_id,
                    name: rules::name("area", &cmd.name)?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AreaCommand::Resize(cmd) => {
                self.ensure_exists(cmd.area_id)?;
                rules::positive("area size", cmd.size.value)?;
                Ok(vec![AreaEvent::AreaSizeChanged(AreaSizeChanged {
                    area_id: cmd.area_id,
                    size: cmd.size,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AreaCommand::ChangeType(cmd) => {
                self.ensure_exists(cmd.area_id)?;
                Ok(vec![AreaEvent::AreaTypeChanged(AreaTypeChanged {
                    area_id: cmd.area_id,
                    area_type: cmd.area_type,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AreaCommand::ChangeLocation(cmd) => {
                self.ensure_exists(cmd.area_id)?;
                Ok(vec![AreaEvent::AreaLocationChanged(AreaLocationChanged {
                    area_id: cmd.area_id,
                    location: cmd.location,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AreaCommand::AssignReservoir(cmd) => {
                self.ensure_exists(cmd.area_id)?;
                if cmd.reservoir_id == self.reservoir_id {
                    return Err(DomainError::validation("area already uses that reservoir"));
                }
                Ok(vec![AreaEvent::AreaReservoirChanged(AreaReservoirChanged {
                    area_id: cmd.area_id,
                    reservoir_id: cmd.reservoir_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Area {
    fn ensure_exists(&self, area_id: AreaId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != area_id {
            return Err(DomainError::invariant("area_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateArea) -> Result<Vec<AreaEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("area already exists"));
        }
        let name = rules::name("area", &cmd.name)?;
        rules::positive("area size", cmd.size.value)?;

        Ok(vec![AreaEvent::AreaCreated(AreaCreated {
            area_id: cmd.area_id,
            farm_id: cmd.farm_id,
            reservoir_id: cmd.reservoir_id,
            name,
            area_type: cmd.area_type,
            location: cmd.location,
            size: cmd.size,
            created_date: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tania_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 11, 7, 30, 0).unwrap()
    }

    fn create(area_id: AreaId, size: f64) -> AreaCommand {
        AreaCommand::Create(CreateArea {
            area_id,
            farm_id: FarmId::generate(),
            reservoir_id: None,
            name: "Nursery bench".into(),
            area_type: AreaType::Seeding,
            location: AreaLocation::Indoor,
            size: AreaSize {
                value: size,
                unit: AreaUnit::SquareMeter,
            },
            occurred_at: test_time(),
        })
    }

    #[test]
    fn zero_size_is_rejected() {
        let id = AreaId::generate();
        let err = Area::empty(id).handle(&create(id, 0.0)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reservoir_can_be_attached_then_detached() {
        let id = AreaId::generate();
        let mut area = Area::empty(id);
        execute(&mut area, &create(id, 12.0)).unwrap();

        let reservoir_id = ReservoirId::generate();
        execute(
            &mut area,
            &AreaCommand::AssignReservoir(AssignAreaReservoir {
                area_id: id,
                reservoir_id: Some(reservoir_id),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(area.reservoir_id(), Some(reservoir_id));

        execute(
            &mut area,
            &AreaCommand::AssignReservoir(AssignAreaReservoir {
                area_id: id,
                reservoir_id: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(area.reservoir_id(), None);
        assert_eq!(area.version(), 3);
    }

    #[test]
    fn reassigning_the_same_reservoir_is_rejected() {
        let id = AreaId::generate();
        let mut area = Area::empty(id);
        execute(&mut area, &create(id, 12.0)).unwrap();
        let err = area
            .handle(&AreaCommand::AssignReservoir(AssignAreaReservoir {
                area_id: id,
                reservoir_id: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
