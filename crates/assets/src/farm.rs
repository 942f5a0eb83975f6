use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

use crate::rules;

typed_id!(
    /// Farm identifier.
    FarmId
);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmType {
    Organic,
    Conventional,
    Hydroponic,
    Aquaponic,
    Mixed,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl Geolocation {
    fn validate(&self) -> Result<(), DomainError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DomainError::validation("latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DomainError::validation("longitude must be between -180 and 180"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub country_code: String,
    pub city_code: String,
}

impl Region {
    fn validate(&self) -> Result<(), DomainError> {
        if self.country_code.trim().is_empty() || self.city_code.trim().is_empty() {
            return Err(DomainError::validation("country and city codes are required"));
        }
        Ok(())
    }
}

/// Aggregate root: Farm.
#[derive(Debug, Clone, PartialEq)]
pub struct Farm {
    id: FarmId,
    name: String,
    farm_type: FarmType,
    geolocation: Geolocation,
    region: Region,
    version: u64,
    created: bool,
}

impl Farm {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: FarmId) -> Self {
        Self {
            id,
            name: String::new(),
            farm_type: FarmType::Organic,
            geolocation: Geolocation {
                latitude: 0.0,
                longitude: 0.0,
            },
            region: Region {
                country_code: String::new(),
                city_code: String::new(),
            },
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn farm_type(&self) -> FarmType {
        self.farm_type
    }

    pub fn geolocation(&self) -> Geolocation {
        self.geolocation
    }
}

impl AggregateRoot for Farm {
    type Id = FarmId;

    const KIND: AggregateKind = AggregateKind::Farm;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateFarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFarm {
    pub farm_id: FarmId,
    pub name: String,
    pub farm_type: FarmType,
    pub geolocation: Geolocation,
    pub region: Region,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameFarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameFarm {
    pub farm_id: FarmId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeFarmType.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFarmType {
    pub farm_id: FarmId,
    pub farm_type: FarmType,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeFarmGeolocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFarmGeolocation {
    pub farm_id: FarmId,
    pub geolocation: Geolocation,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeFarmRegion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeFarmRegion {
    pub farm_id: FarmId,
    pub region: Region,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FarmCommand {
    Create(CreateFarm),
    Rename(RenameFarm),
    ChangeType(ChangeFarmType),
    ChangeGeolocation(ChangeFarmGeolocation),
    ChangeRegion(ChangeFarmRegion),
}

impl Command for FarmCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            FarmCommand::Create(c) => c.farm_id,
            FarmCommand::Rename(c) => c.farm_id,
            FarmCommand::ChangeType(c) => c.farm_id,
            FarmCommand::ChangeGeolocation(c) => c.farm_id,
            FarmCommand::ChangeRegion(c) => c.farm_id,
        };
        id.aggregate_id()
    }
}

/// Event: FarmCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmCreated {
    pub farm_id: FarmId,
    pub name: String,
    pub farm_type: FarmType,
    pub geolocation: Geolocation,
    pub region: Region,
    pub created_date: DateTime<Utc>,
}

/// Event: FarmNameChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmNameChanged {
    pub farm_id: FarmId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FarmTypeChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmTypeChanged {
    pub farm_id: FarmId,
    pub farm_type: FarmType,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FarmGeolocationChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmGeolocationChanged {
    pub farm_id: FarmId,
    pub geolocation: Geolocation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FarmRegionChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmRegionChanged {
    pub farm_id: FarmId,
    pub region: Region,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FarmEvent {
    FarmCreated(FarmCreated),
    FarmNameChanged(FarmNameChanged),
    FarmTypeChanged(FarmTypeChanged),
    FarmGeolocationChanged(FarmGeolocationChanged),
    FarmRegionChanged(FarmRegionChanged),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FarmEventKind {
    Created,
    NameChanged,
    TypeChanged,
    GeolocationChanged,
    RegionChanged,
}

impl EventKind for FarmEventKind {
    fn code(&self) -> &'static str {
        match self {
            FarmEventKind::Created => "FarmCreated",
            FarmEventKind::NameChanged => "FarmNameChanged",
            FarmEventKind::TypeChanged => "FarmTypeChanged",
            FarmEventKind::GeolocationChanged => "FarmGeolocationChanged",
            FarmEventKind::RegionChanged => "FarmRegionChanged",
        }
    }

    fn all() -> &'static [Self] {
        &[
            FarmEventKind::Created,
            FarmEventKind::NameChanged,
            FarmEventKind::TypeChanged,
            FarmEventKind::GeolocationChanged,
            FarmEventKind::RegionChanged,
        ]
    }
}

impl Event for FarmEvent {
    type Kind = FarmEventKind;

    fn kind(&self) -> FarmEventKind {
        match self {
            FarmEvent::FarmCreated(_) => FarmEventKind::Created,
            FarmEvent::FarmNameChanged(_) => FarmEventKind::NameChanged,
            FarmEvent::FarmTypeChanged(_) => FarmEventKind::TypeChanged,
            FarmEvent::FarmGeolocationChanged(_) => FarmEventKind::GeolocationChanged,
            FarmEvent::FarmRegionChanged(_) => FarmEventKind::RegionChanged,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FarmEvent::FarmCreated(e) => e.created_date,
            FarmEvent::FarmNameChanged(e) => e.occurred_at,
            FarmEvent::FarmTypeChanged(e) => e.occurred_at,
            FarmEvent::FarmGeolocationChanged(e) => e.occurred_at,
            FarmEvent::FarmRegionChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Farm {
    type Command = FarmCommand;
    type Event = FarmEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FarmEvent::FarmCreated(e) => {
                self.id = e.farm_id;
                self.name = e.name.clone();
                self.farm_type = e.farm_type;
                self.geolocation = e.geolocation;
                self.region = e.region.clone();
                self.created = true;
            }
            FarmEvent::FarmNameChanged(e) => self.name = e.name.clone(),
            FarmEvent::FarmTypeChanged(e) => self.farm_type = e.farm_type,
            FarmEvent::FarmGeolocationChanged(e) => self.geolocation = e.geolocation,
            FarmEvent::FarmRegionChanged(e) => self.region = e.region.clone(),
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FarmCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("farm already exists"));
                }
                let name = rules::name("farm", &cmd.name)?;
                cmd.geolocation.validate()?;
                cmd.region.validate()?;
                Ok(vec![FarmEvent::FarmCreated(FarmCreated {
                    farm_id: cmd.farm_id,
                    name,
                    farm_type: cmd.farm_type,
                    geolocation: cmd.geolocation,
                    region: cmd.region.clone(),
                    created_date: cmd.occurred_at,
                })])
            }
            FarmCommand::Rename(cmd) => {
                self.ensure_exists(cmd.farm_id)?;
                let name = rules::name("farm", &cmd.name)?;
                Ok(vec![FarmEvent::FarmNameChanged(FarmNameChanged {
                    farm_id: cmd.farm_id,
                    name,
                    occurred_at: cmd.occurred_at,
                })])
            }
            FarmCommand::ChangeType(cmd) => {
                self.ensure_exists(cmd.farm_id)?;
                Ok(vec![FarmEvent::FarmTypeChanged(FarmTypeChanged {
                    farm_id: cmd.farm_id,
                    farm_type: cmd.farm_type,
                    occurred_at: cmd.occurred_at,
                })])
            }
            FarmCommand::ChangeGeolocation(cmd) => {
                self.ensure_exists(cmd.farm_id)?;
                cmd.geolocation.validate()?;
                Ok(vec![FarmEvent::FarmGeolocationChanged(FarmGeolocationChanged {
                    farm_id: cmd.farm_id,
                    geolocation: cmd.geolocation,
                    occurred_at: cmd.occurred_at,
                })])
            }
            FarmCommand::ChangeRegion(cmd) => {
                self.ensure_exists(cmd.farm_id)?;
                cmd.region.validate()?;
                Ok(vec![FarmEvent::FarmRegionChanged(FarmRegionChanged {
                    farm_id: cmd.farm_id,
                    region: cmd.region.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Farm {
    fn ensure_exists(&self, farm_id: FarmId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != farm_id {
            return Err(DomainError::invariant("farm_id mismatch"));
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

    fn create(farm_id: FarmId) -> FarmCommand {
        FarmCommand::Create(CreateFarm {
            farm_id,
            name: "  Green Valley  ".to_string(),
            farm_type: FarmType::Organic,
            geolocation: Geolocation {
                latitude: -6.2,
                longitude: 106.8,
            },
            region: Region {
                country_code: "ID".to_string(),
                city_code: "JK".to_string(),
            },
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_trims_the_name() {
        let id = FarmId::generate();
        let mut farm = Farm::empty(id);
        execute(&mut farm, &create(id)).unwrap();
        assert_eq!(farm.name(), "Green Valley");
        assert_eq!(farm.version(), 1);
    }

    #[test]
    fn geolocation_out_of_range_is_rejected() {
        let id = FarmId::generate();
        let mut farm = Farm::empty(id);
        execute(&mut farm, &create(id)).unwrap();
        let err = farm
            .handle(&FarmCommand::ChangeGeolocation(ChangeFarmGeolocation {
                farm_id: id,
                geolocation: Geolocation {
                    latitude: 91.0,
                    longitude: 0.0,
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rename_of_unknown_farm_is_not_found() {
        let id = FarmId::generate();
        let farm = Farm::empty(id);
        let err = farm
            .handle(&FarmCommand::Rename(RenameFarm {
                farm_id: id,
                name: "North".into(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn type_change_is_applied() {
        let id = FarmId::generate();
        let mut farm = Farm::empty(id);
        execute(&mut farm, &create(id)).unwrap();
        execute(
            &mut farm,
            &FarmCommand::ChangeType(ChangeFarmType {
                farm_id: id,
                farm_type: FarmType::Hydroponic,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(farm.farm_type(), FarmType::Hydroponic);
        assert_eq!(farm.version(), 2);
    }
}
