use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_assets::{FarmEvent, FarmId, FarmType, Geolocation, Region};
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};

use super::handler::ProjectionHandler;

/// Queryable farm row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmReadModel {
    pub farm_id: FarmId,
    pub name: String,
    pub farm_type: FarmType,
    pub geolocation: Geolocation,
    pub region: Region,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct FarmFilter {
    pub farm_type: Option<FarmType>,
}

impl Projection for FarmReadModel {
    type Ev = FarmEvent;

    const NAME: &'static str = "farms";

    fn fold(current: Option<Self>, envelope: &EventEnvelope<FarmEvent>) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                FarmEvent::FarmCreated(e) => Ok(Self {
                    farm_id: e.farm_id,
                    name: e.name.clone(),
                    farm_type: e.farm_type,
                    geolocation: e.geolocation,
                    region: e.region.clone(),
                    created_date: e.created_date,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        match envelope.payload() {
            FarmEvent::FarmCreated(_) => return Err(ProjectionError::duplicate_create(envelope)),
            FarmEvent::FarmNameChanged(e) => row.name = e.name.clone(),
            FarmEvent::FarmTypeChanged(e) => row.farm_type = e.farm_type,
            FarmEvent::FarmGeolocationChanged(e) => row.geolocation = e.geolocation,
            FarmEvent::FarmRegionChanged(e) => row.region = e.region.clone(),
        }
        Ok(row)
    }
}

impl Queryable for FarmReadModel {
    type Filter = FarmFilter;

    fn matches(&self, filter: &FarmFilter) -> bool {
        filter.farm_type.is_none_or(|t| t == self.farm_type)
    }
}

pub type FarmProjection = ProjectionHandler<FarmReadModel>;
