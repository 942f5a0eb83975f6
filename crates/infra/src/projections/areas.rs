use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_assets::{AreaEvent, AreaId, AreaLocation, AreaSize, AreaType, FarmId, ReservoirId};
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};

use super::handler::ProjectionHandler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaReadModel {
    pub area_id: AreaId,
    pub farm_id: FarmId,
    pub reservoir_id: Option<ReservoirId>,
    pub name: String,
    pub area_type: AreaType,
    pub location: AreaLocation,
    pub size: AreaSize,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct AreaFilter {
    pub farm_id: Option<FarmId>,
    pub area_type: Option<AreaType>,
    pub reservoir_id: Option<ReservoirId>,
}

impl Projection for AreaReadModel {
    type Ev = AreaEvent;

    const NAME: &'static str = "areas";

    fn fold(current: Option<Self>, envelope: &EventEnvelope<AreaEvent>) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                AreaEvent::AreaCreated(e) => Ok(Self {
                    area_id: e.area_id,
                    farm_id: e.farm_id,
                    reservoir_id: e.reservoir_id,
                    name: e.name.clone(),
                    area_type: e.area_type,
                    location: e.location,
                    size: e.size,
                    created_date: e.created_date,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        match envelope.payload() {
            AreaEvent::AreaCreated(_) => return Err(ProjectionError::duplicate_create(envelope)),
            AreaEvent::AreaNameChanged(e) => row.name = e.name.clone(),
            AreaEvent::AreaSizeChanged(e) => row.size = e.size,
            AreaEvent::AreaTypeChanged(e) => row.area_type = e.area_type,
            AreaEvent::AreaLocationChanged(e) => row.location = e.location,
            AreaEvent::AreaReservoirChanged(e) => row.reservoir_id = e.reservoir_id,
        }
        Ok(row)
    }
}

impl Queryable for AreaReadModel {
    type Filter = AreaFilter;

    fn matches(&self, filter: &AreaFilter) -> bool {
        filter.farm_id.is_none_or(|id| id == self.farm_id)
            && filter.area_type.is_none_or(|t| t == self.area_type)
            && filter
                .reservoir_id
                .is_none_or(|id| self.reservoir_id == Some(id))
    }
}

pub type AreaProjection = ProjectionHandler<AreaReadModel>;
