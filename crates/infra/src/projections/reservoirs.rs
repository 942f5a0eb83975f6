use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_assets::{FarmId, ReservoirEvent, ReservoirId, WaterSource};
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};

use super::handler::ProjectionHandler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirReadModel {
    pub reservoir_id: ReservoirId,
    pub farm_id: FarmId,
    pub name: String,
    pub water_source: WaterSource,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReservoirFilter {
    pub farm_id: Option<FarmId>,
}

impl Projection for ReservoirReadModel {
    type Ev = ReservoirEvent;

    const NAME: &'static str = "reservoirs";

    fn fold(
        current: Option<Self>,
        envelope: &EventEnvelope<ReservoirEvent>,
    ) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                ReservoirEvent::ReservoirCreated(e) => Ok(Self {
                    reservoir_id: e.reservoir_id,
                    farm_id: e.farm_id,
                    name: e.name.clone(),
                    water_source: e.water_source,
                    created_date: e.created_date,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        match envelope.payload() {
            ReservoirEvent::ReservoirCreated(_) => {
                return Err(ProjectionError::duplicate_create(envelope));
            }
            ReservoirEvent::ReservoirNameChanged(e) => row.name = e.name.clone(),
            ReservoirEvent::ReservoirWaterSourceChanged(e) => row.water_source = e.water_source,
        }
        Ok(row)
    }
}

impl Queryable for ReservoirReadModel {
    type Filter = ReservoirFilter;

    fn matches(&self, filter: &ReservoirFilter) -> bool {
        filter.farm_id.is_none_or(|id| id == self.farm_id)
    }
}

pub type ReservoirProjection = ProjectionHandler<ReservoirReadModel>;
