use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::AggregateId;
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};
use tania_growth::{CropContainer, CropEvent, CropId, CropStatus, CropType};

use super::handler::ProjectionHandler;

/// Containers of a batch sitting in one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaHolding {
    pub area_id: AggregateId,
    pub quantity: u32,
    pub last_watered: Option<DateTime<Utc>>,
}

/// Queryable crop batch row.
///
/// `holdings` is kept sorted by area id and never carries an empty entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropReadModel {
    pub crop_id: CropId,
    pub batch_id: String,
    pub farm_id: AggregateId,
    pub material_id: AggregateId,
    pub crop_type: CropType,
    /// Container shape and count as sown.
    pub container: CropContainer,
    pub holdings: Vec<AreaHolding>,
    pub total_quantity: u32,
    pub harvested_grams: f64,
    pub dumped_quantity: u32,
    pub status: CropStatus,
    pub created_date: DateTime<Utc>,
    pub archived_date: Option<DateTime<Utc>>,
}

impl CropReadModel {
    pub fn quantity_in(&self, area_id: AggregateId) -> u32 {
        self.holding(area_id).map_or(0, |h| h.quantity)
    }

    pub fn holding(&self, area_id: AggregateId) -> Option<&AreaHolding> {
        self.holdings.iter().find(|h| h.area_id == area_id)
    }

    fn holding_mut(&mut self, area_id: AggregateId) -> Option<&mut AreaHolding> {
        self.holdings.iter_mut().find(|h| h.area_id == area_id)
    }

    fn take(
        &mut self,
        envelope: &EventEnvelope<CropEvent>,
        area_id: AggregateId,
        quantity: u32,
    ) -> Result<(), ProjectionError> {
        let Some(holding) = self.holding_mut(area_id) else {
            return Err(ProjectionError::rejected(
                envelope,
                format!("batch holds nothing in area {area_id}"),
            ));
        };
        if holding.quantity < quantity {
            return Err(ProjectionError::rejected(
                envelope,
                format!(
                    "cannot remove {quantity} containers from area {area_id}, only {} held",
                    holding.quantity
                ),
            ));
        }
        holding.quantity -= quantity;
        self.holdings.retain(|h| h.quantity > 0);
        self.total_quantity -= quantity;
        Ok(())
    }

    fn put(&mut self, area_id: AggregateId, quantity: u32) {
        match self.holding_mut(area_id) {
            Some(holding) => holding.quantity += quantity,
            None => {
                self.holdings.push(AreaHolding {
                    area_id,
                    quantity,
                    last_watered: None,
                });
                self.holdings.sort_by_key(|h| h.area_id);
            }
        }
        self.total_quantity += quantity;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CropFilter {
    pub farm_id: Option<AggregateId>,
    /// Batches with at least one container in this area.
    pub area_id: Option<AggregateId>,
    pub status: Option<CropStatus>,
}

impl Projection for CropReadModel {
    type Ev = CropEvent;

    const NAME: &'static str = "crops";

    fn fold(current: Option<Self>, envelope: &EventEnvelope<CropEvent>) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                CropEvent::CropBatchCreated(e) => Ok(Self {
                    crop_id: e.crop_id,
                    batch_id: e.batch_id.clone(),
                    farm_id: e.farm_id,
                    material_id: e.material_id,
                    crop_type: e.crop_type,
                    container: e.container,
                    holdings: vec![AreaHolding {
                        area_id: e.area_id,
                        quantity: e.container.quantity,
                        last_watered: None,
                    }],
                    total_quantity: e.container.quantity,
                    harvested_grams: 0.0,
                    dumped_quantity: 0,
                    status: CropStatus::Active,
                    created_date: e.created_date,
                    archived_date: None,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        if row.status == CropStatus::Archived {
            return Err(ProjectionError::rejected(envelope, "crop batch is archived"));
        }

        match envelope.payload() {
            CropEvent::CropBatchCreated(_) => return Err(ProjectionError::duplicate_create(envelope)),
            CropEvent::CropBatchMoved(e) => {
                row.take(envelope, e.src_area_id, e.quantity)?;
                row.put(e.dst_area_id, e.quantity);
            }
            CropEvent::CropBatchHarvested(e) => {
                row.take(envelope, e.area_id, e.quantity)?;
                row.harvested_grams += e.produced.in_grams();
            }
            CropEvent::CropBatchDumped(e) => {
                row.take(envelope, e.area_id, e.quantity)?;
                row.dumped_quantity += e.quantity;
            }
            CropEvent::CropBatchWatered(e) => match row.holding_mut(e.area_id) {
                Some(holding) => holding.last_watered = Some(e.watering_date),
                None => {
                    return Err(ProjectionError::rejected(
                        envelope,
                        format!("batch holds nothing in area {}", e.area_id),
                    ));
                }
            },
            CropEvent::CropBatchArchived(e) => {
                row.status = CropStatus::Archived;
                row.archived_date = Some(e.archived_date);
            }
        }
        Ok(row)
    }
}

impl Queryable for CropReadModel {
    type Filter = CropFilter;

    fn matches(&self, filter: &CropFilter) -> bool {
        filter.farm_id.is_none_or(|id| id == self.farm_id)
            && filter.status.is_none_or(|s| s == self.status)
            && filter.area_id.is_none_or(|id| self.quantity_in(id) > 0)
    }
}

pub type CropProjection = ProjectionHandler<CropReadModel>;
