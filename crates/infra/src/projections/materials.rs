use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use tania_assets::{
    MaterialEvent, MaterialId, MaterialQuantity, MaterialType, MaterialTypeCode, PricePerUnit,
};
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};

use super::handler::ProjectionHandler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialReadModel {
    pub material_id: MaterialId,
    pub name: String,
    pub material_type: MaterialType,
    pub price_per_unit: PricePerUnit,
    pub quantity: MaterialQuantity,
    pub expiration_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub produced_by: Option<String>,
    pub created_date: DateTime<Utc>,
    pub deleted_date: Option<DateTime<Utc>>,
}

impl MaterialReadModel {
    pub fn is_deleted(&self) -> bool {
        self.deleted_date.is_some()
    }
}

/// Deleted materials are hidden unless `include_deleted` is set.
#[derive(Debug, Clone, Default)]
pub struct MaterialFilter {
    pub type_code: Option<MaterialTypeCode>,
    pub include_deleted: bool,
}

impl Projection for MaterialReadModel {
    type Ev = MaterialEvent;

    const NAME: &'static str = "materials";

    fn fold(
        current: Option<Self>,
        envelope: &EventEnvelope<MaterialEvent>,
    ) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                MaterialEvent::MaterialCreated(e) => Ok(Self {
                    material_id: e.material_id,
                    name: e.name.clone(),
                    material_type: e.material_type,
                    price_per_unit: e.price_per_unit.clone(),
                    quantity: e.quantity,
                    expiration_date: e.expiration_date,
                    notes: e.notes.clone(),
                    produced_by: e.produced_by.clone(),
                    created_date: e.created_date,
                    deleted_date: None,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        if row.is_deleted() {
            return Err(ProjectionError::rejected(envelope, "material is deleted"));
        }

        match envelope.payload() {
            MaterialEvent::MaterialCreated(_) => {
                return Err(ProjectionError::duplicate_create(envelope));
            }
            MaterialEvent::MaterialNameChanged(e) => row.name = e.name.clone(),
            MaterialEvent::MaterialPriceChanged(e) => row.price_per_unit = e.price_per_unit.clone(),
            MaterialEvent::MaterialQuantityChanged(e) => row.quantity = e.quantity,
            MaterialEvent::MaterialExpirationDateChanged(e) => {
                row.expiration_date = e.expiration_date;
            }
            MaterialEvent::MaterialDeleted(e) => row.deleted_date = Some(e.deleted_date),
        }
        Ok(row)
    }
}

impl Queryable for MaterialReadModel {
    type Filter = MaterialFilter;

    fn matches(&self, filter: &MaterialFilter) -> bool {
        (filter.include_deleted || !self.is_deleted())
            && filter
                .type_code
                .is_none_or(|code| code == self.material_type.code())
    }
}

pub type MaterialProjection = ProjectionHandler<MaterialReadModel>;
