use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use tania_assets::AreaType;
use tania_core::AggregateId;
use tania_events::Command;
use tania_growth::{CreateCropBatch, Crop, CropCommand, CropContainer, CropId, CropType, batch_id};

use crate::command_dispatcher::{DispatchError, Dispatcher};
use crate::projections::{AreaReadModel, MaterialReadModel};
use crate::views::ReadViews;

use super::{CommandReceipt, lookup, require};

/// Sow a new batch; farm, crop type and batch id are derived from the area and material.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantBatch {
    pub crop_id: CropId,
    pub area_id: AggregateId,
    pub material_id: AggregateId,
    pub container: CropContainer,
    pub occurred_at: DateTime<Utc>,
}

fn crop_type_for(area_type: AreaType) -> CropType {
    match area_type {
        AreaType::Seeding => CropType::Nursery,
        AreaType::Growing => CropType::Growing,
    }
}

/// Command handler for crop batches.
#[derive(Debug, Clone)]
pub struct GrowthService {
    dispatcher: Arc<Dispatcher>,
    views: ReadViews,
}

impl GrowthService {
    pub fn new(dispatcher: Arc<Dispatcher>, views: ReadViews) -> Self {
        Self { dispatcher, views }
    }

    #[instrument(skip_all, fields(crop_id = %plant.crop_id))]
    pub async fn plant_batch(&self, plant: PlantBatch) -> Result<CommandReceipt, DispatchError> {
        let area = require(&self.views.areas, plant.area_id, "area").await?;
        let material = self.seed_material(plant.material_id).await?;

        self.crop(CropCommand::Create(CreateCropBatch {
            crop_id: plant.crop_id,
            batch_id: batch_id(&material.name, plant.occurred_at.date_naive()),
            farm_id: area.farm_id.aggregate_id(),
            area_id: plant.area_id,
            material_id: plant.material_id,
            crop_type: crop_type_for(area.area_type),
            container: plant.container,
            occurred_at: plant.occurred_at,
        }))
        .await
    }

    #[instrument(skip_all)]
    pub async fn crop(&self, command: CropCommand) -> Result<CommandReceipt, DispatchError> {
        match &command {
            CropCommand::Create(create) => {
                let area = require(&self.views.areas, create.area_id, "area").await?;
                self.seed_material(create.material_id).await?;
                check_placement(&area, create)?;
            }
            CropCommand::Move(mv) => {
                let dst = require(&self.views.areas, mv.dst_area_id, "destination area").await?;
                // An unknown batch falls through to the dispatcher's not-found.
                let crop = lookup(&self.views.crops, mv.crop_id.aggregate_id()).await?;
                if crop.is_some_and(|crop| crop.farm_id != dst.farm_id.aggregate_id()) {
                    return Err(DispatchError::validation(format!(
                        "area {} is on another farm",
                        mv.dst_area_id
                    )));
                }
            }
            _ => {}
        }

        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Crop::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    /// The material must exist, not be deleted, and be a seed or a plant.
    async fn seed_material(&self, material_id: AggregateId) -> Result<MaterialReadModel, DispatchError> {
        let material = require(&self.views.materials, material_id, "material").await?;
        if material.is_deleted() {
            return Err(DispatchError::validation(format!("material {material_id} is deleted")));
        }
        if !material.material_type.can_start_crop() {
            return Err(DispatchError::validation(format!(
                "material {material_id} is not a seed or a plant"
            )));
        }
        Ok(material)
    }
}

fn check_placement(area: &AreaReadModel, create: &CreateCropBatch) -> Result<(), DispatchError> {
    if area.farm_id.aggregate_id() != create.farm_id {
        return Err(DispatchError::validation(format!(
            "area {} is not on farm {}",
            create.area_id, create.farm_id
        )));
    }
    let expected = crop_type_for(area.area_type);
    if create.crop_type != expected {
        return Err(DispatchError::validation(format!(
            "a {:?} area only takes {expected:?} batches",
            area.area_type
        )));
    }
    Ok(())
}
