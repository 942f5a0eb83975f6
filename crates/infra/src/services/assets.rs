use std::sync::Arc;

use tracing::instrument;

use tania_assets::{
    Area, AreaCommand, Farm, FarmCommand, FarmId, Material, MaterialCommand, Reservoir,
    ReservoirCommand, ReservoirId,
};
use tania_events::Command;

use crate::command_dispatcher::{DispatchError, Dispatcher};
use crate::views::ReadViews;

use super::{CommandReceipt, lookup, require};

/// Command handler for farms, reservoirs, areas and materials.
#[derive(Debug, Clone)]
pub struct AssetsService {
    dispatcher: Arc<Dispatcher>,
    views: ReadViews,
}

impl AssetsService {
    pub fn new(dispatcher: Arc<Dispatcher>, views: ReadViews) -> Self {
        Self { dispatcher, views }
    }

    #[instrument(skip_all)]
    pub async fn farm(&self, command: FarmCommand) -> Result<CommandReceipt, DispatchError> {
        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Farm::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    #[instrument(skip_all)]
    pub async fn reservoir(&self, command: ReservoirCommand) -> Result<CommandReceipt, DispatchError> {
        if let ReservoirCommand::Create(create) = &command {
            require(&self.views.farms, create.farm_id.aggregate_id(), "farm").await?;
        }

        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Reservoir::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    #[instrument(skip_all)]
    pub async fn area(&self, command: AreaCommand) -> Result<CommandReceipt, DispatchError> {
        match &command {
            AreaCommand::Create(create) => {
                require(&self.views.farms, create.farm_id.aggregate_id(), "farm").await?;
                if let Some(reservoir_id) = create.reservoir_id {
                    self.check_reservoir(reservoir_id, create.farm_id).await?;
                }
            }
            AreaCommand::AssignReservoir(assign) => {
                // An unknown area falls through to the dispatcher's not-found.
                let area = lookup(&self.views.areas, assign.area_id.aggregate_id()).await?;
                if let (Some(area), Some(reservoir_id)) = (area, assign.reservoir_id) {
                    self.check_reservoir(reservoir_id, area.farm_id).await?;
                }
            }
            _ => {}
        }

        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Area::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    #[instrument(skip_all)]
    pub async fn material(&self, command: MaterialCommand) -> Result<CommandReceipt, DispatchError> {
        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Material::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    async fn check_reservoir(&self, reservoir_id: ReservoirId, farm_id: FarmId) -> Result<(), DispatchError> {
        let reservoir = require(&self.views.reservoirs, reservoir_id.aggregate_id(), "reservoir").await?;
        if reservoir.farm_id != farm_id {
            return Err(DispatchError::validation(format!(
                "reservoir {reservoir_id} belongs to another farm"
            )));
        }
        Ok(())
    }
}
