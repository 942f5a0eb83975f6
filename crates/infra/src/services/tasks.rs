use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use tania_core::{AggregateId, AggregateKind};
use tania_events::Command;
use tania_tasks::{MarkTaskDue, Task, TaskCommand, TaskDomain, TaskId};

use crate::command_dispatcher::{DispatchError, Dispatcher};
use crate::views::ReadViews;

use super::{CommandReceipt, lookup, require};

/// Command handler for tasks.
#[derive(Debug, Clone)]
pub struct TasksService {
    dispatcher: Arc<Dispatcher>,
    views: ReadViews,
}

impl TasksService {
    pub fn new(dispatcher: Arc<Dispatcher>, views: ReadViews) -> Self {
        Self { dispatcher, views }
    }

    pub fn views(&self) -> &ReadViews {
        &self.views
    }

    #[instrument(skip_all)]
    pub async fn task(&self, command: TaskCommand) -> Result<CommandReceipt, DispatchError> {
        match &command {
            TaskCommand::Create(create) => {
                self.check_references(&create.domain, create.asset_id).await?;
            }
            TaskCommand::Modify(modify) => {
                let changes = &modify.changes;
                if changes.domain.is_some() || changes.asset_id.is_some() {
                    // Unchanged fields come from the current row; an unknown
                    // task falls through to the dispatcher's not-found.
                    let current = lookup(&self.views.tasks, modify.task_id.aggregate_id()).await?;
                    let domain = changes
                        .domain
                        .clone()
                        .or_else(|| current.as_ref().map(|row| row.domain.clone()));
                    let asset_id = changes
                        .asset_id
                        .or_else(|| current.as_ref().and_then(|row| row.asset_id));
                    if let Some(domain) = domain {
                        self.check_references(&domain, asset_id).await?;
                    }
                }
            }
            _ => {}
        }

        let aggregate_id = command.target_aggregate_id();
        let events = self
            .dispatcher
            .dispatch(command, |id| Task::empty(id.into()))
            .await?;
        Ok(CommandReceipt::new(aggregate_id, events))
    }

    /// Flag an overdue task (used by the due-date sweep).
    pub async fn mark_due(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<CommandReceipt, DispatchError> {
        self.task(TaskCommand::MarkDue(MarkTaskDue {
            task_id,
            occurred_at: now,
        }))
        .await
    }

    /// Linked asset, materials and areas named by the domain must exist.
    async fn check_references(&self, domain: &TaskDomain, asset_id: Option<AggregateId>) -> Result<(), DispatchError> {
        if let (Some(kind), Some(asset_id)) = (domain.asset_kind(), asset_id) {
            self.require_asset(kind, asset_id).await?;
        }
        if let Some(material_id) = domain.material_id() {
            require(&self.views.materials, material_id, "material").await?;
        }
        if let Some(area_id) = domain.area_id() {
            require(&self.views.areas, area_id, "area").await?;
        }
        Ok(())
    }

    async fn require_asset(&self, kind: AggregateKind, asset_id: AggregateId) -> Result<(), DispatchError> {
        let views = &self.views;
        match kind {
            AggregateKind::Area => require(&views.areas, asset_id, "area").await.map(drop),
            AggregateKind::Crop => require(&views.crops, asset_id, "crop batch").await.map(drop),
            AggregateKind::Reservoir => require(&views.reservoirs, asset_id, "reservoir").await.map(drop),
            AggregateKind::Farm => require(&views.farms, asset_id, "farm").await.map(drop),
            AggregateKind::Material => require(&views.materials, asset_id, "material").await.map(drop),
            AggregateKind::Task => Err(DispatchError::validation("a task cannot be attached to another task")),
        }
    }
}
