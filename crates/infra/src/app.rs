//! Composition root: engine, bus, dispatcher, projections and services.

use std::sync::Arc;

use tracing::info;

use tania_events::{EventBus, InMemoryEventBus};

use crate::command_dispatcher::{CommandDispatcher, Dispatcher};
use crate::config::TaniaConfig;
use crate::due::DueSweeper;
use crate::engine::{Engine, EngineError};
use crate::event_model::DomainEnvelope;
use crate::ledger::Ledger;
use crate::projections::{ReadSide, ReadSideError, RebuildReport};
use crate::services::{AssetsService, GrowthService, TasksService};
use crate::views::ReadViews;

/// A fully wired farm core.
///
/// Cheap to clone; every clone shares the same ledger, bus and read stores.
#[derive(Debug, Clone)]
pub struct TaniaCore {
    engine: Engine,
    dispatcher: Arc<Dispatcher>,
    views: ReadViews,
    read_side: ReadSide,
    assets: AssetsService,
    growth: GrowthService,
    tasks: TasksService,
}

impl TaniaCore {
    /// Open the configured engine and wire everything over an in-process bus.
    pub async fn build(config: &TaniaConfig) -> Result<Self, EngineError> {
        let engine = Engine::open(&config.persistence).await?;
        Ok(Self::assemble(engine, Arc::new(InMemoryEventBus::<DomainEnvelope>::new())))
    }

    /// In-memory core, ready to use.
    pub fn in_memory() -> Self {
        Self::assemble(Engine::in_memory(), Arc::new(InMemoryEventBus::<DomainEnvelope>::new()))
    }

    /// Wire an opened engine with `bus`; projections are subscribed here.
    pub fn assemble(engine: Engine, bus: Arc<dyn EventBus<DomainEnvelope>>) -> Self {
        let ledger = engine.ledger();
        let views = ReadViews::open(&engine);
        views.subscribe(bus.as_ref());

        let read_side = views.read_side(ledger.clone());
        let dispatcher = Arc::new(CommandDispatcher::new(ledger, bus));

        info!(engine = %engine.kind(), "farm core assembled");
        Self {
            assets: AssetsService::new(dispatcher.clone(), views.clone()),
            growth: GrowthService::new(dispatcher.clone(), views.clone()),
            tasks: TasksService::new(dispatcher.clone(), views.clone()),
            engine,
            dispatcher,
            views,
            read_side,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        self.dispatcher.ledger()
    }

    pub fn views(&self) -> &ReadViews {
        &self.views
    }

    pub fn assets(&self) -> &AssetsService {
        &self.assets
    }

    pub fn growth(&self) -> &GrowthService {
        &self.growth
    }

    pub fn tasks(&self) -> &TasksService {
        &self.tasks
    }

    pub fn due_sweeper(&self) -> DueSweeper {
        DueSweeper::new(self.tasks.clone())
    }

    /// Recreate every read model from the ledger while commands are paused.
    pub async fn rebuild(&self) -> Result<RebuildReport, ReadSideError> {
        let _paused = self.dispatcher.pause_writes().await;
        let report = self.read_side.rebuild().await?;
        info!(events = report.events_replayed(), "read side rebuilt");
        Ok(report)
    }

    /// Check every read model against the ledger while commands are paused.
    pub async fn verify(&self) -> Result<(), ReadSideError> {
        let _paused = self.dispatcher.pause_writes().await;
        self.read_side.verify().await
    }

    pub async fn shutdown(&self) {
        self.engine.close().await;
    }
}
