//! The set of projections a running core maintains.

use std::sync::Arc;

use tania_events::{EventBus, EventHandler, Projection};

use crate::engine::Engine;
use crate::event_model::{AggregateEvent, DomainEnvelope};
use crate::ledger::Ledger;
use crate::projections::{
    AreaProjection, CropActivityProjection, CropProjection, FarmProjection, MaterialProjection,
    ProjectionHandler, ReadSide, ReservoirProjection, TaskProjection,
};

/// Every projection handler, shared between the bus, the services and queries.
#[derive(Debug, Clone)]
pub struct ReadViews {
    pub farms: Arc<FarmProjection>,
    pub reservoirs: Arc<ReservoirProjection>,
    pub areas: Arc<AreaProjection>,
    pub materials: Arc<MaterialProjection>,
    pub crops: Arc<CropProjection>,
    pub crop_activities: Arc<CropActivityProjection>,
    pub tasks: Arc<TaskProjection>,
}

impl ReadViews {
    /// Handlers over the engine's read stores.
    pub fn open(engine: &Engine) -> Self {
        Self {
            farms: Arc::new(ProjectionHandler::new(engine.read_store())),
            reservoirs: Arc::new(ProjectionHandler::new(engine.read_store())),
            areas: Arc::new(ProjectionHandler::new(engine.read_store())),
            materials: Arc::new(ProjectionHandler::new(engine.read_store())),
            crops: Arc::new(ProjectionHandler::new(engine.read_store())),
            crop_activities: Arc::new(ProjectionHandler::new(engine.read_store())),
            tasks: Arc::new(ProjectionHandler::new(engine.read_store())),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(&Engine::in_memory())
    }

    /// Subscribe every handler to the event kinds it folds.
    pub fn subscribe<B>(&self, bus: &B)
    where
        B: EventBus<DomainEnvelope> + ?Sized,
    {
        subscribe_projection(bus, &self.farms);
        subscribe_projection(bus, &self.reservoirs);
        subscribe_projection(bus, &self.areas);
        subscribe_projection(bus, &self.materials);
        subscribe_projection(bus, &self.crops);
        subscribe_projection(bus, &self.crop_activities);
        subscribe_projection(bus, &self.tasks);
    }

    /// Rebuild/verify over every handler, fed by `ledger`.
    pub fn read_side(&self, ledger: Arc<dyn Ledger>) -> ReadSide {
        let mut read_side = ReadSide::new(ledger);
        read_side.register(self.farms.clone());
        read_side.register(self.reservoirs.clone());
        read_side.register(self.areas.clone());
        read_side.register(self.materials.clone());
        read_side.register(self.crops.clone());
        read_side.register(self.crop_activities.clone());
        read_side.register(self.tasks.clone());
        read_side
    }
}

fn subscribe_projection<B, P>(bus: &B, handler: &Arc<ProjectionHandler<P>>)
where
    B: EventBus<DomainEnvelope> + ?Sized,
    P: Projection,
    P::Ev: AggregateEvent,
{
    for kind in P::topics() {
        let handler: Arc<dyn EventHandler<DomainEnvelope>> = handler.clone();
        bus.subscribe(<P::Ev as AggregateEvent>::wrap_kind(kind), handler);
    }
}

#[cfg(test)]
mod tests {
    use tania_events::InMemoryEventBus;

    use super::*;
    use crate::event_model::EventKind;
    use tania_growth::CropEventKind;
    use tania_tasks::TaskEventKind;

    #[test]
    fn crop_topics_reach_both_crop_projections() {
        let views = ReadViews::in_memory();
        let bus = InMemoryEventBus::<DomainEnvelope>::new();
        views.subscribe(&bus);

        assert_eq!(bus.subscriber_count(EventKind::from(CropEventKind::Moved)), 2);
        assert_eq!(bus.subscriber_count(EventKind::from(TaskEventKind::Due)), 1);
    }
}
