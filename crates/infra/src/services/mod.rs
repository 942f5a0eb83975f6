//! Per-context command handlers.
//!
//! Each service checks the references a command makes to *other* aggregates
//! against the read views, then hands the command to the shared
//! [`CommandDispatcher`](crate::command_dispatcher::CommandDispatcher).

pub mod assets;
pub mod growth;
pub mod tasks;

pub use assets::AssetsService;
pub use growth::{GrowthService, PlantBatch};
pub use tasks::TasksService;

use tania_core::AggregateId;
use tania_events::Projection;

use crate::command_dispatcher::DispatchError;
use crate::ledger::StoredEvent;
use crate::projections::{ProjectionHandler, QueryError};

/// What a successful command left in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReceipt {
    pub aggregate_id: AggregateId,
    /// Stream version after the command.
    pub version: u64,
    pub events: Vec<StoredEvent>,
}

impl CommandReceipt {
    pub(crate) fn new(aggregate_id: AggregateId, events: Vec<StoredEvent>) -> Self {
        Self {
            aggregate_id,
            version: events.last().map_or(0, |e| e.sequence_number),
            events,
        }
    }
}

/// Read a referenced row; a missing row is `None`, a broken store an error.
pub(crate) async fn lookup<P: Projection>(
    view: &ProjectionHandler<P>,
    id: AggregateId,
) -> Result<Option<P>, DispatchError> {
    match view.get(id).await {
        Ok(row) => Ok(Some(row)),
        Err(QueryError::NotFound(_)) => Ok(None),
        Err(QueryError::Store(err)) => Err(DispatchError::StoreUnavailable(err.to_string())),
    }
}

/// Read a referenced row that must exist.
pub(crate) async fn require<P: Projection>(
    view: &ProjectionHandler<P>,
    id: AggregateId,
    what: &str,
) -> Result<P, DispatchError> {
    lookup(view, id)
        .await?
        .ok_or_else(|| DispatchError::validation(format!("{what} {id} does not exist")))
}
