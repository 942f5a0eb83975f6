//! Command execution pipeline shared by every bounded context.
//!
//! ```text
//! Command
//!   ↓
//! 1. Take the write gate (shared) and the aggregate's lock
//!   ↓
//! 2. Load the ledger stream, check its ordering, rehydrate
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(current)
//!   ↓
//! 5. Publish each committed event, decoded back from its stored form
//! ```
//!
//! The aggregate lock is held until the bus has delivered every event, so
//! projections of one aggregate see its events strictly in order and a
//! caller reads its own writes once `dispatch` returns.
//!
//! Cross-aggregate reference checks (does the farm exist, is the material a
//! seed) are the services' job; the dispatcher only knows one aggregate.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tania_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use tania_events::{Command, EventBus, EventKind as _};

use crate::event_model::{AggregateEvent, DomainEnvelope};
use crate::ledger::{Ledger, LedgerError, StoredEvent, UncommittedEvent};
use crate::locks::AggregateLocks;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A precondition failed: domain validation, invariant, conflict, illegal
    /// transition, or a referenced aggregate that does not exist.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The command targets an aggregate that was never created.
    #[error("aggregate {0} not found")]
    AggregateNotFound(AggregateId),

    /// The stream moved under the lock (another process appended).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Reading or appending failed; nothing was published. Retryable.
    #[error("event store unavailable: {0}")]
    StoreUnavailable(String),

    /// The ledger refused the batch (constraint or trigger violation).
    /// Retrying the same command fails the same way.
    #[error("append rejected: {0}")]
    AppendRejected(String),

    /// A stored record could not be decoded.
    #[error("corrupt event stream: {0}")]
    Corrupt(String),

    /// The append succeeded but delivery failed; the read side lags the
    /// ledger until it is rebuilt.
    #[error("event {sequence_number} of {aggregate_id} was stored but not published: {reason}")]
    Publish {
        aggregate_id: AggregateId,
        sequence_number: u64,
        reason: String,
    },
}

impl DispatchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    fn from_domain(err: DomainError, aggregate_id: AggregateId) -> Self {
        match err {
            DomainError::NotFound => DispatchError::AggregateNotFound(aggregate_id),
            other => DispatchError::ValidationFailed(other.to_string()),
        }
    }
}

impl From<LedgerError> for DispatchError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Concurrency(msg) => DispatchError::Concurrency(msg),
            LedgerError::InvalidAppend(msg) => DispatchError::AppendRejected(msg),
            LedgerError::StoreUnavailable(msg) => DispatchError::StoreUnavailable(msg),
            LedgerError::Corrupt(msg) => DispatchError::Corrupt(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the ledger and the bus so tests can wire in-memory
/// implementations and the engine selector can hand in SQL ones.
pub struct CommandDispatcher<L, B> {
    ledger: L,
    bus: B,
    locks: AggregateLocks,
    /// Held shared by every dispatch and exclusively by a read-side rebuild.
    gate: Arc<RwLock<()>>,
}

impl<L, B> core::fmt::Debug for CommandDispatcher<L, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

/// The dispatcher as wired by the composition root.
pub type Dispatcher = CommandDispatcher<Arc<dyn Ledger>, Arc<dyn EventBus<DomainEnvelope>>>;

impl<L, B> CommandDispatcher<L, B> {
    pub fn new(ledger: L, bus: B) -> Self {
        Self {
            ledger,
            bus,
            locks: AggregateLocks::new(),
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Block new commands until the guard is dropped; waits for running ones.
    pub async fn pause_writes(&self) -> OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }
}

impl<L, B> CommandDispatcher<L, B>
where
    L: Ledger,
    B: EventBus<DomainEnvelope>,
{
    /// Run `command` against the aggregate it targets.
    ///
    /// Returns the committed records (empty when the aggregate decided on no
    /// events). `make_aggregate` builds the empty instance history is folded
    /// into.
    #[instrument(
        skip_all,
        fields(
            aggregate_kind = A::KIND.as_str(),
            aggregate_id = %command.target_aggregate_id()
        )
    )]
    pub async fn dispatch<A>(
        &self,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A + Send,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError> + Send,
        A::Command: Command,
        A::Event: AggregateEvent,
    {
        let aggregate_id = command.target_aggregate_id();
        let _gate = self.gate.read().await;
        let _lock = self.locks.acquire(aggregate_id).await;

        let history = self.ledger.read_all(aggregate_id).await?;
        let version = check_stream::<A>(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        for stored in &history {
            let event = stored.decode_as::<A::Event>()?;
            aggregate.apply(&event);
        }

        let decided = aggregate
            .handle(&command)
            .map_err(|err| DispatchError::from_domain(err, aggregate_id))?;
        if decided.is_empty() {
            debug!("command produced no events");
            return Ok(Vec::new());
        }

        let uncommitted = decided
            .into_iter()
            .map(|event| UncommittedEvent::from_domain(aggregate_id, Uuid::now_v7(), &event.into()))
            .collect::<Result<Vec<_>, _>>()?;
        let committed = self
            .ledger
            .append(uncommitted, ExpectedVersion::Exact(version))
            .await?;

        for stored in &committed {
            info!(
                event_type = stored.event_kind.code(),
                sequence = stored.sequence_number,
                "event committed"
            );
        }

        for stored in &committed {
            let envelope = stored.decode()?;
            if let Err(err) = self.bus.publish(&envelope).await {
                warn!(
                    sequence = stored.sequence_number,
                    error = %err,
                    "publish failed; read side lags until rebuilt"
                );
                return Err(DispatchError::Publish {
                    aggregate_id,
                    sequence_number: stored.sequence_number,
                    reason: err.to_string(),
                });
            }
        }

        Ok(committed)
    }
}

/// Stream must belong to `A`'s kind and run 1, 2, 3, ...; returns its version.
fn check_stream<A: Aggregate>(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<u64, DispatchError> {
    for (idx, stored) in stream.iter().enumerate() {
        if stored.aggregate_id != aggregate_id || stored.aggregate_kind != A::KIND {
            return Err(DispatchError::Corrupt(format!(
                "stream of {} {aggregate_id} contains a {} event of {} at index {idx}",
                A::KIND,
                stored.aggregate_kind,
                stored.aggregate_id
            )));
        }
        let expected = idx as u64 + 1;
        if stored.sequence_number != expected {
            return Err(DispatchError::Corrupt(format!(
                "stream of {aggregate_id} skips from {} to {}",
                expected - 1,
                stored.sequence_number
            )));
        }
    }
    Ok(stream.len() as u64)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use tania_events::InMemoryEventBus;
    use tania_tasks::{
        CancelTask, CompleteTask, CreateTask, Task, TaskCategory, TaskCommand, TaskDomain, TaskId,
        TaskPriority,
    };

    use super::*;
    use crate::ledger::InMemoryLedger;

    fn dispatcher() -> CommandDispatcher<Arc<InMemoryLedger>, Arc<InMemoryEventBus<DomainEnvelope>>> {
        CommandDispatcher::new(Arc::new(InMemoryLedger::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn create(task_id: TaskId) -> TaskCommand {
        TaskCommand::Create(CreateTask {
            task_id,
            title: "Check irrigation".to_string(),
            description: String::new(),
            due_date: None,
            priority: TaskPriority::Normal,
            category: TaskCategory::General,
            domain: TaskDomain::General,
            asset_id: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
        })
    }

    fn complete(task_id: TaskId) -> TaskCommand {
        TaskCommand::Complete(CompleteTask {
            task_id,
            occurred_at: Utc.with_ymd_and_hms(2024, 7, 2, 9, 0, 0).unwrap(),
        })
    }

    #[tokio::test]
    async fn commands_append_in_sequence() {
        let dispatcher = dispatcher();
        let task_id = TaskId::generate();

        let first = dispatcher
            .dispatch(create(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(complete(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap();

        assert_eq!(first[0].sequence_number, 1);
        assert_eq!(second[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn a_command_on_a_missing_aggregate_is_not_found() {
        let dispatcher = dispatcher();
        let task_id = TaskId::generate();

        let err = dispatcher
            .dispatch(complete(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AggregateNotFound(id) if id == task_id.aggregate_id()));
    }

    #[tokio::test]
    async fn terminal_tasks_reject_commands_without_appending() {
        let dispatcher = dispatcher();
        let task_id = TaskId::generate();
        dispatcher
            .dispatch(create(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap();
        dispatcher
            .dispatch(complete(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap();

        let cancel = TaskCommand::Cancel(CancelTask {
            task_id,
            occurred_at: Utc.with_ymd_and_hms(2024, 7, 3, 9, 0, 0).unwrap(),
        });
        let err = dispatcher
            .dispatch(cancel, |id| Task::empty(id.into()))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ValidationFailed(_)));
        assert_eq!(
            dispatcher.ledger().stream_version(task_id.aggregate_id()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn a_stream_of_another_kind_is_corrupt() {
        let dispatcher = dispatcher();
        let task_id = TaskId::generate();
        dispatcher
            .dispatch(create(task_id), |id| Task::empty(id.into()))
            .await
            .unwrap();

        let history = dispatcher.ledger().read_all(task_id.aggregate_id()).await.unwrap();
        let err = check_stream::<tania_growth::Crop>(task_id.aggregate_id(), &history).unwrap_err();
        assert!(matches!(err, DispatchError::Corrupt(_)));
    }

    #[test]
    fn refused_appends_are_not_reported_as_outages() {
        let refused = DispatchError::from(LedgerError::InvalidAppend("append-only".to_string()));
        assert!(matches!(refused, DispatchError::AppendRejected(_)), "got {refused:?}");

        let outage = DispatchError::from(LedgerError::StoreUnavailable("pool timed out".to_string()));
        assert!(matches!(outage, DispatchError::StoreUnavailable(_)), "got {outage:?}");

        let race = DispatchError::from(LedgerError::Concurrency("expected 1, found 2".to_string()));
        assert!(matches!(race, DispatchError::Concurrency(_)), "got {race:?}");
    }
}
