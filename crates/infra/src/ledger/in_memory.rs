use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;

use tania_core::{AggregateId, AggregateKind, ExpectedVersion};

use super::r#trait::{
    Ledger, LedgerError, StoredEvent, UncommittedEvent, batch_target, check_expected,
    check_stream_kind,
};

#[derive(Debug, Default)]
struct Stream {
    kind: Option<AggregateKind>,
    events: Vec<StoredEvent>,
}

/// In-memory append-only ledger.
///
/// Each stream sits behind its own mutex, so appends to one aggregate are
/// serialized while different aggregates proceed independently.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    streams: RwLock<HashMap<AggregateId, Arc<Mutex<Stream>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&self, aggregate_id: AggregateId) -> Option<Arc<Mutex<Stream>>> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&aggregate_id)
            .cloned()
    }

    fn stream_or_insert(&self, aggregate_id: AggregateId) -> Arc<Mutex<Stream>> {
        if let Some(stream) = self.stream(aggregate_id) {
            return stream;
        }
        self.streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(aggregate_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, LedgerError> {
        let Some((aggregate_id, kind)) = batch_target(&events)? else {
            return Ok(vec![]);
        };

        let stream = self.stream_or_insert(aggregate_id);
        let mut stream = stream.lock().unwrap_or_else(PoisonError::into_inner);

        check_stream_kind(aggregate_id, stream.kind, kind)?;
        let current = stream.events.last().map_or(0, |e| e.sequence_number);
        check_expected(expected_version, current)?;

        let stored: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(event, seq)| event.into_stored(seq))
            .collect();

        stream.kind = Some(kind);
        stream.events.extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn read_all(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, LedgerError> {
        Ok(self
            .stream(aggregate_id)
            .map(|stream| {
                stream
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .events
                    .clone()
            })
            .unwrap_or_default())
    }

    async fn read_kind(&self, kind: AggregateKind) -> Result<Vec<StoredEvent>, LedgerError> {
        let mut streams: Vec<(AggregateId, Arc<Mutex<Stream>>)> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, stream)| (*id, stream.clone()))
            .collect();
        streams.sort_by_key(|(id, _)| *id);

        let mut out = Vec::new();
        for (_, stream) in streams {
            let stream = stream.lock().unwrap_or_else(PoisonError::into_inner);
            if stream.kind == Some(kind) {
                out.extend(stream.events.iter().cloned());
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use tania_tasks::{TaskCompleted, TaskEvent, TaskId};

    use super::*;

    fn completed(task_id: TaskId) -> UncommittedEvent {
        UncommittedEvent::from_typed(
            task_id.aggregate_id(),
            TaskEvent::TaskCompleted(TaskCompleted {
                task_id,
                completed_date: Utc::now(),
            }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sequence_numbers_start_at_one_and_grow_by_one() {
        let ledger = InMemoryLedger::new();
        let task_id = TaskId::generate();

        let first = ledger
            .append(vec![completed(task_id), completed(task_id)], ExpectedVersion::Exact(0))
            .await
            .unwrap();
        let next = ledger.append_one(completed(task_id)).await.unwrap();

        assert_eq!(
            first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(next, 3);
        assert_eq!(ledger.stream_version(task_id.aggregate_id()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn stale_expected_version_is_rejected() {
        let ledger = InMemoryLedger::new();
        let task_id = TaskId::generate();
        ledger.append_one(completed(task_id)).await.unwrap();

        let err = ledger
            .append(vec![completed(task_id)], ExpectedVersion::Exact(0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Concurrency(_)));
        assert_eq!(ledger.read_all(task_id.aggregate_id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batches_spanning_aggregates_are_rejected() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .append(
                vec![completed(TaskId::generate()), completed(TaskId::generate())],
                ExpectedVersion::Any,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAppend(_)));
    }

    #[tokio::test]
    async fn unknown_stream_reads_empty() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.read_all(AggregateId::new()).await.unwrap().is_empty());
        assert!(ledger.read_kind(AggregateKind::Task).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_produce_a_gapless_stream() {
        let ledger = Arc::new(InMemoryLedger::new());
        let task_id = TaskId::generate();

        let mut handles = Vec::new();
        for _ in 0..64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.append_one(completed(task_id)).await.unwrap()
            }));
        }

        let mut seen = BTreeSet::new();
        for handle in handles {
            seen.insert(handle.await.unwrap());
        }
        assert_eq!(seen, (1..=64).collect::<BTreeSet<u64>>());
    }

    #[tokio::test]
    async fn read_kind_orders_by_aggregate_then_sequence() {
        let ledger = InMemoryLedger::new();
        let a = TaskId::generate();
        let b = TaskId::generate();
        ledger.append_one(completed(b)).await.unwrap();
        ledger.append_one(completed(a)).await.unwrap();
        ledger.append_one(completed(b)).await.unwrap();

        let all = ledger.read_kind(AggregateKind::Task).await.unwrap();
        let keys: Vec<(AggregateId, u64)> = all
            .iter()
            .map(|e| (e.aggregate_id, e.sequence_number))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 3);
    }
}
