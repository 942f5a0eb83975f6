//! Rebuilding and verifying the read side from the ledger.
//!
//! The ledger is the source of truth; every read-model row can be thrown
//! away and recreated by replaying `read_kind` for the projection's source
//! aggregate kind. Callers serialize this against command dispatch (see
//! `CommandDispatcher::pause_writes`).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use tania_core::{AggregateId, AggregateKind};

use crate::event_model::DomainEnvelope;
use crate::ledger::{Ledger, LedgerError};
use crate::read_model::ReadStoreError;

use super::handler::{ApplyError, Rebuildable};

#[derive(Debug, Error)]
pub enum ReadSideError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] ReadStoreError),

    #[error("projection {projection} is inconsistent with the ledger ({detail}): {aggregate_ids:?}")]
    ProjectionInconsistency {
        projection: String,
        detail: String,
        aggregate_ids: Vec<AggregateId>,
    },

    #[error("projection {projection} failed during replay: {source}")]
    Projection {
        projection: String,
        #[source]
        source: ApplyError,
    },
}

/// What one projection went through during a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionRebuild {
    pub projection: &'static str,
    pub aggregates: usize,
    pub events: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub projections: Vec<ProjectionRebuild>,
}

impl RebuildReport {
    pub fn events_replayed(&self) -> usize {
        self.projections.iter().map(|p| p.events).sum()
    }
}

/// Every registered projection plus the ledger that feeds them.
#[derive(Clone)]
pub struct ReadSide {
    ledger: Arc<dyn Ledger>,
    projections: Vec<Arc<dyn Rebuildable>>,
}

impl core::fmt::Debug for ReadSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<&str> = self.projections.iter().map(|p| p.name()).collect();
        f.debug_struct("ReadSide").field("projections", &names).finish()
    }
}

impl ReadSide {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Arc<dyn Rebuildable>) {
        self.projections.push(projection);
    }

    /// Clear every projection and replay the ledger into it.
    ///
    /// All streams are loaded and checked before anything is cleared, so a
    /// gapped ledger leaves the current rows in place.
    #[instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<RebuildReport, ReadSideError> {
        let histories = self.load_histories().await?;
        let mut report = RebuildReport::default();

        for projection in &self.projections {
            let history = histories
                .get(&projection.source())
                .map(Vec::as_slice)
                .unwrap_or_default();

            projection.reset().await?;
            for envelope in history {
                projection
                    .replay(envelope)
                    .await
                    .map_err(|source| ReadSideError::Projection {
                        projection: projection.name().to_string(),
                        source,
                    })?;
            }

            let aggregates = history
                .iter()
                .filter(|e| e.sequence_number() == 1)
                .count();
            info!(
                projection = projection.name(),
                aggregates,
                events = history.len(),
                "projection rebuilt"
            );
            report.projections.push(ProjectionRebuild {
                projection: projection.name(),
                aggregates,
                events: history.len(),
            });
        }
        Ok(report)
    }

    /// Compare every live projection with a scratch replay of the ledger.
    #[instrument(skip(self))]
    pub async fn verify(&self) -> Result<(), ReadSideError> {
        let histories = self.load_histories().await?;

        for projection in &self.projections {
            let history = histories
                .get(&projection.source())
                .map(Vec::as_slice)
                .unwrap_or_default();
            let diverging = projection
                .diverging(history)
                .await
                .map_err(|source| ReadSideError::Projection {
                    projection: projection.name().to_string(),
                    source,
                })?;

            if !diverging.is_empty() {
                warn!(
                    projection = projection.name(),
                    count = diverging.len(),
                    "read side diverges from the ledger"
                );
                return Err(ReadSideError::ProjectionInconsistency {
                    projection: projection.name().to_string(),
                    detail: "rows differ from a replay of the ledger".to_string(),
                    aggregate_ids: diverging,
                });
            }
        }
        Ok(())
    }

    /// Decoded, gap-checked history for every source kind in use.
    async fn load_histories(
        &self,
    ) -> Result<BTreeMap<AggregateKind, Vec<DomainEnvelope>>, ReadSideError> {
        let mut histories = BTreeMap::new();
        for projection in &self.projections {
            let kind = projection.source();
            if histories.contains_key(&kind) {
                continue;
            }

            let stored = self.ledger.read_kind(kind).await?;
            let envelopes = stored
                .iter()
                .map(|event| event.decode())
                .collect::<Result<Vec<_>, _>>()?;
            check_gapless(projection.name(), &envelopes)?;
            histories.insert(kind, envelopes);
        }
        Ok(histories)
    }
}

/// Each aggregate's stream must run 1, 2, 3, ... in order.
fn check_gapless(projection: &str, envelopes: &[DomainEnvelope]) -> Result<(), ReadSideError> {
    let mut expected: BTreeMap<AggregateId, u64> = BTreeMap::new();
    let mut broken = Vec::new();

    for envelope in envelopes {
        let next = expected.entry(envelope.aggregate_id()).or_insert(1);
        if envelope.sequence_number() != *next {
            broken.push(envelope.aggregate_id());
        }
        *next = envelope.sequence_number() + 1;
    }

    if broken.is_empty() {
        return Ok(());
    }
    broken.sort();
    broken.dedup();
    Err(ReadSideError::ProjectionInconsistency {
        projection: projection.to_string(),
        detail: "ledger stream has a sequence gap".to_string(),
        aggregate_ids: broken,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use tania_events::EventEnvelope;
    use tania_tasks::{TaskCategory, TaskCreated, TaskDomain, TaskEvent, TaskId, TaskPriority, TaskStatus};

    use super::*;
    use crate::event_model::DomainEvent;
    use crate::ledger::{InMemoryLedger, UncommittedEvent};
    use crate::projections::tasks::TaskProjection;

    fn created(task_id: TaskId) -> TaskEvent {
        TaskEvent::TaskCreated(TaskCreated {
            task_id,
            title: "Clean nursery".to_string(),
            description: String::new(),
            created_date: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            due_date: None,
            priority: TaskPriority::Normal,
            status: TaskStatus::Active,
            domain: TaskDomain::General,
            category: TaskCategory::Sanitation,
            is_due: false,
            asset_id: None,
        })
    }

    fn envelope(task_id: TaskId, seq: u64) -> DomainEnvelope {
        EventEnvelope::new(
            Uuid::now_v7(),
            task_id.aggregate_id(),
            AggregateKind::Task,
            seq,
            DomainEvent::Task(created(task_id)),
        )
    }

    #[test]
    fn gapless_streams_pass_and_gapped_ones_are_named() {
        let a = TaskId::generate();
        let b = TaskId::generate();

        assert!(check_gapless("tasks", &[envelope(a, 1), envelope(a, 2), envelope(b, 1)]).is_ok());

        let err = check_gapless("tasks", &[envelope(a, 1), envelope(b, 2)]).unwrap_err();
        assert!(matches!(
            err,
            ReadSideError::ProjectionInconsistency { aggregate_ids, .. } if aggregate_ids == vec![b.aggregate_id()]
        ));
    }

    #[tokio::test]
    async fn rebuild_fills_an_empty_store_and_verify_then_passes() {
        let ledger = Arc::new(InMemoryLedger::new());
        let task_id = TaskId::generate();
        ledger
            .append_one(UncommittedEvent::from_typed(task_id.aggregate_id(), created(task_id)).unwrap())
            .await
            .unwrap();

        let tasks = Arc::new(TaskProjection::in_memory());
        let mut read_side = ReadSide::new(ledger);
        read_side.register(tasks.clone());

        assert!(matches!(
            read_side.verify().await,
            Err(ReadSideError::ProjectionInconsistency { .. })
        ));

        let report = read_side.rebuild().await.unwrap();
        assert_eq!(report.events_replayed(), 1);
        assert_eq!(report.projections[0].aggregates, 1);
        assert_eq!(tasks.get(task_id.aggregate_id()).await.unwrap().title, "Clean nursery");
        read_side.verify().await.unwrap();
    }
}
