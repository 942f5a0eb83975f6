//! Periodic due-date check for tasks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::command_dispatcher::DispatchError;
use crate::projections::{QueryError, TaskFilter};
use crate::services::TasksService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Active, unflagged tasks whose due date had passed.
    pub overdue: usize,
    pub flagged: usize,
    pub failed: usize,
}

/// Emits `TaskDue` for every active task whose due date has elapsed.
///
/// Each task is flagged at most once: the flag is part of the task's state
/// and the aggregate refuses a second `MarkDue`.
#[derive(Debug, Clone)]
pub struct DueSweeper {
    tasks: TasksService,
}

impl DueSweeper {
    pub fn new(tasks: TasksService) -> Self {
        Self { tasks }
    }

    #[instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, QueryError> {
        let filter = TaskFilter {
            overdue_at: Some(now),
            ..TaskFilter::default()
        };
        let overdue = self.tasks.views().tasks.query(&filter).await?;

        let mut report = SweepReport {
            overdue: overdue.len(),
            ..SweepReport::default()
        };
        for task in overdue {
            match self.tasks.mark_due(task.task_id, now).await {
                Ok(_) => report.flagged += 1,
                // Completed, cancelled or flagged since the query ran.
                Err(DispatchError::ValidationFailed(reason)) => {
                    debug!(task_id = %task.task_id, %reason, "task no longer due");
                }
                Err(err) => {
                    warn!(task_id = %task.task_id, error = %err, "could not flag task as due");
                    report.failed += 1;
                }
            }
        }

        if report.flagged > 0 || report.failed > 0 {
            info!(flagged = report.flagged, failed = report.failed, "due sweep finished");
        }
        Ok(report)
    }
}
