use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::AggregateId;
use tania_events::{EventEnvelope, Projection, ProjectionError, Queryable};
use tania_tasks::{
    TaskCategory, TaskDomain, TaskDomainCode, TaskEvent, TaskId, TaskPriority, TaskStatus,
};

use super::handler::ProjectionHandler;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReadModel {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub created_date: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub domain: TaskDomain,
    pub category: TaskCategory,
    pub is_due: bool,
    pub asset_id: Option<AggregateId>,
    pub modified_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub cancelled_date: Option<DateTime<Utc>>,
}

impl TaskReadModel {
    /// Active, carrying a due date at or before `now`, and not yet flagged.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Active
            && !self.is_due
            && self.due_date.is_some_and(|due| due <= now)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub category: Option<TaskCategory>,
    pub domain: Option<TaskDomainCode>,
    pub priority: Option<TaskPriority>,
    pub is_due: Option<bool>,
    pub asset_id: Option<AggregateId>,
    /// Tasks with a due date at or before this instant.
    pub due_before: Option<DateTime<Utc>>,
    /// Tasks the due sweep should flag at this instant.
    pub overdue_at: Option<DateTime<Utc>>,
}

impl Projection for TaskReadModel {
    type Ev = TaskEvent;

    const NAME: &'static str = "tasks";

    fn fold(current: Option<Self>, envelope: &EventEnvelope<TaskEvent>) -> Result<Self, ProjectionError> {
        let Some(mut row) = current else {
            return match envelope.payload() {
                TaskEvent::TaskCreated(e) => Ok(Self {
                    task_id: e.task_id,
                    title: e.title.clone(),
                    description: e.description.clone(),
                    created_date: e.created_date,
                    due_date: e.due_date,
                    priority: e.priority,
                    status: e.status,
                    domain: e.domain.clone(),
                    category: e.category,
                    is_due: e.is_due,
                    asset_id: e.asset_id,
                    modified_date: None,
                    completed_date: None,
                    cancelled_date: None,
                }),
                _ => Err(ProjectionError::missing_row(envelope)),
            };
        };

        if row.status.is_terminal() {
            return Err(ProjectionError::rejected(
                envelope,
                format!("task is already {:?}", row.status).to_lowercase(),
            ));
        }

        match envelope.payload() {
            TaskEvent::TaskCreated(_) => return Err(ProjectionError::duplicate_create(envelope)),
            TaskEvent::TaskModified(e) => {
                row.title = e.title.clone();
                row.description = e.description.clone();
                row.due_date = e.due_date;
                row.priority = e.priority;
                row.domain = e.domain.clone();
                row.category = e.category;
                row.is_due = e.is_due;
                row.asset_id = e.asset_id;
                row.modified_date = Some(e.modified_date);
            }
            TaskEvent::TaskCompleted(e) => {
                row.status = TaskStatus::Completed;
                row.completed_date = Some(e.completed_date);
            }
            TaskEvent::TaskCancelled(e) => {
                row.status = TaskStatus::Cancelled;
                row.cancelled_date = Some(e.cancelled_date);
            }
            TaskEvent::TaskDue(_) => row.is_due = true,
        }
        Ok(row)
    }
}

impl Queryable for TaskReadModel {
    type Filter = TaskFilter;

    fn matches(&self, filter: &TaskFilter) -> bool {
        filter.status.is_none_or(|s| s == self.status)
            && filter.category.is_none_or(|c| c == self.category)
            && filter.domain.is_none_or(|d| d == self.domain.code())
            && filter.priority.is_none_or(|p| p == self.priority)
            && filter.is_due.is_none_or(|due| due == self.is_due)
            && filter.asset_id.is_none_or(|id| self.asset_id == Some(id))
            && filter
                .due_before
                .is_none_or(|limit| self.due_date.is_some_and(|due| due <= limit))
            && filter.overdue_at.is_none_or(|now| self.is_overdue_at(now))
    }
}

pub type TaskProjection = ProjectionHandler<TaskReadModel>;

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    use tania_core::AggregateKind;
    use tania_tasks::{TaskCancelled, TaskCreated, TaskDue};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap()
    }

    fn envelope(task_id: TaskId, seq: u64, event: TaskEvent) -> EventEnvelope<TaskEvent> {
        EventEnvelope::new(Uuid::now_v7(), task_id.aggregate_id(), AggregateKind::Task, seq, event)
    }

    fn created(task_id: TaskId, due_date: Option<DateTime<Utc>>, asset_id: AggregateId) -> TaskEvent {
        TaskEvent::TaskCreated(TaskCreated {
            task_id,
            title: "Spray aphids".to_string(),
            description: "north bed".to_string(),
            created_date: now(),
            due_date,
            priority: TaskPriority::Urgent,
            status: TaskStatus::Active,
            domain: TaskDomain::Area { material_id: None },
            category: TaskCategory::PestControl,
            is_due: false,
            asset_id: Some(asset_id),
        })
    }

    #[tokio::test]
    async fn filters_combine_on_every_field() {
        let handler = TaskProjection::in_memory();
        let area = AggregateId::new();
        let soon = TaskId::generate();
        let later = TaskId::generate();

        handler
            .apply(&envelope(soon, 1, created(soon, Some(now() + Duration::days(1)), area)))
            .await
            .unwrap();
        handler
            .apply(&envelope(later, 1, created(later, Some(now() + Duration::days(9)), area)))
            .await
            .unwrap();

        let filter = TaskFilter {
            status: Some(TaskStatus::Active),
            domain: Some(TaskDomainCode::Area),
            asset_id: Some(area),
            due_before: Some(now() + Duration::days(2)),
            ..TaskFilter::default()
        };
        let found = handler.query(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_id, soon);

        let crop_tasks = TaskFilter {
            domain: Some(TaskDomainCode::Crop),
            ..TaskFilter::default()
        };
        assert!(handler.query(&crop_tasks).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_flag_and_cancellation_fold_into_the_row() {
        let handler = TaskProjection::in_memory();
        let task_id = TaskId::generate();
        let due = now() + Duration::hours(1);

        handler
            .apply(&envelope(task_id, 1, created(task_id, Some(due), AggregateId::new())))
            .await
            .unwrap();
        let row = handler.get(task_id.aggregate_id()).await.unwrap();
        assert!(row.is_overdue_at(due));
        assert!(!row.is_overdue_at(now()));

        handler
            .apply(&envelope(
                task_id,
                2,
                TaskEvent::TaskDue(TaskDue {
                    task_id,
                    flagged_at: due,
                }),
            ))
            .await
            .unwrap();
        handler
            .apply(&envelope(
                task_id,
                3,
                TaskEvent::TaskCancelled(TaskCancelled {
                    task_id,
                    cancelled_date: due,
                }),
            ))
            .await
            .unwrap();

        let row = handler.get(task_id.aggregate_id()).await.unwrap();
        assert!(row.is_due);
        assert_eq!(row.status, TaskStatus::Cancelled);
        assert_eq!(row.cancelled_date, Some(due));
        assert!(!row.is_overdue_at(due));
    }

    #[tokio::test]
    async fn overdue_filter_skips_flagged_and_future_tasks() {
        let handler = TaskProjection::in_memory();
        let area = AggregateId::new();
        let overdue = TaskId::generate();
        let flagged = TaskId::generate();
        let future = TaskId::generate();
        let due = now() + Duration::hours(1);

        for task_id in [overdue, flagged] {
            handler
                .apply(&envelope(task_id, 1, created(task_id, Some(due), area)))
                .await
                .unwrap();
        }
        handler
            .apply(&envelope(future, 1, created(future, Some(due + Duration::days(3)), area)))
            .await
            .unwrap();
        handler
            .apply(&envelope(
                flagged,
                2,
                TaskEvent::TaskDue(TaskDue {
                    task_id: flagged,
                    flagged_at: due,
                }),
            ))
            .await
            .unwrap();

        let sweep = TaskFilter {
            overdue_at: Some(due),
            ..TaskFilter::default()
        };
        let found = handler.query(&sweep).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_id, overdue);
    }
}
