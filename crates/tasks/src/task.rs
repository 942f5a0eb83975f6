use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tania_core::{Aggregate, AggregateId, AggregateKind, AggregateRoot, DomainError, typed_id};
use tania_events::{Command, Event, EventKind};

use crate::values::{TaskCategory, TaskDomain, TaskPriority, TaskStatus};

typed_id!(
    /// Task identifier.
    TaskId
);

/// Aggregate root: Task.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    title: String,
    description: String,
    created_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    priority: TaskPriority,
    status: TaskStatus,
    domain: TaskDomain,
    category: TaskCategory,
    is_due: bool,
    asset_id: Option<AggregateId>,
    completed_date: Option<DateTime<Utc>>,
    cancelled_date: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Task {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TaskId) -> Self {
        Self {
            id,
            title: String::new(),
            description: String::new(),
            created_date: None,
            due_date: None,
            priority: TaskPriority::Normal,
            status: TaskStatus::Active,
            domain: TaskDomain::General,
            category: TaskCategory::General,
            is_due: false,
            asset_id: None,
            completed_date: None,
            cancelled_date: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_due(&self) -> bool {
        self.is_due
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn domain(&self) -> &TaskDomain {
        &self.domain
    }

    pub fn asset_id(&self) -> Option<AggregateId> {
        self.asset_id
    }

    pub fn completed_date(&self) -> Option<DateTime<Utc>> {
        self.completed_date
    }
}

impl AggregateRoot for Task {
    type Id = TaskId;

    const KIND: AggregateKind = AggregateKind::Task;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTask {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    pub domain: TaskDomain,
    pub asset_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

/// Fields a modification may replace. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Drop the current due date. Cannot be combined with `due_date`.
    #[serde(default)]
    pub clear_due_date: bool,
    pub priority: Option<TaskPriority>,
    pub category: Option<TaskCategory>,
    pub domain: Option<TaskDomain>,
    pub asset_id: Option<AggregateId>,
}

impl TaskChanges {
    fn is_empty(&self) -> bool {
        self == &TaskChanges::default()
    }
}

/// Command: ModifyTask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyTask {
    pub task_id: TaskId,
    pub changes: TaskChanges,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTask {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTask {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkTaskDue. Issued by the due-date sweep, not by users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkTaskDue {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskCommand {
    Create(CreateTask),
    Modify(ModifyTask),
    Complete(CompleteTask),
    Cancel(CancelTask),
    MarkDue(MarkTaskDue),
}

impl Command for TaskCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let id = match self {
            TaskCommand::Create(c) => c.task_id,
            TaskCommand::Modify(c) => c.task_id,
            TaskCommand::Complete(c) => c.task_id,
            TaskCommand::Cancel(c) => c.task_id,
            TaskCommand::MarkDue(c) => c.task_id,
        };
        id.aggregate_id()
    }
}

/// Event: TaskCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
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
}

/// Event: TaskModified. Carries the full editable state after the change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskModified {
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub domain: TaskDomain,
    pub category: TaskCategory,
    pub is_due: bool,
    pub asset_id: Option<AggregateId>,
    pub modified_date: DateTime<Utc>,
}

/// Event: TaskCompleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub task_id: TaskId,
    pub completed_date: DateTime<Utc>,
}

/// Event: TaskCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCancelled {
    pub task_id: TaskId,
    pub cancelled_date: DateTime<Utc>,
}

/// Event: TaskDue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDue {
    pub task_id: TaskId,
    pub flagged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskCreated(TaskCreated),
    TaskModified(TaskModified),
    TaskCompleted(TaskCompleted),
    TaskCancelled(TaskCancelled),
    TaskDue(TaskDue),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    Created,
    Modified,
    Completed,
    Cancelled,
    Due,
}

impl EventKind for TaskEventKind {
    fn code(&self) -> &'static str {
        match self {
            TaskEventKind::Created => "TaskCreated",
            TaskEventKind::Modified => "TaskModified",
            TaskEventKind::Completed => "TaskCompleted",
            TaskEventKind::Cancelled => "TaskCancelled",
            TaskEventKind::Due => "TaskDue",
        }
    }

    fn all() -> &'static [Self] {
        &[
            TaskEventKind::Created,
            TaskEventKind::Modified,
            TaskEventKind::Completed,
            TaskEventKind::Cancelled,
            TaskEventKind::Due,
        ]
    }
}

impl Event for TaskEvent {
    type Kind = TaskEventKind;

    fn kind(&self) -> TaskEventKind {
        match self {
            TaskEvent::TaskCreated(_) => TaskEventKind::Created,
            TaskEvent::TaskModified(_) => TaskEventKind::Modified,
            TaskEvent::TaskCompleted(_) => TaskEventKind::Completed,
            TaskEvent::TaskCancelled(_) => TaskEventKind::Cancelled,
            TaskEvent::TaskDue(_) => TaskEventKind::Due,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::TaskCreated(e) => e.created_date,
            TaskEvent::TaskModified(e) => e.modified_date,
            TaskEvent::TaskCompleted(e) => e.completed_date,
            TaskEvent::TaskCancelled(e) => e.cancelled_date,
            TaskEvent::TaskDue(e) => e.flagged_at,
        }
    }
}

impl Aggregate for Task {
    type Command = TaskCommand;
    type Event = TaskEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TaskEvent::TaskCreated(e) => {
                self.id = e.task_id;
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.created_date = Some(e.created_date);
                self.due_date = e.due_date;
                self.priority = e.priority;
                self.status = e.status;
                self.domain = e.domain.clone();
                self.category = e.category;
                self.is_due = e.is_due;
                self.asset_id = e.asset_id;
                self.created = true;
            }
            TaskEvent::TaskModified(e) => {
                self.title = e.title.clone();
                self.description = e.description.clone();
                self.due_date = e.due_date;
                self.priority = e.priority;
                self.domain = e.domain.clone();
                self.category = e.category;
                self.is_due = e.is_due;
                self.asset_id = e.asset_id;
            }
            TaskEvent::TaskCompleted(e) => {
                self.status = TaskStatus::Completed;
                self.completed_date = Some(e.completed_date);
            }
            TaskEvent::TaskCancelled(e) => {
                self.status = TaskStatus::Cancelled;
                self.cancelled_date = Some(e.cancelled_date);
            }
            TaskEvent::TaskDue(_) => {
                self.is_due = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TaskCommand::Create(cmd) => self.handle_create(cmd),
            TaskCommand::Modify(cmd) => self.handle_modify(cmd),
            TaskCommand::Complete(cmd) => self.handle_complete(cmd),
            TaskCommand::Cancel(cmd) => self.handle_cancel(cmd),
            TaskCommand::MarkDue(cmd) => self.handle_mark_due(cmd),
        }
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("task title cannot be empty"));
    }
    if title.chars().count() > 100 {
        return Err(DomainError::validation("task title is longer than 100 characters"));
    }
    Ok(())
}

/// A due date may be today or later, never in the past.
fn validate_due_date(due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), DomainError> {
    match due {
        Some(due) if due.date_naive() < now.date_naive() => Err(DomainError::validation(
            "due date cannot be before the current date",
        )),
        _ => Ok(()),
    }
}

fn validate_attachment(domain: &TaskDomain, asset_id: Option<AggregateId>) -> Result<(), DomainError> {
    match (domain.asset_kind(), asset_id) {
        (Some(kind), None) => Err(DomainError::validation(format!(
            "tasks in the {kind} domain must reference an asset"
        ))),
        (None, Some(_)) => Err(DomainError::validation(format!(
            "tasks in the {:?} domain cannot reference an asset",
            domain.code()
        ))),
        _ => Ok(()),
    }
}

impl Task {
    fn ensure_task_id(&self, task_id: TaskId) -> Result<(), DomainError> {
        if self.id != task_id {
            return Err(DomainError::invariant("task_id mismatch"));
        }
        Ok(())
    }

    fn ensure_active(&self, task_id: TaskId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_task_id(task_id)?;
        match self.status {
            TaskStatus::Active => Ok(()),
            TaskStatus::Completed => Err(DomainError::invariant("task is already completed")),
            TaskStatus::Cancelled => Err(DomainError::invariant("task is already cancelled")),
        }
    }

    fn handle_create(&self, cmd: &CreateTask) -> Result<Vec<TaskEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("task already exists"));
        }
        validate_title(&cmd.title)?;
        validate_due_date(cmd.due_date, cmd.occurred_at)?;
        validate_attachment(&cmd.domain, cmd.asset_id)?;

        Ok(vec![TaskEvent::TaskCreated(TaskCreated {
            task_id: cmd.task_id,
            title: cmd.title.trim().to_string(),
            description: cmd.description.clone(),
            created_date: cmd.occurred_at,
            due_date: cmd.due_date,
            priority: cmd.priority,
            status: TaskStatus::Active,
            domain: cmd.domain.clone(),
            category: cmd.category,
            is_due: false,
            asset_id: cmd.asset_id,
        })])
    }

    fn handle_modify(&self, cmd: &ModifyTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_active(cmd.task_id)?;
        if cmd.changes.is_empty() {
            return Err(DomainError::validation("nothing to modify"));
        }

        let changes = &cmd.changes;
        let title = match &changes.title {
            Some(title) => {
                validate_title(title)?;
                title.trim().to_string()
            }
            None => self.title.clone(),
        };
        let due_date = match (changes.due_date, changes.clear_due_date) {
            (Some(_), true) => {
                return Err(DomainError::validation(
                    "a due date cannot be set and cleared at once",
                ));
            }
            (Some(due), false) => {
                validate_due_date(Some(due), cmd.occurred_at)?;
                Some(due)
            }
            (None, true) => None,
            (None, false) => self.due_date,
        };
        let domain = changes.domain.clone().unwrap_or_else(|| self.domain.clone());
        // Switching domain drops an asset reference that no longer applies.
        let asset_id = match changes.asset_id {
            Some(asset_id) => Some(asset_id),
            None if domain.asset_kind().is_some() => self.asset_id,
            None => None,
        };
        validate_attachment(&domain, asset_id)?;

        // Pushing the due date into the future clears the flag.
        let is_due = self.is_due && due_date.is_some_and(|due| due <= cmd.occurred_at);

        Ok(vec![TaskEvent::TaskModified(TaskModified {
            task_id: cmd.task_id,
            title,
            description: changes
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            due_date,
            priority: changes.priority.unwrap_or(self.priority),
            domain,
            category: changes.category.unwrap_or(self.category),
            is_due,
            asset_id,
            modified_date: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_active(cmd.task_id)?;
        Ok(vec![TaskEvent::TaskCompleted(TaskCompleted {
            task_id: cmd.task_id,
            completed_date: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTask) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_active(cmd.task_id)?;
        Ok(vec![TaskEvent::TaskCancelled(TaskCancelled {
            task_id: cmd.task_id,
            cancelled_date: cmd.occurred_at,
        })])
    }

    fn handle_mark_due(&self, cmd: &MarkTaskDue) -> Result<Vec<TaskEvent>, DomainError> {
        self.ensure_active(cmd.task_id)?;
        if self.is_due {
            return Err(DomainError::invariant("task is already flagged as due"));
        }
        match self.due_date {
            None => Err(DomainError::validation("task has no due date")),
            Some(due) if due > cmd.occurred_at => {
                Err(DomainError::validation("task due date has not elapsed"))
            }
            Some(_) => Ok(vec![TaskEvent::TaskDue(TaskDue {
                task_id: cmd.task_id,
                flagged_at: cmd.occurred_at,
            })]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tania_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn create_cmd(task_id: TaskId) -> CreateTask {
        CreateTask {
            task_id,
            title: "Water crop A".to_string(),
            description: "Morning round".to_string(),
            due_date: Some(test_time() + Duration::days(2)),
            priority: TaskPriority::Urgent,
            category: TaskCategory::Crop,
            domain: TaskDomain::Crop {
                material_id: None,
                area_id: None,
            },
            asset_id: Some(AggregateId::new()),
            occurred_at: test_time(),
        }
    }

    fn created_task() -> Task {
        let id = TaskId::generate();
        let mut task = Task::empty(id);
        execute(&mut task, &TaskCommand::Create(create_cmd(id))).unwrap();
        task
    }

    #[test]
    fn create_starts_active_and_not_due() {
        let task = created_task();
        assert!(task.is_created());
        assert_eq!(task.status(), TaskStatus::Active);
        assert!(!task.is_due());
        assert_eq!(task.version(), 1);
        assert_eq!(task.title(), "Water crop A");
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let mut task = created_task();
        let task_id = *task.id();
        let err = execute(&mut task, &TaskCommand::Create(create_cmd(task_id))).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn create_rejects_blank_title_and_past_due_date() {
        let id = TaskId::generate();
        let task = Task::empty(id);

        let mut blank = create_cmd(id);
        blank.title = "   ".to_string();
        assert!(matches!(
            task.handle(&TaskCommand::Create(blank)),
            Err(DomainError::Validation(_))
        ));

        let mut past = create_cmd(id);
        past.due_date = Some(test_time() - Duration::days(1));
        assert!(matches!(
            task.handle(&TaskCommand::Create(past)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn asset_domains_require_an_asset() {
        let id = TaskId::generate();
        let task = Task::empty(id);
        let mut cmd = create_cmd(id);
        cmd.asset_id = None;
        assert!(matches!(
            task.handle(&TaskCommand::Create(cmd)),
            Err(DomainError::Validation(_))
        ));

        let mut finance = create_cmd(id);
        finance.domain = TaskDomain::Finance;
        assert!(matches!(
            task.handle(&TaskCommand::Create(finance)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn commands_on_unknown_task_are_not_found() {
        let id = TaskId::generate();
        let task = Task::empty(id);
        let err = task
            .handle(&TaskCommand::Complete(CompleteTask {
                task_id: id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn completed_task_rejects_everything() {
        let mut task = created_task();
        let id = *task.id();
        let done_at = test_time() + Duration::hours(3);
        execute(
            &mut task,
            &TaskCommand::Complete(CompleteTask {
                task_id: id,
                occurred_at: done_at,
            }),
        )
        .unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.completed_date(), Some(done_at));

        let cancel = TaskCommand::Cancel(CancelTask {
            task_id: id,
            occurred_at: done_at,
        });
        match task.handle(&cancel) {
            Err(DomainError::InvariantViolation(msg)) => assert!(msg.contains("completed")),
            other => panic!("unexpected: {other:?}"),
        }

        let modify = TaskCommand::Modify(ModifyTask {
            task_id: id,
            changes: TaskChanges {
                title: Some("Again".into()),
                ..TaskChanges::default()
            },
            occurred_at: done_at,
        });
        assert!(task.handle(&modify).is_err());
    }

    #[test]
    fn mark_due_only_after_the_due_date_and_only_once() {
        let mut task = created_task();
        let id = *task.id();
        let early = TaskCommand::MarkDue(MarkTaskDue {
            task_id: id,
            occurred_at: test_time() + Duration::days(1),
        });
        assert!(matches!(task.handle(&early), Err(DomainError::Validation(_))));

        let late = TaskCommand::MarkDue(MarkTaskDue {
            task_id: id,
            occurred_at: test_time() + Duration::days(3),
        });
        execute(&mut task, &late).unwrap();
        assert!(task.is_due());
        assert!(matches!(
            task.handle(&late),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn moving_the_due_date_forward_clears_the_flag() {
        let mut task = created_task();
        let id = *task.id();
        let now = test_time() + Duration::days(3);
        execute(
            &mut task,
            &TaskCommand::MarkDue(MarkTaskDue {
                task_id: id,
                occurred_at: now,
            }),
        )
        .unwrap();

        execute(
            &mut task,
            &TaskCommand::Modify(ModifyTask {
                task_id: id,
                changes: TaskChanges {
                    due_date: Some(now + Duration::days(7)),
                    ..TaskChanges::default()
                },
                occurred_at: now,
            }),
        )
        .unwrap();
        assert!(!task.is_due());
        assert_eq!(task.due_date(), Some(now + Duration::days(7)));
    }

    #[test]
    fn modification_can_clear_the_due_date() {
        let now = test_time();
        let mut task = created_task();
        let task_id = *task.id();
        let modify = |changes: TaskChanges| {
            TaskCommand::Modify(ModifyTask {
                task_id,
                changes,
                occurred_at: now,
            })
        };

        execute(
            &mut task,
            &modify(TaskChanges {
                due_date: Some(now + Duration::days(2)),
                ..TaskChanges::default()
            }),
        )
        .unwrap();
        let events = execute(
            &mut task,
            &modify(TaskChanges {
                clear_due_date: true,
                ..TaskChanges::default()
            }),
        )
        .unwrap();
        assert!(matches!(&events[0], TaskEvent::TaskModified(e) if e.due_date.is_none()));
        assert_eq!(task.due_date(), None);

        let err = task
            .handle(&modify(TaskChanges {
                due_date: Some(now + Duration::days(1)),
                clear_due_date: true,
                ..TaskChanges::default()
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_modification_is_rejected() {
        let task = created_task();
        let err = task
            .handle(&TaskCommand::Modify(ModifyTask {
                task_id: *task.id(),
                changes: TaskChanges::default(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn event_codes_match_the_bus_topics() {
        let codes: Vec<_> = TaskEventKind::all().iter().map(|k| k.code()).collect();
        assert_eq!(
            codes,
            ["TaskCreated", "TaskModified", "TaskCompleted", "TaskCancelled", "TaskDue"]
        );
        assert_eq!(TaskEventKind::from_code("TaskDue"), Some(TaskEventKind::Due));
        assert_eq!(TaskEventKind::from_code("TaskDeleted"), None);
    }

    #[test]
    fn events_survive_json() {
        let task = created_task();
        let events = task
            .handle(&TaskCommand::Complete(CompleteTask {
                task_id: *task.id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        let back: TaskEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Modify(u8),
        Complete,
        Cancel,
        MarkDue,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Modify),
            Just(Op::Complete),
            Just(Op::Cancel),
            Just(Op::MarkDue),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn replaying_emitted_events_reproduces_state_and_terminals_absorb(
            ops in proptest::collection::vec(op(), 0..24)
        ) {
            let id = TaskId::generate();
            let mut live = Task::empty(id);
            let mut history = execute(&mut live, &TaskCommand::Create(create_cmd(id))).unwrap();
            let mut terminal = false;

            for (step, op) in ops.into_iter().enumerate() {
                let now = test_time() + Duration::hours(step as i64 * 12);
                let cmd = match op {
                    Op::Modify(n) => TaskCommand::Modify(ModifyTask {
                        task_id: id,
                        changes: TaskChanges {
                            title: Some(format!("Round {n}")),
                            ..TaskChanges::default()
                        },
                        occurred_at: now,
                    }),
                    Op::Complete => TaskCommand::Complete(CompleteTask { task_id: id, occurred_at: now }),
                    Op::Cancel => TaskCommand::Cancel(CancelTask { task_id: id, occurred_at: now }),
                    Op::MarkDue => TaskCommand::MarkDue(MarkTaskDue { task_id: id, occurred_at: now }),
                };

                match execute(&mut live, &cmd) {
                    Ok(events) => {
                        prop_assert!(!terminal, "terminal task accepted {:?}", cmd);
                        history.extend(events);
                    }
                    Err(_) => {}
                }
                terminal = live.status().is_terminal();
            }

            let mut replayed = Task::empty(id);
            for event in &history {
                replayed.apply(event);
            }
            prop_assert_eq!(replayed.version(), history.len() as u64);
            prop_assert_eq!(replayed, live);
        }
    }
}
