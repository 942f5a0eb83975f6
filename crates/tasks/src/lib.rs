//! Tasks bounded context (event-sourced).
//!
//! Operational to-dos attached to farm assets: watering an area, spraying a
//! crop batch, restocking inventory. Pure deterministic domain logic; the
//! dispatcher in `tania-infra` supplies persistence and cross-aggregate
//! reference checks.

pub mod task;
pub mod values;

pub use task::{
    CancelTask, CompleteTask, CreateTask, MarkTaskDue, ModifyTask, Task, TaskCancelled,
    TaskChanges, TaskCommand, TaskCompleted, TaskCreated, TaskDue, TaskEvent, TaskEventKind,
    TaskId, TaskModified,
};
pub use values::{TaskCategory, TaskDomain, TaskDomainCode, TaskPriority, TaskStatus};
