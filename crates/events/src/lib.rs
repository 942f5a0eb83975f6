//! `tania-events`: event-sourcing mechanics shared by every bounded context.
//!
//! Nothing here knows about farms, crops or tasks: the crate defines what an
//! event and a command look like, how events travel ([`EventBus`]) and how a
//! read model folds them ([`Projection`]). Storage lives in `tania-infra`.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, EventHandler, HandlerFailure, PublishError, Routable};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::{Event, EventKind};
pub use handler::execute;
pub use in_memory_bus::InMemoryEventBus;
pub use projection::{Projection, ProjectionError, Queryable, replay};
