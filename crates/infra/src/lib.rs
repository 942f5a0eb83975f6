//! Infrastructure for the farm core: ledger and read store engines,
//! projections, the command pipeline and the composition root.
//!
//! ```text
//! command → service (reference checks) → CommandDispatcher
//!              → Ledger::append → EventBus::publish → ProjectionHandler → ReadStore
//! ```

pub mod app;
pub mod command_dispatcher;
pub mod config;
pub mod due;
pub mod engine;
pub mod event_model;
pub mod ledger;
pub mod locks;
pub mod projections;
pub mod read_model;
pub mod schema;
pub mod services;
pub mod views;

pub use app::TaniaCore;
pub use command_dispatcher::{CommandDispatcher, DispatchError, Dispatcher};
pub use config::{ConfigError, EngineKind, PersistenceConfig, TaniaConfig};
pub use due::{DueSweeper, SweepReport};
pub use engine::{Engine, EngineError};
pub use event_model::{AggregateEvent, DomainEnvelope, DomainEvent, EventKind};
pub use services::{AssetsService, CommandReceipt, GrowthService, PlantBatch, TasksService};
pub use views::ReadViews;
