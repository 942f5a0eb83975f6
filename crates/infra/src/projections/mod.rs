//! Read models built from the ledger.
//!
//! Every projection is a pure fold (`tania_events::Projection`) wrapped in a
//! [`ProjectionHandler`] that stores rows with their last applied sequence.
//! Rows are disposable: [`ReadSide::rebuild`] recreates them from the ledger.

pub mod areas;
pub mod crop_activities;
pub mod crops;
pub mod farms;
pub mod handler;
pub mod materials;
pub mod replay;
pub mod reservoirs;
pub mod tasks;

pub use areas::{AreaFilter, AreaProjection, AreaReadModel};
pub use crop_activities::{
    ActivityDetail, ActivityFilter, CropActivity, CropActivityLog, CropActivityProjection,
};
pub use crops::{AreaHolding, CropFilter, CropProjection, CropReadModel};
pub use farms::{FarmFilter, FarmProjection, FarmReadModel};
pub use handler::{ApplyError, ApplyOutcome, ProjectionHandler, QueryError, Rebuildable};
pub use materials::{MaterialFilter, MaterialProjection, MaterialReadModel};
pub use replay::{ProjectionRebuild, ReadSide, ReadSideError, RebuildReport};
pub use reservoirs::{ReservoirFilter, ReservoirProjection, ReservoirReadModel};
pub use tasks::{TaskFilter, TaskProjection, TaskReadModel};
