//! `tania-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, aggregate kinds, the aggregate traits and the domain error model.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod kind;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::DomainError;
pub use id::AggregateId;
pub use kind::AggregateKind;
