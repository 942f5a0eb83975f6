//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus sits between the ledger and the read side:
//!
//! ```text
//! Command → Ledger (append) → EventBus (publish) → Handlers
//!                                                  ├─ projections
//!                                                  └─ other subscribers
//! ```
//!
//! Events are **stored first**, then published. The bus has no persistence,
//! no acknowledgement and no retry: a failed publish means the read side lags
//! the ledger until it is rebuilt from the ledger.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::EventEnvelope;
use crate::event::{Event, EventKind};

/// A message that can be routed by topic.
pub trait Routable: Send + Sync + 'static {
    type Topic: EventKind;

    fn topic(&self) -> Self::Topic;
}

impl<E: Event> Routable for EventEnvelope<E> {
    type Topic = E::Kind;

    fn topic(&self) -> Self::Topic {
        self.payload().kind()
    }
}

/// A subscriber on the bus.
///
/// Handlers are awaited inline by the publisher; a slow handler slows the
/// command that published the event.
#[async_trait]
pub trait EventHandler<M>: Send + Sync {
    /// Name used in logs and in [`PublishError`] reports.
    fn name(&self) -> &str;

    async fn handle(&self, message: &M) -> anyhow::Result<()>;
}

/// One handler that failed during a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub handler: String,
    pub reason: String,
}

impl core::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.handler, self.reason)
    }
}

fn join_failures(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// At least one subscriber failed; the others still ran.
    #[error("delivery of {topic} failed: {}", join_failures(.failures))]
    HandlerFailed {
        topic: &'static str,
        failures: Vec<HandlerFailure>,
    },

    /// The bus could not accept the message at all.
    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Domain-agnostic publish/subscribe contract.
///
/// Delivery is synchronous and best-effort: `publish` returns once every
/// handler subscribed to the message's topic has run, in subscription order.
#[async_trait]
pub trait EventBus<M: Routable>: Send + Sync {
    fn subscribe(&self, topic: M::Topic, handler: Arc<dyn EventHandler<M>>);

    async fn publish(&self, message: &M) -> Result<(), PublishError>;
}

#[async_trait]
impl<M, B> EventBus<M> for Arc<B>
where
    M: Routable,
    B: EventBus<M> + ?Sized,
{
    fn subscribe(&self, topic: M::Topic, handler: Arc<dyn EventHandler<M>>) {
        (**self).subscribe(topic, handler)
    }

    async fn publish(&self, message: &M) -> Result<(), PublishError> {
        (**self).publish(message).await
    }
}
