//! In-process event bus keyed by event kind.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::bus::{EventBus, EventHandler, HandlerFailure, PublishError, Routable};
use crate::event::EventKind;

type Handlers<M> = Vec<Arc<dyn EventHandler<M>>>;

/// In-memory pub/sub bus.
///
/// - routes on [`Routable::topic`]
/// - awaits each subscribed handler in turn (no channels, no background tasks)
/// - a failing handler does not stop delivery to the remaining ones
pub struct InMemoryEventBus<M: Routable> {
    handlers: RwLock<HashMap<M::Topic, Handlers<M>>>,
}

impl<M: Routable> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers subscribed to `topic`.
    pub fn subscriber_count(&self, topic: M::Topic) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

impl<M: Routable> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }
}

impl<M: Routable> core::fmt::Debug for InMemoryEventBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let topics = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("InMemoryEventBus")
            .field("topics", &topics)
            .finish()
    }
}

#[async_trait]
impl<M: Routable> EventBus<M> for InMemoryEventBus<M> {
    fn subscribe(&self, topic: M::Topic, handler: Arc<dyn EventHandler<M>>) {
        // Registration only appends, so a poisoned map is still consistent.
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.entry(topic).or_default().push(handler);
    }

    async fn publish(&self, message: &M) -> Result<(), PublishError> {
        let topic = message.topic();
        let handlers: Handlers<M> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::debug!(topic = topic.code(), "no subscribers");
            return Ok(());
        }

        let mut failures = Vec::new();
        for handler in handlers {
            if let Err(err) = handler.handle(message).await {
                tracing::warn!(
                    topic = topic.code(),
                    handler = handler.name(),
                    error = %err,
                    "event handler failed"
                );
                failures.push(HandlerFailure {
                    handler: handler.name().to_string(),
                    reason: format!("{err:#}"),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::HandlerFailed {
                topic: topic.code(),
                failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use tania_core::{AggregateId, AggregateKind};
    use uuid::Uuid;

    use crate::envelope::EventEnvelope;
    use crate::event::Event;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    enum PingKind {
        Ping,
        Pong,
    }

    impl EventKind for PingKind {
        fn code(&self) -> &'static str {
            match self {
                PingKind::Ping => "Ping",
                PingKind::Pong => "Pong",
            }
        }

        fn all() -> &'static [Self] {
            &[PingKind::Ping, PingKind::Pong]
        }
    }

    #[derive(Debug, Clone)]
    struct PingEvent(PingKind);

    impl Event for PingEvent {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            self.0
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::<Utc>::UNIX_EPOCH
        }
    }

    type Msg = EventEnvelope<PingEvent>;

    struct Recorder {
        name: &'static str,
        fail: bool,
        seen: Mutex<Vec<u64>>,
    }

    impl Recorder {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<u64> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventHandler<Msg> for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, message: &Msg) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(message.sequence_number());
            if self.fail {
                anyhow::bail!("refused");
            }
            Ok(())
        }
    }

    fn envelope(kind: PingKind, seq: u64) -> Msg {
        EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            AggregateKind::Task,
            seq,
            PingEvent(kind),
        )
    }

    #[tokio::test]
    async fn delivers_only_to_the_matching_topic() {
        let bus = InMemoryEventBus::<Msg>::new();
        let pings = Recorder::new("pings", false);
        let pongs = Recorder::new("pongs", false);
        bus.subscribe(PingKind::Ping, pings.clone());
        bus.subscribe(PingKind::Pong, pongs.clone());

        bus.publish(&envelope(PingKind::Ping, 1)).await.unwrap();
        bus.publish(&envelope(PingKind::Ping, 2)).await.unwrap();
        bus.publish(&envelope(PingKind::Pong, 3)).await.unwrap();

        assert_eq!(pings.seen(), vec![1, 2]);
        assert_eq!(pongs.seen(), vec![3]);
        assert_eq!(bus.subscriber_count(PingKind::Ping), 1);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let bus = InMemoryEventBus::<Msg>::new();
        bus.publish(&envelope(PingKind::Pong, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn failing_handler_is_reported_and_others_still_run() {
        let bus = InMemoryEventBus::<Msg>::new();
        let broken = Recorder::new("broken", true);
        let healthy = Recorder::new("healthy", false);
        bus.subscribe(PingKind::Ping, broken.clone());
        bus.subscribe(PingKind::Ping, healthy.clone());

        let err = bus.publish(&envelope(PingKind::Ping, 7)).await.unwrap_err();
        match err {
            PublishError::HandlerFailed { topic, failures } => {
                assert_eq!(topic, "Ping");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].handler, "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(healthy.seen(), vec![7]);
    }

    #[tokio::test]
    async fn poisoned_registry_still_delivers() {
        let bus = Arc::new(InMemoryEventBus::<Msg>::new());
        let pings = Recorder::new("pings", false);
        bus.subscribe(PingKind::Ping, pings.clone());

        let poisoner = Arc::clone(&bus);
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.handlers.write().unwrap();
            panic!("poison the registry");
        })
        .join();
        assert!(joined.is_err());
        assert!(bus.handlers.is_poisoned());

        bus.publish(&envelope(PingKind::Ping, 4)).await.unwrap();
        bus.subscribe(PingKind::Pong, Recorder::new("pongs", false));

        assert_eq!(pings.seen(), vec![4]);
        assert_eq!(bus.subscriber_count(PingKind::Pong), 1);
        assert!(format!("{bus:?}").contains("topics: 2"));
    }
}
