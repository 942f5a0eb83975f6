use tania_core::AggregateId;

/// A command targets exactly one aggregate.
///
/// Commands are intent ("complete this task"); they are never persisted.
/// Accepted commands turn into events, rejected ones into errors. The target
/// id is what the dispatcher locks and loads, so a command can never touch
/// two aggregates at once.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
