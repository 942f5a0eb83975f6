use chrono::{DateTime, Utc};

/// Closed catalog of event kinds for one event type.
///
/// The `code()` of a kind is both the bus topic and the `event_type` column
/// written by the ledger, so codes are stable forever once events exist.
pub trait EventKind:
    Copy + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static
{
    /// Stable wire/storage code (e.g. `"TaskCompleted"`).
    fn code(&self) -> &'static str;

    /// Every member of the catalog.
    fn all() -> &'static [Self];

    fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.code() == code)
    }
}

/// A domain event.
///
/// Events are:
/// - **immutable** (treat them as facts; corrections are new events)
/// - **versioned** (schema version travels with every stored record)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    type Kind: EventKind;

    fn kind(&self) -> Self::Kind;

    /// Stable event type identifier, the code of [`Event::kind`].
    fn event_type(&self) -> &'static str {
        self.kind().code()
    }

    /// Schema version for this event type.
    fn version(&self) -> u32 {
        1
    }

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
