/// Execute an aggregate command deterministically (no IO, no async).
///
/// Calls `handle` to decide, then `apply`s every decided event so the
/// aggregate reflects the new state. This is the in-memory half of the
/// dispatcher pipeline; domain unit tests drive aggregates through it.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: tania_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
