use chrono::{DateTime, Utc};

/// A fact recorded by the ledger (batch received, stock consumed, sale recorded).
///
/// Events are immutable and append-only. `version` is the schema version of the
/// event type, not the aggregate version.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. "inventory.stock.consumed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
