//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A batch is an entity: its remaining quantity changes, but it stays the same batch
/// (and stays in the ledger at zero quantity as history).
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
