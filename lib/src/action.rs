//! Actions as seen by a persisted store's dispatch pipeline.

/// Wraps domain actions together with the library owned synchronization
/// action. Domain reducers only ever receive the `Domain` payload; `Sync` is
/// handled by the store itself and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreAction<A, S> {
    /// An application defined transition
    Domain(A),
    /// Replace the in-memory state with the persisted value
    Sync(S),
}

impl<A, S> StoreAction<A, S> {
    /// Returns true for the synchronization variant
    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Sync(_))
    }
}
