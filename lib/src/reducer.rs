//! Pure state transition functions.

/// Computes the next state from the current state and an action. Reducers
/// must not have side effects; persisting and observing are handled by the
/// stores.
pub trait Reducer<S, A> {
    /// Returns the state that results from applying action to state
    fn reduce(&self, state: &S, action: &A) -> S;
}

impl<S, A, F> Reducer<S, A> for F
where
    F: Fn(&S, &A) -> S,
{
    fn reduce(&self, state: &S, action: &A) -> S {
        self(state, action)
    }
}
