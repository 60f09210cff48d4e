//! Redux-like state container with before and after observers.

use log::*;
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use crate::{
    error::{Result, SlotError},
    reducer::Reducer,
};

/// Gets current store state
pub trait StateGetter<S> {
    /// Returns a snapshot of the current state
    fn get_state(&self) -> Rc<S>;
}

/// Dispatches actions to update store state
pub trait Dispatcher<A> {
    /// Applies action to the store
    fn dispatch(&self, action: A);
}

/// Watches actions flowing through a store. Observers receive the state as
/// it was before the action was applied and can neither change the action
/// nor the resulting state.
pub trait Observer<S, A> {
    /// Called once per dispatched action
    fn observe(&self, action: &A, state: &S) -> Result<()>;
}

impl<S, A, F> Observer<S, A> for F
where
    F: Fn(&A, &S) -> Result<()>,
{
    fn observe(&self, action: &A, state: &S) -> Result<()> {
        self(action, state)
    }
}

/// List of boxed observers run in order
pub type Observers<S, A> = Vec<Box<dyn Observer<S, A>>>;

/// Logs every action and the state it was applied to at debug level
#[derive(Debug, Default, Clone)]
pub struct LoggingObserver {
    label: String,
}

impl LoggingObserver {
    /// Returns an observer prefixing its log lines with label
    pub fn new<L: Into<String>>(label: L) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Returns a boxed observer, ready to be handed to a store
    pub fn boxed<S: Debug, A: Debug, L: Into<String>>(
        label: L,
    ) -> Box<dyn Observer<S, A>> {
        Box::new(Self::new(label))
    }
}

impl<S: Debug, A: Debug> Observer<S, A> for LoggingObserver {
    fn observe(&self, action: &A, state: &S) -> Result<()> {
        debug!("{}: action: {:?} state: {:?}", self.label, action, state);
        Ok(())
    }
}

// resets the in-flight flag and drops pending actions even if a reducer
// panics, so a later dispatch never replays them out of order
struct DispatchGuard<'a, A> {
    dispatching: &'a Cell<bool>,
    queue: &'a RefCell<VecDeque<A>>,
}

impl<A> Drop for DispatchGuard<'_, A> {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.queue.try_borrow_mut() {
            if !queue.is_empty() {
                warn!(
                    "dropping {} queued actions after a failed dispatch",
                    queue.len()
                );
                queue.clear();
            }
        }
        self.dispatching.set(false);
    }
}

/// Centralized state container. Every dispatch runs the before observers,
/// applies the reducer, runs the after observers and finally the commit
/// function. Dispatches issued while another one is in flight are queued
/// and processed in order once it completes.
pub struct MiddlewareStore<S, A> {
    state: RefCell<Rc<S>>,
    reducer: Box<dyn Reducer<S, A>>,
    before: Observers<S, A>,
    after: Observers<S, A>,
    commit: Option<Box<dyn Fn(&A, &S)>>,
    queue: RefCell<VecDeque<A>>,
    dispatching: Cell<bool>,
}

impl<S, A> MiddlewareStore<S, A> {
    /// Creates a new store wrapping reducer with the given observers
    pub fn new<R>(
        reducer: R,
        initial_state: S,
        before: Observers<S, A>,
        after: Observers<S, A>,
    ) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        Self {
            state: RefCell::new(Rc::new(initial_state)),
            reducer: Box::new(reducer),
            before,
            after,
            commit: None,
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Sets a function called with each action and the state it produced,
    /// after all observers have run
    pub fn set_commit_fn<F: Fn(&A, &S) + 'static>(&mut self, f: F) {
        self.commit = Some(Box::new(f))
    }

    /// Returns true while an action is being processed
    pub(crate) fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    fn process(&self, action: A) {
        let prev = self.get_state();
        let prev: &S = &prev;

        run_observers("before", &self.before[..], &action, prev);

        let next = Rc::new(self.reducer.reduce(prev, &action));
        *self.state.borrow_mut() = Rc::clone(&next);

        run_observers("after", &self.after[..], &action, prev);

        if let Some(f) = self.commit.as_ref() {
            f(&action, next.as_ref())
        }
    }
}

impl<S, A> StateGetter<S> for MiddlewareStore<S, A> {
    fn get_state(&self) -> Rc<S> {
        self.state.borrow().clone()
    }
}

impl<S, A> Dispatcher<A> for MiddlewareStore<S, A> {
    fn dispatch(&self, action: A) {
        self.queue.borrow_mut().push_back(action);

        if self.dispatching.replace(true) {
            debug!("dispatch in progress, action queued");
            return;
        }

        let _guard = DispatchGuard {
            dispatching: &self.dispatching,
            queue: &self.queue,
        };

        loop {
            let next = self.queue.borrow_mut().pop_front();
            match next {
                Some(action) => self.process(action),
                None => break,
            }
        }
    }
}

fn run_observers<S, A>(
    stage: &str,
    observers: &[Box<dyn Observer<S, A>>],
    action: &A,
    state: &S,
) {
    for (idx, observer) in observers.iter().enumerate() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            observer.observe(action, state)
        }));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{stage} observer {idx} failed: {e}"),
            Err(payload) => {
                error!("{stage} observer {idx}: {}", SlotError::from(payload))
            }
        }
    }
}

#[cfg(test)]
#[path = "./store_tests.rs"]
mod tests;
