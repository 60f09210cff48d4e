//! A [`MiddlewareStore`] whose state is mirrored into a persisted slot.
//!
//! Domain actions are reduced, committed and then written to the slot.
//! Synchronization actions replace the in-memory state with the slot's value
//! and are never written back. A subscription on the slot emits a
//! synchronization action whenever the slot changes out-of-band.

use derive_builder::Builder;
use log::*;
use serde::{Serialize, de::DeserializeOwned};
use std::{cell::Cell, rc::Rc};

use crate::{
    action::StoreAction,
    error::{Result, SlotError},
    reducer::Reducer,
    storage::{SlotStorage, SubscriptionId},
    store::{Dispatcher, MiddlewareStore, Observers, StateGetter},
};

/// Observers of a persisted store see both domain and sync actions
pub type PersistedObservers<S, A> = Observers<S, StoreAction<A, S>>;

/// Controls when the persisted value is applied and whether out-of-band
/// changes are followed
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(default)]
pub struct PersistOptions {
    /// When true the store starts out with the persisted value. When false
    /// it starts with the initial state and the persisted value is applied
    /// by [`PersistedStore::hydrate`], keeping the first observed value
    /// identical regardless of what is in the slot.
    pub initialize_with_value: bool,
    /// When true the store subscribes to slot changes and synchronizes
    /// itself with values written by other stores or processes
    pub sync_on_change: bool,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            initialize_with_value: true,
            sync_on_change: true,
        }
    }
}

impl PersistOptions {
    /// Returns a new instance of PersistOptionsBuilder
    pub fn builder() -> PersistOptionsBuilder {
        PersistOptionsBuilder::default()
    }
}

/// State used when the slot is empty or holds an unreadable value
pub enum InitialState<S> {
    /// A ready made value
    Value(S),
    /// A function producing the value on demand
    Producer(Box<dyn Fn() -> S>),
}

impl<S: Clone> InitialState<S> {
    /// Wraps a producer function
    pub fn producer<F: Fn() -> S + 'static>(f: F) -> Self {
        Self::Producer(Box::new(f))
    }

    /// Returns the initial value
    pub fn get(&self) -> S {
        match self {
            Self::Value(value) => value.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl<S> From<S> for InitialState<S> {
    fn from(value: S) -> Self {
        Self::Value(value)
    }
}

// applies sync payloads verbatim and hands domain actions to the wrapped
// reducer
struct SyncingReducer<R> {
    inner: R,
}

impl<S, A, R> Reducer<S, StoreAction<A, S>> for SyncingReducer<R>
where
    S: Clone,
    R: Reducer<S, A>,
{
    fn reduce(&self, state: &S, action: &StoreAction<A, S>) -> S {
        match action {
            StoreAction::Sync(payload) => payload.clone(),
            StoreAction::Domain(action) => self.inner.reduce(state, action),
        }
    }
}

struct Shared<S, A> {
    key: String,
    store: MiddlewareStore<S, StoreAction<A, S>>,
    storage: Rc<dyn SlotStorage>,
    initial_state: InitialState<S>,
    hydrated: Cell<bool>,
    // set when the slot changes while an action is in flight
    resync: Cell<bool>,
}

impl<S, A> Shared<S, A>
where
    S: Clone + PartialEq + DeserializeOwned,
{
    fn sync(&self, state: S) {
        self.hydrated.set(true);

        if *self.store.get_state() == state {
            debug!("slot {} already in sync", self.key);
            return;
        }

        debug!("synchronizing store with slot {}", self.key);
        self.dispatch(StoreAction::Sync(state));
    }

    fn dispatch(&self, action: StoreAction<A, S>) {
        self.store.dispatch(action);

        // nested calls only queue, the outermost one settles
        if self.store.is_dispatching() {
            return;
        }

        while self.resync.replace(false) {
            match self.storage.read(&self.key) {
                Ok(raw) => self.sync_from_raw(raw),
                Err(e) => warn!("failed to re-read slot {}: {e}", self.key),
            }
        }
    }

    fn sync_from_raw(&self, raw: Option<String>) {
        // a value compared against the state now may be stale by the time a
        // queued sync runs, so re-read the slot once the store is idle
        if self.store.is_dispatching() {
            debug!("slot {} changed during dispatch", self.key);
            self.resync.set(true);
            return;
        }

        let state = raw
            .and_then(|raw| decode_slot(&self.key, &raw))
            .unwrap_or_else(|| self.initial_state.get());
        self.sync(state);
    }

    fn hydrate(&self) {
        if self.hydrated.get() {
            return;
        }

        match read_slot(self.storage.as_ref(), &self.key) {
            Some(state) => self.sync(state),
            None => self.hydrated.set(true),
        }
    }
}

/// Reducer driven store kept consistent with a persisted slot
pub struct PersistedStore<S, A> {
    shared: Rc<Shared<S, A>>,
    subscription: Option<SubscriptionId>,
}

impl<S, A> PersistedStore<S, A>
where
    S: Clone + PartialEq + Serialize + DeserializeOwned + 'static,
    A: 'static,
{
    /// Creates a store for key without observers
    pub fn new<K, R, I>(
        key: K,
        reducer: R,
        initial_state: I,
        storage: Rc<dyn SlotStorage>,
        options: PersistOptions,
    ) -> Result<Self>
    where
        K: Into<String>,
        R: Reducer<S, A> + 'static,
        I: Into<InitialState<S>>,
    {
        Self::with_observers(
            key,
            reducer,
            initial_state,
            storage,
            Vec::new(),
            Vec::new(),
            options,
        )
    }

    /// Creates a store for key, running before and after around every
    /// dispatched action. Returns [`SlotError::InvalidKey`] for an empty
    /// key.
    pub fn with_observers<K, R, I>(
        key: K,
        reducer: R,
        initial_state: I,
        storage: Rc<dyn SlotStorage>,
        before: PersistedObservers<S, A>,
        after: PersistedObservers<S, A>,
        options: PersistOptions,
    ) -> Result<Self>
    where
        K: Into<String>,
        R: Reducer<S, A> + 'static,
        I: Into<InitialState<S>>,
    {
        let key = key.into();

        if key.trim().is_empty() {
            return Err(SlotError::InvalidKey(key));
        }

        let initial_state = initial_state.into();

        let first_state = if options.initialize_with_value {
            read_slot(storage.as_ref(), &key)
                .unwrap_or_else(|| initial_state.get())
        } else {
            initial_state.get()
        };

        let mut store = MiddlewareStore::new(
            SyncingReducer { inner: reducer },
            first_state,
            before,
            after,
        );

        let commit_storage = Rc::clone(&storage);
        let commit_key = key.clone();
        store.set_commit_fn(move |action: &StoreAction<A, S>, state: &S| {
            // prevent writing synchronized values back to the slot
            if action.is_sync() {
                return;
            }
            write_slot(commit_storage.as_ref(), &commit_key, state);
        });

        let shared = Rc::new(Shared {
            key,
            store,
            storage,
            initial_state,
            hydrated: Cell::new(options.initialize_with_value),
            resync: Cell::new(false),
        });

        let subscription = if options.sync_on_change {
            let weak = Rc::downgrade(&shared);
            let id = shared.storage.subscribe(
                &shared.key,
                Rc::new(move |raw: Option<String>| {
                    if let Some(shared) = weak.upgrade() {
                        shared.sync_from_raw(raw);
                    }
                }),
            );
            Some(id)
        } else {
            None
        };

        Ok(Self {
            shared,
            subscription,
        })
    }

    /// Returns the slot key this store persists into
    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Returns false until the persisted value has been applied when the
    /// store was created with `initialize_with_value` disabled
    pub fn is_hydrated(&self) -> bool {
        self.shared.hydrated.get()
    }

    /// Applies the persisted value if it has not been applied yet. Call this
    /// once the initial state has been observed, e.g. after the first
    /// render.
    pub fn hydrate(&self) {
        self.shared.hydrate()
    }

    /// Forces the in-memory state to state without writing to the slot.
    /// Has no effect when state equals the current state.
    pub fn sync(&self, state: S) {
        self.shared.sync(state)
    }
}

impl<S, A> StateGetter<S> for PersistedStore<S, A> {
    fn get_state(&self) -> Rc<S> {
        self.shared.store.get_state()
    }
}

impl<S, A> Dispatcher<A> for PersistedStore<S, A>
where
    S: Clone + PartialEq + DeserializeOwned,
{
    fn dispatch(&self, action: A) {
        // never compute a transition from the placeholder initial state
        self.shared.hydrate();
        self.shared.dispatch(StoreAction::Domain(action));
    }
}

impl<S, A> Drop for PersistedStore<S, A> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.shared.storage.unsubscribe(id);
        }
    }
}

fn decode_slot<S: DeserializeOwned>(key: &str, raw: &str) -> Option<S> {
    match serde_json::from_str(raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("ignoring malformed value in slot {key}: {e}");
            None
        }
    }
}

fn read_slot<S: DeserializeOwned>(
    storage: &dyn SlotStorage,
    key: &str,
) -> Option<S> {
    match storage.read(key) {
        Ok(Some(raw)) => decode_slot(key, &raw),
        Ok(None) => None,
        Err(e) => {
            warn!("failed to read slot {key}, treating as empty: {e}");
            None
        }
    }
}

fn write_slot<S: Serialize>(storage: &dyn SlotStorage, key: &str, state: &S) {
    let result = serde_json::to_string(state)
        .map_err(SlotError::from)
        .and_then(|raw| storage.write(key, &raw));

    if let Err(e) = result {
        error!("failed to persist slot {key}: {e}");
    }
}

#[cfg(test)]
#[path = "./persisted_tests.rs"]
mod tests;
