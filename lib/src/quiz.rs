//! The quiz form: a `name` field and a `finished` flag persisted per route.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    error::Result,
    persisted::{PersistOptions, PersistedObservers, PersistedStore},
    storage::SlotStorage,
    store::{Dispatcher, StateGetter},
};

/// State of a single quiz form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizState {
    /// The answer typed into the name field
    pub name: String,
    /// Whether the quiz has been submitted
    pub finished: bool,
}

/// Transitions supported by the quiz form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAction {
    /// Replace the name field
    Edit(String),
    /// Mark the quiz finished
    Finish,
}

/// Applies a quiz action, returning the new state
pub fn quiz_reducer(state: &QuizState, action: &QuizAction) -> QuizState {
    match action {
        QuizAction::Edit(value) => QuizState {
            name: value.clone(),
            ..state.clone()
        },
        QuizAction::Finish => QuizState {
            finished: true,
            ..state.clone()
        },
    }
}

/// The routes a quiz can be opened under. Each route persists into its own
/// slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum QuizRoute {
    /// The CRM quiz
    #[strum(to_string = "CRM")]
    Crm,
    /// The ATS quiz
    #[strum(to_string = "ATS")]
    Ats,
}

impl QuizRoute {
    /// Returns every route
    pub fn all() -> Vec<QuizRoute> {
        Self::iter().collect()
    }

    /// Returns the slot key the route's state is persisted under
    pub fn slot_key(&self) -> String {
        format!("test-{self}-key")
    }
}

/// Persisted store specialized for the quiz
pub type QuizStore = PersistedStore<QuizState, QuizAction>;

/// A quiz opened for a route, exposing the name, a name change handler and
/// a finish handler
pub struct Quiz {
    route: QuizRoute,
    store: QuizStore,
}

impl Quiz {
    /// Opens the quiz for route without observers
    pub fn open(
        route: QuizRoute,
        storage: Rc<dyn SlotStorage>,
        options: PersistOptions,
    ) -> Result<Self> {
        Self::open_with_observers(
            route,
            storage,
            Vec::new(),
            Vec::new(),
            options,
        )
    }

    /// Opens the quiz for route, running before and after around every
    /// action
    pub fn open_with_observers(
        route: QuizRoute,
        storage: Rc<dyn SlotStorage>,
        before: PersistedObservers<QuizState, QuizAction>,
        after: PersistedObservers<QuizState, QuizAction>,
        options: PersistOptions,
    ) -> Result<Self> {
        let store = PersistedStore::with_observers(
            route.slot_key(),
            quiz_reducer,
            QuizState::default(),
            storage,
            before,
            after,
            options,
        )?;

        Ok(Self { route, store })
    }

    /// Returns the route this quiz was opened for
    pub fn route(&self) -> QuizRoute {
        self.route
    }

    /// Returns the current state
    pub fn state(&self) -> Rc<QuizState> {
        self.store.get_state()
    }

    /// Returns the current name
    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    /// Returns whether the quiz was finished
    pub fn finished(&self) -> bool {
        self.state().finished
    }

    /// Replaces the name
    pub fn change_name<N: Into<String>>(&self, name: N) {
        self.store.dispatch(QuizAction::Edit(name.into()))
    }

    /// Marks the quiz finished
    pub fn finish(&self) {
        self.store.dispatch(QuizAction::Finish)
    }

    /// Applies the persisted value when opened with deferred hydration
    pub fn hydrate(&self) {
        self.store.hydrate()
    }

    /// Returns the underlying store
    pub fn store(&self) -> &QuizStore {
        &self.store
    }
}

#[cfg(test)]
#[path = "./quiz_tests.rs"]
mod tests;
