use mockall::predicate::eq;
use std::cell::RefCell;

use super::*;
use crate::{
    quiz::{QuizAction, QuizState, quiz_reducer},
    storage::{MemorySlotStorage, MockSlotStorage, SlotListener},
};

type TestStore = PersistedStore<QuizState, QuizAction>;

/// Memory storage counting the writes made through the trait. Writes made
/// with `external_write` are not counted and stand in for another actor.
#[derive(Default)]
struct CountingStorage {
    inner: MemorySlotStorage,
    writes: RefCell<usize>,
}

impl CountingStorage {
    fn writes(&self) -> usize {
        *self.writes.borrow()
    }

    fn external_write(&self, key: &str, state: &QuizState) {
        let raw = serde_json::to_string(state).unwrap();
        self.inner.write(key, &raw).unwrap();
    }

    fn persisted(&self, key: &str) -> Option<QuizState> {
        self.inner
            .read(key)
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }
}

impl SlotStorage for CountingStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        *self.writes.borrow_mut() += 1;
        self.inner.write(key, value)
    }

    fn subscribe(&self, key: &str, listener: SlotListener) -> SubscriptionId {
        self.inner.subscribe(key, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.unsubscribe(id)
    }
}

fn quiz_state(name: &str, finished: bool) -> QuizState {
    QuizState {
        name: name.to_string(),
        finished,
    }
}

fn open(key: &str, storage: &Rc<CountingStorage>) -> TestStore {
    let storage: Rc<dyn SlotStorage> = storage.clone();
    PersistedStore::new(
        key,
        quiz_reducer,
        QuizState::default(),
        storage,
        PersistOptions::default(),
    )
    .unwrap()
}

fn deferred() -> PersistOptions {
    PersistOptions::builder()
        .initialize_with_value(false)
        .build()
        .unwrap()
}

fn mock_storage() -> MockSlotStorage {
    let mut storage = MockSlotStorage::new();
    storage.expect_read().returning(|_| Ok(None));
    storage
        .expect_subscribe()
        .returning(|_, _| SubscriptionId(7));
    storage
        .expect_unsubscribe()
        .with(eq(SubscriptionId(7)))
        .times(1)
        .return_const(());
    storage
}

#[test]
fn test_default_options() {
    let options = PersistOptions::builder().build().unwrap();
    assert_eq!(options, PersistOptions::default());
    assert!(options.initialize_with_value);
    assert!(options.sync_on_change);
}

#[test]
fn test_rejects_empty_key() {
    let storage = Rc::new(CountingStorage::default());
    let storage: Rc<dyn SlotStorage> = storage;
    let result: Result<TestStore> = PersistedStore::new(
        " ",
        quiz_reducer,
        QuizState::default(),
        storage,
        PersistOptions::default(),
    );
    assert!(matches!(result, Err(SlotError::InvalidKey(_))));
}

#[test]
fn test_empty_slot_uses_initial_state() {
    let storage = Rc::new(CountingStorage::default());
    let store = open("key", &storage);

    assert_eq!(store.key(), "key");
    assert_eq!(*store.get_state(), QuizState::default());
    assert!(store.is_hydrated());
    assert_eq!(storage.writes(), 0);
}

#[test]
fn test_initial_state_producer() {
    let storage: Rc<dyn SlotStorage> = Rc::new(CountingStorage::default());
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        InitialState::producer(|| quiz_state("anonymous", false)),
        storage,
        PersistOptions::default(),
    )
    .unwrap();

    assert_eq!(*store.get_state(), quiz_state("anonymous", false));
}

#[test]
fn test_initializes_with_persisted_value() {
    let storage = Rc::new(CountingStorage::default());
    storage.external_write("key", &quiz_state("Ada", true));

    let store = open("key", &storage);

    assert_eq!(*store.get_state(), quiz_state("Ada", true));
    assert_eq!(storage.writes(), 0);
}

#[test]
fn test_malformed_slot_falls_back_to_initial_state() {
    let storage = Rc::new(CountingStorage::default());
    storage.inner.write("key", "{not json").unwrap();

    let store = open("key", &storage);
    assert_eq!(*store.get_state(), QuizState::default());

    storage.inner.write("key", r#"{"unexpected":1}"#).unwrap();
    assert_eq!(*store.get_state(), QuizState::default());
}

#[test]
fn test_domain_dispatch_writes_reduced_state_once() {
    let mut storage = mock_storage();
    storage
        .expect_write()
        .withf(|key, value| {
            key == "key" && value == r#"{"name":"Ada","finished":false}"#
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        Rc::new(storage),
        PersistOptions::default(),
    )
    .unwrap();

    store.dispatch(QuizAction::Edit("Ada".to_string()));
    assert_eq!(*store.get_state(), quiz_state("Ada", false));
}

#[test]
fn test_sync_is_idempotent_and_never_writes() {
    let mut storage = mock_storage();
    storage.expect_write().times(0);

    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        Rc::new(storage),
        PersistOptions::default(),
    )
    .unwrap();

    store.sync(quiz_state("Ada", true));
    assert_eq!(*store.get_state(), quiz_state("Ada", true));

    store.sync(quiz_state("Ada", true));
    assert_eq!(*store.get_state(), quiz_state("Ada", true));

    let current = (*store.get_state()).clone();
    store.sync(current.clone());
    store.sync(current);
    assert_eq!(*store.get_state(), quiz_state("Ada", true));
}

#[test]
fn test_write_failure_does_not_reach_caller() {
    let mut storage = mock_storage();
    storage.expect_write().times(1).returning(|_, _| {
        Err(SlotError::Io(std::io::Error::other("disk full")))
    });

    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        Rc::new(storage),
        PersistOptions::default(),
    )
    .unwrap();

    store.dispatch(QuizAction::Finish);
    assert!(store.get_state().finished);
}

#[test]
fn test_drop_unsubscribes() {
    let storage = mock_storage();
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        Rc::new(storage),
        PersistOptions::default(),
    )
    .unwrap();
    drop(store);
}

#[test]
fn test_no_subscription_without_sync_on_change() {
    let mut storage = MockSlotStorage::new();
    storage.expect_read().returning(|_| Ok(None));
    storage.expect_subscribe().times(0);
    storage.expect_unsubscribe().times(0);

    let options = PersistOptions::builder()
        .sync_on_change(false)
        .build()
        .unwrap();

    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        Rc::new(storage),
        options,
    )
    .unwrap();
    drop(store);
}

#[test]
fn test_edit_finish_then_external_write_scenario() {
    let storage = Rc::new(CountingStorage::default());
    let store = open("key", &storage);

    store.dispatch(QuizAction::Edit("Ada".to_string()));
    assert_eq!(*store.get_state(), quiz_state("Ada", false));
    assert_eq!(storage.persisted("key"), Some(quiz_state("Ada", false)));

    store.dispatch(QuizAction::Finish);
    assert_eq!(*store.get_state(), quiz_state("Ada", true));
    assert_eq!(storage.persisted("key"), Some(quiz_state("Ada", true)));
    assert_eq!(storage.writes(), 2);

    storage.external_write("key", &quiz_state("Ada", false));

    assert_eq!(*store.get_state(), quiz_state("Ada", false));
    assert_eq!(storage.writes(), 2);
}

#[test]
fn test_independent_keys() {
    let storage = Rc::new(CountingStorage::default());
    let crm = open("CRM", &storage);
    let ats = open("ATS", &storage);

    crm.dispatch(QuizAction::Edit("Ada".to_string()));
    crm.dispatch(QuizAction::Finish);

    assert_eq!(*ats.get_state(), QuizState::default());
    assert_eq!(storage.persisted("ATS"), None);
    assert_eq!(storage.persisted("CRM"), Some(quiz_state("Ada", true)));
}

#[test]
fn test_stores_sharing_a_key_converge() {
    let storage = Rc::new(CountingStorage::default());
    let first = open("key", &storage);
    let second = open("key", &storage);

    first.dispatch(QuizAction::Edit("Ada".to_string()));
    assert_eq!(*second.get_state(), quiz_state("Ada", false));

    second.dispatch(QuizAction::Finish);
    assert_eq!(*first.get_state(), quiz_state("Ada", true));

    // one write per domain action, none for the synchronizations
    assert_eq!(storage.writes(), 2);
}

#[test]
fn test_removed_slot_resets_to_initial_state() {
    let storage = Rc::new(CountingStorage::default());
    let store = open("key", &storage);
    store.dispatch(QuizAction::Edit("Ada".to_string()));

    storage.inner.remove("key");

    assert_eq!(*store.get_state(), QuizState::default());
    assert_eq!(storage.persisted("key"), None);
}

#[test]
fn test_ignores_changes_without_sync_on_change() {
    let storage = Rc::new(CountingStorage::default());
    let options = PersistOptions::builder()
        .sync_on_change(false)
        .build()
        .unwrap();
    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        options,
    )
    .unwrap();

    storage.external_write("key", &quiz_state("Ada", true));
    assert_eq!(*store.get_state(), QuizState::default());
}

#[test]
fn test_deferred_hydration() {
    let storage = Rc::new(CountingStorage::default());
    storage.external_write("key", &quiz_state("Ada", true));

    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        deferred(),
    )
    .unwrap();

    assert!(!store.is_hydrated());
    assert_eq!(*store.get_state(), QuizState::default());

    store.hydrate();
    assert!(store.is_hydrated());
    assert_eq!(*store.get_state(), quiz_state("Ada", true));

    store.hydrate();
    assert_eq!(*store.get_state(), quiz_state("Ada", true));
    assert_eq!(storage.writes(), 0);
}

#[test]
fn test_dispatch_before_hydration_starts_from_persisted_value() {
    let storage = Rc::new(CountingStorage::default());
    storage.external_write("key", &quiz_state("Ada", false));

    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        deferred(),
    )
    .unwrap();

    store.dispatch(QuizAction::Finish);

    assert_eq!(*store.get_state(), quiz_state("Ada", true));
    assert_eq!(storage.persisted("key"), Some(quiz_state("Ada", true)));
    assert_eq!(storage.writes(), 1);
}

#[test]
fn test_deferred_hydration_of_empty_slot() {
    let storage = Rc::new(CountingStorage::default());
    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::new(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        deferred(),
    )
    .unwrap();

    store.hydrate();
    assert!(store.is_hydrated());
    assert_eq!(*store.get_state(), QuizState::default());
}

#[test]
fn test_observers_see_domain_and_sync_actions() {
    let storage = Rc::new(CountingStorage::default());
    let seen = Rc::new(RefCell::new(Vec::new()));

    let captured = Rc::clone(&seen);
    let after: PersistedObservers<QuizState, QuizAction> = vec![Box::new(
        move |action: &StoreAction<QuizAction, QuizState>, _: &QuizState| {
            captured.borrow_mut().push(action.clone());
            Ok(())
        },
    )];

    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::with_observers(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        vec![],
        after,
        PersistOptions::default(),
    )
    .unwrap();

    store.dispatch(QuizAction::Edit("Ada".to_string()));
    storage.external_write("key", &quiz_state("Bob", false));

    assert_eq!(
        *seen.borrow(),
        vec![
            StoreAction::Domain(QuizAction::Edit("Ada".to_string())),
            StoreAction::Sync(quiz_state("Bob", false)),
        ]
    );
}

#[test]
fn test_slot_change_during_dispatch_keeps_store_and_slot_equal() {
    let storage = Rc::new(CountingStorage::default());

    let other = Rc::clone(&storage);
    let before: PersistedObservers<QuizState, QuizAction> = vec![Box::new(
        move |action: &StoreAction<QuizAction, QuizState>, _: &QuizState| {
            if !action.is_sync() {
                other.external_write("key", &quiz_state("Bob", false));
            }
            Ok(())
        },
    )];

    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::with_observers(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        before,
        vec![],
        PersistOptions::default(),
    )
    .unwrap();

    store.dispatch(QuizAction::Edit("Ada".to_string()));

    assert_eq!(*store.get_state(), quiz_state("Ada", false));
    assert_eq!(storage.persisted("key"), Some(quiz_state("Ada", false)));
}

#[test]
fn test_slot_change_during_sync_is_applied_afterwards() {
    let storage = Rc::new(CountingStorage::default());

    let other = Rc::clone(&storage);
    let after: PersistedObservers<QuizState, QuizAction> = vec![Box::new(
        move |action: &StoreAction<QuizAction, QuizState>, _: &QuizState| {
            if *action == StoreAction::Sync(quiz_state("Bob", false)) {
                other.external_write("key", &quiz_state("Eve", true));
            }
            Ok(())
        },
    )];

    let dyn_storage: Rc<dyn SlotStorage> = storage.clone();
    let store: TestStore = PersistedStore::with_observers(
        "key",
        quiz_reducer,
        QuizState::default(),
        dyn_storage,
        vec![],
        after,
        PersistOptions::default(),
    )
    .unwrap();

    storage.external_write("key", &quiz_state("Bob", false));

    assert_eq!(*store.get_state(), quiz_state("Eve", true));
    assert_eq!(storage.persisted("key"), Some(quiz_state("Eve", true)));
    assert_eq!(storage.writes(), 0);
}
