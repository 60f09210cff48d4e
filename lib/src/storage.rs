//! Provides the key/value slot service that persisted stores mirror into,
//! along with in-memory and file backed implementations.

#[cfg(test)]
use mockall::automock;

use std::rc::Rc;

use crate::error::Result;

pub mod file;
pub mod memory;

pub use file::FileSlotStorage;
pub use memory::MemorySlotStorage;

/// Callback invoked with the new raw value of a slot whenever it changes.
/// `None` means the slot was removed.
pub type SlotListener = Rc<dyn Fn(Option<String>)>;

/// Identifies a single listener registration so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A durable key/value service holding serialized state. Implementations
/// must notify listeners once per actual value change of the subscribed key
/// and must not hold any internal borrow while doing so, since listeners are
/// free to call back into the storage.
#[cfg_attr(test, automock)]
pub trait SlotStorage {
    /// Returns the raw value stored under key, or None if the slot is empty
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the raw value stored under key
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Registers a listener for changes to key
    fn subscribe(&self, key: &str, listener: SlotListener) -> SubscriptionId;

    /// Removes a previously registered listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Listener bookkeeping shared by the storage implementations
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, String, SlotListener)>,
}

impl Listeners {
    pub(crate) fn add(
        &mut self,
        key: &str,
        listener: SlotListener,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, key.to_string(), listener));
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) {
        self.entries.retain(|(entry_id, _, _)| *entry_id != id);
    }

    /// Returns the listeners for key so they can be invoked after the
    /// caller releases its borrow on the registry
    pub(crate) fn for_key(&self, key: &str) -> Vec<SlotListener> {
        self.entries
            .iter()
            .filter(|(_, k, _)| k == key)
            .map(|(_, _, l)| Rc::clone(l))
            .collect()
    }

    /// Returns every distinct subscribed key
    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for (_, key, _) in self.entries.iter() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }
}

pub(crate) fn notify(listeners: Vec<SlotListener>, value: Option<String>) {
    for listener in listeners {
        listener(value.clone());
    }
}

#[cfg(test)]
#[path = "./storage_tests.rs"]
mod tests;
