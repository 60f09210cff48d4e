//! In-process slot storage, the equivalent of a browser's local storage
//! shared by every store created in the same process.

use log::*;
use std::{cell::RefCell, collections::HashMap};

use crate::{
    error::Result,
    storage::{Listeners, SlotListener, SlotStorage, SubscriptionId, notify},
};

/// Keeps slot values in a map and notifies subscribers synchronously
#[derive(Default)]
pub struct MemorySlotStorage {
    values: RefCell<HashMap<String, String>>,
    listeners: RefCell<Listeners>,
}

impl MemorySlotStorage {
    /// Returns a new, empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes a slot, notifying subscribers with `None` if it existed.
    /// Persisted stores never call this; it represents an outside actor
    /// clearing the slot.
    pub fn remove(&self, key: &str) {
        let removed = self.values.borrow_mut().remove(key);

        if removed.is_some() {
            debug!("slot {key} removed");
            let listeners = self.listeners.borrow().for_key(key);
            notify(listeners, None);
        }
    }
}

impl SlotStorage for MemorySlotStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let previous = self
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());

        if previous.as_deref() == Some(value) {
            return Ok(());
        }

        debug!("slot {key} changed");
        let listeners = self.listeners.borrow().for_key(key);
        notify(listeners, Some(value.to_string()));
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: SlotListener) -> SubscriptionId {
        self.listeners.borrow_mut().add(key, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.borrow_mut().remove(id)
    }
}

#[cfg(test)]
#[path = "./memory_tests.rs"]
mod tests;
