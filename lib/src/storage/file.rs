//! Slot storage backed by one JSON file per key in a directory.
//!
//! Writes made through a [`FileSlotStorage`] notify its own subscribers
//! immediately. Writes made by other processes are only observed when
//! [`FileSlotStorage::poll`] is called.

use log::*;
use std::{
    cell::RefCell,
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    error::Result,
    storage::{Listeners, SlotListener, SlotStorage, SubscriptionId, notify},
};

/// Extension used for slot files
pub const SLOT_FILE_EXTENSION: &str = "json";

/// Stores each slot as `<dir>/<escaped key>.json`
pub struct FileSlotStorage {
    dir: PathBuf,
    listeners: RefCell<Listeners>,
    // last value observed per subscribed key, used to detect changes made
    // by other processes
    seen: RefCell<HashMap<String, Option<String>>>,
}

impl FileSlotStorage {
    /// Returns a storage rooted at dir, creating the directory if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            listeners: RefCell::new(Listeners::default()),
            seen: RefCell::new(HashMap::new()),
        })
    }

    /// Returns the file path used for key
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", escape_key(key), SLOT_FILE_EXTENSION))
    }

    /// Re-reads every subscribed slot and notifies listeners of slots whose
    /// value differs from the last one observed. Returns the number of
    /// changed slots.
    pub fn poll(&self) -> Result<usize> {
        let keys = self.listeners.borrow().keys();
        let mut changed = 0;

        for key in keys {
            let current = self.read_file(&key).unwrap_or_else(|e| {
                warn!("failed to poll slot {key}, treating as empty: {e}");
                None
            });

            let previous = self
                .seen
                .borrow_mut()
                .insert(key.clone(), current.clone());

            if previous.as_ref() == Some(&current) {
                continue;
            }

            debug!("slot {key} changed on disk");
            changed += 1;
            let listeners = self.listeners.borrow().for_key(&key);
            notify(listeners, current);
        }

        Ok(changed)
    }

    fn read_file(&self, key: &str) -> Result<Option<String>> {
        let bytes = match fs::read(self.slot_path(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // a slot that is not text can never hold a value, treat it as empty
        match String::from_utf8(bytes) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) => {
                warn!("ignoring non utf-8 contents in slot {key}: {e}");
                Ok(None)
            }
        }
    }
}

impl SlotStorage for FileSlotStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.read_file(key)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let previous = self.read_file(key).unwrap_or_else(|e| {
            warn!("failed to read slot {key} before writing: {e}");
            None
        });

        if previous.as_deref() == Some(value) {
            return Ok(());
        }

        fs::write(self.slot_path(key), value)?;

        let current = Some(value.to_string());
        let mut seen = self.seen.borrow_mut();
        if seen.contains_key(key) {
            seen.insert(key.to_string(), current.clone());
        }
        drop(seen);

        let listeners = self.listeners.borrow().for_key(key);
        notify(listeners, current);
        Ok(())
    }

    fn subscribe(&self, key: &str, listener: SlotListener) -> SubscriptionId {
        // record the current value so the first poll only reports changes
        // made after subscribing
        let current = self.read_file(key).unwrap_or_else(|e| {
            warn!("failed to read slot {key} while subscribing: {e}");
            None
        });
        self.seen.borrow_mut().insert(key.to_string(), current);
        self.listeners.borrow_mut().add(key, listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut listeners = self.listeners.borrow_mut();
        listeners.remove(id);
        let keys = listeners.keys();
        drop(listeners);
        self.seen.borrow_mut().retain(|key, _| keys.contains(key));
    }
}

/// Maps a key to a file name made of ASCII alphanumerics, `-` and `_`.
/// Any other byte is written as `.XX` hex so distinct keys never collide.
pub fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => {
                escaped.push(byte as char)
            }
            _ => escaped.push_str(&format!(".{byte:02X}")),
        }
    }
    escaped
}

#[cfg(test)]
#[path = "./file_tests.rs"]
mod tests;
