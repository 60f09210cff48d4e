//! Library package for reducer driven state that survives restarts
//!
//! A [`persisted::PersistedStore`] keeps an in-memory state produced by a
//! [`reducer::Reducer`] consistent with a durable key/value slot provided by
//! a [`storage::SlotStorage`]. Every domain action is written to the slot,
//! and changes made to the slot by anyone else are synchronized back into
//! the store.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use slotstore::{
//!     persisted::PersistOptions,
//!     quiz::{Quiz, QuizRoute},
//!     storage::{MemorySlotStorage, SlotStorage},
//! };
//!
//! let storage: Rc<dyn SlotStorage> = Rc::new(MemorySlotStorage::new());
//! let quiz = Quiz::open(QuizRoute::Crm, storage.clone(), PersistOptions::default())
//!     .unwrap();
//!
//! quiz.change_name("Ada");
//! quiz.finish();
//!
//! assert_eq!(quiz.name(), "Ada");
//! assert_eq!(
//!     storage.read("test-CRM-key").unwrap().unwrap(),
//!     r#"{"name":"Ada","finished":true}"#
//! );
//! ```

#![deny(missing_docs)]
pub mod action;
pub mod error;
pub mod persisted;
pub mod quiz;
pub mod reducer;
pub mod storage;
pub mod store;
