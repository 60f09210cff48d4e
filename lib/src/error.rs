//! Custom Error and Result types for this library

use std::any::Any;
use thiserror::Error;

use crate::persisted::PersistOptionsBuilderError;

/// Custom Error type for this library
#[derive(Error, Debug)]
pub enum SlotError {
    /// A slot key was empty or otherwise unusable
    #[error("invalid slot key: {_0:?}")]
    InvalidKey(String),

    /// Errors reading or writing a slot on disk
    #[error("slot storage io error: {_0}")]
    Io(#[from] std::io::Error),

    /// Errors serializing or deserializing a slot value
    #[error("failed to (de)serialize slot value: {_0}")]
    Serialize(#[from] serde_json::Error),

    /// An observer reported a failure while observing an action
    #[error("observer failed: {_0}")]
    Observer(String),

    /// An observer panicked while observing an action
    #[error("observer panicked: {_0}")]
    ObserverPanic(String),

    /// Error resulting from failure to build persist options
    #[error("failed to build persist options: {_0}")]
    OptionsBuild(#[from] PersistOptionsBuilderError),
}

impl From<Box<dyn Any + Send>> for SlotError {
    fn from(value: Box<dyn Any + Send>) -> Self {
        if let Some(s) = value.downcast_ref::<&'static str>() {
            Self::ObserverPanic(format!("panicked with: {}", s))
        } else if let Some(s) = value.downcast_ref::<String>() {
            Self::ObserverPanic(format!("panicked with: {}", s))
        } else {
            Self::ObserverPanic("panicked with an unknown type".into())
        }
    }
}

/// Custom Result type for this library. All Errors exposed by this library
/// will be returned as [`SlotError`]
pub type Result<T> = std::result::Result<T, SlotError>;

#[cfg(test)]
#[path = "./error_tests.rs"]
mod tests;
