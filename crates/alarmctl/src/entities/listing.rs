//! Per-item results for bulk reads.

use serde::{Deserialize, Serialize};

/// A source that could not be read or parsed during a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub path: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Items that loaded successfully plus the ones that did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Listing<T> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
