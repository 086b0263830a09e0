//! In-memory key-value storage.
//!
//! Stands in for browser local storage in headless clients and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use time::Duration;

use super::KeyValueStore;
use crate::error::Error;

/// Key-value store held in a `HashMap` behind a `RwLock`.
///
/// Like browser local storage it ignores `max_age`; entries live until removed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str, _max_age: Option<Duration>) -> Result<(), Error> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("Lock poisoned".to_owned()))?
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries
            .write()
            .map_err(|_| Error::Storage("Lock poisoned".to_owned()))?
            .remove(key);
        Ok(())
    }
}
