//! In-memory storage backend.
//!
//! The simplest [`StorageBackend`]: a `HashMap` behind a mutex, with
//! ready futures. Used by tests and by applications that want the
//! reactive layer without durable storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{BoxFuture, StorageBackend};
use crate::error::StoreError;

/// In-memory [`StorageBackend`].
///
/// `Clone` is cheap — clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any entry exists under `key`.
    ///
    /// Lets tests distinguish "deleted" from "stored an empty marker"
    /// without going through deserialization.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

impl StorageBackend for MemoryBackend {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        let result = Ok(self.entries.lock().unwrap().get(key).cloned());
        Box::pin(async move { result })
    }

    fn write<'a>(&'a self, key: &'a str, text: String) -> BoxFuture<'a, Result<(), StoreError>> {
        self.entries.lock().unwrap().insert(key.to_string(), text);
        Box::pin(async move { Ok(()) })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.entries.lock().unwrap().remove(key);
        Box::pin(async move { Ok(()) })
    }
}
