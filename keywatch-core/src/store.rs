//! Typed persistent store over a [`StorageBackend`].
//!
//! The store owns no in-memory value state — every read goes to the
//! backend. Values are serialized to JSON text at this layer, so the
//! backend only ever sees text. Every successful write publishes exactly
//! one change event on the injected [`ChangeBus`], after the backend call
//! has resolved (publish-after-persist), so a listener that reacts by
//! reading back is guaranteed to see the value just written, barring a
//! concurrent second write.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::StorageBackend;
use crate::bus::ChangeBus;
use crate::error::{StoreError, StoreResult};

/// Typed async key-value store with change notification.
///
/// `Clone` is cheap — clones share the backend and the bus.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    bus: ChangeBus,
}

impl Store {
    /// Creates a store over `backend`, publishing changes on `bus`.
    pub fn new(backend: Arc<dyn StorageBackend>, bus: ChangeBus) -> Self {
        Self { backend, bus }
    }

    /// The change bus this store publishes on.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Reads and deserializes the value stored under `key`.
    ///
    /// A missing entry is `Ok(None)`, not an error. Fails with
    /// [`StoreError::Read`] when the backend cannot be read and
    /// [`StoreError::Deserialization`] when the persisted text does not
    /// parse as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.backend.read(key).await? {
            Some(text) => {
                let value = serde_json::from_str(&text)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Stores `value` under `key`, or deletes the entry when `value` is
    /// `None`.
    ///
    /// `None` removes the entry entirely — absence stays a distinct third
    /// state rather than a stored marker. On success, exactly one change
    /// event for `key` is published; the publish is part of this
    /// method's contract, not something callers trigger themselves.
    pub async fn set<T: Serialize>(&self, key: &str, value: Option<&T>) -> StoreResult<()> {
        match value {
            Some(v) => {
                let text =
                    serde_json::to_string(v).map_err(|e| StoreError::Write(e.to_string()))?;
                self.backend.write(key, text).await?;
            }
            None => {
                self.backend.delete(key).await?;
            }
        }
        self.bus.publish(key);
        Ok(())
    }

    /// Deletes the entry under `key` and publishes the change.
    ///
    /// Untyped convenience for `set(key, None)`.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        self.backend.delete(key).await?;
        self.bus.publish(key);
        Ok(())
    }
}
