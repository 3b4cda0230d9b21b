//! Storage backend trait for keywatch.
//!
//! Defines the [`StorageBackend`] trait that concrete device-storage
//! implementations (in-memory, SQLite, …) must fulfill. Values cross this
//! boundary as serialized text; everything typed lives above it in
//! [`crate::Store`].

use core::future::Future;
use core::pin::Pin;

use crate::error::StoreError;

/// Type alias for the manually boxed futures used by backend traits
/// (no `async_trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pluggable device-local key-value storage.
///
/// Absence is a first-class state: `read` returns `Ok(None)` for a key
/// that has no entry, which is distinct from any stored text (including
/// `"null"`). `delete` of a missing key succeeds.
pub trait StorageBackend: Send + Sync {
    /// Reads the serialized text stored under `key`, if any.
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StoreError>>;

    /// Stores `text` under `key`, overwriting any prior entry.
    fn write<'a>(&'a self, key: &'a str, text: String) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Removes the entry under `key` entirely. Idempotent.
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}
