//! # keywatch-core
//!
//! Persisted, observer-synchronized key-value state for a single process.
//!
//! The crate is layered bottom-up:
//!
//! - [`StorageBackend`] — pluggable async text storage (the device-local
//!   store boundary). [`MemoryBackend`] is the in-process implementation;
//!   `keywatch-sqlite` provides a durable one.
//! - [`ChangeBus`] — payload-less per-key publish/subscribe. Events carry
//!   only the key; consumers re-read the store, which stays the single
//!   source of truth.
//! - [`Store`] — typed get/set/remove over a backend, serializing values
//!   to JSON text. Every successful write publishes exactly one change
//!   event, after the write has completed.
//! - [`Binding`] — a consumer's live attachment to one key: a local
//!   observable value, a load/reload procedure driven by bus events, and
//!   a subscription released exactly once on detach.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keywatch_core::{Binding, BindingCfg, ChangeBus, MemoryBackend, Store};
//!
//! let store = Store::new(Arc::new(MemoryBackend::new()), ChangeBus::new());
//!
//! let binding = Binding::<UserData>::attach(&store, "userData", BindingCfg::new()).await;
//! binding.update(Some(UserData { email: "a@b.com".into() })).await?;
//!
//! // Every other binding attached to "userData" converges on the new value.
//! ```

pub mod backend;
pub mod binding;
pub mod bus;
pub mod error;
pub mod memory;
pub mod store;

// Public API exports
pub use backend::{BoxFuture, StorageBackend};
pub use binding::{Binding, BindingCfg, Equality};
pub use bus::{ChangeBus, Listener};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use store::Store;
