//! Reactive per-consumer binding to one stored key.
//!
//! A [`Binding`] composes the store and the change bus: on attach it
//! loads the current value into a local observable cell and subscribes to
//! the bus for its key; every change notification triggers an
//! asynchronous reload of the store (the event carries no payload — the
//! store is the single source of truth). The mutator writes through the
//! store, whose publish fans the change out to every other binding on the
//! key, and then assigns the local cell optimistically without waiting
//! for its own echo.
//!
//! Lifecycle is scoped acquisition: the bus subscription is taken on
//! attach and released exactly once on [`Binding::detach`] (or `Drop`),
//! on every exit path. A load still in flight when the binding detaches
//! resolves harmlessly — an `attached` flag is checked at the point the
//! load resumes, so a detached binding's state is never mutated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, watch};

use crate::bus::Listener;
use crate::error::StoreResult;
use crate::store::Store;

/// Comparator deciding whether a freshly loaded value equals the one the
/// binding already holds. When it does, the consumer is not re-notified.
pub type Equality<T> = Arc<dyn Fn(Option<&T>, Option<&T>) -> bool + Send + Sync>;

/// Configuration for [`Binding::attach`].
pub struct BindingCfg<T> {
    default: Option<T>,
    equality: Equality<T>,
}

impl<T: PartialEq> BindingCfg<T> {
    /// Default configuration: no initial value, structural `==` equality.
    pub fn new() -> Self {
        Self {
            default: None,
            equality: Arc::new(|loaded, current| loaded == current),
        }
    }
}

impl<T: PartialEq> Default for BindingCfg<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BindingCfg<T> {
    /// Sets the local value the binding holds until the initial load
    /// completes (and keeps when that load fails).
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }

    /// Replaces the equality comparator used to short-circuit redundant
    /// notifications.
    pub fn with_equality<F>(mut self, equality: F) -> Self
    where
        F: Fn(Option<&T>, Option<&T>) -> bool + Send + Sync + 'static,
    {
        self.equality = Arc::new(equality);
        self
    }
}

/// State shared between the binding handle and its reload task.
struct BindingShared<T> {
    /// Latest known value, updated synchronously on every load or write.
    /// Functional updaters resolve against this cell, never against a
    /// stale snapshot held by a consumer.
    latest: Mutex<Option<T>>,
    attached: AtomicBool,
    tx: watch::Sender<Option<T>>,
    equality: Equality<T>,
}

impl<T: Clone> BindingShared<T> {
    /// Compares a loaded value against the current cell and applies it if
    /// unequal. No-op once the binding has detached.
    fn apply_loaded(&self, loaded: Option<T>) {
        let mut latest = self.latest.lock().unwrap();
        if !self.attached.load(Ordering::SeqCst) {
            return;
        }
        if (self.equality)(loaded.as_ref(), latest.as_ref()) {
            return;
        }
        *latest = loaded.clone();
        // send_replace: the channel must track the cell even while no
        // receiver exists yet.
        self.tx.send_replace(loaded);
    }

    /// Unconditionally assigns a value the binding itself just wrote.
    fn assign(&self, value: Option<T>) {
        let mut latest = self.latest.lock().unwrap();
        *latest = value.clone();
        self.tx.send_replace(value);
    }
}

/// A consumer's live attachment to one stored key.
///
/// Created with [`Binding::attach`]; released with [`Binding::detach`] or
/// by dropping. Not `Clone` — each consumer attaches its own binding, and
/// independent bindings on the same key converge through the bus.
pub struct Binding<T> {
    store: Store,
    key: String,
    shared: Arc<BindingShared<T>>,
    listener: Listener,
    nudge_tx: mpsc::UnboundedSender<()>,
}

impl<T> Binding<T>
where
    T: Clone + Send + Sync + DeserializeOwned + 'static,
{
    /// Attaches to `key` on `store`.
    ///
    /// Initializes the local value to the configured default, performs
    /// the initial load (a load failure is logged and leaves the default
    /// in place), then subscribes to the store's change bus. The returned
    /// binding is synced: it reloads on every subsequent publish for the
    /// key.
    pub async fn attach(store: &Store, key: &str, cfg: BindingCfg<T>) -> Self {
        let (tx, _rx) = watch::channel(cfg.default.clone());
        let shared = Arc::new(BindingShared {
            latest: Mutex::new(cfg.default),
            attached: AtomicBool::new(true),
            tx,
            equality: cfg.equality,
        });

        match store.get::<T>(key).await {
            Ok(loaded) => shared.apply_loaded(loaded),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("binding '{}': initial load failed: {}", key, e);
                let _ = e;
            }
        }

        let (nudge_tx, mut nudge_rx) = mpsc::unbounded_channel::<()>();
        let listener: Listener = {
            let nudge_tx = nudge_tx.clone();
            Arc::new(move |_key| {
                let _ = nudge_tx.send(());
            })
        };
        store.bus().subscribe(key, listener.clone());

        {
            let store = store.clone();
            let key = key.to_string();
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while nudge_rx.recv().await.is_some() {
                    if !shared.attached.load(Ordering::SeqCst) {
                        break;
                    }
                    match store.get::<T>(&key).await {
                        Ok(loaded) => shared.apply_loaded(loaded),
                        Err(e) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!("binding '{}': reload failed: {}", key, e);
                            let _ = e;
                        }
                    }
                }
            });
        }

        Self {
            store: store.clone(),
            key: key.to_string(),
            shared,
            listener,
            nudge_tx,
        }
    }

    /// Writes a new value (or `None` to delete the entry) through the
    /// store, then assigns the local value optimistically.
    ///
    /// After this resolves successfully, any binding on the key that
    /// subsequently reads observes the new value; other live bindings
    /// converge asynchronously on the publish. On a write failure the
    /// error is logged and returned, and the local value is left
    /// unchanged — the optimistic assignment only happens after the
    /// write has succeeded, so there is nothing to roll back.
    pub async fn update(&self, value: Option<T>) -> StoreResult<()>
    where
        T: Serialize,
    {
        self.write_through(value).await
    }

    /// Like [`update`](Binding::update), but resolves the new value from
    /// the latest known local value.
    ///
    /// The updater runs against the binding's live cell, which is kept
    /// current synchronously on every load and write — two awaited
    /// updates in quick succession compose instead of both reading the
    /// same stale base. Two *concurrent* functional updates on different
    /// bindings can still each read the same base and lose one write;
    /// that is last-write-wins by design, with no locking across the
    /// store.
    pub async fn update_with<F>(&self, updater: F) -> StoreResult<()>
    where
        T: Serialize,
        F: FnOnce(Option<&T>) -> Option<T>,
    {
        let next = {
            let latest = self.shared.latest.lock().unwrap();
            updater(latest.as_ref())
        };
        self.write_through(next).await
    }

    async fn write_through(&self, value: Option<T>) -> StoreResult<()>
    where
        T: Serialize,
    {
        if let Err(e) = self.store.set(&self.key, value.as_ref()).await {
            #[cfg(feature = "tracing")]
            tracing::warn!("binding '{}': write failed: {}", self.key, e);
            return Err(e);
        }
        self.shared.assign(value);
        Ok(())
    }
}

impl<T> Binding<T> {
    /// The key this binding is attached to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Clone of the latest known value.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.shared.latest.lock().unwrap().clone()
    }

    /// A receiver over the binding's observable value.
    ///
    /// The receiver sees one change per consumer-visible notification;
    /// reloads short-circuited by the equality comparator produce none.
    pub fn observe(&self) -> watch::Receiver<Option<T>> {
        self.shared.tx.subscribe()
    }

    /// Releases the bus subscription. Idempotent; also runs on `Drop`.
    ///
    /// An in-flight load resolving after this call finds the binding
    /// detached and leaves its state untouched.
    pub fn detach(&self) {
        if self.shared.attached.swap(false, Ordering::SeqCst) {
            self.store.bus().unsubscribe(&self.key, &self.listener);
            // Wake the reload task so it observes the flag and exits.
            let _ = self.nudge_tx.send(());
        }
    }
}

impl<T> Drop for Binding<T> {
    fn drop(&mut self) {
        self.detach();
    }
}
