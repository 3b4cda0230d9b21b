//! Per-key change notification bus.
//!
//! An in-process publish/subscribe registry keyed by the same string keys
//! as the store. Events carry only the key that changed — no payload —
//! so the store remains the single source of truth and subscribers
//! re-read it on notification rather than trusting an event payload that
//! could desynchronize from storage.
//!
//! The bus is an explicitly constructed, cheap-clone handle. It is
//! injected into [`crate::Store`] rather than living in a module-level
//! singleton, so tests create isolated bus instances per case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A registered change listener, invoked with the key that changed.
///
/// Identity is `Arc` pointer identity: [`ChangeBus::unsubscribe`] removes
/// entries whose `Arc` is pointer-equal to the one passed in.
pub type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Payload-less per-key publish/subscribe registry.
///
/// `Clone` is cheap — clones share the same registry.
#[derive(Clone, Default)]
pub struct ChangeBus {
    subscriptions: Arc<Mutex<HashMap<String, Vec<Listener>>>>,
}

impl ChangeBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every subsequent publish of `key`.
    ///
    /// Registration order is preserved and registrations are not
    /// deduplicated: subscribing the same listener twice yields two
    /// entries that both fire.
    pub fn subscribe(&self, key: &str, listener: Listener) {
        let mut subs = self.subscriptions.lock().unwrap();
        subs.entry(key.to_string()).or_default().push(listener);
    }

    /// Removes every registration under `key` whose listener is
    /// pointer-equal to `listener`.
    ///
    /// Removing a listener that is not registered is a no-op.
    pub fn unsubscribe(&self, key: &str, listener: &Listener) {
        let mut subs = self.subscriptions.lock().unwrap();
        if let Some(listeners) = subs.get_mut(key) {
            listeners.retain(|l| !Arc::ptr_eq(l, listener));
            if listeners.is_empty() {
                subs.remove(key);
            }
        }
    }

    /// Synchronously invokes, in registration order, every listener
    /// registered for `key` at the moment of the call.
    ///
    /// Dispatch runs against a snapshot taken under the lock, so a
    /// listener that subscribes or unsubscribes during dispatch does not
    /// affect the in-flight delivery. Listener panics are not caught.
    pub fn publish(&self, key: &str) {
        let snapshot: Vec<Listener> = {
            let subs = self.subscriptions.lock().unwrap();
            match subs.get(key) {
                Some(listeners) => listeners.clone(),
                None => return,
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!("publishing change for key '{}' to {} listener(s)", key, snapshot.len());

        for listener in snapshot {
            listener(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_listener(count: &Arc<AtomicUsize>) -> Listener {
        let count = Arc::clone(count);
        Arc::new(move |_key| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_publish_reaches_subscribed_listener() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("userData", counting_listener(&count));

        bus.publish("userData");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_publish_never_crosses_keys() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("a", counting_listener(&count));

        bus.publish("b");
        assert_eq!(count.load(Ordering::SeqCst), 0, "listener on 'a' must not see 'b'");
    }

    #[test]
    fn test_listener_receives_the_published_key() {
        let bus = ChangeBus::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.subscribe(
            "userData",
            Arc::new(move |key| seen_clone.lock().unwrap().push(key.to_string())),
        );

        bus.publish("userData");
        assert_eq!(*seen.lock().unwrap(), vec!["userData".to_string()]);
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let bus = ChangeBus::new();
        let order: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3u8 {
            let order = Arc::clone(&order);
            bus.subscribe("k", Arc::new(move |_| order.lock().unwrap().push(n)));
        }

        bus.publish("k");
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_registrations_both_fire() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = counting_listener(&count);
        bus.subscribe("k", listener.clone());
        bus.subscribe("k", listener);

        bus.publish("k");
        assert_eq!(count.load(Ordering::SeqCst), 2, "no dedup: both entries fire");
    }

    #[test]
    fn test_unsubscribe_removes_all_pointer_equal_entries() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = counting_listener(&count);
        bus.subscribe("k", listener.clone());
        bus.subscribe("k", listener.clone());

        bus.unsubscribe("k", &listener);
        bus.publish("k");
        assert_eq!(
            count.load(Ordering::SeqCst),
            0,
            "unsubscribe removes every entry for the listener, not just one"
        );
    }

    #[test]
    fn test_unsubscribe_leaves_other_listeners_intact() {
        let bus = ChangeBus::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let kept = Arc::new(AtomicUsize::new(0));
        let removed_listener = counting_listener(&removed);
        bus.subscribe("k", removed_listener.clone());
        bus.subscribe("k", counting_listener(&kept));

        bus.unsubscribe("k", &removed_listener);
        bus.publish("k");
        assert_eq!(removed.load(Ordering::SeqCst), 0);
        assert_eq!(kept.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_listener_is_noop() {
        let bus = ChangeBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("k", counting_listener(&count));

        let stranger: Listener = Arc::new(|_| {});
        bus.unsubscribe("k", &stranger);
        bus.unsubscribe("other", &stranger);

        bus.publish("k");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_subscribed_during_dispatch_misses_the_in_flight_publish() {
        let bus = ChangeBus::new();
        let late_count = Arc::new(AtomicUsize::new(0));
        let late = counting_listener(&late_count);

        let bus_clone = bus.clone();
        bus.subscribe(
            "k",
            Arc::new(move |key| {
                bus_clone.subscribe(key, late.clone());
            }),
        );

        bus.publish("k");
        assert_eq!(
            late_count.load(Ordering::SeqCst),
            0,
            "delivery targets the set subscribed at the moment of publish"
        );

        bus.publish("k");
        assert_eq!(late_count.load(Ordering::SeqCst), 1, "but the next publish reaches it");
    }
}
