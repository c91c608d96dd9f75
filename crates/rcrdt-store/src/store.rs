//! The local per-node key-value store.
//!
//! A plain map guarded by a single lock, with change notification fanned
//! out to per-key subscribers rather than a full-store broadcast.

use parking_lot::RwLock;
use rcrdt_core::value::CrdtValue;
use rcrdt_core::{NodeId, RemovedNodePruning};
use rcrdt_envelope::{Entry, Envelope};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub type Key = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

/// Identifies one logical watcher across every key it subscribes to, so a
/// single termination signal can purge all of them in one call instead of
/// one `unsubscribe` per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

struct Subscription {
    id: SubscriberId,
    watcher: WatcherId,
    sender: mpsc::UnboundedSender<Entry>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<Key, Entry>,
    subscribers: BTreeMap<Key, Vec<Subscription>>,
    /// Reverse index: every key a given watcher currently has a live
    /// subscription on.
    watcher_keys: BTreeMap<WatcherId, BTreeSet<Key>>,
}

/// Thread-safe handle to the local store. Cheap to clone; all clones share
/// the same underlying state.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<RwLock<Inner>>,
    next_subscriber_id: Arc<AtomicU64>,
    next_watcher_id: Arc<AtomicU64>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            next_subscriber_id: Arc::new(AtomicU64::new(0)),
            next_watcher_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Mint a fresh watcher identity, to be reused across every key a
    /// single logical watcher subscribes to.
    pub fn new_watcher_id(&self) -> WatcherId {
        WatcherId(self.next_watcher_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self, key: &str) -> Option<Entry> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Store `envelope` under `key`, recomputing its digest. Subscribers are
    /// notified only when the digest actually changed — applying an
    /// idempotent merge (the common case for gossip and read-repair) does
    /// not wake anyone up.
    pub fn set(&self, key: impl Into<Key>, envelope: Envelope<CrdtValue>) {
        let key = key.into();
        let entry = Entry::new(envelope);

        let mut inner = self.inner.write();
        let changed = inner
            .entries
            .get(&key)
            .map(|prior| prior.digest != entry.digest)
            .unwrap_or(true);

        inner.entries.insert(key.clone(), entry.clone());

        if changed {
            if let Some(subs) = inner.subscribers.get_mut(&key) {
                subs.retain(|sub| sub.sender.send(entry.clone()).is_ok());
            }
            debug!(key = %key, digest = %entry.digest, "local store entry changed");
        }
    }

    /// Keys whose current value is not the `Deleted` tombstone.
    pub fn list_live_keys(&self) -> Vec<Key> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.envelope.data.is_deleted())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Digests for every live key, used to build a gossip `Status` message.
    pub fn live_digests(&self) -> BTreeMap<Key, rcrdt_envelope::Sha1Digest> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| !entry.envelope.data.is_deleted())
            .map(|(key, entry)| (key.clone(), entry.digest))
            .collect()
    }

    /// Subscribe to mutations of `key` under `watcher`'s identity. If an
    /// entry already exists for `key`, it is sent on the new channel
    /// immediately, before this call returns — a watcher must not have to
    /// wait for the next mutation to learn the current value.
    pub fn subscribe(
        &self,
        key: impl Into<Key>,
        watcher: WatcherId,
    ) -> (SubscriberId, mpsc::UnboundedReceiver<Entry>) {
        let key = key.into();
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.inner.write();
        if let Some(existing) = inner.entries.get(&key) {
            let _ = tx.send(existing.clone());
        }
        inner
            .subscribers
            .entry(key.clone())
            .or_default()
            .push(Subscription { id, watcher, sender: tx });
        inner.watcher_keys.entry(watcher).or_default().insert(key);

        (id, rx)
    }

    /// Remove a subscriber registration in time proportional to the number
    /// of subscribers on `key`, never a full-store scan.
    pub fn unsubscribe(&self, key: &str, id: SubscriberId) {
        let mut inner = self.inner.write();
        let Some(subs) = inner.subscribers.get_mut(key) else {
            return;
        };
        let Some(pos) = subs.iter().position(|sub| sub.id == id) else {
            return;
        };
        let watcher = subs[pos].watcher;
        subs.remove(pos);

        if let Some(keys) = inner.watcher_keys.get_mut(&watcher) {
            keys.remove(key);
            if keys.is_empty() {
                inner.watcher_keys.remove(&watcher);
            }
        }
    }

    /// Remove every subscription a terminated watcher holds, across every
    /// key it is subscribed to, in time proportional to that watcher's own
    /// subscription count rather than a full-store scan.
    pub fn terminate_watcher(&self, watcher: WatcherId) {
        let mut inner = self.inner.write();
        let Some(keys) = inner.watcher_keys.remove(&watcher) else {
            return;
        };
        for key in keys {
            if let Some(subs) = inner.subscribers.get_mut(&key) {
                subs.retain(|sub| sub.watcher != watcher);
            }
        }
    }

    /// Apply removed-node pruning to every live key's envelope that still
    /// references `node`, handing each the node's pruning transition
    /// decided by the caller (Pruning Controller).
    pub fn keys_referencing(&self, node: &NodeId) -> Vec<Key> {
        self.inner
            .read()
            .entries
            .iter()
            .filter(|(_, entry)| entry.envelope.pruning.contains_key(node))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn needs_pruning(&self, key: &str, node: &NodeId) -> bool {
        self.inner
            .read()
            .entries
            .get(key)
            .map(|entry| entry.envelope.data.needs_pruning_from(node))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcrdt_core::GCounter;

    fn envelope_with(n: u64) -> Envelope<CrdtValue> {
        let mut c = GCounter::new();
        c.increment(&NodeId::new("n1", 1), n);
        Envelope::new(CrdtValue::GCounter(c))
    }

    #[test]
    fn get_returns_none_for_unknown_key() {
        let store = LocalStore::new();
        assert!(store.get("k").is_none());
    }

    #[test]
    fn set_then_get_roundtrips() {
        let store = LocalStore::new();
        store.set("k", envelope_with(3));
        let entry = store.get("k").unwrap();
        match entry.envelope.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 3),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn list_live_keys_excludes_deleted() {
        let store = LocalStore::new();
        store.set("live", envelope_with(1));
        store.set("gone", Envelope::new(CrdtValue::Deleted));

        let live = store.list_live_keys();
        assert_eq!(live, vec!["live".to_string()]);
    }

    #[tokio::test]
    async fn subscriber_receives_only_real_changes() {
        let store = LocalStore::new();
        let watcher = store.new_watcher_id();
        let (_id, mut rx) = store.subscribe("k", watcher);

        store.set("k", envelope_with(1));
        let first = rx.recv().await.unwrap();
        match first.envelope.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 1),
            _ => panic!("wrong variant"),
        }

        // Re-applying the identical envelope must not notify again.
        store.set("k", envelope_with(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_notifications() {
        let store = LocalStore::new();
        let watcher = store.new_watcher_id();
        let (id, mut rx) = store.subscribe("k", watcher);
        store.unsubscribe("k", id);

        store.set("k", envelope_with(1));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_delivers_existing_entry_immediately() {
        let store = LocalStore::new();
        store.set("k", envelope_with(5));

        let watcher = store.new_watcher_id();
        let (_id, mut rx) = store.subscribe("k", watcher);
        let first = rx.try_recv().unwrap();
        match first.envelope.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 5),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn subscribe_sends_nothing_immediately_for_missing_key() {
        let store = LocalStore::new();
        let watcher = store.new_watcher_id();
        let (_id, mut rx) = store.subscribe("k", watcher);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminate_watcher_purges_every_key_in_one_call() {
        let store = LocalStore::new();
        let watcher = store.new_watcher_id();
        let (_id_a, mut rx_a) = store.subscribe("a", watcher);
        let (_id_b, mut rx_b) = store.subscribe("b", watcher);

        store.terminate_watcher(watcher);

        store.set("a", envelope_with(1));
        store.set("b", envelope_with(1));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminate_watcher_does_not_affect_other_watchers_on_shared_key() {
        let store = LocalStore::new();
        let watcher_a = store.new_watcher_id();
        let watcher_b = store.new_watcher_id();
        let (_id_a, mut rx_a) = store.subscribe("k", watcher_a);
        let (_id_b, mut rx_b) = store.subscribe("k", watcher_b);

        store.terminate_watcher(watcher_a);
        store.set("k", envelope_with(1));

        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.recv().await.is_some());
    }
}
