//! Status/pull anti-entropy: one random peer per tick, two message rounds.
//!
//! This is deliberately full-state rather than delta-state: each round
//! compares digests and pulls whole envelopes for the keys that turn out to
//! differ, a need/request/response/apply cycle rather than a delta-buffer
//! scheme.

use crate::message::GossipMessage;
use rcrdt_envelope::Sha1Digest;
use rcrdt_store::{Key, LocalStore};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::debug;

/// Pick one peer uniformly at random to gossip with this tick.
pub fn pick_peer<'a, A>(peers: &'a [A]) -> Option<&'a A> {
    peers.choose(&mut rand::thread_rng())
}

/// Build the `Status` message advertising every locally live key's digest.
pub fn build_status(store: &LocalStore) -> GossipMessage {
    GossipMessage::Status {
        digests: store.live_digests(),
    }
}

/// Given a peer's `Status`, compute the `Gossip` reply: envelopes for keys
/// the peer is missing entirely or has a stale digest for, in ascending key
/// order (deterministic), capped at `max_delta_elements`.
pub fn handle_status(
    store: &LocalStore,
    peer_digests: &BTreeMap<Key, Sha1Digest>,
    max_delta_elements: usize,
) -> GossipMessage {
    let local_digests = store.live_digests();

    let mut envelopes = BTreeMap::new();
    for (key, local_digest) in &local_digests {
        if envelopes.len() >= max_delta_elements {
            break;
        }
        let peer_has_current = peer_digests
            .get(key)
            .is_some_and(|peer_digest| peer_digest == local_digest);
        if peer_has_current {
            continue;
        }
        if let Some(entry) = store.get(key) {
            envelopes.insert(key.clone(), entry.envelope);
        }
    }

    debug!(sent = envelopes.len(), "gossip status resolved to pull reply");
    GossipMessage::Gossip { envelopes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcrdt_core::value::CrdtValue;
    use rcrdt_core::{GCounter, NodeId};
    use rcrdt_envelope::Envelope;

    fn counter(n: u64) -> Envelope<CrdtValue> {
        let mut c = GCounter::new();
        c.increment(&NodeId::new("n1", 1), n);
        Envelope::new(CrdtValue::GCounter(c))
    }

    #[test]
    fn status_lists_every_live_key_digest() {
        let store = LocalStore::new();
        store.set("a", counter(1));
        store.set("b", counter(2));

        match build_status(&store) {
            GossipMessage::Status { digests } => assert_eq!(digests.len(), 2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn handle_status_pulls_missing_and_stale_keys_only() {
        let store = LocalStore::new();
        store.set("missing_on_peer", counter(1));
        store.set("stale_on_peer", counter(5));
        store.set("up_to_date", counter(9));

        let mut peer_digests = BTreeMap::new();
        peer_digests.insert("stale_on_peer".to_string(), Sha1Digest::of(b"old"));
        peer_digests.insert(
            "up_to_date".to_string(),
            store.get("up_to_date").unwrap().digest,
        );

        match handle_status(&store, &peer_digests, 1000) {
            GossipMessage::Gossip { envelopes } => {
                assert!(envelopes.contains_key("missing_on_peer"));
                assert!(envelopes.contains_key("stale_on_peer"));
                assert!(!envelopes.contains_key("up_to_date"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn handle_status_respects_max_delta_elements() {
        let store = LocalStore::new();
        for i in 0..10 {
            store.set(format!("k{i}"), counter(i));
        }

        match handle_status(&store, &BTreeMap::new(), 3) {
            GossipMessage::Gossip { envelopes } => assert_eq!(envelopes.len(), 3),
            _ => panic!("wrong variant"),
        }
    }
}
