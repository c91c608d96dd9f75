//! The replication envelope: a CRDT payload plus the per-node pruning
//! metadata that rides alongside it.

use crate::pruning::PruningState;
use rcrdt_core::{Crdt, NodeId, RemovedNodePruning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<V> {
    pub data: V,
    pub pruning: BTreeMap<NodeId, PruningState>,
}

impl<V: Crdt + RemovedNodePruning> Envelope<V> {
    pub fn new(data: V) -> Self {
        Self {
            data,
            pruning: BTreeMap::new(),
        }
    }

    /// Join `data` via the capability merge and `pruning` pointwise, key by
    /// key, per §3.2. Every node whose joined pruning state comes out
    /// `Performed` gets `pruning_cleanup` applied to the merged data so a
    /// stale peer's still-`Init` envelope can never resurrect a pruned
    /// node's traces into `data`.
    pub fn merge(&self, other: &Self) -> Self {
        let mut data = self.data.merge(&other.data);

        let mut pruning = self.pruning.clone();
        for (node, state) in &other.pruning {
            pruning
                .entry(node.clone())
                .and_modify(|existing| *existing = existing.merge(state))
                .or_insert_with(|| state.clone());
        }

        for (node, state) in &pruning {
            if state.is_performed() {
                data = data.pruning_cleanup(node);
            }
        }

        Self { data, pruning }
    }

    /// Insert `Init` pruning state for `node` if absent, or if `owner` is
    /// lexicographically lesser than the existing owner (an explicit,
    /// semilattice-legal overwrite by a newer leader).
    pub fn init_pruning(&mut self, node: NodeId, owner: NodeId) {
        match self.pruning.get(&node) {
            None => {
                self.pruning.insert(node, PruningState::init(owner));
            }
            Some(existing) if owner < existing.owner => {
                self.pruning.insert(node, PruningState::init(owner));
            }
            Some(_) => {}
        }
    }

    /// Replace `data` with its pruned form. Only valid while `pruning[node]`
    /// is still `Init`; a caller must check that before calling this.
    pub fn prune(&mut self, node: &NodeId, performer: &NodeId) {
        self.data = self.data.prune(node, performer);
    }

    /// Record that `self_id` has observed the prune for `node`. Does not
    /// itself decide the `Init` → `Performed` transition — that is the
    /// pruning controller's call once `seen` covers the full peer set.
    pub fn add_seen(&mut self, node: &NodeId, self_id: &NodeId) {
        if let Some(state) = self.pruning.get(node) {
            if state.is_init() {
                let updated = state.with_seen(self_id);
                self.pruning.insert(node.clone(), updated);
            }
        }
    }

    /// Strip pruning metadata for `node` and clean up any remaining
    /// per-node bookkeeping in `data`. Used by Pruning Controller Phase C.
    pub fn tombstone(&mut self, node: &NodeId) {
        self.pruning.remove(node);
        self.data = self.data.pruning_cleanup(node);
    }

    /// Remove pruning entries for nodes already fully tombstoned locally,
    /// before merging an incoming envelope — this is what makes late
    /// gossip absorption of a pruned node's stale metadata a no-op.
    pub fn strip_tombstoned(&self, tombstoned: &std::collections::BTreeSet<NodeId>) -> Self {
        Self {
            data: self.data.clone(),
            pruning: self
                .pruning
                .iter()
                .filter(|(node, _)| !tombstoned.contains(node))
                .map(|(node, state)| (node.clone(), state.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcrdt_core::value::CrdtValue;
    use rcrdt_core::GCounter;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    fn counter_value(node_addr: &str, n: u64) -> CrdtValue {
        let mut c = GCounter::new();
        c.increment(&node(node_addr), n);
        CrdtValue::GCounter(c)
    }

    #[test]
    fn merge_joins_data_and_pruning_pointwise() {
        let mut a = Envelope::new(counter_value("n1", 3));
        a.init_pruning(node("dead"), node("leader1"));

        let b = Envelope::new(counter_value("n2", 4));

        let merged = a.merge(&b);
        match merged.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 7),
            _ => panic!("wrong variant"),
        }
        assert!(merged.pruning.contains_key(&node("dead")));
    }

    #[test]
    fn init_pruning_overwritten_by_lexicographically_lesser_owner() {
        let mut e = Envelope::new(counter_value("n1", 1));
        e.init_pruning(node("dead"), node("z-leader"));
        e.init_pruning(node("dead"), node("a-leader"));
        assert_eq!(e.pruning[&node("dead")].owner, node("a-leader"));
    }

    #[test]
    fn init_pruning_does_not_overwrite_lexicographically_greater_owner() {
        let mut e = Envelope::new(counter_value("n1", 1));
        e.init_pruning(node("dead"), node("a-leader"));
        e.init_pruning(node("dead"), node("z-leader"));
        assert_eq!(e.pruning[&node("dead")].owner, node("a-leader"));
    }

    #[test]
    fn add_seen_accumulates_until_controller_promotes() {
        let mut e = Envelope::new(counter_value("n1", 1));
        e.init_pruning(node("dead"), node("leader1"));
        e.add_seen(&node("dead"), &node("n1"));
        e.add_seen(&node("dead"), &node("n2"));
        assert!(e.pruning[&node("dead")].is_init());
    }

    #[test]
    fn tombstone_strips_pruning_and_cleans_data() {
        let mut e = Envelope::new(CrdtValue::OrSet(Default::default()));
        e.init_pruning(node("dead"), node("leader1"));
        e.tombstone(&node("dead"));
        assert!(!e.pruning.contains_key(&node("dead")));
    }

    #[test]
    fn merge_cleans_up_data_for_entries_joined_as_performed() {
        use rcrdt_core::{OrSet, RemovedNodePruning};

        let dead = node("dead");
        let mut live: OrSet<String> = OrSet::new();
        live.add(&node("n1"), "kept".to_string());
        live.add(&dead, "stale".to_string());
        live.remove(&"stale".to_string());

        let mut local = Envelope::new(CrdtValue::OrSet(live));
        local
            .pruning
            .insert(dead.clone(), PruningState::performed(node("leader1")));

        // A stale peer still thinks the prune is only Init and gossips in
        // an envelope whose data still carries `dead`'s tombstoned tag.
        let mut stale_data: OrSet<String> = OrSet::new();
        stale_data.add(&node("n2"), "other".to_string());
        let mut incoming = Envelope::new(CrdtValue::OrSet(stale_data));
        incoming.init_pruning(dead.clone(), node("leader1"));
        incoming.pruning.insert(
            dead.clone(),
            incoming.pruning[&dead].with_seen(&node("n2")),
        );

        let merged = local.merge(&incoming);
        assert!(merged.pruning[&dead].is_performed());
        match merged.data {
            CrdtValue::OrSet(set) => assert!(!set.needs_pruning_from(&dead)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn strip_tombstoned_removes_stale_entries_before_merge() {
        let mut incoming = Envelope::new(counter_value("n1", 1));
        incoming.init_pruning(node("dead"), node("leader1"));

        let mut tombstoned = std::collections::BTreeSet::new();
        tombstoned.insert(node("dead"));

        let cleaned = incoming.strip_tombstoned(&tombstoned);
        assert!(!cleaned.pruning.contains_key(&node("dead")));
    }
}
