//! Grow-only Counter - each replica tracks its own monotonic contribution.
//!
//! The counter's value is the sum of every replica's local count. Merge is
//! a pointwise max, which keeps the per-replica counts monotonic and makes
//! the whole structure a join-semilattice.

use crate::crdt::Crdt;
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<NodeId, u64>,
}

impl GCounter {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }

    /// Add `amount` to this node's own contribution.
    pub fn increment(&mut self, node: &NodeId, amount: u64) {
        *self.counts.entry(node.clone()).or_insert(0) += amount;
    }

    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count_for(&self, node: &NodeId) -> u64 {
        self.counts.get(node).copied().unwrap_or(0)
    }
}

impl Crdt for GCounter {
    fn bottom() -> Self {
        Self::new()
    }

    fn merge(&self, other: &Self) -> Self {
        let mut counts = self.counts.clone();
        for (node, &count) in &other.counts {
            let entry = counts.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        Self { counts }
    }

    fn shape(&self) -> &'static str {
        "gcounter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    #[test]
    fn increment_accumulates_per_node() {
        let mut c = GCounter::new();
        c.increment(&node("a"), 3);
        c.increment(&node("a"), 4);
        assert_eq!(c.value(), 7);
    }

    #[test]
    fn merge_takes_max_per_node() {
        let mut a = GCounter::new();
        a.increment(&node("a"), 5);
        let mut b = GCounter::new();
        b.increment(&node("a"), 2);
        b.increment(&node("b"), 3);

        let merged = a.merge(&b);
        assert_eq!(merged.value(), 8);
        assert_eq!(merged.count_for(&node("a")), 5);
        assert_eq!(merged.count_for(&node("b")), 3);
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a = GCounter::new();
        a.increment(&node("a"), 5);
        let mut b = GCounter::new();
        b.increment(&node("b"), 7);
        let mut c = GCounter::new();
        c.increment(&node("c"), 2);

        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn bottom_is_merge_identity() {
        let mut a = GCounter::new();
        a.increment(&node("a"), 9);
        assert_eq!(a.merge(&GCounter::bottom()), a);
    }
}
