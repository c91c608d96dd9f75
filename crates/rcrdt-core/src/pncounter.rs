//! PN-Counter (Positive-Negative Counter) CRDT
//!
//! Supports both increment and decrement by maintaining two `GCounter`s:
//! one for increments (p) and one for decrements (n). The value is p - n.

use crate::crdt::Crdt;
use crate::gcounter::GCounter;
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounter {
    p: GCounter,
    n: GCounter,
}

impl PnCounter {
    pub fn new() -> Self {
        Self {
            p: GCounter::new(),
            n: GCounter::new(),
        }
    }

    pub fn increment(&mut self, node: &NodeId, amount: u64) {
        self.p.increment(node, amount);
    }

    pub fn decrement(&mut self, node: &NodeId, amount: u64) {
        self.n.increment(node, amount);
    }

    pub fn value(&self) -> i64 {
        self.p.value() as i64 - self.n.value() as i64
    }
}

impl Crdt for PnCounter {
    fn bottom() -> Self {
        Self::new()
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            p: self.p.merge(&other.p),
            n: self.n.merge(&other.n),
        }
    }

    fn shape(&self) -> &'static str {
        "pncounter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    #[test]
    fn increment_and_decrement() {
        let mut c = PnCounter::new();
        c.increment(&node("n1"), 10);
        c.decrement(&node("n1"), 3);
        assert_eq!(c.value(), 7);
    }

    #[test]
    fn value_can_go_negative() {
        let mut c = PnCounter::new();
        c.decrement(&node("n1"), 5);
        assert_eq!(c.value(), -5);
    }

    #[test]
    fn merge_sums_contributions_per_node() {
        let mut a = PnCounter::new();
        a.increment(&node("n1"), 10);
        a.decrement(&node("n1"), 2);

        let mut b = PnCounter::new();
        b.increment(&node("n2"), 5);
        b.decrement(&node("n2"), 1);

        let merged = a.merge(&b);
        assert_eq!(merged.value(), 12);
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a = PnCounter::new();
        a.increment(&node("n1"), 5);
        let mut b = PnCounter::new();
        b.decrement(&node("n2"), 3);
        let mut c = PnCounter::new();
        c.increment(&node("n3"), 1);

        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
    }
}
