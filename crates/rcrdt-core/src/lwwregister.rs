//! Last-Write-Wins (LWW) Register CRDT
//!
//! Always retains the value with the highest timestamp. In case of a tie,
//! the node with the highest `NodeId` wins. This carries no per-node
//! bookkeeping once a write lands, so unlike `OrSet` it does not implement
//! `RemovedNodePruning` — there is nothing to rewrite when a node leaves.

use crate::crdt::Crdt;
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LwwRegister<T: Ord + Clone> {
    value: Option<T>,
    timestamp: u64,
    writer: Option<NodeId>,
}

impl<T: Ord + Clone> LwwRegister<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            timestamp: 0,
            writer: None,
        }
    }

    /// Set a new value with the given timestamp, tie-breaking on `writer`.
    pub fn set(&mut self, value: T, timestamp: u64, writer: NodeId) {
        let wins = match self.writer.as_ref() {
            None => true,
            Some(current_writer) => {
                timestamp > self.timestamp
                    || (timestamp == self.timestamp && &writer >= current_writer)
            }
        };
        if wins {
            self.value = Some(value);
            self.timestamp = timestamp;
            self.writer = Some(writer);
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn writer(&self) -> Option<&NodeId> {
        self.writer.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

impl<T: Ord + Clone> Default for LwwRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> Crdt for LwwRegister<T> {
    fn bottom() -> Self {
        Self::new()
    }

    /// Keep the value with the highest `(timestamp, writer)` pair; the
    /// bottom element (no writer yet) always loses.
    fn merge(&self, other: &Self) -> Self {
        let self_wins = match (&self.writer, &other.writer) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(sw), Some(ow)) => match self.timestamp.cmp(&other.timestamp) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => sw >= ow,
            },
        };

        if self_wins {
            self.clone()
        } else {
            other.clone()
        }
    }

    fn shape(&self) -> &'static str {
        "lwwregister"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    #[test]
    fn higher_timestamp_wins() {
        let mut reg: LwwRegister<i32> = LwwRegister::new();
        reg.set(10, 100, node("n1"));
        reg.set(20, 200, node("n2"));
        assert_eq!(reg.get(), Some(&20));
        reg.set(30, 150, node("n1"));
        assert_eq!(reg.get(), Some(&20));
    }

    #[test]
    fn tie_breaks_on_writer() {
        let mut reg: LwwRegister<i32> = LwwRegister::new();
        reg.set(10, 100, node("n1"));
        reg.set(20, 100, node("n2"));
        assert_eq!(reg.get(), Some(&20));
        reg.set(30, 100, node("n1"));
        assert_eq!(reg.get(), Some(&20));
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a: LwwRegister<i32> = LwwRegister::new();
        a.set(10, 100, node("n1"));
        let mut b: LwwRegister<i32> = LwwRegister::new();
        b.set(20, 150, node("n2"));
        let mut c: LwwRegister<i32> = LwwRegister::new();
        c.set(30, 120, node("n3"));

        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn bottom_is_merge_identity() {
        let mut a: LwwRegister<i32> = LwwRegister::new();
        a.set(42, 100, node("n1"));
        assert_eq!(a.merge(&LwwRegister::bottom()), a);
    }
}
