//! `CrdtValue` — the concrete sum type stored behind every key.
//!
//! The local store needs one concrete storable type per key even though the
//! engine supports several logical CRDT shapes. `CrdtValue` is that type: a
//! closed enum over the payloads the engine knows about, dispatching
//! `Crdt` and `RemovedNodePruning` to whichever variant is active.
//!
//! `merge` on mismatched variants is a logic error in the caller: every
//! call site above this type must compare `shape()` first and treat a
//! mismatch as a conflicting-type condition, never call `merge` across
//! variants. When it happens anyway this falls back to keeping `self`
//! rather than panicking, since merge must remain total.

use crate::crdt::{Crdt, RemovedNodePruning};
use crate::gcounter::GCounter;
use crate::gset::GSet;
use crate::ids::NodeId;
use crate::lwwregister::LwwRegister;
use crate::orset::OrSet;
use crate::pncounter::PnCounter;
use serde::{Deserialize, Serialize};

/// Elements stored in set-shaped payloads. Kept as a plain string so the
/// enum itself stays free of extra type parameters.
pub type Element = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CrdtValue {
    GCounter(GCounter),
    PnCounter(PnCounter),
    GSet(GSet<Element>),
    OrSet(OrSet<Element>),
    LwwRegister(LwwRegister<Element>),
    /// Tombstone sentinel. Absorbs merges with any other value regardless
    /// of shape, and is permanent: nothing ever merges it back to a live
    /// value.
    Deleted,
}

impl CrdtValue {
    /// True for the variants that carry per-node bookkeeping and therefore
    /// participate in removed-node pruning.
    pub fn is_prunable(&self) -> bool {
        matches!(self, CrdtValue::OrSet(_))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, CrdtValue::Deleted)
    }
}

impl Crdt for CrdtValue {
    fn bottom() -> Self {
        CrdtValue::GCounter(GCounter::bottom())
    }

    fn merge(&self, other: &Self) -> Self {
        if self.is_deleted() || other.is_deleted() {
            return CrdtValue::Deleted;
        }
        match (self, other) {
            (CrdtValue::GCounter(a), CrdtValue::GCounter(b)) => CrdtValue::GCounter(a.merge(b)),
            (CrdtValue::PnCounter(a), CrdtValue::PnCounter(b)) => CrdtValue::PnCounter(a.merge(b)),
            (CrdtValue::GSet(a), CrdtValue::GSet(b)) => CrdtValue::GSet(a.merge(b)),
            (CrdtValue::OrSet(a), CrdtValue::OrSet(b)) => CrdtValue::OrSet(a.merge(b)),
            (CrdtValue::LwwRegister(a), CrdtValue::LwwRegister(b)) => {
                CrdtValue::LwwRegister(a.merge(b))
            }
            _ => self.clone(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            CrdtValue::GCounter(v) => v.shape(),
            CrdtValue::PnCounter(v) => v.shape(),
            CrdtValue::GSet(v) => v.shape(),
            CrdtValue::OrSet(v) => v.shape(),
            CrdtValue::LwwRegister(v) => v.shape(),
            CrdtValue::Deleted => "deleted",
        }
    }
}

impl RemovedNodePruning for CrdtValue {
    fn needs_pruning_from(&self, node: &NodeId) -> bool {
        match self {
            CrdtValue::OrSet(v) => v.needs_pruning_from(node),
            _ => false,
        }
    }

    fn prune(&self, node: &NodeId, performer: &NodeId) -> Self {
        match self {
            CrdtValue::OrSet(v) => CrdtValue::OrSet(v.prune(node, performer)),
            other => other.clone(),
        }
    }

    fn pruning_cleanup(&self, node: &NodeId) -> Self {
        match self {
            CrdtValue::OrSet(v) => CrdtValue::OrSet(v.pruning_cleanup(node)),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    #[test]
    fn same_shape_merges_normally() {
        let mut a = GCounter::new();
        a.increment(&node("n1"), 3);
        let mut b = GCounter::new();
        b.increment(&node("n2"), 4);

        let va = CrdtValue::GCounter(a);
        let vb = CrdtValue::GCounter(b);
        let merged = va.merge(&vb);
        assert_eq!(merged.shape(), "gcounter");
        match merged {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 7),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn mismatched_shape_does_not_panic() {
        let va = CrdtValue::GCounter(GCounter::new());
        let vb = CrdtValue::GSet(GSet::new());
        assert_ne!(va.shape(), vb.shape());
        let merged = va.merge(&vb);
        assert_eq!(merged.shape(), "gcounter");
    }

    #[test]
    fn only_orset_is_prunable() {
        assert!(CrdtValue::OrSet(OrSet::new()).is_prunable());
        assert!(!CrdtValue::GCounter(GCounter::new()).is_prunable());
        assert!(!CrdtValue::LwwRegister(LwwRegister::new()).is_prunable());
    }

    #[test]
    fn pruning_no_ops_on_non_prunable_variants() {
        let v = CrdtValue::LwwRegister(LwwRegister::<Element>::new());
        assert!(!v.needs_pruning_from(&node("n1")));
        assert_eq!(v.prune(&node("n1"), &node("n2")), v);
    }

    #[test]
    fn deleted_absorbs_any_merge() {
        let mut live = GCounter::new();
        live.increment(&node("n1"), 5);
        let live = CrdtValue::GCounter(live);

        assert_eq!(live.merge(&CrdtValue::Deleted), CrdtValue::Deleted);
        assert_eq!(CrdtValue::Deleted.merge(&live), CrdtValue::Deleted);
        assert_eq!(
            CrdtValue::Deleted.merge(&CrdtValue::Deleted),
            CrdtValue::Deleted
        );
    }
}
