//! The CRDT capability trait — the mathematical foundation every payload
//! stored in an envelope must satisfy.
//!
//! A join-semilattice (S, ⊔) satisfies:
//! - Commutativity: a ⊔ b = b ⊔ a
//! - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
//! - Idempotence:    a ⊔ a = a
//!
//! These properties guarantee convergence regardless of message order.

use crate::ids::NodeId;
use std::cmp::Ordering;

/// A small, stable tag identifying the logical shape of a payload. Two
/// values with different shapes are never merged directly — callers must
/// check `shape()` equality before calling `merge`, and handle a mismatch
/// as a conflicting-type condition rather than attempt to join.
pub type Shape = &'static str;

/// The core CRDT capability. Every value stored behind a key in the engine
/// implements this.
pub trait Crdt: Clone + PartialEq {
    /// The bottom element (identity for merge).
    fn bottom() -> Self;

    /// Merge (least upper bound). Must be commutative, associative, and
    /// idempotent for values of the same shape. Behavior when called on
    /// mismatched shapes is unspecified — callers must not do this; compare
    /// `shape()` first.
    fn merge(&self, other: &Self) -> Self;

    /// Discriminator used to detect when two values that are supposedly
    /// the same logical type are not actually mergeable.
    fn shape(&self) -> Shape;

    /// Partial order derived from merge: a ≤ b iff a ⊔ b = b.
    fn partial_cmp_lattice(&self, other: &Self) -> Option<Ordering> {
        let joined = self.merge(other);
        if &joined == self && &joined == other {
            Some(Ordering::Equal)
        } else if &joined == other {
            Some(Ordering::Less)
        } else if &joined == self {
            Some(Ordering::Greater)
        } else {
            None
        }
    }

    fn leq(&self, other: &Self) -> bool {
        matches!(
            self.partial_cmp_lattice(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }

    fn merge_assign(&mut self, other: &Self) {
        *self = self.merge(other);
    }
}

/// Optional capability: a payload that tracks per-node state (like an
/// OR-Set's tags) and therefore needs to participate in the removed-node
/// pruning protocol. Payloads that carry no per-node state (a plain
/// register, say) simply do not implement this.
pub trait RemovedNodePruning: Crdt {
    /// Does this value still hold state attributable to `node`?
    fn needs_pruning_from(&self, node: &NodeId) -> bool;

    /// Rewrite state owned by `node` as if it had been performed by
    /// `performer`. Only meaningful while the node's pruning state is
    /// still `Init` (see `rcrdt_envelope::PruningState`).
    fn prune(&self, node: &NodeId, performer: &NodeId) -> Self;

    /// Strip any remaining bookkeeping for `node` once it has been fully
    /// tombstoned. Unlike `prune`, this never changes observable value —
    /// it only reclaims space.
    fn pruning_cleanup(&self, node: &NodeId) -> Self;
}
