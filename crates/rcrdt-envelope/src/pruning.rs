//! Per-node pruning state threaded through every envelope.
//!
//! `PruningState` is itself a small join-semilattice: `Performed` dominates
//! `Init`, two `Init` phases join by unioning their `seen` sets, and an
//! owner tie is broken by picking the lexicographically lesser `NodeId` —
//! this is what lets a newer leader reassert ownership of an in-flight
//! pruning round without losing already-recorded `seen` progress.

use rcrdt_core::{Crdt, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init { seen: BTreeSet<NodeId> },
    Performed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningState {
    pub owner: NodeId,
    pub phase: Phase,
}

impl PruningState {
    pub fn init(owner: NodeId) -> Self {
        Self {
            owner,
            phase: Phase::Init {
                seen: BTreeSet::new(),
            },
        }
    }

    pub fn is_init(&self) -> bool {
        matches!(self.phase, Phase::Init { .. })
    }

    pub fn is_performed(&self) -> bool {
        matches!(self.phase, Phase::Performed)
    }

    /// Record `self_id` as having observed the prune. Returns a new state;
    /// transitioning to `Performed` once `seen` covers the current peer set
    /// is the pruning controller's call (Phase B), not this method's.
    pub fn with_seen(&self, self_id: &NodeId) -> Self {
        match &self.phase {
            Phase::Init { seen } => {
                let mut seen = seen.clone();
                seen.insert(self_id.clone());
                Self {
                    owner: self.owner.clone(),
                    phase: Phase::Init { seen },
                }
            }
            Phase::Performed => self.clone(),
        }
    }

    pub fn performed(owner: NodeId) -> Self {
        Self {
            owner,
            phase: Phase::Performed,
        }
    }
}

impl Crdt for PruningState {
    fn bottom() -> Self {
        // There is no meaningful "no owner" pruning state; bottom is only
        // used as a merge identity and is never observed outside of it.
        Self::init(NodeId::new("", 0))
    }

    fn merge(&self, other: &Self) -> Self {
        match (&self.phase, &other.phase) {
            (Phase::Performed, _) | (_, Phase::Performed) => {
                let owner = self.owner.clone().min(other.owner.clone());
                Self::performed(owner)
            }
            (Phase::Init { seen: a }, Phase::Init { seen: b }) => Self {
                owner: self.owner.clone().min(other.owner.clone()),
                phase: Phase::Init {
                    seen: a.union(b).cloned().collect(),
                },
            },
        }
    }

    fn shape(&self) -> &'static str {
        "pruning-state"
    }
}
