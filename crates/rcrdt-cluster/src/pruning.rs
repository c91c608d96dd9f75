//! Three-phase removed-node pruning controller.
//!
//! Phase A (leader-only, initialisation) marks a long-gone node's state for
//! pruning across every key that still carries its per-node bookkeeping.
//! Phase B (perform) fires once every live peer has echoed back that it has
//! seen the prune for a key. Phase C (tombstone) retires the node entirely
//! once enough time has passed on the reachability clock for the prune to
//! have disseminated everywhere.
//!
//! The dissemination window (`max_pruning_dissemination`) is measured in
//! reachability-clock ticks here, not wall-clock seconds — the clock itself
//! only advances while the cluster is fully reachable, so a tick count is
//! the quantity that is actually meaningful to this controller.

use crate::membership::Membership;
use rcrdt_core::NodeId;
use rcrdt_envelope::PruningState;
use rcrdt_store::LocalStore;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub struct PruningController {
    self_id: NodeId,
    max_pruning_dissemination: u64,
    /// Clock time at which Phase B completed for a node (most recent key).
    pruning_performed: BTreeMap<NodeId, u64>,
    tombstone_nodes: BTreeSet<NodeId>,
}

impl PruningController {
    pub fn new(self_id: NodeId, max_pruning_dissemination: u64) -> Self {
        Self {
            self_id,
            max_pruning_dissemination,
            pruning_performed: BTreeMap::new(),
            tombstone_nodes: BTreeSet::new(),
        }
    }

    pub fn tombstone_nodes(&self) -> &BTreeSet<NodeId> {
        &self.tombstone_nodes
    }

    /// Phase A: leader-only initialisation. Runs once per tick over every
    /// membership-removed node old enough to disseminate, marking `Init`
    /// on every live key whose payload still references it.
    #[tracing::instrument(skip_all)]
    pub fn phase_a(&mut self, store: &LocalStore, membership: &Membership) {
        if !membership.is_self_leader() {
            return;
        }

        for node in membership.removed_nodes() {
            if self.tombstone_nodes.contains(node) {
                continue;
            }
            let Some(removed_at) = membership.removed_at(node) else {
                continue;
            };
            if membership.clock().saturating_sub(removed_at) <= self.max_pruning_dissemination {
                continue;
            }

            for key in store.list_live_keys() {
                if !store.needs_pruning(&key, node) {
                    continue;
                }
                if let Some(mut entry) = store.get(&key) {
                    entry.envelope.init_pruning(node.clone(), self.self_id.clone());
                    info!(%key, %node, "pruning phase A initialised");
                    store.set(key, entry.envelope);
                }
            }
        }
    }

    /// Phase B: called whenever a peer's echo brings a key's `seen` set up
    /// to date. Performs the prune once `seen` covers the whole peer set.
    #[tracing::instrument(skip(self, store, membership), fields(node = %node, echo_from = %echo_from))]
    pub fn observe_seen(
        &mut self,
        store: &LocalStore,
        membership: &Membership,
        key: &str,
        node: &NodeId,
        echo_from: &NodeId,
    ) {
        let Some(mut entry) = store.get(key) else {
            return;
        };
        entry.envelope.add_seen(node, echo_from);

        let seen_covers_peers = match entry.envelope.pruning.get(node) {
            Some(state) => match &state.phase {
                rcrdt_envelope::Phase::Init { seen } => membership
                    .peers()
                    .iter()
                    .all(|peer| seen.iter().any(|s| s.addr() == peer)),
                rcrdt_envelope::Phase::Performed => false,
            },
            None => false,
        };

        if seen_covers_peers {
            entry.envelope.prune(node, &self.self_id);
            entry
                .envelope
                .pruning
                .insert(node.clone(), PruningState::performed(self.self_id.clone()));
            self.pruning_performed
                .entry(node.clone())
                .and_modify(|t| *t = (*t).max(membership.clock()))
                .or_insert(membership.clock());
            debug!(%key, %node, "pruning phase B performed");
        }

        store.set(key.to_string(), entry.envelope);
    }

    /// Phase C: tombstone a node once its prune has had time to
    /// disseminate and every key that referenced it has moved past `Init`.
    #[tracing::instrument(skip_all)]
    pub fn phase_c(&mut self, store: &LocalStore, membership: &Membership) {
        let ready: Vec<NodeId> = self
            .pruning_performed
            .iter()
            .filter(|(_, &performed_at)| {
                membership.clock().saturating_sub(performed_at) > self.max_pruning_dissemination
            })
            .map(|(node, _)| node.clone())
            .collect();

        for node in ready {
            let keys = store.keys_referencing(&node);
            let all_past_init = keys.iter().all(|key| {
                store
                    .get(key)
                    .and_then(|entry| entry.envelope.pruning.get(&node).cloned())
                    .map(|state| state.is_performed())
                    .unwrap_or(true)
            });
            if !all_past_init {
                continue;
            }

            for key in &keys {
                if let Some(mut entry) = store.get(key) {
                    entry.envelope.tombstone(&node);
                    store.set(key.clone(), entry.envelope);
                }
            }
            self.tombstone_nodes.insert(node.clone());
            self.pruning_performed.remove(&node);
            info!(%node, "pruning phase C tombstoned node");
        }
    }
}
