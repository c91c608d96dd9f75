//! Membership adapter and reachability clock.
//!
//! The peer set, leader identity, and the logical clock driving the
//! pruning controller are all derived from a small stream of cluster
//! signals rather than polled. The reachability clock is the
//! design-critical piece: it is a plain counter, never wall-clock time,
//! and it must not advance while any peer is unreachable — doing so during
//! a partition would let the pruning dissemination window expire while the
//! cluster cannot actually disseminate anything.

use rcrdt_core::{NodeAddr, NodeId};
use rcrdt_store::WatcherId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipEvent {
    MemberUp(NodeAddr),
    MemberRemoved(NodeId),
    Reachable(NodeAddr),
    Unreachable(NodeAddr),
    LeaderChanged {
        role: String,
        leader: Option<NodeAddr>,
    },
    /// A watcher's connection/session ended; every key it is subscribed to
    /// should drop its subscription. Not a membership transition in its own
    /// right, so it never advances the reachability clock — the engine
    /// intercepts this variant and routes it straight to the store instead
    /// of passing it through `Membership::apply`.
    WatcherTerminated(WatcherId),
}

pub struct Membership {
    self_addr: NodeAddr,
    role: String,
    peers: BTreeSet<NodeAddr>,
    unreachable: BTreeSet<NodeAddr>,
    leader: Option<NodeAddr>,
    /// Clock time at which each removed node was recorded gone.
    removed_nodes: BTreeMap<NodeId, u64>,
    clock: u64,
    /// Set once a `MemberRemoved` names this node's own address; the
    /// engine must stop accepting work from that point on.
    stopped: bool,
}

impl Membership {
    pub fn new(self_addr: NodeAddr, role: impl Into<String>) -> Self {
        Self {
            self_addr,
            role: role.into(),
            peers: BTreeSet::new(),
            unreachable: BTreeSet::new(),
            leader: None,
            removed_nodes: BTreeMap::new(),
            clock: 0,
            stopped: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn peers(&self) -> &BTreeSet<NodeAddr> {
        &self.peers
    }

    pub fn leader(&self) -> Option<&NodeAddr> {
        self.leader.as_ref()
    }

    pub fn is_self_leader(&self) -> bool {
        self.leader.as_ref() == Some(&self.self_addr)
    }

    pub fn removed_at(&self, node: &NodeId) -> Option<u64> {
        self.removed_nodes.get(node).copied()
    }

    pub fn removed_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.removed_nodes.keys()
    }

    /// Apply one membership event, advancing the reachability clock
    /// exactly once per call — and only when no peer is currently
    /// unreachable.
    pub fn apply(&mut self, event: MembershipEvent) {
        if self.stopped {
            return;
        }

        match event {
            MembershipEvent::MemberUp(addr) => {
                self.peers.insert(addr);
            }
            MembershipEvent::MemberRemoved(node) => {
                if node.addr() == &self.self_addr {
                    warn!(node = %node, "member-removed names self; stopping engine");
                    self.stopped = true;
                    return;
                }
                self.peers.remove(node.addr());
                self.removed_nodes.insert(node, self.clock);
            }
            MembershipEvent::Reachable(addr) => {
                self.unreachable.remove(&addr);
            }
            MembershipEvent::Unreachable(addr) => {
                self.unreachable.insert(addr);
            }
            MembershipEvent::LeaderChanged { role, leader } => {
                if role == self.role {
                    info!(?leader, "leader changed");
                    self.leader = leader;
                }
            }
            MembershipEvent::WatcherTerminated(_) => {
                // Handled by `Engine::apply_membership_event` before this
                // point is ever reached; a no-op here if called directly.
                return;
            }
        }

        if self.unreachable.is_empty() {
            self.clock += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(a: &str) -> NodeAddr {
        NodeAddr::new(a)
    }

    #[test]
    fn clock_advances_only_when_fully_reachable() {
        let mut m = Membership::new(addr("self"), "store");
        let before = m.clock();
        m.apply(MembershipEvent::Unreachable(addr("peer1")));
        assert_eq!(m.clock(), before);
        m.apply(MembershipEvent::MemberUp(addr("peer2")));
        assert_eq!(m.clock(), before);
        m.apply(MembershipEvent::Reachable(addr("peer1")));
        assert!(m.clock() > before);
    }

    #[test]
    fn member_removed_self_stops_engine() {
        let mut m = Membership::new(addr("self"), "store");
        m.apply(MembershipEvent::MemberRemoved(NodeId::from_addr(
            addr("self"),
            1,
        )));
        assert!(m.is_stopped());
    }

    #[test]
    fn leader_changed_scoped_to_role() {
        let mut m = Membership::new(addr("self"), "store");
        m.apply(MembershipEvent::LeaderChanged {
            role: "other-role".to_string(),
            leader: Some(addr("x")),
        });
        assert_eq!(m.leader(), None);

        m.apply(MembershipEvent::LeaderChanged {
            role: "store".to_string(),
            leader: Some(addr("self")),
        });
        assert!(m.is_self_leader());
    }

    #[test]
    fn member_removed_records_clock_time() {
        let mut m = Membership::new(addr("self"), "store");
        m.apply(MembershipEvent::MemberUp(addr("dead")));
        let removed = NodeId::from_addr(addr("dead"), 1);
        m.apply(MembershipEvent::MemberRemoved(removed.clone()));
        assert!(m.removed_at(&removed).is_some());
    }
}
