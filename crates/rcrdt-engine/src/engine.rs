//! The per-node engine actor: client command surface and peer protocol
//! dispatch sitting on top of the store, coordinators, update pipeline,
//! gossip engine, and cluster membership/pruning.

use crate::config::EngineConfig;
use crate::consistency::Consistency;
use crate::coordinator::read_coordinate;
use crate::error::{EngineError, Result};
use crate::network::{Message, NetworkTransport, PeerId};
use crate::pending::PendingRequests;
use crate::pipeline::{self, incoming::apply_incoming, KeyLocks};
use crate::stats::{EngineStats, EngineStatsSnapshot};
use parking_lot::RwLock;
use rcrdt_cluster::{Membership, MembershipEvent, PruningController};
use rcrdt_core::value::CrdtValue;
use rcrdt_core::{NodeAddr, NodeId};
use rcrdt_envelope::Envelope;
use rcrdt_gossip::{build_status, handle_status, GossipMessage};
use rcrdt_store::{Key, LocalStore, SubscriberId, WatcherId};
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::warn;

/// Client-facing command surface (§6.1).
pub enum ClientCommand {
    Get {
        key: Key,
        level: Consistency,
    },
    GetKeys,
    Update {
        key: Key,
        level: Consistency,
        f: Box<dyn FnOnce(CrdtValue) -> std::result::Result<CrdtValue, String> + Send>,
    },
    Delete {
        key: Key,
        level: Consistency,
    },
    Subscribe {
        key: Key,
        watcher: WatcherId,
    },
    Unsubscribe {
        key: Key,
        id: SubscriberId,
    },
}

pub enum ClientReply {
    Value(Envelope<CrdtValue>),
    NotFound,
    DataDeleted,
    Keys(BTreeSet<Key>),
    UpdateOk,
    DeleteOk,
    Subscribed(SubscriberId, mpsc::UnboundedReceiver<rcrdt_envelope::Entry>),
    Unsubscribed,
    Error(EngineError),
}

/// The engine owns the local store, membership/pruning state, and the
/// transport used to talk to peers. One instance per node.
pub struct Engine<T: NetworkTransport> {
    self_id: NodeId,
    config: EngineConfig,
    transport: T,
    store: LocalStore,
    pending: PendingRequests,
    locks: KeyLocks,
    stats: EngineStats,
    membership: RwLock<Membership>,
    pruning: RwLock<PruningController>,
}

impl<T: NetworkTransport> Engine<T> {
    pub fn new(self_id: NodeId, config: EngineConfig, transport: T) -> Self {
        let role = config.role.clone();
        let max_pruning_dissemination = config.max_pruning_dissemination;
        Self {
            membership: RwLock::new(Membership::new(self_id.addr().clone(), role)),
            pruning: RwLock::new(PruningController::new(
                self_id.clone(),
                max_pruning_dissemination,
            )),
            self_id,
            config,
            transport,
            store: LocalStore::new(),
            pending: PendingRequests::default(),
            locks: KeyLocks::default(),
            stats: EngineStats::default(),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Mint a fresh watcher identity for a new subscriber session (e.g. one
    /// `Client` handle), to be reused across every key it subscribes to.
    pub fn new_watcher_id(&self) -> WatcherId {
        self.store.new_watcher_id()
    }

    pub fn stats(&self) -> EngineStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_stopped(&self) -> bool {
        self.membership.read().is_stopped()
    }

    pub fn is_tombstoned(&self, node: &NodeId) -> bool {
        self.pruning.read().tombstone_nodes().contains(node)
    }

    fn peer_ids(&self) -> Vec<PeerId> {
        self.membership
            .read()
            .peers()
            .iter()
            .map(|addr| PeerId::new(addr.0.clone()))
            .collect()
    }

    /// Feed a cluster signal (§6.4) into the membership adapter. A
    /// `WatcherTerminated` signal is routed straight to the store instead —
    /// it purges every key the watcher is subscribed to, in one call, and
    /// never touches the reachability clock.
    pub fn apply_membership_event(&self, event: MembershipEvent) {
        if let MembershipEvent::WatcherTerminated(watcher) = event {
            self.store.terminate_watcher(watcher);
            return;
        }
        self.membership.write().apply(event);
    }

    /// Handle one client command (§6.1).
    pub async fn handle_command(&self, cmd: ClientCommand) -> ClientReply {
        if self.is_stopped() {
            return ClientReply::Error(EngineError::InvalidUsage("engine stopped".to_string()));
        }

        match cmd {
            ClientCommand::Get { key, level } => {
                // Holds the same per-key lock an in-progress Update/Delete
                // holds, so a Get queues FIFO behind a quorum update on the
                // same key rather than racing it (§4.5).
                let _guard = self.locks.acquire(&key).await;
                let peers = self.peer_ids();
                match read_coordinate(&self.store, &self.transport, &self.pending, &peers, &key, level)
                    .await
                {
                    Ok(envelope) if envelope.data.is_deleted() => ClientReply::DataDeleted,
                    Ok(envelope) => ClientReply::Value(envelope),
                    Err(EngineError::NotFound) => ClientReply::NotFound,
                    Err(e) => ClientReply::Error(e),
                }
            }
            ClientCommand::GetKeys => {
                ClientReply::Keys(self.store.list_live_keys().into_iter().collect())
            }
            ClientCommand::Update { key, level, f } => {
                let peers = self.peer_ids();
                match pipeline::update(
                    &self.store,
                    &self.transport,
                    &self.pending,
                    &self.locks,
                    &peers,
                    &key,
                    level,
                    &self.stats,
                    f,
                )
                .await
                {
                    Ok(()) => ClientReply::UpdateOk,
                    Err(e) => ClientReply::Error(e),
                }
            }
            ClientCommand::Delete { key, level } => {
                let peers = self.peer_ids();
                match pipeline::delete(
                    &self.store,
                    &self.transport,
                    &self.pending,
                    &self.locks,
                    &peers,
                    &key,
                    level,
                    &self.stats,
                )
                .await
                {
                    Ok(()) => ClientReply::DeleteOk,
                    Err(e) => ClientReply::Error(e),
                }
            }
            ClientCommand::Subscribe { key, watcher } => {
                let (id, rx) = self.store.subscribe(key, watcher);
                ClientReply::Subscribed(id, rx)
            }
            ClientCommand::Unsubscribe { key, id } => {
                self.store.unsubscribe(&key, id);
                ClientReply::Unsubscribed
            }
        }
    }

    /// Handle one inbound peer protocol message (§6.2, §4.9).
    pub async fn handle_peer_message(&self, from: PeerId, message: Message) {
        if self.is_stopped() {
            return;
        }

        if self.pending.dispatch(from.clone(), &message) {
            return;
        }

        match message {
            Message::Read { request_id, key } => {
                let envelope = self.store.get(&key).map(|e| e.envelope);
                let _ = self
                    .transport
                    .send(
                        &from,
                        Message::ReadResult {
                            request_id,
                            key,
                            envelope,
                        },
                    )
                    .await;
            }
            Message::Write {
                request_id,
                key,
                envelope,
            } => {
                self.absorb(&key, envelope);
                let _ = self
                    .transport
                    .send(&from, Message::WriteAck { request_id, key })
                    .await;
            }
            Message::ReadRepair { key, envelope } => {
                self.absorb(&key, envelope);
                let _ = self
                    .transport
                    .send(&from, Message::ReadRepairAck { key })
                    .await;
            }
            Message::Status { digests } => {
                if let GossipMessage::Gossip { envelopes } =
                    handle_status(&self.store, &digests, self.config.max_delta_elements)
                {
                    self.stats.record_gossip_received();
                    let _ = self.transport.send(&from, Message::Gossip { envelopes }).await;
                }
            }
            Message::Gossip { envelopes } => {
                self.stats.record_gossip_received();
                for (key, envelope) in envelopes {
                    self.absorb(&key, envelope);
                }
            }
            Message::ReadResult { .. } | Message::WriteAck { .. } => {
                warn!("unmatched reply dropped");
            }
            Message::ReadRepairAck { .. } => {}
        }
    }

    /// Apply an incoming replication write (§4.9) and store the result.
    /// This is also the real-traffic driver for pruning Phase B: every node
    /// whose bookkeeping the merged envelope still carries gets an
    /// `observe_seen` call, so an ordinary gossip or write round promotes a
    /// key to `Performed` as soon as every live peer's envelope has echoed
    /// the prune back, with no separate echo message needed.
    fn absorb(&self, key: &str, envelope: Envelope<CrdtValue>) {
        let local = self.store.get(key);
        let tombstoned = self.pruning.read().tombstone_nodes().clone();
        if let Some(merged) = apply_incoming(local.as_ref(), envelope, &self.self_id, &tombstoned) {
            let pruning_nodes: Vec<NodeId> = merged.pruning.keys().cloned().collect();
            self.store.set(key.to_string(), merged);

            if !pruning_nodes.is_empty() {
                let membership = self.membership.read();
                let mut controller = self.pruning.write();
                for node in pruning_nodes {
                    controller.observe_seen(&self.store, &membership, key, &node, &self.self_id);
                }
            }
        }
    }

    /// One gossip tick (§4.6): pick a random peer and send a `Status`.
    pub async fn gossip_tick(&self) {
        let peers = self.peer_ids();
        if let Some(peer) = rcrdt_gossip::pick_peer(&peers) {
            if let GossipMessage::Status { digests } = build_status(&self.store) {
                self.stats.record_gossip_sent();
                let _ = self
                    .transport
                    .send(peer, Message::Status { digests })
                    .await;
            }
        }
    }

    /// One pruning tick: leader-only Phase A initialisation followed by
    /// Phase C tombstoning (§4.7). Phase B runs as replies arrive, via
    /// `observe_prune_seen`.
    pub fn pruning_tick(&self) {
        let membership = self.membership.read();
        let mut controller = self.pruning.write();
        controller.phase_a(&self.store, &membership);
        controller.phase_c(&self.store, &membership);
    }

    /// Record that `echo_from` has observed the prune for `node` on `key`
    /// (Phase B driver, §4.7).
    pub fn observe_prune_seen(&self, key: &str, node: &NodeId, echo_from: &NodeId) {
        let membership = self.membership.read();
        self.pruning
            .write()
            .observe_seen(&self.store, &membership, key, node, echo_from);
    }

    pub fn self_addr(&self) -> &NodeAddr {
        self.self_id.addr()
    }

    /// Spawn the engine's single subscription loop: every inbound peer
    /// message is dispatched to `handle_peer_message`. Must be called at
    /// most once per engine, since `NetworkTransport::subscribe` itself
    /// may only be called once.
    pub fn spawn_listener(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut rx = self.transport.subscribe();
        tokio::spawn(async move {
            while let Some((from, message)) = rx.recv().await {
                self.handle_peer_message(from, message).await;
            }
        })
    }

    /// Spawn periodic gossip and pruning ticks on `config.gossip_interval`
    /// and `config.pruning_interval`.
    pub fn spawn_ticks(self: std::sync::Arc<Self>) -> tokio::task::JoinHandle<()> {
        let gossip_interval = self.config.gossip_interval;
        let pruning_interval = self.config.pruning_interval;
        tokio::spawn(async move {
            let mut gossip_timer = tokio::time::interval(gossip_interval);
            let mut pruning_timer = tokio::time::interval(pruning_interval);
            loop {
                tokio::select! {
                    _ = gossip_timer.tick() => self.gossip_tick().await,
                    _ = pruning_timer.tick() => self.pruning_tick(),
                }
            }
        })
    }
}

pub type ClientCommandFn =
    Box<dyn FnOnce(CrdtValue) -> std::result::Result<CrdtValue, String> + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;

    fn config() -> EngineConfig {
        EngineConfig::builder("store").build()
    }

    #[tokio::test]
    async fn get_missing_key_returns_not_found() {
        let engine = Engine::new(
            NodeId::new("n1", 1),
            config(),
            MemoryTransport::new(PeerId::new("n1")),
        );

        let reply = engine
            .handle_command(ClientCommand::Get {
                key: "missing".to_string(),
                level: Consistency::One,
            })
            .await;
        assert!(matches!(reply, ClientReply::NotFound));
    }

    #[tokio::test]
    async fn update_then_get_round_trips_locally() {
        let engine = Engine::new(
            NodeId::new("n1", 1),
            config(),
            MemoryTransport::new(PeerId::new("n1")),
        );

        let reply = engine
            .handle_command(ClientCommand::Update {
                key: "counter".to_string(),
                level: Consistency::One,
                f: Box::new(|value| {
                    let mut c = match value {
                        CrdtValue::GCounter(c) => c,
                        _ => rcrdt_core::GCounter::new(),
                    };
                    c.increment(&NodeId::new("n1", 1), 1);
                    Ok(CrdtValue::GCounter(c))
                }),
            })
            .await;
        assert!(matches!(reply, ClientReply::UpdateOk));

        let reply = engine
            .handle_command(ClientCommand::Get {
                key: "counter".to_string(),
                level: Consistency::One,
            })
            .await;
        match reply {
            ClientReply::Value(envelope) => match envelope.data {
                CrdtValue::GCounter(c) => assert_eq!(c.value(), 1),
                _ => panic!("wrong variant"),
            },
            _ => panic!("expected Value"),
        }
    }

    #[tokio::test]
    async fn member_removed_self_stops_engine() {
        let engine = Engine::new(
            NodeId::new("n1", 1),
            config(),
            MemoryTransport::new(PeerId::new("n1")),
        );
        engine.apply_membership_event(MembershipEvent::MemberRemoved(NodeId::new("n1", 1)));

        let reply = engine
            .handle_command(ClientCommand::Get {
                key: "k".to_string(),
                level: Consistency::One,
            })
            .await;
        assert!(matches!(reply, ClientReply::Error(EngineError::InvalidUsage(_))));
    }

    #[tokio::test]
    async fn watcher_terminated_purges_every_subscribed_key() {
        let engine = Engine::new(
            NodeId::new("n1", 1),
            config(),
            MemoryTransport::new(PeerId::new("n1")),
        );
        let watcher = engine.new_watcher_id();

        let ClientReply::Subscribed(_id_a, mut rx_a) = engine
            .handle_command(ClientCommand::Subscribe {
                key: "a".to_string(),
                watcher,
            })
            .await
        else {
            panic!("expected Subscribed");
        };
        let ClientReply::Subscribed(_id_b, mut rx_b) = engine
            .handle_command(ClientCommand::Subscribe {
                key: "b".to_string(),
                watcher,
            })
            .await
        else {
            panic!("expected Subscribed");
        };

        engine.apply_membership_event(MembershipEvent::WatcherTerminated(watcher));

        engine.store().set("a", Envelope::new(CrdtValue::Deleted));
        engine.store().set("b", Envelope::new(CrdtValue::Deleted));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }
}
