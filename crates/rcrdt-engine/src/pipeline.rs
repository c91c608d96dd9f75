//! Update Pipeline: the only path by which a client's `Update`/`Delete`
//! command results in a local mutation, and the path by which peer-sourced
//! writes are absorbed into the local store.

use crate::consistency::Consistency;
use crate::coordinator::{read_coordinate, write_coordinate};
use crate::error::{EngineError, Result};
use crate::network::{NetworkTransport, PeerId};
use crate::pending::PendingRequests;
use crate::stats::EngineStats;
use parking_lot::Mutex;
use rcrdt_core::value::CrdtValue;
use rcrdt_core::Crdt;
use rcrdt_envelope::Envelope;
use rcrdt_store::{Key, LocalStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Serializes updates to the same key FIFO; distinct keys never block each
/// other.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Apply a client `Update(key, level, f)`. If `level` is `One`, merges `f`'s
/// result directly into the local envelope and replies synchronously.
/// Otherwise runs a Read Coordinator to establish a base, applies `f`, and
/// runs a Write Coordinator to propagate the result. Updates to the same key
/// queue FIFO via `locks`; there is no ordering guarantee across keys.
pub async fn update<T, F>(
    store: &LocalStore,
    transport: &T,
    pending: &PendingRequests,
    locks: &KeyLocks,
    peers: &[PeerId],
    key: &str,
    level: Consistency,
    stats: &EngineStats,
    f: F,
) -> Result<()>
where
    T: NetworkTransport,
    F: FnOnce(CrdtValue) -> std::result::Result<CrdtValue, String>,
{
    let _guard = locks.acquire(key).await;

    let base = if level.is_local_only(peers.len()) {
        store.get(key).map(|e| e.envelope)
    } else {
        match read_coordinate(store, transport, pending, peers, key, level).await {
            Ok(envelope) => Some(envelope),
            Err(EngineError::NotFound) => None,
            Err(e) => return Err(e),
        }
    };

    let base_value = base
        .as_ref()
        .map(|e| e.data.clone())
        .unwrap_or_else(CrdtValue::bottom);
    let base_shape = base.as_ref().map(|e| e.data.shape());

    if base_value.is_deleted() {
        return Err(EngineError::DataDeleted);
    }

    let updated_value = f(base_value).map_err(EngineError::ModifyFailure)?;

    if let Some(shape) = base_shape {
        if shape != updated_value.shape() {
            return Err(EngineError::ConflictingType {
                expected: shape,
                found: updated_value.shape(),
            });
        }
    }

    let mut envelope = base.unwrap_or_else(|| Envelope::new(CrdtValue::bottom()));
    envelope.data = updated_value;

    store.set(key.to_string(), envelope.clone());

    if level.is_local_only(peers.len()) {
        return Ok(());
    }

    write_coordinate(transport, pending, peers, key, envelope, level, stats)
        .await
        .map_err(|_| EngineError::ReplicationUpdateFailure(key.to_string()))
}

/// Apply a client `Delete(key, level)`: tombstones the key locally and
/// propagates via the write coordinator exactly like `update`.
pub async fn delete<T: NetworkTransport>(
    store: &LocalStore,
    transport: &T,
    pending: &PendingRequests,
    locks: &KeyLocks,
    peers: &[PeerId],
    key: &str,
    level: Consistency,
    stats: &EngineStats,
) -> Result<()> {
    let _guard = locks.acquire(key).await;

    let envelope = Envelope::new(CrdtValue::Deleted);
    store.set(key.to_string(), envelope.clone());
    stats.record_tombstone();

    if level.is_local_only(peers.len()) {
        return Ok(());
    }

    write_coordinate(transport, pending, peers, key, envelope, level, stats)
        .await
        .map_err(|_| EngineError::ReplicationDeleteFailure(key.to_string()))
}

pub mod incoming {
    //! Incoming replication write handling (`Write`, `ReadRepair`, `Gossip`).

    use rcrdt_core::value::CrdtValue;
    use rcrdt_core::NodeId;
    use rcrdt_envelope::{Entry, Envelope};
    use std::collections::BTreeSet;
    use tracing::warn;

    /// Applies `incoming` to `local` per the uniform replication-write rule:
    /// a `Deleted` local value absorbs nothing, a shape mismatch is logged
    /// and ignored, otherwise `local.merge(tombstone_cleanup(incoming))`
    /// followed by marking every pruning entry the result carries as seen by
    /// `self_id`. Returns `None` when the incoming envelope should be
    /// dropped without mutating the store.
    pub fn apply_incoming(
        local: Option<&Entry>,
        incoming: Envelope<CrdtValue>,
        self_id: &NodeId,
        tombstoned: &BTreeSet<NodeId>,
    ) -> Option<Envelope<CrdtValue>> {
        if let Some(entry) = local {
            if entry.envelope.data.is_deleted() {
                return None;
            }
            if entry.envelope.data.shape() != incoming.data.shape() {
                warn!(
                    local_shape = entry.envelope.data.shape(),
                    incoming_shape = incoming.data.shape(),
                    "dropping incoming envelope: shape mismatch"
                );
                return None;
            }
        }

        let cleaned = incoming.strip_tombstoned(tombstoned);
        let mut merged = match local {
            Some(entry) => entry.envelope.merge(&cleaned),
            None => cleaned,
        };

        let pruned_nodes: Vec<NodeId> = merged.pruning.keys().cloned().collect();
        for node in pruned_nodes {
            merged.add_seen(&node, self_id);
        }

        Some(merged)
    }
}
