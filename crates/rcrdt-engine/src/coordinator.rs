//! Read and Write Coordinators.
//!
//! Both are short-lived tasks spawned whenever a request's consistency
//! level is not satisfied by the local copy alone. Each fans a message out
//! to every known peer, collects replies up to a 2s deadline, and lingers
//! for stragglers after the threshold is met rather than returning the
//! instant it is reached.

use crate::consistency::Consistency;
use crate::error::{EngineError, Result};
use crate::network::{Message, NetworkTransport, PeerId};
use crate::pending::PendingRequests;
use crate::stats::EngineStats;
use rcrdt_core::value::CrdtValue;
use rcrdt_envelope::Envelope;
use rcrdt_store::LocalStore;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

const LINGER: Duration = Duration::from_secs(2);

/// Read Coordinator (module `coordinator::read` in the design).
///
/// Reads locally, short-circuits if that alone satisfies `level`, otherwise
/// fans a `Read` out to every peer and merges replies as they arrive. Once
/// the threshold count of distinct replies (including the local read) has
/// merged, lingers for the remainder of the 2s deadline to drain stragglers,
/// then issues `ReadRepair` to any peer whose digest did not match.
#[tracing::instrument(skip_all, fields(key = %key, level = ?level))]
pub async fn read_coordinate<T: NetworkTransport>(
    store: &LocalStore,
    transport: &T,
    pending: &PendingRequests,
    peers: &[PeerId],
    key: &str,
    level: Consistency,
) -> Result<Envelope<CrdtValue>> {
    let local_entry = store.get(key);
    let threshold = level.threshold(peers.len())?;

    if level.is_local_only(peers.len()) {
        return local_entry
            .map(|e| e.envelope)
            .ok_or(EngineError::NotFound);
    }

    let request_id = pending.next_request_id();
    let mut rx = pending.register_read(request_id);

    for peer in peers {
        let _ = transport
            .send(
                peer,
                Message::Read {
                    request_id,
                    key: key.to_string(),
                },
            )
            .await;
    }

    let mut merged = local_entry.clone().map(|e| e.envelope);
    let mut seen: BTreeSet<PeerId> = BTreeSet::new();
    let mut stale_peers: Vec<PeerId> = Vec::new();

    // Collect until the threshold is reached, then linger for a further
    // LINGER window to absorb stragglers before the task exits.
    let mut deadline = tokio::time::Instant::now() + LINGER;
    let mut lingering = false;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some((from, reply_key, envelope))) if reply_key == key => {
                seen.insert(from.clone());
                if let Some(incoming) = envelope {
                    let merged_next = match merged.take() {
                        Some(existing) => {
                            let before = digest_of(&existing);
                            let after = existing.merge(&incoming);
                            if digest_of(&after) != before {
                                stale_peers.push(from);
                            }
                            after
                        }
                        None => incoming,
                    };
                    merged = Some(merged_next);
                }
                if !lingering && seen.len() + 1 >= threshold {
                    lingering = true;
                    deadline = tokio::time::Instant::now() + LINGER;
                }
            }
            Ok(None) => break,
            _ => continue,
        }
    }
    pending.forget_read(request_id);

    let result = merged.ok_or(EngineError::NotFound)?;
    for peer in stale_peers {
        let _ = transport
            .send(
                &peer,
                Message::ReadRepair {
                    key: key.to_string(),
                    envelope: result.clone(),
                },
            )
            .await;
    }

    debug!(key, replies = seen.len(), "read coordinator finished");
    Ok(result)
}

fn digest_of(envelope: &Envelope<CrdtValue>) -> rcrdt_envelope::Sha1Digest {
    if envelope.data.is_deleted() {
        return rcrdt_envelope::Sha1Digest::EMPTY;
    }
    rcrdt_envelope::Sha1Digest::of(&serde_json::to_vec(&envelope.data).unwrap_or_default())
}

/// Write Coordinator (module `coordinator::write` in the design). Mirrors
/// the read coordinator: merges locally first, then fans `Write` out and
/// collects `WriteAck` until the threshold is reached, lingering for the
/// remainder of the 2s deadline.
#[tracing::instrument(skip_all, fields(key = %key, level = ?level))]
pub async fn write_coordinate<T: NetworkTransport>(
    transport: &T,
    pending: &PendingRequests,
    peers: &[PeerId],
    key: &str,
    envelope: Envelope<CrdtValue>,
    level: Consistency,
    stats: &EngineStats,
) -> Result<()> {
    let threshold = level.threshold(peers.len())?;
    stats.record_entry_stored();

    if level.is_local_only(peers.len()) {
        return Ok(());
    }

    let request_id = pending.next_request_id();
    let mut rx = pending.register_write(request_id);

    for peer in peers {
        let _ = transport
            .send(
                peer,
                Message::Write {
                    request_id,
                    key: key.to_string(),
                    envelope: envelope.clone(),
                },
            )
            .await;
    }

    let mut acked: BTreeSet<PeerId> = BTreeSet::new();
    let mut deadline = tokio::time::Instant::now() + LINGER;
    let mut lingering = false;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some((from, reply_key))) if reply_key == key => {
                acked.insert(from);
                if !lingering && acked.len() + 1 >= threshold {
                    lingering = true;
                    deadline = tokio::time::Instant::now() + LINGER;
                }
            }
            Ok(None) => break,
            _ => continue,
        }
    }
    pending.forget_write(request_id);

    if acked.len() + 1 < threshold {
        return Err(EngineError::ReplicationUpdateFailure(format!(
            "only {} of {} required replicas acked",
            acked.len() + 1,
            threshold
        )));
    }

    debug!(key, acks = acked.len(), "write coordinator finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;
    use rcrdt_core::{GCounter, NodeId};

    fn counter_envelope(n: u64) -> Envelope<CrdtValue> {
        let mut c = GCounter::new();
        c.increment(&NodeId::new("n1", 1), n);
        Envelope::new(CrdtValue::GCounter(c))
    }

    #[tokio::test]
    async fn read_coordinate_short_circuits_on_one() {
        let store = LocalStore::new();
        store.set("k", counter_envelope(3));
        let transport = MemoryTransport::new(PeerId::new("self"));
        let pending = PendingRequests::default();

        let result = read_coordinate(&store, &transport, &pending, &[], "k", Consistency::One)
            .await
            .unwrap();
        match result.data {
            CrdtValue::GCounter(c) => assert_eq!(c.value(), 3),
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn read_coordinate_fails_not_found_with_no_peers() {
        let store = LocalStore::new();
        let transport = MemoryTransport::new(PeerId::new("self"));
        let pending = PendingRequests::default();

        let result = read_coordinate(&store, &transport, &pending, &[], "missing", Consistency::One)
            .await;
        assert!(matches!(result, Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn write_coordinate_succeeds_when_peer_acks() {
        let transport_a = MemoryTransport::new(PeerId::new("a"));
        let transport_b = MemoryTransport::new(PeerId::new("b"));
        transport_a.connect_to(&transport_b);

        let mut rx_b = transport_b.subscribe();
        tokio::spawn(async move {
            if let Some((from, Message::Write { request_id, key, .. })) = rx_b.recv().await {
                let _ = transport_b
                    .send(&from, Message::WriteAck { request_id, key })
                    .await;
            }
        });

        let pending = PendingRequests::default();
        let peers = vec![PeerId::new("b")];
        let stats = EngineStats::default();

        let result = write_coordinate(
            &transport_a,
            &pending,
            &peers,
            "k",
            counter_envelope(1),
            Consistency::Two,
            &stats,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn write_coordinate_fails_when_no_peer_responds() {
        let transport_a = MemoryTransport::new(PeerId::new("a"));
        let transport_b = MemoryTransport::new(PeerId::new("b"));
        transport_a.connect_to(&transport_b);

        let pending = PendingRequests::default();
        let peers = vec![PeerId::new("b")];
        let stats = EngineStats::default();

        let result = write_coordinate(
            &transport_a,
            &pending,
            &peers,
            "k",
            counter_envelope(1),
            Consistency::Two,
            &stats,
        )
        .await;
        assert!(matches!(result, Err(EngineError::ReplicationUpdateFailure(_))));
    }
}
