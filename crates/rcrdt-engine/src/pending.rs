//! Registry of in-flight peer requests awaiting replies.
//!
//! The engine task is the sole subscriber of a transport's incoming message
//! stream (`NetworkTransport::subscribe` may only be called once), so reply
//! dispatch to a coordinator task happens through this registry rather than
//! each coordinator holding its own receiver.

use crate::network::{Message, PeerId};
use parking_lot::Mutex;
use rcrdt_core::value::CrdtValue;
use rcrdt_envelope::Envelope;
use rcrdt_store::Key;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

pub type ReadReply = (PeerId, Key, Option<Envelope<CrdtValue>>);
pub type WriteReply = (PeerId, Key);

#[derive(Default)]
pub struct PendingRequests {
    next_id: AtomicU64,
    reads: Mutex<HashMap<u64, mpsc::UnboundedSender<ReadReply>>>,
    writes: Mutex<HashMap<u64, mpsc::UnboundedSender<WriteReply>>>,
}

impl PendingRequests {
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn register_read(&self, request_id: u64) -> mpsc::UnboundedReceiver<ReadReply> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reads.lock().insert(request_id, tx);
        rx
    }

    pub fn register_write(&self, request_id: u64) -> mpsc::UnboundedReceiver<WriteReply> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.writes.lock().insert(request_id, tx);
        rx
    }

    pub fn forget_read(&self, request_id: u64) {
        self.reads.lock().remove(&request_id);
    }

    pub fn forget_write(&self, request_id: u64) {
        self.writes.lock().remove(&request_id);
    }

    /// Route an inbound peer message to its pending coordinator, if any.
    /// Returns `true` if the message was a reply and has been routed.
    pub fn dispatch(&self, from: PeerId, message: &Message) -> bool {
        match message {
            Message::ReadResult {
                request_id,
                key,
                envelope,
            } => {
                if let Some(tx) = self.reads.lock().get(request_id) {
                    let _ = tx.send((from, key.clone(), envelope.clone()));
                    return true;
                }
                false
            }
            Message::WriteAck { request_id, key } => {
                if let Some(tx) = self.writes.lock().get(request_id) {
                    let _ = tx.send((from, key.clone()));
                    return true;
                }
                false
            }
            _ => false,
        }
    }
}
