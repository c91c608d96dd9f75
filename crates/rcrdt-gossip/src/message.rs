//! The gossip wire messages: `Status` advertises digests, `Gossip` answers
//! with the envelopes the recipient turned out to be missing or stale on.

use rcrdt_core::value::CrdtValue;
use rcrdt_envelope::{Envelope, Sha1Digest};
use rcrdt_store::Key;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GossipMessage {
    Status {
        digests: BTreeMap<Key, Sha1Digest>,
    },
    Gossip {
        envelopes: BTreeMap<Key, Envelope<CrdtValue>>,
    },
}
