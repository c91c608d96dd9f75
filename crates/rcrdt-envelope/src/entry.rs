//! A local store entry: an envelope plus its cached content digest.

use crate::digest::Sha1Digest;
use crate::envelope::Envelope;
use rcrdt_core::value::CrdtValue;

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub envelope: Envelope<CrdtValue>,
    pub digest: Sha1Digest,
}

impl Entry {
    pub fn new(envelope: Envelope<CrdtValue>) -> Self {
        let digest = digest_of(&envelope.data);
        Self { envelope, digest }
    }

    /// Recompute the digest after `envelope.data` has changed. Cheap
    /// relative to serializing the whole store, since it touches only this
    /// entry.
    pub fn refresh_digest(&mut self) {
        self.digest = digest_of(&self.envelope.data);
    }
}

/// The digest is computed over a canonical encoding of the CRDT payload
/// alone; pruning metadata never affects it, since read-repair and gossip
/// diffing are about observable data convergence, not bookkeeping.
fn digest_of(data: &CrdtValue) -> Sha1Digest {
    if data.is_deleted() {
        return Sha1Digest::EMPTY;
    }
    let bytes = serde_json::to_vec(data).expect("CrdtValue always serializes");
    Sha1Digest::of(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcrdt_core::GCounter;

    #[test]
    fn deleted_value_digests_to_empty() {
        let entry = Entry::new(Envelope::new(CrdtValue::Deleted));
        assert_eq!(entry.digest, Sha1Digest::EMPTY);
    }

    #[test]
    fn identical_data_digests_identically() {
        let a = Entry::new(Envelope::new(CrdtValue::GCounter(GCounter::new())));
        let b = Entry::new(Envelope::new(CrdtValue::GCounter(GCounter::new())));
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn mutation_changes_digest() {
        let mut entry = Entry::new(Envelope::new(CrdtValue::GCounter(GCounter::new())));
        let before = entry.digest;

        let mut c = match entry.envelope.data.clone() {
            CrdtValue::GCounter(c) => c,
            _ => unreachable!(),
        };
        c.increment(&rcrdt_core::NodeId::new("n1", 1), 1);
        entry.envelope.data = CrdtValue::GCounter(c);
        entry.refresh_digest();

        assert_ne!(entry.digest, before);
    }
}
