//! In-memory observability counters for a single engine instance.
//!
//! Plain struct state, not an external metrics exporter: a `stats()` call on
//! the engine handle returns a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EngineStats {
    entries_stored: AtomicU64,
    tombstones: AtomicU64,
    gossip_rounds_sent: AtomicU64,
    gossip_rounds_received: AtomicU64,
    pruning_phase_a: AtomicU64,
    pruning_phase_b: AtomicU64,
    pruning_phase_c: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStatsSnapshot {
    pub entries_stored: u64,
    pub tombstones: u64,
    pub gossip_rounds_sent: u64,
    pub gossip_rounds_received: u64,
    pub pruning_phase_a: u64,
    pub pruning_phase_b: u64,
    pub pruning_phase_c: u64,
}

impl EngineStats {
    pub fn record_entry_stored(&self) {
        self.entries_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tombstone(&self) {
        self.tombstones.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gossip_sent(&self) {
        self.gossip_rounds_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gossip_received(&self) {
        self.gossip_rounds_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruning_phase_a(&self) {
        self.pruning_phase_a.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruning_phase_b(&self) {
        self.pruning_phase_b.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pruning_phase_c(&self) {
        self.pruning_phase_c.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStatsSnapshot {
        EngineStatsSnapshot {
            entries_stored: self.entries_stored.load(Ordering::Relaxed),
            tombstones: self.tombstones.load(Ordering::Relaxed),
            gossip_rounds_sent: self.gossip_rounds_sent.load(Ordering::Relaxed),
            gossip_rounds_received: self.gossip_rounds_received.load(Ordering::Relaxed),
            pruning_phase_a: self.pruning_phase_a.load(Ordering::Relaxed),
            pruning_phase_b: self.pruning_phase_b.load(Ordering::Relaxed),
            pruning_phase_c: self.pruning_phase_c.load(Ordering::Relaxed),
        }
    }
}
