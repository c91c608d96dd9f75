//! Observed-Remove Set (OR-Set / Add-Wins Set)
//!
//! Each add generates a unique tag scoped to the node that performed it.
//! Remove only removes currently observed tags. Concurrent add and remove
//! of the same element: add wins.
//!
//! Because every live element carries a per-node tag, an `ORSet` is the
//! natural payload that needs `RemovedNodePruning`: once a node is gone for
//! good, its tags have to be rewritten onto the node that performs the
//! prune so the set keeps shrinking instead of accumulating dead replicas'
//! tags forever.

use crate::crdt::{Crdt, RemovedNodePruning};
use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ulid::Ulid;

/// A unique tag for each add operation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// The node that created this tag.
    pub node: NodeId,
    /// Unique identifier for this specific add.
    pub unique_id: Ulid,
}

impl Tag {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            unique_id: Ulid::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrSet<T: Ord + Clone> {
    /// Maps elements to their active tags.
    entries: BTreeMap<T, BTreeSet<Tag>>,
    /// Tombstones: tags that have been removed.
    tombstones: BTreeSet<Tag>,
}

impl<T: Ord + Clone> OrSet<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            tombstones: BTreeSet::new(),
        }
    }

    /// Add an element with a new tag scoped to `node`.
    pub fn add(&mut self, node: &NodeId, value: T) {
        let tag = Tag::new(node.clone());
        self.entries.entry(value).or_default().insert(tag);
    }

    /// Remove all currently observed instances of an element.
    pub fn remove(&mut self, value: &T) {
        if let Some(tags) = self.entries.remove(value) {
            self.tombstones.extend(tags);
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.entries.get(value).is_some_and(|tags| !tags.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Ord + Clone> Default for OrSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> Crdt for OrSet<T> {
    fn bottom() -> Self {
        Self::new()
    }

    fn merge(&self, other: &Self) -> Self {
        let mut result = Self::new();

        // Tombstones first, so a concurrent add racing a remove of the same
        // tag is never resurrected below.
        result.tombstones = self.tombstones.union(&other.tombstones).cloned().collect();

        let all_keys: BTreeSet<_> = self
            .entries
            .keys()
            .chain(other.entries.keys())
            .cloned()
            .collect();

        for key in all_keys {
            let self_tags = self.entries.get(&key).cloned().unwrap_or_default();
            let other_tags = other.entries.get(&key).cloned().unwrap_or_default();

            let merged_tags: BTreeSet<Tag> = self_tags
                .union(&other_tags)
                .filter(|tag| !result.tombstones.contains(tag))
                .cloned()
                .collect();

            if !merged_tags.is_empty() {
                result.entries.insert(key, merged_tags);
            }
        }

        result
    }

    fn shape(&self) -> &'static str {
        "orset"
    }
}

impl<T: Ord + Clone> RemovedNodePruning for OrSet<T> {
    fn needs_pruning_from(&self, node: &NodeId) -> bool {
        self.entries
            .values()
            .flatten()
            .chain(self.tombstones.iter())
            .any(|tag| &tag.node == node)
    }

    /// Rewrite every tag owned by `node` as if `performer` had created it.
    /// The element set and tombstone set are unchanged in content, only the
    /// tag ownership moves.
    fn prune(&self, node: &NodeId, performer: &NodeId) -> Self {
        let rewrite = |tag: &Tag| -> Tag {
            if &tag.node == node {
                Tag {
                    node: performer.clone(),
                    unique_id: tag.unique_id,
                }
            } else {
                tag.clone()
            }
        };

        let entries = self
            .entries
            .iter()
            .map(|(value, tags)| (value.clone(), tags.iter().map(rewrite).collect()))
            .collect();
        let tombstones = self.tombstones.iter().map(rewrite).collect();

        Self {
            entries,
            tombstones,
        }
    }

    /// Drop tombstones owned by `node` once it is fully gone; live entries
    /// are untouched since dropping a tombstone never changes `contains`.
    fn pruning_cleanup(&self, node: &NodeId) -> Self {
        Self {
            entries: self.entries.clone(),
            tombstones: self
                .tombstones
                .iter()
                .filter(|tag| &tag.node != node)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(addr: &str) -> NodeId {
        NodeId::new(addr, 1)
    }

    #[test]
    fn add_wins_over_concurrent_remove() {
        let mut a = OrSet::new();
        a.add(&node("n1"), "x");

        let mut b = a.clone();
        b.remove(&"x");

        let mut c = a.clone();
        c.add(&node("n2"), "x");

        let merged = b.merge(&c);
        assert!(merged.contains(&"x"));
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a = OrSet::new();
        a.add(&node("n1"), 1);
        let mut b = OrSet::new();
        b.add(&node("n2"), 2);
        let mut c = OrSet::new();
        c.add(&node("n3"), 3);

        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn remove_then_merge_stays_removed() {
        let mut a = OrSet::new();
        a.add(&node("n1"), "x");
        a.remove(&"x");

        let b = OrSet::new();
        let merged = a.merge(&b);
        assert!(!merged.contains(&"x"));
    }

    #[test]
    fn needs_pruning_reflects_live_and_tombstoned_tags() {
        let mut a = OrSet::new();
        a.add(&node("n1"), "x");
        assert!(a.needs_pruning_from(&node("n1")));
        assert!(!a.needs_pruning_from(&node("n2")));

        a.remove(&"x");
        assert!(a.needs_pruning_from(&node("n1")));
    }

    #[test]
    fn prune_rewrites_ownership_without_changing_membership() {
        let mut a = OrSet::new();
        a.add(&node("n1"), "x");
        a.remove(&"x");
        a.add(&node("n1"), "y");

        let pruned = a.prune(&node("n1"), &node("n2"));
        assert!(!pruned.needs_pruning_from(&node("n1")));
        assert!(pruned.needs_pruning_from(&node("n2")));
        assert!(pruned.contains(&"y"));
        assert!(!pruned.contains(&"x"));
    }

    #[test]
    fn pruning_cleanup_drops_dead_tombstones_only() {
        let mut a = OrSet::new();
        a.add(&node("n1"), "x");
        a.remove(&"x");
        a.add(&node("n2"), "y");

        let cleaned = a.pruning_cleanup(&node("n1"));
        assert!(!cleaned.needs_pruning_from(&node("n1")));
        assert!(cleaned.contains(&"y"));
    }
}
