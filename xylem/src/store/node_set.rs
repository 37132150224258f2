// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Node sets and document sets
//!
//! A node set is an ordered-by-document-order collection of nodes. A
//! persistent node set is backed by the store: it carries a unique
//! identity and reads the store's mutation tick as its state counter, so
//! that `(identity, counter)` equality guarantees structural identity. An
//! in-memory node set is constructed ad hoc and is never optimized.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dom::{DocId, NodeId};

/// Identity of a persistent node set
///
/// Allocated from a store counter at creation. Two equal-content sets
/// built separately get distinct identities; a cache keyed on identity
/// then misses and re-checks, which is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeSetId(pub u64);

/// Scoping id threaded through structural joins and gateway lookups,
/// identifying the predicate context that requested them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// The documents contributing nodes to a node set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet(BTreeSet<DocId>);

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_docs(docs: impl IntoIterator<Item = DocId>) -> Self {
        Self(docs.into_iter().collect())
    }

    pub fn contains(&self, doc: DocId) -> bool {
        self.0.contains(&doc)
    }

    pub fn insert(&mut self, doc: DocId) {
        self.0.insert(doc);
    }

    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where a node set came from
#[derive(Debug, Clone)]
enum Provenance {
    /// Backed by the store; eligible for optimization
    Persistent {
        id: NodeSetId,
        tick: Arc<AtomicU64>,
    },
    /// Constructed ad hoc; never optimized
    InMemory,
}

/// An ordered-by-document-order collection of nodes
#[derive(Debug, Clone)]
pub struct NodeSet {
    nodes: Vec<NodeId>,
    docs: DocumentSet,
    provenance: Provenance,
}

impl NodeSet {
    pub(crate) fn persistent(
        mut nodes: Vec<NodeId>,
        id: NodeSetId,
        tick: Arc<AtomicU64>,
    ) -> Self {
        nodes.sort_unstable();
        nodes.dedup();
        let docs = DocumentSet::from_docs(nodes.iter().map(|n| n.doc));
        Self {
            nodes,
            docs,
            provenance: Provenance::Persistent { id, tick },
        }
    }

    /// Build an in-memory node set; it will never be optimized.
    pub fn in_memory(mut nodes: Vec<NodeId>) -> Self {
        nodes.sort_unstable();
        nodes.dedup();
        let docs = DocumentSet::from_docs(nodes.iter().map(|n| n.doc));
        Self {
            nodes,
            docs,
            provenance: Provenance::InMemory,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        matches!(self.provenance, Provenance::InMemory)
    }

    /// Identity of a persistent set; `None` for in-memory sets
    pub fn identity(&self) -> Option<NodeSetId> {
        match &self.provenance {
            Provenance::Persistent { id, .. } => Some(*id),
            Provenance::InMemory => None,
        }
    }

    /// Current state counter. Monotonically increasing; equal identity
    /// plus equal counter guarantees the set is structurally unchanged.
    pub fn state(&self) -> u64 {
        match &self.provenance {
            Provenance::Persistent { tick, .. } => tick.load(Ordering::Acquire),
            Provenance::InMemory => 0,
        }
    }

    /// Whether the underlying data has mutated since `counter` was read
    pub fn changed_since(&self, counter: u64) -> bool {
        self.state() != counter
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn document_set(&self) -> &DocumentSet {
        &self.docs
    }

    /// Nodes of this set that lie in `doc`, ascending by pre
    pub fn nodes_in_doc(&self, doc: DocId) -> &[NodeId] {
        let start = self.nodes.partition_point(|n| n.doc < doc);
        let end = self.nodes.partition_point(|n| n.doc <= doc);
        &self.nodes[start..end]
    }

    /// Derive a set with the same provenance-kind carrying `nodes`.
    /// A derived persistent set gets a fresh identity.
    pub(crate) fn derive(&self, nodes: Vec<NodeId>, next_id: impl FnOnce() -> NodeSetId) -> Self {
        match &self.provenance {
            Provenance::Persistent { tick, .. } => {
                Self::persistent(nodes, next_id(), Arc::clone(tick))
            }
            Provenance::InMemory => Self::in_memory(nodes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(doc: u32, pre: u32) -> NodeId {
        NodeId::new(DocId(doc), pre)
    }

    #[test]
    fn nodes_are_sorted_and_deduplicated() {
        let set = NodeSet::in_memory(vec![node(1, 5), node(0, 2), node(1, 5), node(0, 9)]);
        assert_eq!(set.nodes(), &[node(0, 2), node(0, 9), node(1, 5)]);
        assert_eq!(set.document_set().len(), 2);
    }

    #[test]
    fn in_memory_sets_have_no_identity() {
        let set = NodeSet::in_memory(vec![node(0, 1)]);
        assert!(set.is_in_memory());
        assert!(set.identity().is_none());
    }

    #[test]
    fn persistent_state_follows_the_tick() {
        let tick = Arc::new(AtomicU64::new(3));
        let set = NodeSet::persistent(vec![node(0, 1)], NodeSetId(7), Arc::clone(&tick));
        assert_eq!(set.identity(), Some(NodeSetId(7)));
        assert_eq!(set.state(), 3);
        assert!(!set.changed_since(3));
        tick.store(4, Ordering::Release);
        assert!(set.changed_since(3));
        assert_eq!(set.state(), 4);
    }

    #[test]
    fn nodes_in_doc_slices_by_document() {
        let set = NodeSet::in_memory(vec![node(0, 1), node(1, 2), node(1, 7), node(2, 0)]);
        assert_eq!(set.nodes_in_doc(DocId(1)), &[node(1, 2), node(1, 7)]);
        assert!(set.nodes_in_doc(DocId(3)).is_empty());
    }
}
