// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Document store
//!
//! Collections of documents with their structural and range indexes, the
//! global mutation tick, and the node-set services the query subsystem
//! and the optimizer are built on: axis primitives, structural joins,
//! document narrowing, and name-based gateway lookups.

pub mod collection;
pub mod errors;
pub mod node_set;

pub use collection::Collection;
pub use errors::StoreError;
pub use node_set::{ContextId, DocumentSet, NodeSet, NodeSetId};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::dom::{loader, DocId, Document, NameKind, NodeId, NodeKind, NodeRec};
use crate::index::{
    RangeIndexSpec, RangeKey, RangeOp, RangePostings, RangeType, StructuralTable, VerificationAxis,
};

/// Name of the collection holding engine metadata
pub const SYSTEM_COLLECTION: &str = "system";

struct DocEntry {
    doc: Document,
    structural: StructuralTable,
    range: RangePostings,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<String, Collection>,
    documents: HashMap<DocId, DocEntry>,
    next_doc: u32,
}

/// Counters for index usage, read by tests and the CLI
#[derive(Debug, Default)]
pub struct IndexStats {
    gateway_lookups: AtomicU64,
    range_queries: AtomicU64,
}

/// Snapshot of [`IndexStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatsSnapshot {
    pub gateway_lookups: u64,
    pub range_queries: u64,
}

/// Handle to the in-memory document store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
    /// Global mutation tick; every structural mutation increments it
    tick: Arc<AtomicU64>,
    nodeset_ids: Arc<AtomicU64>,
    stats: Arc<IndexStats>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty store with the system collection in place
    pub fn new() -> Self {
        let mut inner = StoreInner::default();
        inner.collections.insert(
            SYSTEM_COLLECTION.to_string(),
            Collection::new(SYSTEM_COLLECTION, true),
        );
        Self {
            inner: Arc::new(RwLock::new(inner)),
            tick: Arc::new(AtomicU64::new(0)),
            nodeset_ids: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(IndexStats::default()),
        }
    }

    /// Current value of the global mutation tick
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    fn bump_tick(&self) {
        self.tick.fetch_add(1, Ordering::AcqRel);
    }

    fn next_nodeset_id(&self) -> NodeSetId {
        NodeSetId(self.nodeset_ids.fetch_add(1, Ordering::Relaxed))
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    pub fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        info!("Creating collection '{}'", name);
        inner
            .collections
            .insert(name.to_string(), Collection::new(name, false));
        Ok(())
    }

    pub fn collection_names(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner.collections.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_system_collection(&self, name: &str) -> bool {
        self.inner
            .read()
            .collections
            .get(name)
            .map(|c| c.system)
            .unwrap_or(false)
    }

    /// The configured range index of one collection on `(kind, name)`
    pub fn collection_range_spec(
        &self,
        collection: &str,
        kind: NameKind,
        name: &str,
    ) -> Result<Option<RangeIndexSpec>, StoreError> {
        let inner = self.inner.read();
        let coll = inner
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        Ok(coll.range_index(kind, name).cloned())
    }

    /// Collection names contributing documents to `docs`, sorted, unique
    pub fn collections_of(&self, docs: &DocumentSet) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = docs
            .iter()
            .filter_map(|doc| inner.documents.get(&doc))
            .map(|entry| entry.doc.collection.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Configure (or replace) a range index and reindex the collection's
    /// documents
    pub fn configure_range_index(
        &self,
        collection: &str,
        kind: NameKind,
        name: &str,
        value_type: RangeType,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let coll = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        coll.set_range_index(kind, name, value_type);
        info!(
            "Configured {} range index on {} {} in '{}'",
            value_type, kind, name, collection
        );
        let specs = coll.range_indexes().to_vec();
        let docs = coll.docs.clone();
        for doc in docs {
            if let Some(entry) = inner.documents.get_mut(&doc) {
                entry.range = RangePostings::build(&entry.doc, &specs);
            }
        }
        Ok(())
    }

    /// Drop a range index configuration and reindex
    pub fn drop_range_index(
        &self,
        collection: &str,
        kind: NameKind,
        name: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let coll = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let dropped = coll.drop_range_index(kind, name);
        if dropped {
            let specs = coll.range_indexes().to_vec();
            let docs = coll.docs.clone();
            for doc in docs {
                if let Some(entry) = inner.documents.get_mut(&doc) {
                    entry.range = RangePostings::build(&entry.doc, &specs);
                }
            }
        }
        Ok(dropped)
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Parse and store an XML document; a structural mutation.
    pub fn load_document(
        &self,
        collection: &str,
        name: &str,
        xml: &str,
    ) -> Result<DocId, StoreError> {
        let mut inner = self.inner.write();
        if !inner.collections.contains_key(collection) {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        let id = DocId(inner.next_doc);
        inner.next_doc += 1;
        let doc = loader::parse_document(id, name, collection, xml)?;
        let structural = StructuralTable::build(&doc);
        let specs = inner.collections[collection].range_indexes().to_vec();
        let range = RangePostings::build(&doc, &specs);
        inner.documents.insert(
            id,
            DocEntry {
                doc,
                structural,
                range,
            },
        );
        if let Some(coll) = inner.collections.get_mut(collection) {
            coll.docs.push(id);
        }
        drop(inner);
        self.bump_tick();
        debug!("Loaded {} into '{}' as {}", name, collection, id);
        Ok(id)
    }

    /// Remove a document; a structural mutation.
    pub fn remove_document(&self, doc: DocId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let entry = inner
            .documents
            .remove(&doc)
            .ok_or(StoreError::DocumentNotFound(doc))?;
        if let Some(coll) = inner.collections.get_mut(&entry.doc.collection) {
            coll.docs.retain(|d| *d != doc);
        }
        drop(inner);
        self.bump_tick();
        debug!("Removed {}", doc);
        Ok(())
    }

    /// Replace an attribute's value in place and reindex the document;
    /// a structural mutation.
    pub fn update_attribute_value(&self, node: NodeId, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let collection = {
            let entry = inner
                .documents
                .get_mut(&node.doc)
                .ok_or(StoreError::DocumentNotFound(node.doc))?;
            let rec = entry
                .doc
                .node_mut(node.pre)
                .ok_or(StoreError::NodeNotFound(node))?;
            if rec.kind != NodeKind::Attribute {
                return Err(StoreError::NotAnAttribute(node));
            }
            rec.value = Some(value.to_string());
            entry.doc.collection.clone()
        };
        let specs = inner
            .collections
            .get(&collection)
            .map(|c| c.range_indexes().to_vec())
            .unwrap_or_default();
        if let Some(entry) = inner.documents.get_mut(&node.doc) {
            entry.range = RangePostings::build(&entry.doc, &specs);
        }
        drop(inner);
        self.bump_tick();
        debug!("Updated attribute {}", node);
        Ok(())
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn documents_in(&self, collection: &str) -> Result<Vec<DocId>, StoreError> {
        let inner = self.inner.read();
        let coll = inner
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        Ok(coll.docs.clone())
    }

    pub fn document_name(&self, doc: DocId) -> Option<String> {
        self.inner
            .read()
            .documents
            .get(&doc)
            .map(|e| e.doc.name.clone())
    }

    // ------------------------------------------------------------------
    // Node primitives
    // ------------------------------------------------------------------

    /// Clone of one node record
    pub fn node(&self, id: NodeId) -> Option<NodeRec> {
        let inner = self.inner.read();
        inner.documents.get(&id.doc)?.doc.node(id.pre).cloned()
    }

    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        let inner = self.inner.read();
        inner.documents.get(&id.doc)?.doc.node(id.pre).map(|r| r.kind)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        let inner = self.inner.read();
        let parent = inner.documents.get(&id.doc)?.doc.node(id.pre)?.parent?;
        Some(NodeId::new(id.doc, parent))
    }

    /// Child nodes (elements and text, not attributes), document order
    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        let Some(entry) = inner.documents.get(&id.doc) else {
            return Vec::new();
        };
        let Some(rec) = entry.doc.node(id.pre) else {
            return Vec::new();
        };
        let end = id.pre + rec.size;
        let mut out = Vec::new();
        for pre in (id.pre + 1)..=end {
            if let Some(child) = entry.doc.node(pre) {
                if child.parent == Some(id.pre) && child.kind != NodeKind::Attribute {
                    out.push(NodeId::new(id.doc, pre));
                }
            }
        }
        out
    }

    /// Attribute nodes of an element, document order
    pub fn attributes_of(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        let Some(entry) = inner.documents.get(&id.doc) else {
            return Vec::new();
        };
        let Some(rec) = entry.doc.node(id.pre) else {
            return Vec::new();
        };
        let end = id.pre + rec.size;
        let mut out = Vec::new();
        for pre in (id.pre + 1)..=end {
            if let Some(child) = entry.doc.node(pre) {
                if child.parent == Some(id.pre) && child.kind == NodeKind::Attribute {
                    out.push(NodeId::new(id.doc, pre));
                }
            }
        }
        out
    }

    /// Descendant nodes (elements and text, not attributes), document
    /// order, optionally including `id` itself
    pub fn descendants_of(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        let inner = self.inner.read();
        let Some(entry) = inner.documents.get(&id.doc) else {
            return Vec::new();
        };
        let Some(rec) = entry.doc.node(id.pre) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if include_self {
            out.push(id);
        }
        let end = id.pre + rec.size;
        for pre in (id.pre + 1)..=end {
            if let Some(node) = entry.doc.node(pre) {
                if node.kind != NodeKind::Attribute {
                    out.push(NodeId::new(id.doc, pre));
                }
            }
        }
        out
    }

    /// Ancestor chain from the parent upward, optionally starting at `id`
    pub fn ancestors_of(&self, id: NodeId, include_self: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        if include_self {
            out.push(id);
        }
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn string_value(&self, id: NodeId) -> String {
        let inner = self.inner.read();
        inner
            .documents
            .get(&id.doc)
            .map(|e| e.doc.string_value(id.pre))
            .unwrap_or_default()
    }

    /// True if `node` is a descendant of `ancestor` (or equal, when
    /// `or_self` is set)
    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId, or_self: bool) -> bool {
        if ancestor.doc != node.doc {
            return false;
        }
        let inner = self.inner.read();
        let Some(entry) = inner.documents.get(&ancestor.doc) else {
            return false;
        };
        if or_self {
            entry.doc.is_descendant_or_self(ancestor.pre, node.pre)
        } else {
            entry.doc.is_descendant(ancestor.pre, node.pre)
        }
    }

    // ------------------------------------------------------------------
    // Node sets
    // ------------------------------------------------------------------

    /// Wrap `nodes` as a persistent node set with a fresh identity
    pub fn make_node_set(&self, nodes: Vec<NodeId>) -> NodeSet {
        NodeSet::persistent(nodes, self.next_nodeset_id(), Arc::clone(&self.tick))
    }

    /// The document nodes of the named collections
    pub fn collection_node_set(&self, collections: &[&str]) -> Result<NodeSet, StoreError> {
        let mut nodes = Vec::new();
        {
            let inner = self.inner.read();
            for name in collections {
                let coll = inner
                    .collections
                    .get(*name)
                    .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))?;
                for doc in &coll.docs {
                    nodes.push(NodeId::new(*doc, 0));
                }
            }
        }
        Ok(self.make_node_set(nodes))
    }

    /// The document nodes of every non-system collection
    pub fn root_node_set(&self) -> NodeSet {
        let mut nodes = Vec::new();
        {
            let inner = self.inner.read();
            for coll in inner.collections.values() {
                if coll.system {
                    continue;
                }
                for doc in &coll.docs {
                    nodes.push(NodeId::new(*doc, 0));
                }
            }
        }
        self.make_node_set(nodes)
    }

    /// Restrict `set` to nodes of documents present in `docs`
    pub fn narrow_to_docs(&self, set: &NodeSet, docs: &DocumentSet) -> NodeSet {
        let nodes: Vec<NodeId> = set.iter().filter(|n| docs.contains(n.doc)).collect();
        set.derive(nodes, || self.next_nodeset_id())
    }

    /// Generic ancestor-descendant structural join: the nodes of
    /// `context` that have at least one node of `selection` in their
    /// subtree (or equal to them, with `include_self`).
    pub fn select_ancestor_descendant(
        &self,
        selection: &NodeSet,
        context: &NodeSet,
        include_self: bool,
        scope: ContextId,
    ) -> NodeSet {
        let mut out = Vec::new();
        {
            let inner = self.inner.read();
            for ctx in context.iter() {
                let Some(entry) = inner.documents.get(&ctx.doc) else {
                    continue;
                };
                let Some(rec) = entry.doc.node(ctx.pre) else {
                    continue;
                };
                let candidates = selection.nodes_in_doc(ctx.doc);
                let low = if include_self { ctx.pre } else { ctx.pre + 1 };
                let high = ctx.pre + rec.size;
                let start = candidates.partition_point(|n| n.pre < low);
                if start < candidates.len() && candidates[start].pre <= high {
                    out.push(ctx);
                }
            }
        }
        debug!(
            "structural join ({}): {} of {} context nodes kept",
            scope,
            out.len(),
            context.len()
        );
        context.derive(out, || self.next_nodeset_id())
    }

    /// Structural-index gateway lookup: nodes named `(kind, name)` that
    /// stand in `axis` relation to the candidate nodes, scoped to `docs`.
    pub fn find_by_name(
        &self,
        kind: NameKind,
        name: &str,
        axis: VerificationAxis,
        docs: &DocumentSet,
        candidates: &NodeSet,
        scope: ContextId,
    ) -> NodeSet {
        self.stats.gateway_lookups.fetch_add(1, Ordering::Relaxed);
        let mut out: Vec<NodeId> = Vec::new();
        {
            let inner = self.inner.read();
            for cand in candidates.iter() {
                if !docs.contains(cand.doc) {
                    continue;
                }
                let Some(entry) = inner.documents.get(&cand.doc) else {
                    continue;
                };
                let doc = &entry.doc;
                match axis {
                    VerificationAxis::SelfAxis => {
                        if doc.node(cand.pre).is_some_and(|r| r.is_named(kind, name)) {
                            out.push(cand);
                        }
                    }
                    VerificationAxis::Parent => {
                        if let Some(parent) = doc.node(cand.pre).and_then(|r| r.parent) {
                            if doc.node(parent).is_some_and(|r| r.is_named(kind, name)) {
                                out.push(NodeId::new(cand.doc, parent));
                            }
                        }
                    }
                    VerificationAxis::Ancestor | VerificationAxis::AncestorOrSelf => {
                        if axis == VerificationAxis::AncestorOrSelf
                            && doc.node(cand.pre).is_some_and(|r| r.is_named(kind, name))
                        {
                            out.push(cand);
                        }
                        let mut current = doc.node(cand.pre).and_then(|r| r.parent);
                        while let Some(pre) = current {
                            if doc.node(pre).is_some_and(|r| r.is_named(kind, name)) {
                                out.push(NodeId::new(cand.doc, pre));
                            }
                            current = doc.node(pre).and_then(|r| r.parent);
                        }
                    }
                }
            }
        }
        debug!(
            "gateway lookup {} {} via {:?} ({}): {} candidates -> {} nodes",
            kind,
            name,
            axis,
            scope,
            candidates.len(),
            out.len()
        );
        self.make_node_set(out)
    }

    // ------------------------------------------------------------------
    // Range lookups
    // ------------------------------------------------------------------

    /// Range-index query across the documents of `docs`
    pub fn range_query(
        &self,
        docs: &DocumentSet,
        kind: NameKind,
        name: &str,
        op: RangeOp,
        key: &RangeKey,
    ) -> Vec<NodeId> {
        self.stats.range_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        let mut out = Vec::new();
        for doc in docs.iter() {
            if let Some(entry) = inner.documents.get(&doc) {
                for pre in entry.range.query(kind, name, op, key) {
                    out.push(NodeId::new(doc, pre));
                }
            }
        }
        out
    }

    /// Range-index query against a single document
    pub fn range_lookup_doc(
        &self,
        doc: DocId,
        kind: NameKind,
        name: &str,
        op: RangeOp,
        key: &RangeKey,
    ) -> Vec<NodeId> {
        self.stats.range_queries.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        inner
            .documents
            .get(&doc)
            .map(|entry| {
                entry
                    .range
                    .query(kind, name, op, key)
                    .into_iter()
                    .map(|pre| NodeId::new(doc, pre))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Structural-index occurrence lookup in one document
    pub fn structural_lookup(&self, doc: DocId, kind: NameKind, name: &str) -> Vec<NodeId> {
        let inner = self.inner.read();
        inner
            .documents
            .get(&doc)
            .map(|entry| {
                entry
                    .structural
                    .lookup(kind, name)
                    .iter()
                    .map(|&pre| NodeId::new(doc, pre))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn index_stats(&self) -> IndexStatsSnapshot {
        IndexStatsSnapshot {
            gateway_lookups: self.stats.gateway_lookups.load(Ordering::Relaxed),
            range_queries: self.stats.range_queries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_books() -> (Store, DocId) {
        let store = Store::new();
        store.create_collection("db").unwrap();
        let doc = store
            .load_document(
                "db",
                "books.xml",
                r#"<library>
                     <book id="b1"><author>Herbert</author></book>
                     <book id="b2"><author>Orwell</author></book>
                   </library>"#,
            )
            .unwrap();
        (store, doc)
    }

    #[test]
    fn load_and_remove_bump_the_tick() {
        let (store, doc) = store_with_books();
        let t0 = store.tick();
        store.remove_document(doc).unwrap();
        assert!(store.tick() > t0);
        assert_eq!(store.document_count(), 0);
    }

    #[test]
    fn children_and_attributes_are_separated() {
        let (store, doc) = store_with_books();
        let library = NodeId::new(doc, 1);
        let books = store.children_of(library);
        assert_eq!(books.len(), 2);
        let attrs = store.attributes_of(books[0]);
        assert_eq!(attrs.len(), 1);
        assert_eq!(store.string_value(attrs[0]), "b1");
        // attributes are not children
        let children = store.children_of(books[0]);
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn structural_join_keeps_context_nodes_with_matches() {
        let (store, doc) = store_with_books();
        let library = NodeId::new(doc, 1);
        let books = store.children_of(library);
        let context = store.make_node_set(books.clone());
        // selection: the author element under the first book
        let author = store.children_of(books[0])[0];
        let selection = store.make_node_set(vec![author]);
        let joined =
            store.select_ancestor_descendant(&selection, &context, true, ContextId(0));
        assert_eq!(joined.nodes(), &[books[0]]);
    }

    #[test]
    fn gateway_finds_named_ancestors() {
        let (store, doc) = store_with_books();
        let library = NodeId::new(doc, 1);
        let books = store.children_of(library);
        let author = store.children_of(books[1])[0];
        let candidates = store.make_node_set(vec![author]);
        let docs = candidates.document_set().clone();
        let found = store.find_by_name(
            NameKind::Element,
            "book",
            VerificationAxis::AncestorOrSelf,
            &docs,
            &candidates,
            ContextId(0),
        );
        assert_eq!(found.nodes(), &[books[1]]);
        assert_eq!(store.index_stats().gateway_lookups, 1);
    }

    #[test]
    fn gateway_parent_axis_resolves_attribute_owners() {
        let (store, doc) = store_with_books();
        let library = NodeId::new(doc, 1);
        let books = store.children_of(library);
        let id_attr = store.attributes_of(books[0])[0];
        let candidates = store.make_node_set(vec![id_attr]);
        let docs = candidates.document_set().clone();
        let found = store.find_by_name(
            NameKind::Element,
            "book",
            VerificationAxis::Parent,
            &docs,
            &candidates,
            ContextId(0),
        );
        assert_eq!(found.nodes(), &[books[0]]);
    }

    #[test]
    fn range_queries_follow_configuration() {
        let (store, doc) = store_with_books();
        store
            .configure_range_index("db", NameKind::Attribute, "id", RangeType::String)
            .unwrap();
        let docs = DocumentSet::from_docs([doc]);
        let hits = store.range_query(
            &docs,
            NameKind::Attribute,
            "id",
            RangeOp::Eq,
            &RangeKey::String("b2".into()),
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(store.string_value(hits[0]), "b2");
    }

    #[test]
    fn update_attribute_reindexes_and_bumps_tick() {
        let (store, doc) = store_with_books();
        store
            .configure_range_index("db", NameKind::Attribute, "id", RangeType::String)
            .unwrap();
        let docs = DocumentSet::from_docs([doc]);
        let hits = store.range_query(
            &docs,
            NameKind::Attribute,
            "id",
            RangeOp::Eq,
            &RangeKey::String("b1".into()),
        );
        let t0 = store.tick();
        store.update_attribute_value(hits[0], "z9").unwrap();
        assert!(store.tick() > t0);
        assert!(store
            .range_query(
                &docs,
                NameKind::Attribute,
                "id",
                RangeOp::Eq,
                &RangeKey::String("b1".into()),
            )
            .is_empty());
        assert_eq!(
            store
                .range_query(
                    &docs,
                    NameKind::Attribute,
                    "id",
                    RangeOp::Eq,
                    &RangeKey::String("z9".into()),
                )
                .len(),
            1
        );
    }

    #[test]
    fn collection_node_set_is_persistent() {
        let (store, _) = store_with_books();
        let set = store.collection_node_set(&["db"]).unwrap();
        assert!(!set.is_in_memory());
        assert!(set.identity().is_some());
        assert_eq!(set.len(), 1);
        assert_eq!(set.state(), store.tick());
    }

    #[test]
    fn narrowing_allocates_a_fresh_identity() {
        let (store, doc) = store_with_books();
        let set = store.collection_node_set(&["db"]).unwrap();
        let narrowed = store.narrow_to_docs(&set, &DocumentSet::from_docs([doc]));
        assert_eq!(narrowed.len(), 1);
        assert_ne!(set.identity(), narrowed.identity());
    }
}
