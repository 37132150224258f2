// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Index-type consistency checking
//!
//! A pure function over a context's contributing collections and a target
//! name, deciding whether a single, consistent range-index type justifies
//! optimizing a value comparison. Computed fresh per call; collection
//! membership and configuration can change between calls.

use log::trace;

use crate::config::EnforcementMode;
use crate::dom::NameKind;
use crate::store::{DocumentSet, Store};

/// Resolve the usable range-index type for `(kind, name)` across the
/// collections contributing documents to `docs`.
///
/// Under [`EnforcementMode::Default`], every contributing collection must
/// define the index and all definitions must agree on the value type.
/// Under [`EnforcementMode::Always`], the first definition found wins and
/// collections without one are skipped. System collections never
/// participate. Returns `None` when no usable index exists.
pub fn resolve_index_type(
    store: &Store,
    docs: &DocumentSet,
    kind: NameKind,
    name: &str,
    mode: EnforcementMode,
) -> Option<crate::index::RangeType> {
    let mut candidate = None;
    for collection in store.collections_of(docs) {
        if store.is_system_collection(&collection) {
            continue;
        }
        let spec = store
            .collection_range_spec(&collection, kind, name)
            .ok()
            .flatten();
        match spec {
            None => match mode {
                EnforcementMode::Default => {
                    trace!(
                        "no {} index on {} in '{}': no usable index",
                        kind,
                        name,
                        collection
                    );
                    return None;
                }
                EnforcementMode::Always => continue,
            },
            Some(spec) => match mode {
                EnforcementMode::Always => return Some(spec.value_type),
                EnforcementMode::Default => match candidate {
                    None => candidate = Some(spec.value_type),
                    Some(t) if t != spec.value_type => {
                        trace!(
                            "mixed index types {} and {} on {} {}: no usable index",
                            t,
                            spec.value_type,
                            kind,
                            name
                        );
                        return None;
                    }
                    _ => {}
                },
            },
        }
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::RangeType;
    use crate::store::SYSTEM_COLLECTION;

    /// Two collections, a string index on `n` in A and an integer index
    /// on `n` in B, one document in each.
    fn mixed_store() -> (Store, DocumentSet, DocumentSet) {
        let store = Store::new();
        store.create_collection("a").unwrap();
        store.create_collection("b").unwrap();
        store
            .configure_range_index("a", NameKind::Element, "n", RangeType::String)
            .unwrap();
        store
            .configure_range_index("b", NameKind::Element, "n", RangeType::Integer)
            .unwrap();
        let doc_a = store.load_document("a", "a.xml", "<r><n>x</n></r>").unwrap();
        let doc_b = store.load_document("b", "b.xml", "<r><n>1</n></r>").unwrap();
        let both = DocumentSet::from_docs([doc_a, doc_b]);
        let only_a = DocumentSet::from_docs([doc_a]);
        (store, both, only_a)
    }

    #[test]
    fn default_mode_rejects_mixed_types() {
        let (store, both, _) = mixed_store();
        assert_eq!(
            resolve_index_type(
                &store,
                &both,
                NameKind::Element,
                "n",
                EnforcementMode::Default
            ),
            None
        );
    }

    #[test]
    fn default_mode_resolves_a_single_collection() {
        let (store, _, only_a) = mixed_store();
        assert_eq!(
            resolve_index_type(
                &store,
                &only_a,
                NameKind::Element,
                "n",
                EnforcementMode::Default
            ),
            Some(RangeType::String)
        );
    }

    #[test]
    fn default_mode_requires_every_collection_to_define_the_index() {
        let (store, both, _) = mixed_store();
        // "m" is configured nowhere
        assert_eq!(
            resolve_index_type(
                &store,
                &both,
                NameKind::Element,
                "m",
                EnforcementMode::Default
            ),
            None
        );
        // configured in A only: B's absence vetoes under default mode
        store
            .configure_range_index("a", NameKind::Element, "m", RangeType::String)
            .unwrap();
        assert_eq!(
            resolve_index_type(
                &store,
                &both,
                NameKind::Element,
                "m",
                EnforcementMode::Default
            ),
            None
        );
    }

    #[test]
    fn always_mode_takes_the_first_available_definition() {
        let (store, _, only_a) = mixed_store();
        assert_eq!(
            resolve_index_type(
                &store,
                &only_a,
                NameKind::Element,
                "n",
                EnforcementMode::Always
            ),
            Some(RangeType::String)
        );
    }

    #[test]
    fn always_mode_skips_collections_without_the_index() {
        let (store, both, _) = mixed_store();
        store.drop_range_index("a", NameKind::Element, "n").unwrap();
        // A no longer defines it; B's definition is sufficient
        assert_eq!(
            resolve_index_type(
                &store,
                &both,
                NameKind::Element,
                "n",
                EnforcementMode::Always
            ),
            Some(RangeType::Integer)
        );
    }

    #[test]
    fn system_collections_are_skipped() {
        let (store, _, only_a) = mixed_store();
        let sys_doc = store
            .load_document(SYSTEM_COLLECTION, "conf.xml", "<conf><n>x</n></conf>")
            .unwrap();
        let mut docs = DocumentSet::new();
        for d in only_a.iter() {
            docs.insert(d);
        }
        docs.insert(sys_doc);
        // the system collection defines nothing, yet does not veto
        assert_eq!(
            resolve_index_type(
                &store,
                &docs,
                NameKind::Element,
                "n",
                EnforcementMode::Default
            ),
            Some(RangeType::String)
        );
    }
}
