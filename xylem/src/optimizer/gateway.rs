// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! The structural index gateway boundary
//!
//! The controller consumes the structural index through this trait
//! rather than a concrete store, keeping the collaborator replaceable at
//! the optimizer's boundary.

use crate::dom::NameKind;
use crate::index::VerificationAxis;
use crate::store::{ContextId, DocumentSet, NodeSet, Store};

/// Name-based lookup service scoped to a document set
pub trait StructuralIndexGateway {
    /// Nodes named `(kind, name)` standing in `axis` relation to the
    /// candidate nodes, scoped to `docs`.
    fn find_by_name(
        &self,
        kind: NameKind,
        name: &str,
        axis: VerificationAxis,
        docs: &DocumentSet,
        candidates: &NodeSet,
        scope: ContextId,
    ) -> NodeSet;
}

impl StructuralIndexGateway for Store {
    fn find_by_name(
        &self,
        kind: NameKind,
        name: &str,
        axis: VerificationAxis,
        docs: &DocumentSet,
        candidates: &NodeSet,
        scope: ContextId,
    ) -> NodeSet {
        Store::find_by_name(self, kind, name, axis, docs, candidates, scope)
    }
}
