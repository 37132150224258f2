// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Structural (name) index
//!
//! Maps `(name-kind, name)` to the pre values where that name occurs in a
//! document. Built once per document at load time; used for direct
//! name-based lookup instead of tree traversal, and for the upward
//! verification axes of the optimizer's gateway.

use std::collections::HashMap;

use crate::dom::{Document, NameKind, NodeKind};

/// Axis of an upward verification lookup against the structural index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationAxis {
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
}

/// Per-document name occurrence table
#[derive(Debug, Clone, Default)]
pub struct StructuralTable {
    names: HashMap<(NameKind, String), Vec<u32>>,
}

impl StructuralTable {
    pub fn build(doc: &Document) -> Self {
        let mut names: HashMap<(NameKind, String), Vec<u32>> = HashMap::new();
        for (pre, rec) in doc.nodes().iter().enumerate() {
            let kind = match rec.kind {
                NodeKind::Element => NameKind::Element,
                NodeKind::Attribute => NameKind::Attribute,
                NodeKind::Document | NodeKind::Text => continue,
            };
            if let Some(name) = &rec.name {
                names
                    .entry((kind, name.clone()))
                    .or_default()
                    .push(pre as u32);
            }
        }
        Self { names }
    }

    /// Pre values carrying `(kind, name)`, ascending
    pub fn lookup(&self, kind: NameKind, name: &str) -> &[u32] {
        self.names
            .get(&(kind, name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct names in the table
    pub fn name_count(&self) -> usize {
        self.names.len()
    }
}
