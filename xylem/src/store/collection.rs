// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Collections: named groups of documents with index configuration

use crate::dom::{DocId, NameKind};
use crate::index::{RangeIndexSpec, RangeType};

/// A named collection of documents
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    /// System collections hold engine metadata and are skipped by the
    /// index-type consistency checker
    pub system: bool,
    pub docs: Vec<DocId>,
    range_indexes: Vec<RangeIndexSpec>,
}

impl Collection {
    pub fn new(name: impl Into<String>, system: bool) -> Self {
        Self {
            name: name.into(),
            system,
            docs: Vec::new(),
            range_indexes: Vec::new(),
        }
    }

    /// Look up the configured range index on `(kind, name)`, if any
    pub fn range_index(&self, kind: NameKind, name: &str) -> Option<&RangeIndexSpec> {
        self.range_indexes
            .iter()
            .find(|spec| NameKind::from(spec.kind) == kind && spec.name == name)
    }

    pub fn range_indexes(&self) -> &[RangeIndexSpec] {
        &self.range_indexes
    }

    /// Add or replace the range index configuration on `(kind, name)`.
    /// Returns true if an existing configuration was replaced.
    pub fn set_range_index(&mut self, kind: NameKind, name: &str, value_type: RangeType) -> bool {
        let spec = RangeIndexSpec {
            kind: kind.into(),
            name: name.to_string(),
            value_type,
        };
        if let Some(existing) = self
            .range_indexes
            .iter_mut()
            .find(|s| NameKind::from(s.kind) == kind && s.name == name)
        {
            *existing = spec;
            true
        } else {
            self.range_indexes.push(spec);
            false
        }
    }

    /// Remove the range index configuration on `(kind, name)`.
    pub fn drop_range_index(&mut self, kind: NameKind, name: &str) -> bool {
        let before = self.range_indexes.len();
        self.range_indexes
            .retain(|s| !(NameKind::from(s.kind) == kind && s.name == name));
        self.range_indexes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_lookup_range_index() {
        let mut coll = Collection::new("db", false);
        assert!(coll.range_index(NameKind::Attribute, "id").is_none());

        let replaced = coll.set_range_index(NameKind::Attribute, "id", RangeType::String);
        assert!(!replaced);
        let spec = coll.range_index(NameKind::Attribute, "id").unwrap();
        assert_eq!(spec.value_type, RangeType::String);
        // same name, different kind, is a different index
        assert!(coll.range_index(NameKind::Element, "id").is_none());

        let replaced = coll.set_range_index(NameKind::Attribute, "id", RangeType::Integer);
        assert!(replaced);
        let spec = coll.range_index(NameKind::Attribute, "id").unwrap();
        assert_eq!(spec.value_type, RangeType::Integer);
    }

    #[test]
    fn drop_range_index_removes_configuration() {
        let mut coll = Collection::new("db", false);
        coll.set_range_index(NameKind::Element, "year", RangeType::Integer);
        assert!(coll.drop_range_index(NameKind::Element, "year"));
        assert!(!coll.drop_range_index(NameKind::Element, "year"));
        assert!(coll.range_index(NameKind::Element, "year").is_none());
    }
}
