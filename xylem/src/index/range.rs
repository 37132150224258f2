// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Typed range (value) indexes
//!
//! A range index is configured per collection on a `(name-kind, name)` pair
//! with a value type. Postings are kept per document as an ordered map from
//! typed key to the pre values of the nodes whose string value casts to
//! that key. Values that do not cast to the configured type are skipped at
//! build time.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

use chrono::NaiveDate;
use log::trace;
use serde::{Deserialize, Serialize};

use super::errors::IndexError;
use crate::dom::{Document, NameKind, NodeKind};

/// Value type of a configured range index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RangeType::String => "string",
            RangeType::Integer => "integer",
            RangeType::Double => "double",
            RangeType::Boolean => "boolean",
            RangeType::Date => "date",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RangeType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(RangeType::String),
            "integer" => Ok(RangeType::Integer),
            "double" => Ok(RangeType::Double),
            "boolean" => Ok(RangeType::Boolean),
            "date" => Ok(RangeType::Date),
            other => Err(IndexError::UnknownType(other.to_string())),
        }
    }
}

/// Configuration of one range index on a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeIndexSpec {
    pub kind: NameKindSpec,
    pub name: String,
    pub value_type: RangeType,
}

/// Serde-friendly mirror of [`NameKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameKindSpec {
    Element,
    Attribute,
}

impl From<NameKindSpec> for NameKind {
    fn from(spec: NameKindSpec) -> Self {
        match spec {
            NameKindSpec::Element => NameKind::Element,
            NameKindSpec::Attribute => NameKind::Attribute,
        }
    }
}

impl From<NameKind> for NameKindSpec {
    fn from(kind: NameKind) -> Self {
        match kind {
            NameKind::Element => NameKindSpec::Element,
            NameKind::Attribute => NameKindSpec::Attribute,
        }
    }
}

/// A typed key in a range index
///
/// Keys within one index are homogeneous (one variant per configured
/// type); ordering across variants exists only to satisfy `Ord`.
#[derive(Debug, Clone)]
pub enum RangeKey {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl RangeKey {
    fn rank(&self) -> u8 {
        match self {
            RangeKey::String(_) => 0,
            RangeKey::Integer(_) => 1,
            RangeKey::Double(_) => 2,
            RangeKey::Boolean(_) => 3,
            RangeKey::Date(_) => 4,
        }
    }

    /// Cast a raw string value to a key of the given type.
    ///
    /// Returns `None` when the value does not cast; such nodes are left
    /// out of the index.
    pub fn parse(text: &str, value_type: RangeType) -> Option<RangeKey> {
        let text = text.trim();
        match value_type {
            RangeType::String => Some(RangeKey::String(text.to_string())),
            RangeType::Integer => text.parse::<i64>().ok().map(RangeKey::Integer),
            RangeType::Double => match text.parse::<f64>() {
                Ok(d) if !d.is_nan() => Some(RangeKey::Double(d)),
                _ => None,
            },
            RangeType::Boolean => match text {
                "true" | "1" => Some(RangeKey::Boolean(true)),
                "false" | "0" => Some(RangeKey::Boolean(false)),
                _ => None,
            },
            RangeType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(RangeKey::Date),
        }
    }

    pub fn value_type(&self) -> RangeType {
        match self {
            RangeKey::String(_) => RangeType::String,
            RangeKey::Integer(_) => RangeType::Integer,
            RangeKey::Double(_) => RangeType::Double,
            RangeKey::Boolean(_) => RangeType::Boolean,
            RangeKey::Date(_) => RangeType::Date,
        }
    }
}

impl PartialEq for RangeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RangeKey {}

impl PartialOrd for RangeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RangeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RangeKey::String(a), RangeKey::String(b)) => a.cmp(b),
            (RangeKey::Integer(a), RangeKey::Integer(b)) => a.cmp(b),
            (RangeKey::Double(a), RangeKey::Double(b)) => a.total_cmp(b),
            (RangeKey::Boolean(a), RangeKey::Boolean(b)) => a.cmp(b),
            (RangeKey::Date(a), RangeKey::Date(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Comparison operator served by a range lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Per-document range postings for every index configured on the owning
/// collection
#[derive(Debug, Clone, Default)]
pub struct RangePostings {
    tables: HashMap<(NameKind, String), BTreeMap<RangeKey, Vec<u32>>>,
}

impl RangePostings {
    /// Build postings for `doc` under the given index specs.
    pub fn build(doc: &Document, specs: &[RangeIndexSpec]) -> Self {
        let mut tables: HashMap<(NameKind, String), BTreeMap<RangeKey, Vec<u32>>> = HashMap::new();
        for spec in specs {
            let kind: NameKind = spec.kind.into();
            let mut table = BTreeMap::new();
            let mut indexed = 0usize;
            let mut skipped = 0usize;
            for (pre, rec) in doc.nodes().iter().enumerate() {
                let matches = match kind {
                    NameKind::Element => rec.kind == NodeKind::Element,
                    NameKind::Attribute => rec.kind == NodeKind::Attribute,
                };
                if !matches || rec.name.as_deref() != Some(spec.name.as_str()) {
                    continue;
                }
                let value = doc.string_value(pre as u32);
                match RangeKey::parse(&value, spec.value_type) {
                    Some(key) => {
                        table.entry(key).or_insert_with(Vec::new).push(pre as u32);
                        indexed += 1;
                    }
                    None => skipped += 1,
                }
            }
            trace!(
                "range index {} {} on {}: {} entries, {} skipped",
                spec.value_type,
                kind,
                spec.name,
                indexed,
                skipped
            );
            tables.insert((kind, spec.name.clone()), table);
        }
        Self { tables }
    }

    /// Whether a table exists for `(kind, name)`
    pub fn has_table(&self, kind: NameKind, name: &str) -> bool {
        self.tables.contains_key(&(kind, name.to_string()))
    }

    /// Pre values of nodes whose key satisfies `op key`, ascending.
    pub fn query(&self, kind: NameKind, name: &str, op: RangeOp, key: &RangeKey) -> Vec<u32> {
        let Some(table) = self.tables.get(&(kind, name.to_string())) else {
            return Vec::new();
        };
        let mut out: Vec<u32> = match op {
            RangeOp::Eq => table.get(key).cloned().unwrap_or_default(),
            RangeOp::Ne => table
                .iter()
                .filter(|(k, _)| *k != key)
                .flat_map(|(_, pres)| pres.iter().copied())
                .collect(),
            RangeOp::Lt => table
                .range(..key.clone())
                .flat_map(|(_, pres)| pres.iter().copied())
                .collect(),
            RangeOp::Le => table
                .range(..=key.clone())
                .flat_map(|(_, pres)| pres.iter().copied())
                .collect(),
            RangeOp::Gt => table
                .range((Bound::Excluded(key.clone()), Bound::Unbounded))
                .flat_map(|(_, pres)| pres.iter().copied())
                .collect(),
            RangeOp::Ge => table
                .range(key.clone()..)
                .flat_map(|(_, pres)| pres.iter().copied())
                .collect(),
        };
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_document, DocId};

    fn spec(kind: NameKindSpec, name: &str, value_type: RangeType) -> RangeIndexSpec {
        RangeIndexSpec {
            kind,
            name: name.to_string(),
            value_type,
        }
    }

    fn book_doc() -> Document {
        parse_document(
            DocId(0),
            "books.xml",
            "db",
            r#"<books>
                 <book id="b1"><year>1965</year></book>
                 <book id="b2"><year>1984</year></book>
                 <book id="b3"><year>n/a</year></book>
               </books>"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_typed_postings_and_skips_uncastable_values() {
        let doc = book_doc();
        let postings = RangePostings::build(
            &doc,
            &[spec(NameKindSpec::Element, "year", RangeType::Integer)],
        );
        let hits = postings.query(
            NameKind::Element,
            "year",
            RangeOp::Eq,
            &RangeKey::Integer(1965),
        );
        assert_eq!(hits.len(), 1);
        // "n/a" must not be indexed
        let all = postings.query(
            NameKind::Element,
            "year",
            RangeOp::Ge,
            &RangeKey::Integer(i64::MIN),
        );
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn serves_ordered_operators() {
        let doc = book_doc();
        let postings = RangePostings::build(
            &doc,
            &[spec(NameKindSpec::Element, "year", RangeType::Integer)],
        );
        let lt = postings.query(
            NameKind::Element,
            "year",
            RangeOp::Lt,
            &RangeKey::Integer(1984),
        );
        assert_eq!(lt.len(), 1);
        let ge = postings.query(
            NameKind::Element,
            "year",
            RangeOp::Ge,
            &RangeKey::Integer(1965),
        );
        assert_eq!(ge.len(), 2);
        let ne = postings.query(
            NameKind::Element,
            "year",
            RangeOp::Ne,
            &RangeKey::Integer(1965),
        );
        assert_eq!(ne.len(), 1);
    }

    #[test]
    fn attribute_postings_use_attribute_names() {
        let doc = book_doc();
        let postings = RangePostings::build(
            &doc,
            &[spec(NameKindSpec::Attribute, "id", RangeType::String)],
        );
        let hits = postings.query(
            NameKind::Attribute,
            "id",
            RangeOp::Eq,
            &RangeKey::String("b2".to_string()),
        );
        assert_eq!(hits.len(), 1);
        assert!(postings
            .query(
                NameKind::Element,
                "id",
                RangeOp::Eq,
                &RangeKey::String("b2".to_string()),
            )
            .is_empty());
    }

    #[test]
    fn date_keys_parse_iso_dates() {
        assert!(RangeKey::parse("2024-02-29", RangeType::Date).is_some());
        assert!(RangeKey::parse("not-a-date", RangeType::Date).is_none());
    }
}
