// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Xylem - A native XML database with structural index optimization
//!
//! Xylem stores XML documents in named collections, indexes them
//! structurally (by name) and by typed value (range indexes), and
//! evaluates a path-query subset against them. Its core subsystem is the
//! structural-index-based optimization layer: an `xylem:optimize` pragma
//! that replaces naive tree-walk predicate evaluation with index
//! pre-selection plus upward ancestor verification, guarded by a
//! mutation-aware decision cache, and an independent
//! `xylem:enforce-index` pragma asserting that an index was used at all.
//!
//! ```no_run
//! use xylem::{CompiledQuery, EngineConfig, Store, Variables};
//!
//! let store = Store::new();
//! store.create_collection("db")?;
//! store.load_document("db", "books.xml", "<books><book id=\"b1\"/></books>")?;
//!
//! let config = EngineConfig::default();
//! let context = store.collection_node_set(&["db"])?;
//! let mut query =
//!     CompiledQuery::compile("(# xylem:optimize #) { //book[@id = \"b1\"] }")?;
//! let result = query.eval(&store, &config, Some(&context), &Variables::new())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dom;
pub mod index;
pub mod optimizer;
pub mod store;
pub mod xq;

pub use config::{EnforcementMode, EngineConfig};
pub use dom::{DocId, DomError, NameKind, NodeId, NodeKind};
pub use index::{IndexError, RangeType};
pub use optimizer::{
    resolve_index_type, GuardPolicy, Optimizable, OptimizeAxis, OptimizeDiagnostics,
    StructuralIndexGateway,
};
pub use store::{
    ContextId, DocumentSet, NodeSet, NodeSetId, Store, StoreError, SYSTEM_COLLECTION,
};
pub use xq::{Binding, CompiledQuery, QueryError, Sequence, Value, Variables};
