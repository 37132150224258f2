// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Document model: flat pre-order node records and XML loading

pub mod errors;
pub mod loader;
pub mod node;

pub use errors::DomError;
pub use loader::parse_document;
pub use node::{DocId, Document, NameKind, NodeId, NodeKind, NodeRec};
