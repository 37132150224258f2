// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for store operations

use thiserror::Error;

use crate::dom::{DocId, DomError, NodeId};
use crate::index::IndexError;

/// Errors raised by collection and document operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {0} is not an attribute")]
    NotAnAttribute(NodeId),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Index(#[from] IndexError),
}
