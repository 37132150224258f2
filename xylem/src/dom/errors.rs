// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for document parsing

use thiserror::Error;

/// Errors raised while parsing XML into the document model
#[derive(Error, Debug)]
pub enum DomError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

impl DomError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        DomError::Malformed(msg.into())
    }
}
