// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for query compilation and evaluation
//!
//! Static errors surface at compile time (parse failures, malformed
//! pragma content, unknown functions); dynamic errors surface during
//! evaluation. Collaborator errors propagate unchanged.

use thiserror::Error;

use crate::store::StoreError;

/// Errors raised by the query subsystem
#[derive(Error, Debug)]
pub enum QueryError {
    /// Compile-time error: the query never becomes executable
    #[error("Static error: {0}")]
    Static(String),

    /// Evaluation-time error
    #[error("Dynamic error: {0}")]
    Dynamic(String),

    /// Type error during evaluation
    #[error("Type error: {0}")]
    Type(String),

    /// The force-index-use guard's post-condition failed
    #[error("No index used by expression: {0}")]
    IndexRequired(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    pub fn static_error(msg: impl Into<String>) -> Self {
        QueryError::Static(msg.into())
    }

    pub fn dynamic(msg: impl Into<String>) -> Self {
        QueryError::Dynamic(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        QueryError::Type(msg.into())
    }
}
