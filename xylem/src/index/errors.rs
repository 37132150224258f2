// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for index operations

use thiserror::Error;

/// Errors raised by index configuration and lookups
#[derive(Error, Debug, Clone)]
pub enum IndexError {
    #[error("Unknown range index type: {0}")]
    UnknownType(String),

    #[error("Index configuration error: {0}")]
    Configuration(String),
}

impl IndexError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        IndexError::Configuration(msg.into())
    }
}
