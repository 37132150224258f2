// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Engine configuration
//!
//! Configuration is threaded explicitly into evaluation and into the
//! index-type consistency checker; nothing in the engine reads ambient
//! global state.

use serde::{Deserialize, Serialize};

/// How strictly range-index presence is required across the collections
/// contributing to a context before a value comparison may be optimized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Every contributing collection must define the index, and all
    /// definitions must agree on the value type.
    Default,
    /// It is sufficient that some contributing collection defines the
    /// index; the first definition found wins.
    Always,
}

/// Engine-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Range-index enforcement policy for the consistency checker
    #[serde(default = "default_enforcement")]
    pub enforcement: EnforcementMode,
    /// Whether optimization pragmas without an explicit `enable` key are
    /// active
    #[serde(default = "default_optimize")]
    pub optimize_by_default: bool,
}

fn default_enforcement() -> EnforcementMode {
    EnforcementMode::Default
}

fn default_optimize() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforcement: default_enforcement(),
            optimize_by_default: default_optimize(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
