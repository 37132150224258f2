// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Indexing system for Xylem
//!
//! This module provides:
//! - Structural (name) indexes for direct name-based node lookup
//! - Typed range (value) indexes for value-comparison optimization

pub mod errors;
pub mod range;
pub mod structural;

pub use errors::IndexError;
pub use range::{NameKindSpec, RangeIndexSpec, RangeKey, RangeOp, RangePostings, RangeType};
pub use structural::{StructuralTable, VerificationAxis};
