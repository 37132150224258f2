// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Structural-index-based query optimization
//!
//! This module decides, per evaluation of a predicate-bearing path
//! expression, whether to replace the naive tree-walk with an
//! index-driven plan: fetch candidates by name and value from the
//! indexes and walk upward to verify ancestry. The substitution is kept
//! safe by a unanimous per-call feasibility check over the chain of
//! cooperating sub-expressions and a decision cache invalidated by the
//! context node set's state counter.
//!
//! Components:
//! - [`Optimizable`]: the capability contract comparison nodes implement
//! - [`OptimizeController`]: the `xylem:optimize` pragma
//! - [`resolve_index_type`]: the index-type consistency checker
//! - [`guard`]: the `xylem:enforce-index` post-condition check
//! - [`StructuralIndexGateway`]: the consumed index lookup boundary

pub mod controller;
pub mod gateway;
pub mod guard;
pub mod index_type;
pub mod optimizable;

pub use controller::{OptimizeController, OptimizeDiagnostics};
pub use gateway::StructuralIndexGateway;
pub use guard::GuardPolicy;
pub use index_type::resolve_index_type;
pub use optimizable::{Optimizable, OptimizeAxis};
