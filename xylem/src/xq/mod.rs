// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Query subsystem: AST, parser, and evaluator

pub mod ast;
pub mod errors;
pub mod eval;
pub mod parser;

pub use ast::{Axis, ComparisonOp, ExprArena, ExprId, Literal, NodeTest};
pub use errors::QueryError;
pub use eval::{Binding, CompiledQuery, EvalContext, Sequence, Value, Variables};
pub use parser::{PRAGMA_ENFORCE_INDEX, PRAGMA_OPTIMIZE};
