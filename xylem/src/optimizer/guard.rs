// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! The force-index-use guard pragma
//!
//! An independent post-condition check, usable with or without the
//! optimization controller: after the guarded expression evaluates, walk
//! its tree and fail loudly if the index-usage observations violate the
//! configured policy. The guard signals a query-author mistake (an
//! expression expected to be index-eligible was not), never an engine
//! defect.

use log::debug;

use crate::xq::ast::{ExprArena, ExprId, ExprNode};
use crate::xq::errors::QueryError;

/// Which index-usage observations satisfy the guard.
///
/// The original system recomputed one shared flag while visiting every
/// comparison, silently reporting only the last-visited node's
/// observation. That positional accident is preserved as
/// [`GuardPolicy::LastVisited`]; the default demands that every
/// comparison used an index, which is the only policy that cannot mask a
/// mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPolicy {
    /// Every comparison in the guarded expression must have used an index
    #[default]
    All,
    /// At least one comparison must have used an index
    Any,
    /// Only the last-visited comparison counts
    LastVisited,
}

/// Check the guard's post-condition over the evaluated expression tree.
pub(crate) fn enforce(
    arena: &ExprArena,
    body: ExprId,
    policy: GuardPolicy,
) -> Result<(), QueryError> {
    let comparisons = arena.collect_comparisons(body);
    if comparisons.is_empty() {
        return Err(QueryError::IndexRequired(
            "guarded expression contains no index-capable comparison".to_string(),
        ));
    }

    let observations: Vec<bool> = comparisons
        .iter()
        .map(|id| match arena.node(*id) {
            ExprNode::Comparison(cmp) => cmp.used_index,
            _ => false,
        })
        .collect();
    let used = observations.iter().filter(|b| **b).count();

    let satisfied = match policy {
        GuardPolicy::All => used == observations.len(),
        GuardPolicy::Any => used > 0,
        GuardPolicy::LastVisited => *observations.last().unwrap_or(&false),
    };

    debug!(
        "index-use guard ({:?}): {} of {} comparisons used an index",
        policy,
        used,
        observations.len()
    );

    if satisfied {
        Ok(())
    } else {
        Err(QueryError::IndexRequired(format!(
            "{} of {} comparisons evaluated without an index",
            observations.len() - used,
            observations.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xq::ast::{
        BinaryExpr, ComparisonExpr, ComparisonOp, Literal, LogicOp, Operand,
    };

    /// A conjunction of dummy comparisons carrying the given flags, in
    /// visit order.
    fn arena_with_flags(flags: &[bool]) -> (ExprArena, ExprId) {
        let mut arena = ExprArena::default();
        let mut root = None;
        for &used in flags {
            let cmp = arena.alloc(ExprNode::Comparison(ComparisonExpr {
                op: ComparisonOp::Eq,
                left: Operand::Literal(Literal::Integer(1)),
                right: Operand::Literal(Literal::Integer(1)),
                used_index: used,
            }));
            root = Some(match root {
                None => cmp,
                Some(prev) => arena.alloc(ExprNode::Binary(BinaryExpr {
                    op: LogicOp::And,
                    left: prev,
                    right: cmp,
                })),
            });
        }
        (arena, root.expect("at least one flag"))
    }

    #[test]
    fn all_policy_requires_every_observation() {
        let (arena, root) = arena_with_flags(&[true, true, true]);
        assert!(enforce(&arena, root, GuardPolicy::All).is_ok());
        let (arena, root) = arena_with_flags(&[true, false, true]);
        assert!(enforce(&arena, root, GuardPolicy::All).is_err());
    }

    #[test]
    fn any_policy_accepts_a_single_observation() {
        let (arena, root) = arena_with_flags(&[false, true, false]);
        assert!(enforce(&arena, root, GuardPolicy::Any).is_ok());
        let (arena, root) = arena_with_flags(&[false, false]);
        assert!(enforce(&arena, root, GuardPolicy::Any).is_err());
    }

    #[test]
    fn last_visited_policy_preserves_the_positional_behavior() {
        // only the last-visited comparison counts, masking the earlier miss
        let (arena, root) = arena_with_flags(&[false, true]);
        assert!(enforce(&arena, root, GuardPolicy::LastVisited).is_ok());
        let (arena, root) = arena_with_flags(&[true, false]);
        assert!(enforce(&arena, root, GuardPolicy::LastVisited).is_err());
    }

    #[test]
    fn an_expression_without_comparisons_violates_the_guard() {
        let mut arena = ExprArena::default();
        let root = arena.alloc(ExprNode::Literal(Literal::Integer(1)));
        assert!(matches!(
            enforce(&arena, root, GuardPolicy::All),
            Err(QueryError::IndexRequired(_))
        ));
    }
}
