// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! The Optimizable capability
//!
//! A contract implemented by expression nodes that can, in principle, be
//! answered by an index: a cheap per-call feasibility check, the declared
//! structural axis, the upward-verification refinements, and index
//! pre-selection. The general comparison is the one implementor; function
//! nodes expose no capability. Implementations never mutate the context
//! node set they are given; the only side effect is the
//! `has_used_index` flag.

use log::trace;

use super::index_type::resolve_index_type;
use crate::config::EngineConfig;
use crate::dom::{NameKind, NodeId};
use crate::index::{RangeKey, RangeOp, RangeType};
use crate::store::{NodeSet, Store};
use crate::xq::ast::{
    Axis, ComparisonExpr, ComparisonOp, Literal, NodeTest, Operand, PatternStep,
};
use crate::xq::eval::{Binding, Variables};

/// The structural axis a chain entry natively operates on. Never a
/// reverse axis; reverse-axis candidates are refused at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeAxis {
    Child,
    Descendant,
    DescendantSelf,
    Attribute,
    DescendantAttribute,
    SelfAxis,
}

/// Feasibility and pre-selection contract for index-capable expressions
pub trait Optimizable {
    /// Cheap, context-dependent feasibility check
    fn can_optimize(
        &self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        context: &NodeSet,
    ) -> bool;

    /// The raw axis of the operand path, reverse axes included
    fn declared_axis(&self) -> Option<Axis>;

    /// The optimization axis, when the operand path is index-shaped
    fn optimize_axis(&self) -> Option<OptimizeAxis>;

    /// Upward verification may use the self axis
    fn applies_on_self(&self) -> bool;

    /// Upward verification may use the parent axis
    fn applies_on_child(&self) -> bool;

    /// Candidate matches straight from the index, ancestry unverified.
    /// With `use_prior_result`, candidates are restricted to the node set
    /// produced by the previous chain entry (given as `context`) rather
    /// than the original context. Returns `None` when value or type
    /// resolution fails against the current context.
    fn pre_select(
        &mut self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        context: &NodeSet,
        use_prior_result: bool,
    ) -> Option<NodeSet>;

    /// True iff the most recent evaluation consulted an index
    fn has_used_index(&self) -> bool;
}

/// The operand shape an index can serve: a path pattern on one side, an
/// atomic value on the other, with the operator oriented toward the path.
struct IndexView<'a> {
    steps: &'a [PatternStep],
    op: ComparisonOp,
    value: &'a Operand,
}

fn index_view(cmp: &ComparisonExpr) -> Option<IndexView<'_>> {
    match (&cmp.left, &cmp.right) {
        (Operand::Path(steps), value @ (Operand::Literal(_) | Operand::Var(_))) => {
            Some(IndexView {
                steps,
                op: cmp.op,
                value,
            })
        }
        (value @ (Operand::Literal(_) | Operand::Var(_)), Operand::Path(steps)) => {
            Some(IndexView {
                steps,
                op: cmp.op.mirrored(),
                value,
            })
        }
        _ => None,
    }
}

/// Leading `self::node()` steps are identity for a single context node.
fn effective_steps(steps: &[PatternStep]) -> &[PatternStep] {
    let mut start = 0;
    while start < steps.len()
        && steps[start].axis == Axis::SelfAxis
        && steps[start].test == NodeTest::AnyNode
    {
        start += 1;
    }
    &steps[start..]
}

/// Classify a pattern into the name an index must cover and the axis
/// relating candidates back to the context.
pub(crate) fn classify_pattern(steps: &[PatternStep]) -> Option<(OptimizeAxis, NameKind, &str)> {
    let steps = effective_steps(steps);
    match steps {
        [step] => {
            let NodeTest::Name(name) = &step.test else {
                return None;
            };
            let (axis, kind) = match step.axis {
                Axis::Child => (OptimizeAxis::Child, NameKind::Element),
                Axis::Descendant => (OptimizeAxis::Descendant, NameKind::Element),
                Axis::DescendantOrSelf => (OptimizeAxis::DescendantSelf, NameKind::Element),
                Axis::Attribute => (OptimizeAxis::Attribute, NameKind::Attribute),
                Axis::SelfAxis => (OptimizeAxis::SelfAxis, NameKind::Element),
                _ => return None,
            };
            Some((axis, kind, name.as_str()))
        }
        [first, second] => {
            if first.axis == Axis::DescendantOrSelf
                && first.test == NodeTest::AnyNode
                && second.axis == Axis::Attribute
            {
                if let NodeTest::Name(name) = &second.test {
                    return Some((
                        OptimizeAxis::DescendantAttribute,
                        NameKind::Attribute,
                        name.as_str(),
                    ));
                }
            }
            None
        }
        _ => None,
    }
}

/// Cast the comparison's value operand to a key of the index type.
///
/// Casts are admitted only where index-driven and naive evaluation agree
/// on every operator: strings to string or ISO date keys, integers to
/// integer or double keys, doubles to double keys.
pub(crate) fn comparison_key(
    value: &Operand,
    vars: &Variables,
    value_type: RangeType,
) -> Option<RangeKey> {
    let literal = match value {
        Operand::Literal(lit) => lit.clone(),
        Operand::Var(name) => match vars.get(name) {
            Some(Binding::Value(v)) => v.as_literal()?,
            _ => return None,
        },
        _ => return None,
    };
    match (literal, value_type) {
        (Literal::String(s), RangeType::String) => Some(RangeKey::String(s)),
        (Literal::String(s), RangeType::Date) => RangeKey::parse(&s, RangeType::Date),
        (Literal::Integer(i), RangeType::Integer) => Some(RangeKey::Integer(i)),
        (Literal::Integer(i), RangeType::Double) => Some(RangeKey::Double(i as f64)),
        (Literal::Double(d), RangeType::Double) if !d.is_nan() => Some(RangeKey::Double(d)),
        _ => None,
    }
}

pub(crate) fn range_op(op: ComparisonOp) -> RangeOp {
    match op {
        ComparisonOp::Eq => RangeOp::Eq,
        ComparisonOp::Ne => RangeOp::Ne,
        ComparisonOp::Lt => RangeOp::Lt,
        ComparisonOp::Le => RangeOp::Le,
        ComparisonOp::Gt => RangeOp::Gt,
        ComparisonOp::Ge => RangeOp::Ge,
    }
}

/// Whether `hit` stands in `axis` relation to the context node `ctx`
pub(crate) fn related(store: &Store, hit: NodeId, ctx: NodeId, axis: OptimizeAxis) -> bool {
    match axis {
        OptimizeAxis::Child | OptimizeAxis::Attribute => store.parent_of(hit) == Some(ctx),
        OptimizeAxis::Descendant => store.is_descendant(ctx, hit, false),
        OptimizeAxis::DescendantSelf => store.is_descendant(ctx, hit, true),
        OptimizeAxis::SelfAxis => hit == ctx,
        // attribute records live inside their owner's subtree interval
        OptimizeAxis::DescendantAttribute => store.is_descendant(ctx, hit, false),
    }
}

impl ComparisonExpr {
    /// Resolve the index parameters of this comparison against a
    /// document set: `(axis, kind, name, op, key)`.
    fn resolve_index(
        &self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        docs: &crate::store::DocumentSet,
    ) -> Option<(OptimizeAxis, NameKind, String, RangeOp, RangeKey)> {
        let view = index_view(self)?;
        let (axis, kind, name) = classify_pattern(view.steps)?;
        let value_type = resolve_index_type(store, docs, kind, name, config.enforcement)?;
        let key = comparison_key(view.value, vars, value_type)?;
        Some((axis, kind, name.to_string(), range_op(view.op), key))
    }

    /// Answer this comparison for a single context node via the range
    /// index, or `None` when no consistent index serves it.
    pub(crate) fn index_filter_node(
        &self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        node: NodeId,
    ) -> Option<bool> {
        let docs = crate::store::DocumentSet::from_docs([node.doc]);
        let (axis, kind, name, op, key) = self.resolve_index(store, config, vars, &docs)?;
        let hits = store.range_lookup_doc(node.doc, kind, &name, op, &key);
        Some(hits.into_iter().any(|hit| related(store, hit, node, axis)))
    }
}

impl Optimizable for ComparisonExpr {
    fn can_optimize(
        &self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        context: &NodeSet,
    ) -> bool {
        let feasible = self
            .resolve_index(store, config, vars, context.document_set())
            .is_some();
        trace!(
            "can_optimize: {} for comparison {}",
            feasible,
            self.op.symbol()
        );
        feasible
    }

    fn declared_axis(&self) -> Option<Axis> {
        let view = index_view(self)?;
        effective_steps(view.steps).first().map(|s| s.axis)
    }

    fn optimize_axis(&self) -> Option<OptimizeAxis> {
        let view = index_view(self)?;
        classify_pattern(view.steps).map(|(axis, _, _)| axis)
    }

    fn applies_on_self(&self) -> bool {
        self.optimize_axis() == Some(OptimizeAxis::SelfAxis)
    }

    fn applies_on_child(&self) -> bool {
        matches!(
            self.optimize_axis(),
            Some(OptimizeAxis::Child) | Some(OptimizeAxis::Attribute)
        )
    }

    fn pre_select(
        &mut self,
        store: &Store,
        config: &EngineConfig,
        vars: &Variables,
        context: &NodeSet,
        use_prior_result: bool,
    ) -> Option<NodeSet> {
        let resolved = self.resolve_index(store, config, vars, context.document_set())?;
        let (_, kind, name, op, key) = resolved;
        let mut hits = store.range_query(context.document_set(), kind, &name, op, &key);
        if use_prior_result {
            hits.retain(|hit| {
                context
                    .nodes_in_doc(hit.doc)
                    .iter()
                    .any(|prior| store.is_descendant(*prior, *hit, true))
            });
        }
        self.used_index = true;
        trace!(
            "pre_select {} {} on {} {}: {} hits",
            name,
            op_symbol_for_trace(op),
            kind,
            if use_prior_result { "prior" } else { "context" },
            hits.len()
        );
        Some(store.make_node_set(hits))
    }

    fn has_used_index(&self) -> bool {
        self.used_index
    }
}

fn op_symbol_for_trace(op: RangeOp) -> &'static str {
    match op {
        RangeOp::Eq => "=",
        RangeOp::Ne => "!=",
        RangeOp::Lt => "<",
        RangeOp::Le => "<=",
        RangeOp::Gt => ">",
        RangeOp::Ge => ">=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(steps: &[(Axis, NodeTest)]) -> Vec<PatternStep> {
        steps
            .iter()
            .map(|(axis, test)| PatternStep {
                axis: *axis,
                test: test.clone(),
            })
            .collect()
    }

    #[test]
    fn classifies_single_step_patterns() {
        let p = pattern(&[(Axis::Child, NodeTest::Name("author".into()))]);
        let (axis, kind, name) = classify_pattern(&p).unwrap();
        assert_eq!(axis, OptimizeAxis::Child);
        assert_eq!(kind, NameKind::Element);
        assert_eq!(name, "author");

        let p = pattern(&[(Axis::Attribute, NodeTest::Name("id".into()))]);
        let (axis, kind, _) = classify_pattern(&p).unwrap();
        assert_eq!(axis, OptimizeAxis::Attribute);
        assert_eq!(kind, NameKind::Attribute);
    }

    #[test]
    fn classifies_descendant_attribute_patterns() {
        let p = pattern(&[
            (Axis::SelfAxis, NodeTest::AnyNode),
            (Axis::DescendantOrSelf, NodeTest::AnyNode),
            (Axis::Attribute, NodeTest::Name("id".into())),
        ]);
        let (axis, kind, name) = classify_pattern(&p).unwrap();
        assert_eq!(axis, OptimizeAxis::DescendantAttribute);
        assert_eq!(kind, NameKind::Attribute);
        assert_eq!(name, "id");
    }

    #[test]
    fn rejects_reverse_and_wildcard_patterns() {
        let p = pattern(&[(Axis::Ancestor, NodeTest::Name("c".into()))]);
        assert!(classify_pattern(&p).is_none());
        let p = pattern(&[(Axis::Child, NodeTest::Wildcard)]);
        assert!(classify_pattern(&p).is_none());
        let p = pattern(&[
            (Axis::Child, NodeTest::Name("a".into())),
            (Axis::Child, NodeTest::Name("b".into())),
        ]);
        assert!(classify_pattern(&p).is_none());
    }

    #[test]
    fn comparison_keys_only_admit_equivalence_safe_casts() {
        let vars = Variables::new();
        let s = Operand::Literal(Literal::String("x".into()));
        assert!(comparison_key(&s, &vars, RangeType::String).is_some());
        assert!(comparison_key(&s, &vars, RangeType::Integer).is_none());

        let d = Operand::Literal(Literal::String("2024-01-01".into()));
        assert!(comparison_key(&d, &vars, RangeType::Date).is_some());

        let i = Operand::Literal(Literal::Integer(7));
        assert!(comparison_key(&i, &vars, RangeType::Integer).is_some());
        assert!(comparison_key(&i, &vars, RangeType::Double).is_some());
        assert!(comparison_key(&i, &vars, RangeType::String).is_none());
    }
}
