// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Query evaluation
//!
//! Naive per-context-node evaluation of the expression tree, with one
//! deliberate exception: a general comparison answers through the range
//! index whenever a consistent index of a compatible type covers the
//! context, and records that fact in its `used_index` flag. The
//! optimization pragma builds on the same machinery to narrow contexts
//! before this evaluator runs.
//!
//! A compiled query is evaluated through `&mut`: per-node evaluation
//! state lives in the tree, so exclusive ownership is what makes the
//! single-writer rule hold by construction.

use std::collections::HashMap;

use log::debug;
use regex::Regex;

use super::ast::{
    Axis, ExprArena, ExprId, ExprNode, Function, Literal, LogicOp, NodeTest, Operand, PatternStep,
    PragmaKind,
};
use super::errors::QueryError;
use super::parser;
use crate::config::EngineConfig;
use crate::dom::{NodeId, NodeKind};
use crate::optimizer::{guard, GuardPolicy, OptimizeController, OptimizeDiagnostics};
use crate::store::{NodeSet, Store};

/// A single value in an evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Node(NodeId),
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
}

impl Value {
    pub fn from_literal(lit: &Literal) -> Value {
        match lit {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::Integer(*i),
            Literal::Double(d) => Value::Double(*d),
        }
    }

    /// The literal this atomic value corresponds to, if any
    pub fn as_literal(&self) -> Option<Literal> {
        match self {
            Value::String(s) => Some(Literal::String(s.clone())),
            Value::Integer(i) => Some(Literal::Integer(*i)),
            Value::Double(d) => Some(Literal::Double(*d)),
            Value::Node(_) | Value::Boolean(_) => None,
        }
    }
}

/// An ordered evaluation result
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    items: Vec<Value>,
}

impl Sequence {
    pub fn empty() -> Sequence {
        Sequence::default()
    }

    pub fn singleton(value: Value) -> Sequence {
        Sequence { items: vec![value] }
    }

    pub fn from_nodes(nodes: Vec<NodeId>) -> Sequence {
        Sequence {
            items: nodes.into_iter().map(Value::Node).collect(),
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The node ids in this sequence, in order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.items
            .iter()
            .filter_map(|v| match v {
                Value::Node(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Effective boolean value
    pub fn ebv(&self) -> Result<bool, QueryError> {
        match self.items.as_slice() {
            [] => Ok(false),
            [Value::Node(_), ..] => Ok(true),
            [single] => Ok(match single {
                Value::Boolean(b) => *b,
                Value::String(s) => !s.is_empty(),
                Value::Integer(i) => *i != 0,
                Value::Double(d) => *d != 0.0 && !d.is_nan(),
                Value::Node(_) => true,
            }),
            _ => Err(QueryError::type_error(
                "effective boolean value of a multi-item atomic sequence",
            )),
        }
    }

    /// A positional predicate value, when the sequence is one number
    fn as_position(&self) -> Option<f64> {
        match self.items.as_slice() {
            [Value::Integer(i)] => Some(*i as f64),
            [Value::Double(d)] => Some(*d),
            _ => None,
        }
    }
}

/// A variable binding: a node set keeps its provenance, anything else is
/// a plain value
#[derive(Debug, Clone)]
pub enum Binding {
    NodeSet(NodeSet),
    Value(Value),
}

/// Variable bindings for one evaluation
pub type Variables = HashMap<String, Binding>;

/// The context an expression is evaluated against
#[derive(Debug, Clone, Copy)]
pub enum EvalContext<'a> {
    None,
    /// A whole node set, as handed to the outermost expression
    Set(&'a NodeSet),
    /// One context item with its position and the context size
    Item {
        node: NodeId,
        position: usize,
        size: usize,
    },
}

/// A parsed, reusable query
///
/// Evaluation takes `&mut self`: the controller cache, index-usage flags
/// and preloaded candidates are instance state of the compiled artifact.
/// A compiled query must not be evaluated concurrently; reuse for an
/// unrelated execution requires [`CompiledQuery::reset_state`].
#[derive(Debug)]
pub struct CompiledQuery {
    pub(crate) arena: ExprArena,
    pub(crate) root: ExprId,
    pub(crate) controllers: Vec<OptimizeController>,
}

impl CompiledQuery {
    /// Compile a query. All parse and pragma-content errors surface
    /// here, never at evaluation time.
    pub fn compile(text: &str) -> Result<CompiledQuery, QueryError> {
        let parsed = parser::parse(text)?;
        debug!(
            "compiled query: {} nodes, {} optimize pragma(s)",
            parsed.arena.len(),
            parsed.controllers.len()
        );
        Ok(CompiledQuery {
            arena: parsed.arena,
            root: parsed.root,
            controllers: parsed.controllers,
        })
    }

    /// Evaluate against an optional context node set.
    pub fn eval(
        &mut self,
        store: &Store,
        config: &EngineConfig,
        context: Option<&NodeSet>,
        vars: &Variables,
    ) -> Result<Sequence, QueryError> {
        let ctx = match context {
            Some(ns) => EvalContext::Set(ns),
            None => EvalContext::None,
        };
        let mut ev = Evaluator {
            store,
            config,
            vars,
            arena: &mut self.arena,
            controllers: &mut self.controllers,
        };
        ev.eval_expr(self.root, ctx)
    }

    /// Clear all per-execution state: controller caches, index-usage
    /// flags and preloaded candidates. Analysis results are kept; they
    /// are a property of the expression, not of one execution.
    pub fn reset_state(&mut self) {
        for controller in &mut self.controllers {
            controller.reset_state();
        }
        self.arena.reset_eval_state();
    }

    /// Diagnostics of every optimization controller in this query
    pub fn optimize_diagnostics(&self) -> Vec<OptimizeDiagnostics> {
        self.controllers.iter().map(|c| c.diagnostics()).collect()
    }
}

/// Comparison operand data lifted out of the arena for evaluation
enum OperandData {
    Path(Vec<PatternStep>),
    Literal(Literal),
    Var(String),
    Expr(ExprId),
}

fn operand_data(operand: &Operand) -> OperandData {
    match operand {
        Operand::Path(steps) => OperandData::Path(steps.clone()),
        Operand::Literal(lit) => OperandData::Literal(lit.clone()),
        Operand::Var(name) => OperandData::Var(name.clone()),
        Operand::Expr(id) => OperandData::Expr(*id),
    }
}

enum PragmaDispatch {
    Optimize(usize),
    Guard(GuardPolicy),
    Passthrough,
}

/// Walks the tree; owns the mutable borrow of the compiled artifact for
/// the duration of one evaluation.
pub(crate) struct Evaluator<'a> {
    pub(crate) store: &'a Store,
    pub(crate) config: &'a EngineConfig,
    pub(crate) vars: &'a Variables,
    pub(crate) arena: &'a mut ExprArena,
    pub(crate) controllers: &'a mut Vec<OptimizeController>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn eval_expr(
        &mut self,
        id: ExprId,
        ctx: EvalContext<'_>,
    ) -> Result<Sequence, QueryError> {
        match self.arena.node(id) {
            ExprNode::Literal(lit) => Ok(Sequence::singleton(Value::from_literal(lit))),
            ExprNode::VarRef(var) => {
                let name = var.name.clone();
                self.var_sequence(&name)
            }
            ExprNode::Binary(bin) => {
                let (op, left, right) = (bin.op, bin.left, bin.right);
                let lhs = self.eval_expr(left, ctx)?.ebv()?;
                let result = match op {
                    LogicOp::And => lhs && self.eval_expr(right, ctx)?.ebv()?,
                    LogicOp::Or => lhs || self.eval_expr(right, ctx)?.ebv()?,
                };
                Ok(Sequence::singleton(Value::Boolean(result)))
            }
            ExprNode::FunctionCall(call) => {
                let (function, args) = (call.function, call.args.clone());
                self.eval_function(function, &args, ctx)
            }
            ExprNode::Path(path) => {
                let (absolute, steps) = (path.absolute, path.steps.clone());
                self.eval_path(absolute, &steps, ctx)
            }
            ExprNode::Filter(filter) => {
                let (base, predicates) = (filter.base, filter.predicates.clone());
                let seq = self.eval_expr(base, ctx)?;
                if seq.node_ids().len() != seq.len() {
                    return Err(QueryError::type_error(
                        "predicates require a node sequence",
                    ));
                }
                let filtered = self.apply_predicates(seq.node_ids(), &predicates)?;
                Ok(Sequence::from_nodes(filtered))
            }
            ExprNode::Comparison(_) => self.eval_comparison(id, ctx),
            // a bare step outside a path; evaluate as a one-step path
            ExprNode::Step(_) => self.eval_path(false, &[id], ctx),
            ExprNode::Pragma(pragma) => {
                let body = pragma.body;
                let dispatch = match &pragma.kind {
                    PragmaKind::Optimize { slot } => PragmaDispatch::Optimize(*slot),
                    PragmaKind::EnforceIndex { policy } => PragmaDispatch::Guard(*policy),
                    PragmaKind::Unknown { .. } => PragmaDispatch::Passthrough,
                };
                match dispatch {
                    PragmaDispatch::Optimize(slot) => {
                        let mut controller = std::mem::take(&mut self.controllers[slot]);
                        let result = controller.evaluate(self, body, ctx);
                        self.controllers[slot] = controller;
                        result
                    }
                    PragmaDispatch::Guard(policy) => {
                        let result = self.eval_expr(body, ctx)?;
                        guard::enforce(self.arena, body, policy)?;
                        Ok(result)
                    }
                    PragmaDispatch::Passthrough => self.eval_expr(body, ctx),
                }
            }
        }
    }

    fn var_sequence(&self, name: &str) -> Result<Sequence, QueryError> {
        match self.vars.get(name) {
            Some(Binding::NodeSet(ns)) => Ok(Sequence::from_nodes(ns.nodes().to_vec())),
            Some(Binding::Value(v)) => Ok(Sequence::singleton(v.clone())),
            None => Err(QueryError::dynamic(format!("unbound variable ${}", name))),
        }
    }

    // ------------------------------------------------------------------
    // Paths and steps
    // ------------------------------------------------------------------

    fn eval_path(
        &mut self,
        absolute: bool,
        steps: &[ExprId],
        ctx: EvalContext<'_>,
    ) -> Result<Sequence, QueryError> {
        let mut current: Vec<NodeId> = if absolute {
            match ctx {
                EvalContext::Set(ns) => ns
                    .document_set()
                    .iter()
                    .map(|doc| NodeId::new(doc, 0))
                    .collect(),
                EvalContext::Item { node, .. } => vec![NodeId::new(node.doc, 0)],
                EvalContext::None => self.store.root_node_set().nodes().to_vec(),
            }
        } else {
            match ctx {
                EvalContext::Set(ns) => ns.nodes().to_vec(),
                EvalContext::Item { node, .. } => vec![node],
                EvalContext::None => {
                    return Err(QueryError::dynamic("relative path without a context"))
                }
            }
        };

        for step in steps {
            current = self.eval_step(*step, &current)?;
        }
        Ok(Sequence::from_nodes(current))
    }

    fn eval_step(
        &mut self,
        step_id: ExprId,
        context_nodes: &[NodeId],
    ) -> Result<Vec<NodeId>, QueryError> {
        let ExprNode::Step(step) = self.arena.node(step_id) else {
            return Err(QueryError::dynamic("malformed step"));
        };
        let axis = step.axis;
        let test = step.test.clone();
        let predicates = step.predicates.clone();
        let preload = step.preload.as_ref().map(|p| p.nodes.clone());

        if let Some(candidates) = preload {
            // the controller preloaded verified candidates; serve the
            // step from them instead of re-scanning documents
            let mut kept = Vec::new();
            for node in candidates.iter() {
                if !self.test_matches(node, axis, &test) {
                    continue;
                }
                if self.preload_related(node, axis, context_nodes) {
                    kept.push(node);
                }
            }
            kept.sort_unstable();
            kept.dedup();
            return self.apply_predicates(kept, &predicates);
        }

        let mut result = Vec::new();
        for ctx_node in context_nodes {
            let candidates: Vec<NodeId> = self
                .axis_candidates(*ctx_node, axis)
                .into_iter()
                .filter(|n| self.test_matches(*n, axis, &test))
                .collect();
            let mut kept = self.apply_predicates(candidates, &predicates)?;
            result.append(&mut kept);
        }
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Whether a preloaded candidate relates to some context node along
    /// the step's axis
    fn preload_related(&self, node: NodeId, axis: Axis, context_nodes: &[NodeId]) -> bool {
        let in_ctx = |n: NodeId| context_nodes.binary_search(&n).is_ok();
        match axis {
            Axis::Child | Axis::Attribute => {
                self.store.parent_of(node).is_some_and(in_ctx)
            }
            Axis::SelfAxis => in_ctx(node),
            Axis::Descendant => self
                .store
                .ancestors_of(node, false)
                .into_iter()
                .any(in_ctx),
            Axis::DescendantOrSelf => self
                .store
                .ancestors_of(node, true)
                .into_iter()
                .any(in_ctx),
            // preload only lands on forward steps
            _ => false,
        }
    }

    fn axis_candidates(&self, node: NodeId, axis: Axis) -> Vec<NodeId> {
        match axis {
            Axis::Child => self.store.children_of(node),
            Axis::Attribute => self.store.attributes_of(node),
            Axis::Descendant => self.store.descendants_of(node, false),
            Axis::DescendantOrSelf => self.store.descendants_of(node, true),
            Axis::SelfAxis => vec![node],
            Axis::Parent => self.store.parent_of(node).into_iter().collect(),
            Axis::Ancestor => self.store.ancestors_of(node, false),
            Axis::AncestorOrSelf => self.store.ancestors_of(node, true),
        }
    }

    fn test_matches(&self, node: NodeId, axis: Axis, test: &NodeTest) -> bool {
        let Some(rec) = self.store.node(node) else {
            return false;
        };
        match test {
            NodeTest::AnyNode => true,
            NodeTest::Wildcard => match axis {
                Axis::Attribute => rec.kind == NodeKind::Attribute,
                _ => rec.kind == NodeKind::Element,
            },
            NodeTest::Name(name) => {
                let kind_ok = match axis {
                    Axis::Attribute => rec.kind == NodeKind::Attribute,
                    _ => rec.kind == NodeKind::Element,
                };
                kind_ok && rec.name.as_deref() == Some(name.as_str())
            }
        }
    }

    fn apply_predicates(
        &mut self,
        candidates: Vec<NodeId>,
        predicates: &[ExprId],
    ) -> Result<Vec<NodeId>, QueryError> {
        let mut current = candidates;
        for pred in predicates {
            let size = current.len();
            let mut kept = Vec::with_capacity(size);
            for (i, node) in current.iter().enumerate() {
                let seq = self.eval_expr(
                    *pred,
                    EvalContext::Item {
                        node: *node,
                        position: i + 1,
                        size,
                    },
                )?;
                let keep = match seq.as_position() {
                    Some(p) => (i + 1) as f64 == p,
                    None => seq.ebv()?,
                };
                if keep {
                    kept.push(*node);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    // ------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------

    fn eval_comparison(
        &mut self,
        id: ExprId,
        ctx: EvalContext<'_>,
    ) -> Result<Sequence, QueryError> {
        let ExprNode::Comparison(cmp) = self.arena.node(id) else {
            return Err(QueryError::dynamic("malformed comparison"));
        };
        let op = cmp.op;
        let left = operand_data(&cmp.left);
        let right = operand_data(&cmp.right);

        // the index answers single-node contexts directly
        if let EvalContext::Item { node, .. } = ctx {
            let store = self.store;
            let config = self.config;
            let vars = self.vars;
            let answered = match self.arena.node(id) {
                ExprNode::Comparison(cmp) => cmp.index_filter_node(store, config, vars, node),
                _ => None,
            };
            if let Some(result) = answered {
                self.set_used_index(id, true);
                return Ok(Sequence::singleton(Value::Boolean(result)));
            }
        }

        let lvals = self.operand_values(&left, ctx)?;
        let rvals = self.operand_values(&right, ctx)?;
        let mut result = false;
        'outer: for l in &lvals {
            for r in &rvals {
                if self.compare_values(l, r, op) {
                    result = true;
                    break 'outer;
                }
            }
        }
        self.set_used_index(id, false);
        Ok(Sequence::singleton(Value::Boolean(result)))
    }

    fn set_used_index(&mut self, id: ExprId, used: bool) {
        if let ExprNode::Comparison(cmp) = self.arena.node_mut(id) {
            cmp.used_index = used;
        }
    }

    fn operand_values(
        &mut self,
        operand: &OperandData,
        ctx: EvalContext<'_>,
    ) -> Result<Vec<Value>, QueryError> {
        match operand {
            OperandData::Literal(lit) => Ok(vec![Value::from_literal(lit)]),
            OperandData::Var(name) => Ok(self.var_sequence(name)?.items().to_vec()),
            OperandData::Expr(id) => Ok(self.eval_expr(*id, ctx)?.items().to_vec()),
            OperandData::Path(steps) => {
                let start: Vec<NodeId> = match ctx {
                    EvalContext::Item { node, .. } => vec![node],
                    EvalContext::Set(ns) => ns.nodes().to_vec(),
                    EvalContext::None => Vec::new(),
                };
                let mut current = start;
                for step in steps {
                    let mut next = Vec::new();
                    for node in &current {
                        next.extend(
                            self.axis_candidates(*node, step.axis)
                                .into_iter()
                                .filter(|n| self.test_matches(*n, step.axis, &step.test)),
                        );
                    }
                    next.sort_unstable();
                    next.dedup();
                    current = next;
                }
                Ok(current.into_iter().map(Value::Node).collect())
            }
        }
    }

    /// General comparison of two atomized values. The non-node operand
    /// drives coercion: numeric when either side is numeric, boolean
    /// when either side is boolean, string otherwise.
    fn compare_values(&self, left: &Value, right: &Value, op: super::ast::ComparisonOp) -> bool {
        use super::ast::ComparisonOp;
        let l = self.atomize(left);
        let r = self.atomize(right);

        let numeric = matches!(l, Value::Integer(_) | Value::Double(_))
            || matches!(r, Value::Integer(_) | Value::Double(_));
        if numeric {
            let (Some(a), Some(b)) = (to_number(&l), to_number(&r)) else {
                return false;
            };
            return match op {
                ComparisonOp::Eq => a == b,
                ComparisonOp::Ne => a != b,
                ComparisonOp::Lt => a < b,
                ComparisonOp::Le => a <= b,
                ComparisonOp::Gt => a > b,
                ComparisonOp::Ge => a >= b,
            };
        }

        let boolean = matches!(l, Value::Boolean(_)) || matches!(r, Value::Boolean(_));
        if boolean {
            let a = to_boolean(&l);
            let b = to_boolean(&r);
            return match op {
                ComparisonOp::Eq => a == b,
                ComparisonOp::Ne => a != b,
                ComparisonOp::Lt => !a & b,
                ComparisonOp::Le => a <= b,
                ComparisonOp::Gt => a & !b,
                ComparisonOp::Ge => a >= b,
            };
        }

        let a = to_string_value(&l);
        let b = to_string_value(&r);
        match op {
            ComparisonOp::Eq => a == b,
            ComparisonOp::Ne => a != b,
            ComparisonOp::Lt => a < b,
            ComparisonOp::Le => a <= b,
            ComparisonOp::Gt => a > b,
            ComparisonOp::Ge => a >= b,
        }
    }

    fn atomize(&self, value: &Value) -> Value {
        match value {
            Value::Node(n) => Value::String(self.store.string_value(*n)),
            other => other.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn eval_function(
        &mut self,
        function: Function,
        args: &[ExprId],
        ctx: EvalContext<'_>,
    ) -> Result<Sequence, QueryError> {
        let mut arg_seqs = Vec::with_capacity(args.len());
        for arg in args {
            arg_seqs.push(self.eval_expr(*arg, ctx)?);
        }

        let result = match function {
            Function::Contains => {
                Value::Boolean(self.string_arg(&arg_seqs, 0).contains(&self.string_arg(&arg_seqs, 1)))
            }
            Function::StartsWith => Value::Boolean(
                self.string_arg(&arg_seqs, 0)
                    .starts_with(&self.string_arg(&arg_seqs, 1)),
            ),
            Function::Substring => {
                let s = self.string_arg(&arg_seqs, 0);
                let start = self.number_arg(&arg_seqs, 1);
                let length = if arg_seqs.len() > 2 {
                    Some(self.number_arg(&arg_seqs, 2))
                } else {
                    None
                };
                Value::String(substring(&s, start, length))
            }
            Function::StringLength => {
                let s = match arg_seqs.first() {
                    Some(seq) => self.first_string(seq),
                    None => self.context_string(ctx)?,
                };
                Value::Integer(s.chars().count() as i64)
            }
            Function::Matches => {
                let input = self.string_arg(&arg_seqs, 0);
                let pattern = self.string_arg(&arg_seqs, 1);
                let re = Regex::new(&pattern).map_err(|e| {
                    QueryError::dynamic(format!("invalid pattern in matches(): {}", e))
                })?;
                Value::Boolean(re.is_match(&input))
            }
            Function::Count => Value::Integer(arg_seqs[0].len() as i64),
            Function::Not => Value::Boolean(!arg_seqs[0].ebv()?),
            Function::StringFn => {
                let s = match arg_seqs.first() {
                    Some(seq) => self.first_string(seq),
                    None => self.context_string(ctx)?,
                };
                Value::String(s)
            }
        };
        Ok(Sequence::singleton(result))
    }

    fn string_arg(&self, seqs: &[Sequence], index: usize) -> String {
        seqs.get(index).map(|s| self.first_string(s)).unwrap_or_default()
    }

    fn first_string(&self, seq: &Sequence) -> String {
        match seq.items().first() {
            Some(Value::Node(n)) => self.store.string_value(*n),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Integer(i)) => i.to_string(),
            Some(Value::Double(d)) => format_double(*d),
            Some(Value::Boolean(b)) => b.to_string(),
            None => String::new(),
        }
    }

    fn number_arg(&self, seqs: &[Sequence], index: usize) -> f64 {
        seqs.get(index)
            .and_then(|s| s.items().first())
            .and_then(|v| to_number(&self.atomize(v)))
            .unwrap_or(f64::NAN)
    }

    fn context_string(&self, ctx: EvalContext<'_>) -> Result<String, QueryError> {
        match ctx {
            EvalContext::Item { node, .. } => Ok(self.store.string_value(node)),
            _ => Err(QueryError::dynamic("context item required")),
        }
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Double(d) => Some(*d),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Node(_) => None,
    }
}

fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Integer(i) => *i != 0,
        Value::Double(d) => *d != 0.0 && !d.is_nan(),
        Value::Node(_) => true,
    }
}

fn to_string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Double(d) => format_double(*d),
        Value::Boolean(b) => b.to_string(),
        Value::Node(_) => String::new(),
    }
}

fn format_double(d: f64) -> String {
    if d == d.trunc() && d.is_finite() {
        format!("{}", d as i64)
    } else {
        format!("{}", d)
    }
}

/// 1-based substring with XPath rounding semantics
fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    if start.is_nan() {
        return String::new();
    }
    let start = start.round();
    let end = match length {
        Some(len) if len.is_nan() => return String::new(),
        Some(len) => start + len.round(),
        None => f64::INFINITY,
    };
    s.chars()
        .enumerate()
        .filter(|(i, _)| {
            let pos = (*i + 1) as f64;
            pos >= start && pos < end
        })
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_uses_one_based_positions() {
        assert_eq!(substring("12345", 2.0, Some(3.0)), "234");
        assert_eq!(substring("12345", 2.0, None), "2345");
        assert_eq!(substring("12345", 0.0, Some(3.0)), "12");
        assert_eq!(substring("abc", 1.0, Some(1.0)), "a");
    }

    #[test]
    fn ebv_follows_xpath_rules() {
        assert!(!Sequence::empty().ebv().unwrap());
        assert!(Sequence::singleton(Value::Boolean(true)).ebv().unwrap());
        assert!(!Sequence::singleton(Value::String(String::new()))
            .ebv()
            .unwrap());
        assert!(Sequence::singleton(Value::Integer(3)).ebv().unwrap());
        assert!(!Sequence::singleton(Value::Double(f64::NAN)).ebv().unwrap());
    }
}
