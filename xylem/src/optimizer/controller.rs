// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! The optimization controller pragma
//!
//! Wraps a path expression and decides, per evaluation, whether to
//! replace the naive tree-walk with index pre-selection followed by
//! upward ancestor verification. The expression tree is analyzed exactly
//! once; feasibility is re-checked per call behind a mutation-aware
//! cache keyed on the context node set's identity and state counter.

use log::debug;

use super::gateway::StructuralIndexGateway;
use super::optimizable::Optimizable;
use crate::dom::NameKind;
use crate::index::VerificationAxis;
use crate::store::{ContextId, NodeSet, NodeSetId};
use crate::xq::ast::{Axis, ExprArena, ExprId, ExprNode, NodeTest, Preload};
use crate::xq::errors::QueryError;
use crate::xq::eval::{Binding, EvalContext, Evaluator, Sequence};

/// One registered chain entry
#[derive(Debug, Clone, Copy)]
struct ChainEntry {
    expr: ExprId,
    /// The step whose predicate registered this entry, if any
    host_step: Option<ExprId>,
    /// True when `host_step` is the recorded context step; only then may
    /// the self/parent verification refinements apply
    on_context_step: bool,
}

/// The concrete-name location step index lookups can be scoped by
#[derive(Debug, Clone)]
struct ContextStep {
    step: ExprId,
    name: String,
}

/// Decision cached from the last feasibility check. Valid only while the
/// context keeps its identity and its state counter.
#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    identity: NodeSetId,
    state: u64,
    optimize: bool,
}

/// Counters exposed for tests and the CLI explain view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeDiagnostics {
    pub chain_len: usize,
    pub has_context_step: bool,
    pub feasibility_checks: u64,
    pub cache_hits: u64,
    pub optimized_evals: u64,
    pub fallback_evals: u64,
}

/// State of one `xylem:optimize` pragma instance
#[derive(Debug)]
pub struct OptimizeController {
    context_id: ContextId,
    enabled_override: Option<bool>,
    analyzed: bool,
    chain: Vec<ChainEntry>,
    context_step: Option<ContextStep>,
    context_var: Option<String>,
    cache: Option<CacheEntry>,
    feasibility_checks: u64,
    cache_hits: u64,
    optimized_evals: u64,
    fallback_evals: u64,
}

impl Default for OptimizeController {
    fn default() -> Self {
        Self::new(ContextId(u32::MAX), None)
    }
}

impl OptimizeController {
    pub fn new(context_id: ContextId, enabled_override: Option<bool>) -> Self {
        Self {
            context_id,
            enabled_override,
            analyzed: false,
            chain: Vec::new(),
            context_step: None,
            context_var: None,
            cache: None,
            feasibility_checks: 0,
            cache_hits: 0,
            optimized_evals: 0,
            fallback_evals: 0,
        }
    }

    /// Unconditionally clear the cache entry. Must be invoked when a
    /// compiled query is reused for a new, logically unrelated execution.
    pub fn reset_state(&mut self) {
        self.cache = None;
    }

    pub fn diagnostics(&self) -> OptimizeDiagnostics {
        OptimizeDiagnostics {
            chain_len: self.chain.len(),
            has_context_step: self.context_step.is_some(),
            feasibility_checks: self.feasibility_checks,
            cache_hits: self.cache_hits,
            optimized_evals: self.optimized_evals,
            fallback_evals: self.fallback_evals,
        }
    }

    /// Evaluate the wrapped expression, optimized where feasible.
    pub(crate) fn evaluate(
        &mut self,
        ev: &mut Evaluator<'_>,
        body: ExprId,
        ctx: EvalContext<'_>,
    ) -> Result<Sequence, QueryError> {
        if !self.analyzed {
            self.analyze(ev.arena, body);
        }

        let enabled = self.enabled_override.unwrap_or(ev.config.optimize_by_default);
        let context = match ctx {
            EvalContext::Set(ns) if enabled && !ns.is_in_memory() && !self.chain.is_empty() => {
                ns.clone()
            }
            other => return ev.eval_expr(body, other),
        };

        let decision = self.decide(ev, &context);
        if !decision {
            self.fallback_evals += 1;
            debug!("{}: optimization infeasible, evaluating unmodified", self.context_id);
            return ev.eval_expr(body, EvalContext::Set(&context));
        }

        match self.run_chain(ev, &context)? {
            Some(ancestors) => self.finish(ev, body, &context, ancestors),
            None => {
                // value resolution failed against the live bindings
                self.fallback_evals += 1;
                ev.eval_expr(body, EvalContext::Set(&context))
            }
        }
    }

    /// Reuse the cached decision when identity and counter both match;
    /// otherwise re-check feasibility over the whole chain and re-cache.
    fn decide(&mut self, ev: &mut Evaluator<'_>, context: &NodeSet) -> bool {
        if let Some(entry) = self.cache {
            if Some(entry.identity) == context.identity() && !context.changed_since(entry.state) {
                self.cache_hits += 1;
                return entry.optimize;
            }
        }

        let chain_context = self.chain_context(ev, context);
        self.feasibility_checks += 1;
        let mut optimize = true;
        for entry in &self.chain {
            let ExprNode::Comparison(cmp) = ev.arena.node(entry.expr) else {
                optimize = false;
                break;
            };
            if !cmp.can_optimize(ev.store, ev.config, ev.vars, &chain_context) {
                optimize = false;
                break;
            }
        }

        if let Some(identity) = context.identity() {
            self.cache = Some(CacheEntry {
                identity,
                state: context.state(),
                optimize,
            });
        }
        debug!(
            "{}: feasibility over {} chain entries -> {}",
            self.context_id,
            self.chain.len(),
            optimize
        );
        optimize
    }

    /// The context the chain starts from: the context variable's current
    /// value when one was recorded and currently holds a persistent node
    /// set, the original context otherwise.
    fn chain_context(&self, ev: &Evaluator<'_>, original: &NodeSet) -> NodeSet {
        if let Some(name) = &self.context_var {
            if let Some(Binding::NodeSet(ns)) = ev.vars.get(name) {
                if !ns.is_in_memory() {
                    return ns.clone();
                }
            }
        }
        original.clone()
    }

    /// The chained pre-selection / ancestor-verification loop. Returns
    /// the final ancestors set, or `None` when a pre-selection could not
    /// resolve its value against the live bindings.
    fn run_chain(
        &mut self,
        ev: &mut Evaluator<'_>,
        context: &NodeSet,
    ) -> Result<Option<NodeSet>, QueryError> {
        let mut running = self.chain_context(ev, context);
        let mut ancestors = None;

        for (i, entry) in self.chain.iter().enumerate() {
            let store = ev.store;
            let config = ev.config;
            let vars = ev.vars;
            let ExprNode::Comparison(cmp) = ev.arena.node_mut(entry.expr) else {
                return Ok(None);
            };
            let Some(selection) = cmp.pre_select(store, config, vars, &running, i > 0) else {
                return Ok(None);
            };
            let (on_self, on_child) = if entry.on_context_step {
                let ExprNode::Comparison(cmp) = ev.arena.node(entry.expr) else {
                    return Ok(None);
                };
                (cmp.applies_on_self(), cmp.applies_on_child())
            } else {
                (false, false)
            };

            if selection.is_empty() {
                // nothing can match; no join or gateway call is needed
                ancestors = Some(selection);
                break;
            }

            let joined = match &self.context_step {
                Some(step) if i == 0 => {
                    let axis = if on_self {
                        VerificationAxis::SelfAxis
                    } else if on_child {
                        VerificationAxis::Parent
                    } else {
                        VerificationAxis::AncestorOrSelf
                    };
                    StructuralIndexGateway::find_by_name(
                        ev.store,
                        NameKind::Element,
                        &step.name,
                        axis,
                        selection.document_set(),
                        &selection,
                        self.context_id,
                    )
                }
                _ => ev.store.select_ancestor_descendant(
                    &selection,
                    &running,
                    true,
                    self.context_id,
                ),
            };
            running = joined.clone();
            ancestors = Some(joined);
        }

        Ok(ancestors)
    }

    /// Hand the final ancestors to the context step as preloaded
    /// candidates and evaluate against the document-narrowed context, or
    /// evaluate directly against the ancestors when the chain was driven
    /// purely by the context variable.
    fn finish(
        &mut self,
        ev: &mut Evaluator<'_>,
        body: ExprId,
        original: &NodeSet,
        ancestors: NodeSet,
    ) -> Result<Sequence, QueryError> {
        self.optimized_evals += 1;
        debug!(
            "{}: optimized evaluation, {} verified candidates",
            self.context_id,
            ancestors.len()
        );
        match &self.context_step {
            Some(step) => {
                set_preload(ev.arena, step.step, Some(Preload {
                    nodes: ancestors.clone(),
                }));
                let narrowed = ev.store.narrow_to_docs(original, ancestors.document_set());
                let result = ev.eval_expr(body, EvalContext::Set(&narrowed));
                set_preload(ev.arena, step.step, None);
                result
            }
            None => ev.eval_expr(body, EvalContext::Set(&ancestors)),
        }
    }

    // ------------------------------------------------------------------
    // One-time analysis
    // ------------------------------------------------------------------

    /// Walk the wrapped expression's tree exactly once, collecting every
    /// reachable Optimizable and the context step.
    fn analyze(&mut self, arena: &ExprArena, body: ExprId) {
        self.analyzed = true;
        self.walk(arena, body);
        self.context_step = find_context_step(arena, body);
        if let Some(step) = &self.context_step {
            for entry in &mut self.chain {
                entry.on_context_step = entry.host_step == Some(step.step);
            }
        }
        debug!(
            "{}: analysis done, chain of {}, context step {}, context variable {:?}",
            self.context_id,
            self.chain.len(),
            self.context_step
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("absent"),
            self.context_var
        );
    }

    fn walk(&mut self, arena: &ExprArena, id: ExprId) {
        match arena.node(id) {
            ExprNode::Path(path) => {
                for step in path.steps.clone() {
                    self.walk(arena, step);
                }
            }
            ExprNode::Step(step) => {
                for pred in step.predicates.clone() {
                    self.register_predicate(arena, pred, Some(id));
                    self.walk(arena, pred);
                }
            }
            ExprNode::Filter(filter) => {
                if let ExprNode::VarRef(var) = arena.node(filter.base) {
                    if self.context_var.is_none() {
                        self.context_var = Some(var.name.clone());
                    }
                }
                for pred in filter.predicates.clone() {
                    self.register_predicate(arena, pred, None);
                    self.walk(arena, pred);
                }
            }
            ExprNode::Comparison(cmp) => {
                let mut children = Vec::new();
                if let crate::xq::ast::Operand::Expr(e) = &cmp.left {
                    children.push(*e);
                }
                if let crate::xq::ast::Operand::Expr(e) = &cmp.right {
                    children.push(*e);
                }
                for child in children {
                    self.walk(arena, child);
                }
            }
            ExprNode::Binary(bin) => {
                let (l, r) = (bin.left, bin.right);
                self.walk(arena, l);
                self.walk(arena, r);
            }
            ExprNode::FunctionCall(call) => {
                for arg in call.args.clone() {
                    self.walk(arena, arg);
                }
            }
            // nested pragmas run their own analysis
            ExprNode::Pragma(_) => {}
            ExprNode::Literal(_) | ExprNode::VarRef(_) => {}
        }
    }

    /// Register Optimizables reachable from a predicate root, descending
    /// through conjunctions only. A disjunction's branches must not join
    /// the chain: the chain intersects selections, which would change the
    /// meaning of `or`.
    fn register_predicate(&mut self, arena: &ExprArena, id: ExprId, host: Option<ExprId>) {
        match arena.node(id) {
            ExprNode::Comparison(cmp) => match cmp.optimize_axis() {
                Some(axis) => {
                    debug!(
                        "{}: registering chain entry with {:?} axis",
                        self.context_id, axis
                    );
                    self.chain.push(ChainEntry {
                        expr: id,
                        host_step: host,
                        on_context_step: false,
                    });
                }
                None => {
                    if cmp.declared_axis().is_some_and(|a| a.is_reverse()) {
                        debug!(
                            "{}: refusing reverse-axis comparison ({})",
                            self.context_id,
                            cmp.declared_axis().map(|a| a.name()).unwrap_or("?")
                        );
                    }
                }
            },
            ExprNode::Binary(bin) if bin.op == crate::xq::ast::LogicOp::And => {
                let (l, r) = (bin.left, bin.right);
                self.register_predicate(arena, l, host);
                self.register_predicate(arena, r, host);
            }
            _ => {}
        }
    }
}

/// The first location step of the wrapped path, when its name test is
/// concrete and it produces elements. Wildcard steps are discarded.
fn find_context_step(arena: &ExprArena, body: ExprId) -> Option<ContextStep> {
    let mut id = body;
    loop {
        match arena.node(id) {
            ExprNode::Pragma(p) => id = p.body,
            _ => break,
        }
    }
    let ExprNode::Path(path) = arena.node(id) else {
        return None;
    };
    let first = *path.steps.first()?;
    let ExprNode::Step(step) = arena.node(first) else {
        return None;
    };
    if !matches!(
        step.axis,
        Axis::Child | Axis::Descendant | Axis::DescendantOrSelf | Axis::SelfAxis
    ) {
        return None;
    }
    match &step.test {
        NodeTest::Name(name) => Some(ContextStep {
            step: first,
            name: name.clone(),
        }),
        NodeTest::Wildcard | NodeTest::AnyNode => None,
    }
}

fn set_preload(arena: &mut ExprArena, step: ExprId, preload: Option<Preload>) {
    if let ExprNode::Step(s) = arena.node_mut(step) {
        s.preload = preload;
    }
}
