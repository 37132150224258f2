// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Expression tree
//!
//! Expressions live in an arena indexed by [`ExprId`]; tree traversal
//! stays in the visitors and the optimizer, while per-node evaluation
//! state (index-usage flags, preloaded candidates) lives on the nodes
//! themselves. Mutable access therefore requires `&mut` on the whole
//! compiled query, which is what makes single-writer evaluation a
//! compile-time property.

use crate::optimizer::GuardPolicy;
use crate::store::NodeSet;

/// Index of an expression node in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub(crate) u32);

/// Arena holding every expression node of one compiled query
#[derive(Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
}

impl ExprArena {
    pub fn alloc(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clear per-execution node state: index-usage flags and preloaded
    /// candidates
    pub(crate) fn reset_eval_state(&mut self) {
        for node in &mut self.nodes {
            match node {
                ExprNode::Comparison(cmp) => cmp.used_index = false,
                ExprNode::Step(step) => step.preload = None,
                _ => {}
            }
        }
    }

    /// Every comparison node reachable from `root`, in visit order
    pub fn collect_comparisons(&self, root: ExprId) -> Vec<ExprId> {
        let mut out = Vec::new();
        self.visit_comparisons(root, &mut out);
        out
    }

    fn visit_comparisons(&self, id: ExprId, out: &mut Vec<ExprId>) {
        match self.node(id) {
            ExprNode::Path(path) => {
                for step in &path.steps {
                    self.visit_comparisons(*step, out);
                }
            }
            ExprNode::Step(step) => {
                for pred in &step.predicates {
                    self.visit_comparisons(*pred, out);
                }
            }
            ExprNode::Filter(filter) => {
                self.visit_comparisons(filter.base, out);
                for pred in &filter.predicates {
                    self.visit_comparisons(*pred, out);
                }
            }
            ExprNode::Comparison(cmp) => {
                out.push(id);
                if let Operand::Expr(e) = &cmp.left {
                    self.visit_comparisons(*e, out);
                }
                if let Operand::Expr(e) = &cmp.right {
                    self.visit_comparisons(*e, out);
                }
            }
            ExprNode::Binary(bin) => {
                self.visit_comparisons(bin.left, out);
                self.visit_comparisons(bin.right, out);
            }
            ExprNode::FunctionCall(call) => {
                for arg in &call.args {
                    self.visit_comparisons(*arg, out);
                }
            }
            ExprNode::Pragma(pragma) => {
                self.visit_comparisons(pragma.body, out);
            }
            ExprNode::Literal(_) | ExprNode::VarRef(_) => {}
        }
    }
}

/// One expression node
#[derive(Debug)]
pub enum ExprNode {
    Path(PathExpr),
    Step(StepExpr),
    Filter(FilterExpr),
    Comparison(ComparisonExpr),
    Binary(BinaryExpr),
    FunctionCall(FunctionCallExpr),
    Literal(Literal),
    VarRef(VarRefExpr),
    Pragma(PragmaExpr),
}

/// A traversal axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    SelfAxis,
    Child,
    Descendant,
    DescendantOrSelf,
    Attribute,
    Parent,
    Ancestor,
    AncestorOrSelf,
}

impl Axis {
    /// Reverse axes walk from a node back toward the context; index
    /// pre-selection followed by upward verification is undefined for
    /// them.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Axis::SelfAxis => "self",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Attribute => "attribute",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
        }
    }
}

/// A node test within a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Concrete name test
    Name(String),
    /// `*`
    Wildcard,
    /// `node()`
    AnyNode,
}

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    Double(f64),
}

/// General comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// The operator with its operands swapped
    pub fn mirrored(&self) -> ComparisonOp {
        match self {
            ComparisonOp::Eq => ComparisonOp::Eq,
            ComparisonOp::Ne => ComparisonOp::Ne,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// One step of a comparison-operand path pattern (no predicates)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStep {
    pub axis: Axis,
    pub test: NodeTest,
}

/// An operand of a general comparison
#[derive(Debug)]
pub enum Operand {
    /// A relative, predicate-free path
    Path(Vec<PatternStep>),
    Literal(Literal),
    Var(String),
    /// Anything else, held as a full expression
    Expr(ExprId),
}

/// A path expression: a sequence of steps, optionally rooted at the
/// document node
#[derive(Debug)]
pub struct PathExpr {
    pub absolute: bool,
    pub steps: Vec<ExprId>,
}

/// Candidates preloaded onto a location step by the optimization
/// controller; the step serves them instead of re-scanning documents.
#[derive(Debug)]
pub struct Preload {
    pub nodes: NodeSet,
}

/// A location step
#[derive(Debug)]
pub struct StepExpr {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<ExprId>,
    pub preload: Option<Preload>,
}

/// A filtered variable reference: `$v[p1][p2]`
#[derive(Debug)]
pub struct FilterExpr {
    pub base: ExprId,
    pub predicates: Vec<ExprId>,
}

/// A general comparison
#[derive(Debug)]
pub struct ComparisonExpr {
    pub op: ComparisonOp,
    pub left: Operand,
    pub right: Operand,
    /// True iff the most recent evaluation consulted an index
    pub used_index: bool,
}

#[derive(Debug)]
pub struct BinaryExpr {
    pub op: LogicOp,
    pub left: ExprId,
    pub right: ExprId,
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Contains,
    StartsWith,
    Substring,
    StringLength,
    Matches,
    Count,
    Not,
    StringFn,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        match name {
            "contains" => Some(Function::Contains),
            "starts-with" => Some(Function::StartsWith),
            "substring" => Some(Function::Substring),
            "string-length" => Some(Function::StringLength),
            "matches" => Some(Function::Matches),
            "count" => Some(Function::Count),
            "not" => Some(Function::Not),
            "string" => Some(Function::StringFn),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Contains => "contains",
            Function::StartsWith => "starts-with",
            Function::Substring => "substring",
            Function::StringLength => "string-length",
            Function::Matches => "matches",
            Function::Count => "count",
            Function::Not => "not",
            Function::StringFn => "string",
        }
    }

    /// (min, max) accepted argument counts
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Function::Contains | Function::StartsWith | Function::Matches => (2, 2),
            Function::Substring => (2, 3),
            Function::StringLength | Function::StringFn => (0, 1),
            Function::Count | Function::Not => (1, 1),
        }
    }
}

#[derive(Debug)]
pub struct FunctionCallExpr {
    pub function: Function,
    pub args: Vec<ExprId>,
}

#[derive(Debug)]
pub struct VarRefExpr {
    pub name: String,
}

/// What a pragma installs around its body
#[derive(Debug)]
pub enum PragmaKind {
    /// `xylem:optimize` — slot into the compiled query's controller table
    Optimize { slot: usize },
    /// `xylem:enforce-index`
    EnforceIndex { policy: GuardPolicy },
    /// A pragma this engine does not recognize; the body is evaluated
    /// unchanged
    Unknown { name: String },
}

#[derive(Debug)]
pub struct PragmaExpr {
    pub kind: PragmaKind,
    pub body: ExprId,
}
