// Copyright (c) 2024-2025 Xylem Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Query parser
//!
//! `nom`-based parser for the path expression subset: absolute and
//! relative paths (`//` maps to the descendant axis), predicates,
//! general comparisons, `and`/`or`, literals, variable references,
//! function calls, and pragma extension expressions
//! `(# name content #) { expr }`.
//!
//! Parsing happens in two phases: a pure `nom` grammar producing a
//! throwaway tree, then a lowering pass that builds the expression arena,
//! validates functions and pragma content, and allocates optimization
//! controllers. All errors here are static errors.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while};
use nom::character::complete::{char, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, map, not, opt, peek, recognize, verify};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use log::warn;

use super::ast::{
    Axis, BinaryExpr, ComparisonExpr, ComparisonOp, ExprArena, ExprId, ExprNode, FilterExpr,
    Function, FunctionCallExpr, Literal, LogicOp, NodeTest, Operand, PathExpr, PatternStep,
    PragmaExpr, PragmaKind, StepExpr, VarRefExpr,
};
use super::errors::QueryError;
use crate::optimizer::{GuardPolicy, OptimizeController};
use crate::store::ContextId;

/// Pragma name installing the optimization controller
pub const PRAGMA_OPTIMIZE: &str = "xylem:optimize";
/// Pragma name installing the force-index-use guard
pub const PRAGMA_ENFORCE_INDEX: &str = "xylem:enforce-index";

/// Result of parsing one query
#[derive(Debug)]
pub(crate) struct Parsed {
    pub arena: ExprArena,
    pub root: ExprId,
    pub controllers: Vec<OptimizeController>,
}

/// Parse `text` into an expression arena.
pub(crate) fn parse(text: &str) -> Result<Parsed, QueryError> {
    let (_, pexpr) = all_consuming(terminated(expr, multispace0))(text).map_err(|e| {
        QueryError::static_error(match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("parse error near '{}'", truncate(e.input))
            }
            nom::Err::Incomplete(_) => "unexpected end of query".to_string(),
        })
    })?;
    let mut arena = ExprArena::default();
    let mut controllers = Vec::new();
    let root = lower(pexpr, &mut arena, &mut controllers)?;
    Ok(Parsed {
        arena,
        root,
        controllers,
    })
}

fn truncate(input: &str) -> &str {
    let end = input
        .char_indices()
        .nth(24)
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    &input[..end]
}

// ----------------------------------------------------------------------
// Phase 1: grammar
// ----------------------------------------------------------------------

#[derive(Debug)]
enum PExpr {
    Binary(LogicOp, Box<PExpr>, Box<PExpr>),
    Comparison(ComparisonOp, Box<PExpr>, Box<PExpr>),
    Path { absolute: bool, steps: Vec<PStep> },
    Filter { var: String, predicates: Vec<PExpr> },
    Literal(Literal),
    Var(String),
    Call(String, Vec<PExpr>),
    Pragma { name: String, content: String, body: Box<PExpr> },
}

#[derive(Debug)]
struct PStep {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<PExpr>,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn ncname(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(is_name_start), take_while(is_name_char)))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(is_name_char))))
}

fn expr(input: &str) -> IResult<&str, PExpr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, PExpr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(
        delimited(multispace0, keyword("or"), multispace0),
        and_expr,
    ))(input)?;
    Ok((input, fold_binary(LogicOp::Or, first, rest)))
}

fn and_expr(input: &str) -> IResult<&str, PExpr> {
    let (input, first) = comparison_expr(input)?;
    let (input, rest) = many0(preceded(
        delimited(multispace0, keyword("and"), multispace0),
        comparison_expr,
    ))(input)?;
    Ok((input, fold_binary(LogicOp::And, first, rest)))
}

fn fold_binary(op: LogicOp, first: PExpr, rest: Vec<PExpr>) -> PExpr {
    rest.into_iter().fold(first, |acc, next| {
        PExpr::Binary(op, Box::new(acc), Box::new(next))
    })
}

fn comparison_expr(input: &str) -> IResult<&str, PExpr> {
    let (input, left) = unary_expr(input)?;
    let (input, tail) = opt(pair(
        delimited(multispace0, comparison_op, multispace0),
        unary_expr,
    ))(input)?;
    Ok((input, match tail {
        Some((op, right)) => PExpr::Comparison(op, Box::new(left), Box::new(right)),
        None => left,
    }))
}

fn comparison_op(input: &str) -> IResult<&str, ComparisonOp> {
    alt((
        map(tag("!="), |_| ComparisonOp::Ne),
        map(tag("<="), |_| ComparisonOp::Le),
        map(tag(">="), |_| ComparisonOp::Ge),
        map(tag("="), |_| ComparisonOp::Eq),
        map(tag("<"), |_| ComparisonOp::Lt),
        map(tag(">"), |_| ComparisonOp::Gt),
    ))(input)
}

fn unary_expr(input: &str) -> IResult<&str, PExpr> {
    alt((
        pragma_expr,
        string_literal,
        number_literal,
        var_filter,
        path_expr,
        function_call,
        paren_expr,
    ))(input)
}

fn paren_expr(input: &str) -> IResult<&str, PExpr> {
    delimited(
        pair(char('('), multispace0),
        expr,
        pair(multispace0, char(')')),
    )(input)
}

fn pragma_expr(input: &str) -> IResult<&str, PExpr> {
    let (input, _) = tag("(#")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, name) = recognize(tuple((ncname, opt(pair(char(':'), ncname)))))(input)?;
    let (input, content) = take_until("#)")(input)?;
    let (input, _) = tag("#)")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, body) = delimited(
        pair(char('{'), multispace0),
        expr,
        pair(multispace0, char('}')),
    )(input)?;
    Ok((
        input,
        PExpr::Pragma {
            name: name.to_string(),
            content: content.trim().to_string(),
            body: Box::new(body),
        },
    ))
}

fn string_literal(input: &str) -> IResult<&str, PExpr> {
    let double = delimited(char('"'), take_while(|c| c != '"'), char('"'));
    let single = delimited(char('\''), take_while(|c| c != '\''), char('\''));
    map(alt((double, single)), |s: &str| {
        PExpr::Literal(Literal::String(s.to_string()))
    })(input)
}

fn number_literal(input: &str) -> IResult<&str, PExpr> {
    let (input, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    let literal = if text.contains('.') {
        Literal::Double(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Literal::Integer(n),
            Err(_) => Literal::Double(text.parse().unwrap_or(0.0)),
        }
    };
    Ok((input, PExpr::Literal(literal)))
}

fn var_filter(input: &str) -> IResult<&str, PExpr> {
    let (input, name) = preceded(char('$'), ncname)(input)?;
    let (input, predicates) = many0(predicate)(input)?;
    Ok((input, if predicates.is_empty() {
        PExpr::Var(name.to_string())
    } else {
        PExpr::Filter {
            var: name.to_string(),
            predicates,
        }
    }))
}

fn function_call(input: &str) -> IResult<&str, PExpr> {
    let (input, name) = ncname(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = function_args(input)?;
    let (input, _) = pair(multispace0, char(')'))(input)?;
    Ok((input, PExpr::Call(name.to_string(), args)))
}

fn function_args(input: &str) -> IResult<&str, Vec<PExpr>> {
    let (input, first) = opt(expr)(input)?;
    let Some(first) = first else {
        return Ok((input, Vec::new()));
    };
    let (input, mut rest) = many0(preceded(
        delimited(multispace0, char(','), multispace0),
        expr,
    ))(input)?;
    let mut args = vec![first];
    args.append(&mut rest);
    Ok((input, args))
}

fn predicate(input: &str) -> IResult<&str, PExpr> {
    delimited(
        pair(char('['), multispace0),
        expr,
        pair(multispace0, char(']')),
    )(input)
}

/// A path: optional leading `/` or `//`, then separated steps.
fn path_expr(input: &str) -> IResult<&str, PExpr> {
    let (rest, leading) = opt(alt((tag("//"), tag("/"))))(input)?;
    let absolute = leading.is_some();
    let mut steps = Vec::new();
    let mut current = rest;

    match leading {
        Some(sep) => {
            // "/" alone is the document node; "//" requires a step
            match preceded(multispace0, raw_step)(current) {
                Ok((next, step)) => {
                    push_step(&mut steps, sep == "//", step);
                    current = next;
                }
                Err(e) => {
                    if sep == "//" {
                        return Err(e);
                    }
                    return Ok((current, PExpr::Path { absolute, steps }));
                }
            }
        }
        None => {
            let (next, step) = raw_step(current)?;
            push_step(&mut steps, false, step);
            current = next;
        }
    }

    loop {
        let mut sep_parser = delimited(multispace0, alt((tag("//"), tag("/"))), multispace0);
        let sep_result: IResult<&str, &str> = sep_parser(current);
        let Ok((after_sep, sep)) = sep_result else {
            break;
        };
        let (next, step) = raw_step(after_sep)?;
        push_step(&mut steps, sep == "//", step);
        current = next;
    }

    Ok((current, PExpr::Path { absolute, steps }))
}

/// Normalize a `//`-separated step into the step list. A default-axis
/// (child) step becomes a descendant step; anything else gets a
/// `descendant-or-self::node()` step in front.
fn push_step(steps: &mut Vec<PStep>, descendant: bool, mut step: PStep) {
    if descendant {
        if step.axis == Axis::Child {
            step.axis = Axis::Descendant;
        } else {
            steps.push(PStep {
                axis: Axis::DescendantOrSelf,
                test: NodeTest::AnyNode,
                predicates: Vec::new(),
            });
        }
    }
    steps.push(step);
}

fn raw_step(input: &str) -> IResult<&str, PStep> {
    let (input, (axis, test)) = alt((
        map(tag(".."), |_| (Axis::Parent, NodeTest::AnyNode)),
        map(tag("."), |_| (Axis::SelfAxis, NodeTest::AnyNode)),
        map(preceded(char('@'), node_test), |test| {
            (Axis::Attribute, test)
        }),
        explicit_axis_step,
        map(node_test, |test| (Axis::Child, test)),
    ))(input)?;
    let (input, predicates) = many0(preceded(multispace0, predicate))(input)?;
    Ok((
        input,
        PStep {
            axis,
            test,
            predicates,
        },
    ))
}

fn explicit_axis_step(input: &str) -> IResult<&str, (Axis, NodeTest)> {
    let (input, axis) = terminated(axis_name, tag("::"))(input)?;
    let (input, test) = node_test(input)?;
    Ok((input, (axis, test)))
}

fn axis_name(input: &str) -> IResult<&str, Axis> {
    alt((
        map(keyword("descendant-or-self"), |_| Axis::DescendantOrSelf),
        map(keyword("descendant"), |_| Axis::Descendant),
        map(keyword("ancestor-or-self"), |_| Axis::AncestorOrSelf),
        map(keyword("ancestor"), |_| Axis::Ancestor),
        map(keyword("attribute"), |_| Axis::Attribute),
        map(keyword("child"), |_| Axis::Child),
        map(keyword("parent"), |_| Axis::Parent),
        map(keyword("self"), |_| Axis::SelfAxis),
    ))(input)
}

fn node_test(input: &str) -> IResult<&str, NodeTest> {
    alt((
        map(tuple((tag("node"), multispace0, tag("()"))), |_| {
            NodeTest::AnyNode
        }),
        map(char('*'), |_| NodeTest::Wildcard),
        // a name followed by '(' is a function call, not a step
        map(
            verify(terminated(ncname, not(peek(char('(')))), |name: &str| {
                !name.is_empty()
            }),
            |name: &str| NodeTest::Name(name.to_string()),
        ),
    ))(input)
}

// ----------------------------------------------------------------------
// Phase 2: lowering
// ----------------------------------------------------------------------

fn lower(
    pexpr: PExpr,
    arena: &mut ExprArena,
    controllers: &mut Vec<OptimizeController>,
) -> Result<ExprId, QueryError> {
    match pexpr {
        PExpr::Binary(op, left, right) => {
            let left = lower(*left, arena, controllers)?;
            let right = lower(*right, arena, controllers)?;
            Ok(arena.alloc(ExprNode::Binary(BinaryExpr { op, left, right })))
        }
        PExpr::Comparison(op, left, right) => {
            let left = lower_operand(*left, arena, controllers)?;
            let right = lower_operand(*right, arena, controllers)?;
            Ok(arena.alloc(ExprNode::Comparison(ComparisonExpr {
                op,
                left,
                right,
                used_index: false,
            })))
        }
        PExpr::Path { absolute, steps } => {
            let mut step_ids = Vec::with_capacity(steps.len());
            for step in steps {
                let mut predicates = Vec::with_capacity(step.predicates.len());
                for pred in step.predicates {
                    predicates.push(lower(pred, arena, controllers)?);
                }
                step_ids.push(arena.alloc(ExprNode::Step(StepExpr {
                    axis: step.axis,
                    test: step.test,
                    predicates,
                    preload: None,
                })));
            }
            Ok(arena.alloc(ExprNode::Path(PathExpr {
                absolute,
                steps: step_ids,
            })))
        }
        PExpr::Filter { var, predicates } => {
            let base = arena.alloc(ExprNode::VarRef(VarRefExpr { name: var }));
            let mut preds = Vec::with_capacity(predicates.len());
            for pred in predicates {
                preds.push(lower(pred, arena, controllers)?);
            }
            Ok(arena.alloc(ExprNode::Filter(FilterExpr {
                base,
                predicates: preds,
            })))
        }
        PExpr::Literal(lit) => Ok(arena.alloc(ExprNode::Literal(lit))),
        PExpr::Var(name) => Ok(arena.alloc(ExprNode::VarRef(VarRefExpr { name }))),
        PExpr::Call(name, args) => {
            let function = Function::from_name(&name)
                .ok_or_else(|| QueryError::static_error(format!("unknown function {}()", name)))?;
            let (min, max) = function.arity();
            if args.len() < min || args.len() > max {
                return Err(QueryError::static_error(format!(
                    "{}() expects {}..{} arguments, got {}",
                    name,
                    min,
                    max,
                    args.len()
                )));
            }
            let mut arg_ids = Vec::with_capacity(args.len());
            for arg in args {
                arg_ids.push(lower(arg, arena, controllers)?);
            }
            Ok(arena.alloc(ExprNode::FunctionCall(FunctionCallExpr {
                function,
                args: arg_ids,
            })))
        }
        PExpr::Pragma {
            name,
            content,
            body,
        } => {
            let kind = match name.as_str() {
                PRAGMA_OPTIMIZE => {
                    let enabled = parse_optimize_content(&content)?;
                    let slot = controllers.len();
                    controllers.push(OptimizeController::new(
                        ContextId(slot as u32),
                        enabled,
                    ));
                    PragmaKind::Optimize { slot }
                }
                PRAGMA_ENFORCE_INDEX => {
                    if !content.is_empty() {
                        return Err(QueryError::static_error(format!(
                            "pragma {} takes no content, got '{}'",
                            PRAGMA_ENFORCE_INDEX, content
                        )));
                    }
                    PragmaKind::EnforceIndex {
                        policy: GuardPolicy::default(),
                    }
                }
                other => {
                    warn!("Ignoring unrecognized pragma '{}'", other);
                    PragmaKind::Unknown {
                        name: other.to_string(),
                    }
                }
            };
            let body = lower(*body, arena, controllers)?;
            Ok(arena.alloc(ExprNode::Pragma(PragmaExpr { kind, body })))
        }
    }
}

/// `enable=yes|no`; anything else is a static error.
fn parse_optimize_content(content: &str) -> Result<Option<bool>, QueryError> {
    let mut enabled = None;
    for token in content.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            return Err(QueryError::static_error(format!(
                "malformed pragma option '{}', expected key=value",
                token
            )));
        };
        match key {
            "enable" => match value {
                "yes" => enabled = Some(true),
                "no" => enabled = Some(false),
                other => {
                    return Err(QueryError::static_error(format!(
                        "invalid value '{}' for pragma option 'enable'",
                        other
                    )))
                }
            },
            other => {
                return Err(QueryError::static_error(format!(
                    "unrecognized pragma option '{}'",
                    other
                )))
            }
        }
    }
    Ok(enabled)
}

/// Lower a comparison operand. Relative, predicate-free paths become
/// path patterns the index machinery can classify; everything else is
/// kept as a child expression.
fn lower_operand(
    pexpr: PExpr,
    arena: &mut ExprArena,
    controllers: &mut Vec<OptimizeController>,
) -> Result<Operand, QueryError> {
    match pexpr {
        PExpr::Literal(lit) => Ok(Operand::Literal(lit)),
        PExpr::Var(name) => Ok(Operand::Var(name)),
        PExpr::Path { absolute: false, steps }
            if steps.iter().all(|s| s.predicates.is_empty()) =>
        {
            Ok(Operand::Path(
                steps
                    .into_iter()
                    .map(|s| PatternStep {
                        axis: s.axis,
                        test: s.test,
                    })
                    .collect(),
            ))
        }
        other => Ok(Operand::Expr(lower(other, arena, controllers)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_node(text: &str) -> (Parsed, &'static str) {
        let parsed = parse(text).expect("parse");
        (parsed, "")
    }

    #[test]
    fn parses_descendant_shorthand_as_descendant_axis() {
        let (parsed, _) = root_node(r#"//book"#);
        let ExprNode::Path(path) = parsed.arena.node(parsed.root) else {
            panic!("expected path");
        };
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 1);
        let ExprNode::Step(step) = parsed.arena.node(path.steps[0]) else {
            panic!("expected step");
        };
        assert_eq!(step.axis, Axis::Descendant);
        assert_eq!(step.test, NodeTest::Name("book".into()));
    }

    #[test]
    fn parses_predicates_with_comparisons() {
        let (parsed, _) = root_node(r#"//book[@id = "b1"]"#);
        let ExprNode::Path(path) = parsed.arena.node(parsed.root) else {
            panic!("expected path");
        };
        let ExprNode::Step(step) = parsed.arena.node(path.steps[0]) else {
            panic!("expected step");
        };
        assert_eq!(step.predicates.len(), 1);
        let ExprNode::Comparison(cmp) = parsed.arena.node(step.predicates[0]) else {
            panic!("expected comparison");
        };
        assert_eq!(cmp.op, ComparisonOp::Eq);
        let Operand::Path(pattern) = &cmp.left else {
            panic!("expected pattern operand");
        };
        assert_eq!(pattern.len(), 1);
        assert_eq!(pattern[0].axis, Axis::Attribute);
        assert!(matches!(cmp.right, Operand::Literal(Literal::String(_))));
    }

    #[test]
    fn double_slash_attribute_expands_to_two_steps() {
        let (parsed, _) = root_node(r#"book[.//@id = "x"]"#);
        let ExprNode::Path(path) = parsed.arena.node(parsed.root) else {
            panic!("expected path");
        };
        let ExprNode::Step(step) = parsed.arena.node(path.steps[0]) else {
            panic!("expected step");
        };
        let ExprNode::Comparison(cmp) = parsed.arena.node(step.predicates[0]) else {
            panic!("expected comparison");
        };
        let Operand::Path(pattern) = &cmp.left else {
            panic!("expected pattern operand");
        };
        assert_eq!(pattern[0].axis, Axis::SelfAxis);
        assert_eq!(pattern[1].axis, Axis::DescendantOrSelf);
        assert_eq!(pattern[1].test, NodeTest::AnyNode);
        assert_eq!(pattern[2].axis, Axis::Attribute);
    }

    #[test]
    fn parses_explicit_axes_and_keywords() {
        let (parsed, _) = root_node(r#"a[b = "x" and ancestor::c = "y"]"#);
        let ExprNode::Path(path) = parsed.arena.node(parsed.root) else {
            panic!("expected path");
        };
        let ExprNode::Step(step) = parsed.arena.node(path.steps[0]) else {
            panic!("expected step");
        };
        let ExprNode::Binary(bin) = parsed.arena.node(step.predicates[0]) else {
            panic!("expected and");
        };
        assert_eq!(bin.op, LogicOp::And);
        let ExprNode::Comparison(right) = parsed.arena.node(bin.right) else {
            panic!("expected comparison");
        };
        let Operand::Path(pattern) = &right.left else {
            panic!("expected pattern");
        };
        assert_eq!(pattern[0].axis, Axis::Ancestor);
    }

    #[test]
    fn parses_function_calls_and_checks_arity() {
        assert!(parse(r#"//a[contains(@id, "x")]"#).is_ok());
        assert!(parse(r#"//a[substring(@id, 1, 1) = "x"]"#).is_ok());
        let err = parse(r#"//a[contains(@id)]"#).unwrap_err();
        assert!(matches!(err, QueryError::Static(_)));
        let err = parse(r#"//a[frobnicate(@id)]"#).unwrap_err();
        assert!(matches!(err, QueryError::Static(_)));
    }

    #[test]
    fn parses_optimize_pragma_with_content() {
        let parsed = parse(r#"(# xylem:optimize enable=yes #) { //book[@id = "b1"] }"#).unwrap();
        assert_eq!(parsed.controllers.len(), 1);
        let ExprNode::Pragma(pragma) = parsed.arena.node(parsed.root) else {
            panic!("expected pragma");
        };
        assert!(matches!(pragma.kind, PragmaKind::Optimize { slot: 0 }));
    }

    #[test]
    fn malformed_pragma_content_is_a_static_error() {
        let err = parse(r#"(# xylem:optimize enable #) { //book }"#).unwrap_err();
        assert!(matches!(err, QueryError::Static(_)));
        let err = parse(r#"(# xylem:optimize enable=maybe #) { //book }"#).unwrap_err();
        assert!(matches!(err, QueryError::Static(_)));
        let err = parse(r#"(# xylem:optimize cache=yes #) { //book }"#).unwrap_err();
        assert!(matches!(err, QueryError::Static(_)));
    }

    #[test]
    fn unknown_pragmas_are_transparent() {
        let parsed = parse(r#"(# vendor:hint #) { //book }"#).unwrap();
        let ExprNode::Pragma(pragma) = parsed.arena.node(parsed.root) else {
            panic!("expected pragma");
        };
        assert!(matches!(pragma.kind, PragmaKind::Unknown { .. }));
        assert!(parsed.controllers.is_empty());
    }

    #[test]
    fn parses_variable_filters() {
        let parsed = parse(r#"$books[year = 1965]"#).unwrap();
        let ExprNode::Filter(filter) = parsed.arena.node(parsed.root) else {
            panic!("expected filter");
        };
        assert!(matches!(
            parsed.arena.node(filter.base),
            ExprNode::VarRef(_)
        ));
        assert_eq!(filter.predicates.len(), 1);
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse(r#"//book }"#).is_err());
    }

    #[test]
    fn parses_root_path() {
        let parsed = parse("/").unwrap();
        let ExprNode::Path(path) = parsed.arena.node(parsed.root) else {
            panic!("expected path");
        };
        assert!(path.absolute);
        assert!(path.steps.is_empty());
    }
}
