//! Type checker: binds a parsed expression to the seven-field schema and
//! lowers it into an executable [`Program`].
//!
//! Literal arguments of `timestamp()`, `duration()` and `matches()` are
//! converted here once, so a bad literal is a [`CompileError`] and the
//! evaluator never re-parses it.

use regex::Regex;

use super::context::Field;
use super::parser::{parse, BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use super::value::{parse_duration, parse_timestamp, Value, ValueType};
use crate::error::CompileError;

/// Built-in functions and methods, resolved to a single overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    LowerAscii,
    StringSize,
    ListSize,
    ToTimestamp,
    ToDuration,
    TimestampToInt,
    IntToString,
    FullYear,
    Month,
    DayOfMonth,
    Date,
    DayOfWeek,
    Hours,
    Minutes,
}

/// Typed, executable expression tree.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    Const(Value),
    Field(Field),
    List(Vec<Node>),
    Not(Box<Node>),
    Negate(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Conditional(Box<Node>, Box<Node>, Box<Node>),
    /// Any binary operator other than `&&` and `||`.
    Binary(BinaryOp, Box<Node>, Box<Node>),
    /// Receiver (if any) first, then arguments.
    Call(Builtin, Vec<Node>),
    /// `matches()` with a pattern compiled ahead of time.
    Matches(Box<Node>, Regex),
}

/// A checked expression. Any result type is accepted here; a non-bool
/// result is reported when the program is evaluated.
#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub root: Node,
}

pub(crate) fn compile(source: &str) -> Result<Program, CompileError> {
    let expr = parse(source)?;
    let (root, _) = check(&expr)?;
    Ok(Program { root })
}

const FUNCTIONS: &[&str] = &[
    "timestamp",
    "duration",
    "size",
    "int",
    "string",
    "contains",
    "startsWith",
    "endsWith",
    "matches",
    "lowerAscii",
    "getFullYear",
    "getMonth",
    "getDayOfMonth",
    "getDate",
    "getDayOfWeek",
    "getHours",
    "getMinutes",
];

fn check(expr: &Expr) -> Result<(Node, ValueType), CompileError> {
    match &expr.kind {
        ExprKind::Literal(lit) => {
            let value = match lit {
                Literal::Int(n) => Value::Int(*n),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::String(s) => Value::String(s.clone()),
            };
            let ty = value.ty();
            Ok((Node::Const(value), ty))
        }

        ExprKind::Ident(name) => match Field::from_name(name) {
            Some(field) => Ok((Node::Field(field), field.ty())),
            None => Err(CompileError::UnknownIdentifier {
                offset: expr.offset,
                name: name.clone(),
            }),
        },

        ExprKind::List(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            let mut elem: Option<ValueType> = None;
            for item in items {
                let (node, ty) = check(item)?;
                match &elem {
                    Some(first) if !first.is_compatible(&ty) => {
                        return Err(CompileError::NoMatchingOverload {
                            offset: item.offset,
                            operation: "list literal".to_string(),
                            operands: format!("{}, {}", first, ty),
                        })
                    }
                    Some(_) => {}
                    None => elem = Some(ty),
                }
                nodes.push(node);
            }
            Ok((Node::List(nodes), ValueType::List(elem.map(Box::new))))
        }

        ExprKind::Unary(op, operand) => {
            let (node, ty) = check(operand)?;
            match (op, &ty) {
                (UnaryOp::Not, ValueType::Bool) => Ok((Node::Not(Box::new(node)), ValueType::Bool)),
                (UnaryOp::Negate, ValueType::Int | ValueType::Duration) => {
                    Ok((Node::Negate(Box::new(node)), ty))
                }
                _ => Err(CompileError::NoMatchingOverload {
                    offset: expr.offset,
                    operation: match op {
                        UnaryOp::Not => "!_".to_string(),
                        UnaryOp::Negate => "-_".to_string(),
                    },
                    operands: ty.to_string(),
                }),
            }
        }

        ExprKind::Binary(op, lhs, rhs) => {
            let (left, lt) = check(lhs)?;
            let (right, rt) = check(rhs)?;
            let result = binary_result(*op, &lt, &rt).ok_or_else(|| {
                CompileError::NoMatchingOverload {
                    offset: expr.offset,
                    operation: op.symbol().to_string(),
                    operands: format!("{}, {}", lt, rt),
                }
            })?;
            let (left, right) = (Box::new(left), Box::new(right));
            let node = match op {
                BinaryOp::And => Node::And(left, right),
                BinaryOp::Or => Node::Or(left, right),
                other => Node::Binary(*other, left, right),
            };
            Ok((node, result))
        }

        ExprKind::Conditional(cond, then, otherwise) => {
            let (c, ct) = check(cond)?;
            let (t, tt) = check(then)?;
            let (e, et) = check(otherwise)?;
            if ct != ValueType::Bool || !tt.is_compatible(&et) {
                return Err(CompileError::NoMatchingOverload {
                    offset: expr.offset,
                    operation: "_?_:_".to_string(),
                    operands: format!("{}, {}, {}", ct, tt, et),
                });
            }
            let ty = match tt {
                ValueType::List(None) => et,
                other => other,
            };
            Ok((
                Node::Conditional(Box::new(c), Box::new(t), Box::new(e)),
                ty,
            ))
        }

        ExprKind::Call {
            target,
            function,
            args,
        } => check_call(expr.offset, target.as_deref(), function, args),
    }
}

fn binary_result(op: BinaryOp, l: &ValueType, r: &ValueType) -> Option<ValueType> {
    use ValueType::*;
    match op {
        BinaryOp::And | BinaryOp::Or => (*l == Bool && *r == Bool).then_some(Bool),
        BinaryOp::Eq | BinaryOp::Ne => l.is_compatible(r).then_some(Bool),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            (l == r && l.is_ordered()).then_some(Bool)
        }
        BinaryOp::In => match r {
            List(None) => Some(Bool),
            List(Some(elem)) => l.is_compatible(elem).then_some(Bool),
            _ => None,
        },
        BinaryOp::Add => match (l, r) {
            (Int, Int) => Some(Int),
            (String, String) => Some(String),
            (Timestamp, Duration) | (Duration, Timestamp) => Some(Timestamp),
            (Duration, Duration) => Some(Duration),
            _ => None,
        },
        BinaryOp::Sub => match (l, r) {
            (Int, Int) => Some(Int),
            (Timestamp, Timestamp) => Some(Duration),
            (Timestamp, Duration) => Some(Timestamp),
            (Duration, Duration) => Some(Duration),
            _ => None,
        },
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (*l == Int && *r == Int).then_some(Int),
    }
}

fn check_call(
    offset: usize,
    target: Option<&Expr>,
    function: &str,
    args: &[Expr],
) -> Result<(Node, ValueType), CompileError> {
    if !FUNCTIONS.contains(&function) {
        return Err(CompileError::UnknownIdentifier {
            offset,
            name: function.to_string(),
        });
    }

    let mut nodes = Vec::with_capacity(args.len() + 1);
    let mut types = Vec::with_capacity(args.len() + 1);
    if let Some(receiver) = target {
        let (node, ty) = check(receiver)?;
        nodes.push(node);
        types.push(ty);
    }
    for arg in args {
        let (node, ty) = check(arg)?;
        nodes.push(node);
        types.push(ty);
    }

    let (builtin, result) = resolve_overload(target.is_some(), function, &types).ok_or_else(|| {
        let operands: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        CompileError::NoMatchingOverload {
            offset,
            operation: function.to_string(),
            operands: operands.join(", "),
        }
    })?;

    // Convert literal arguments ahead of time.
    match (builtin, nodes.as_slice()) {
        (Builtin::ToTimestamp, [Node::Const(Value::String(s))]) => {
            let t = parse_timestamp(s).map_err(|reason| CompileError::InvalidLiteral {
                offset,
                kind: "timestamp",
                literal: s.clone(),
                reason,
            })?;
            return Ok((Node::Const(Value::Timestamp(t)), result));
        }
        (Builtin::ToDuration, [Node::Const(Value::String(s))]) => {
            let d = parse_duration(s).map_err(|reason| CompileError::InvalidLiteral {
                offset,
                kind: "duration",
                literal: s.clone(),
                reason,
            })?;
            return Ok((Node::Const(Value::Duration(d)), result));
        }
        (Builtin::Matches, [receiver, Node::Const(Value::String(pattern))]) => {
            let regex = Regex::new(pattern).map_err(|e| CompileError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            return Ok((Node::Matches(Box::new(receiver.clone()), regex), result));
        }
        _ => {}
    }

    Ok((Node::Call(builtin, nodes), result))
}

/// Pick the overload for `function` given the receiver/argument types.
fn resolve_overload(
    is_method: bool,
    function: &str,
    types: &[ValueType],
) -> Option<(Builtin, ValueType)> {
    use ValueType::*;
    let found = if is_method {
        match (function, types) {
            ("contains", [String, String]) => (Builtin::Contains, Bool),
            ("startsWith", [String, String]) => (Builtin::StartsWith, Bool),
            ("endsWith", [String, String]) => (Builtin::EndsWith, Bool),
            ("matches", [String, String]) => (Builtin::Matches, Bool),
            ("lowerAscii", [String]) => (Builtin::LowerAscii, String),
            ("size", [String]) => (Builtin::StringSize, Int),
            ("size", [List(_)]) => (Builtin::ListSize, Int),
            ("getFullYear", [Timestamp]) => (Builtin::FullYear, Int),
            ("getMonth", [Timestamp]) => (Builtin::Month, Int),
            ("getDayOfMonth", [Timestamp]) => (Builtin::DayOfMonth, Int),
            ("getDate", [Timestamp]) => (Builtin::Date, Int),
            ("getDayOfWeek", [Timestamp]) => (Builtin::DayOfWeek, Int),
            ("getHours", [Timestamp]) => (Builtin::Hours, Int),
            ("getMinutes", [Timestamp]) => (Builtin::Minutes, Int),
            _ => return None,
        }
    } else {
        match (function, types) {
            ("timestamp", [String]) => (Builtin::ToTimestamp, Timestamp),
            ("duration", [String]) => (Builtin::ToDuration, Duration),
            ("size", [String]) => (Builtin::StringSize, Int),
            ("size", [List(_)]) => (Builtin::ListSize, Int),
            ("int", [Timestamp]) => (Builtin::TimestampToInt, Int),
            ("string", [Int]) => (Builtin::IntToString, String),
            ("matches", [String, String]) => (Builtin::Matches, Bool),
            _ => return None,
        }
    };
    Some(found)
}
