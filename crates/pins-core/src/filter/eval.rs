//! Three-valued evaluation of a checked [`Node`] tree.
//!
//! `Ok(None)` is the unknown value produced by a deferred field. It
//! propagates through every operator except `&&` and `||`, which still
//! decide when the known side is enough (`false && ?` is `false`).

use chrono::{Datelike, Timelike};
use regex::Regex;

use super::checker::{Builtin, Node};
use super::context::{lookup, Record};
use super::parser::BinaryOp;
use super::value::{parse_duration, parse_timestamp, Value, ValueType};
use crate::error::EvaluationError;

type Outcome = Result<Option<Value>, EvaluationError>;

/// Unwrap a known value or return unknown from the enclosing function.
macro_rules! known {
    ($e:expr) => {
        match $e? {
            Some(v) => v,
            None => return Ok(None),
        }
    };
}

pub(crate) fn eval(node: &Node, record: &dyn Record) -> Outcome {
    match node {
        Node::Const(v) => Ok(Some(v.clone())),
        Node::Field(field) => lookup(record, *field),

        Node::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(known!(eval(item, record)));
            }
            Ok(Some(Value::List(values)))
        }

        Node::Not(inner) => match known!(eval(inner, record)) {
            Value::Bool(b) => Ok(Some(Value::Bool(!b))),
            other => Err(unexpected("!_", &other)),
        },

        Node::Negate(inner) => match known!(eval(inner, record)) {
            Value::Int(n) => n
                .checked_neg()
                .map(|n| Some(Value::Int(n)))
                .ok_or(EvaluationError::Overflow { operation: "-_" }),
            Value::Duration(d) => Ok(Some(Value::Duration(-d))),
            other => Err(unexpected("-_", &other)),
        },

        Node::And(lhs, rhs) => {
            let left = eval_bool(lhs, record, "_&&_")?;
            if left == Some(false) {
                return Ok(Some(Value::Bool(false)));
            }
            let right = eval_bool(rhs, record, "_&&_")?;
            Ok(match (left, right) {
                (_, Some(false)) => Some(Value::Bool(false)),
                (Some(true), Some(true)) => Some(Value::Bool(true)),
                _ => None,
            })
        }

        Node::Or(lhs, rhs) => {
            let left = eval_bool(lhs, record, "_||_")?;
            if left == Some(true) {
                return Ok(Some(Value::Bool(true)));
            }
            let right = eval_bool(rhs, record, "_||_")?;
            Ok(match (left, right) {
                (_, Some(true)) => Some(Value::Bool(true)),
                (Some(false), Some(false)) => Some(Value::Bool(false)),
                _ => None,
            })
        }

        Node::Conditional(cond, then, otherwise) => {
            match eval_bool(cond, record, "_?_:_")? {
                Some(true) => eval(then, record),
                Some(false) => eval(otherwise, record),
                None => Ok(None),
            }
        }

        Node::Binary(op, lhs, rhs) => {
            let left = known!(eval(lhs, record));
            let right = known!(eval(rhs, record));
            binary(*op, left, right).map(Some)
        }

        Node::Call(builtin, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(known!(eval(arg, record)));
            }
            call(*builtin, values).map(Some)
        }

        Node::Matches(target, regex) => match known!(eval(target, record)) {
            Value::String(s) => Ok(Some(Value::Bool(regex.is_match(&s)))),
            other => Err(unexpected("matches", &other)),
        },
    }
}

fn eval_bool(
    node: &Node,
    record: &dyn Record,
    operation: &'static str,
) -> Result<Option<bool>, EvaluationError> {
    match eval(node, record)? {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(unexpected(operation, &other)),
    }
}

fn unexpected(operation: &'static str, value: &Value) -> EvaluationError {
    EvaluationError::UnexpectedType {
        operation,
        found: value.ty(),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvaluationError> {
    use Value::*;
    let name = op.symbol();
    let overflow = || EvaluationError::Overflow { operation: name };
    let out_of_range = || EvaluationError::TimestampOutOfRange { operation: name };

    let value = match (op, left, right) {
        (BinaryOp::Eq, l, r) => Bool(l == r),
        (BinaryOp::Ne, l, r) => Bool(l != r),
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, l, r) => {
            let ord = l.compare(&r).ok_or_else(|| unexpected(name, &l))?;
            Bool(match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            })
        }
        (BinaryOp::In, l, List(items)) => Bool(items.contains(&l)),

        (BinaryOp::Add, Int(a), Int(b)) => Int(a.checked_add(b).ok_or_else(overflow)?),
        (BinaryOp::Add, String(a), String(b)) => String(a + &b),
        (BinaryOp::Add, Timestamp(t), Duration(d)) | (BinaryOp::Add, Duration(d), Timestamp(t)) => {
            Timestamp(t.checked_add_signed(d).ok_or_else(out_of_range)?)
        }
        (BinaryOp::Add, Duration(a), Duration(b)) => Duration(a.checked_add(&b).ok_or_else(overflow)?),

        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.checked_sub(b).ok_or_else(overflow)?),
        (BinaryOp::Sub, Timestamp(a), Timestamp(b)) => Duration(a.signed_duration_since(b)),
        (BinaryOp::Sub, Timestamp(t), Duration(d)) => {
            Timestamp(t.checked_sub_signed(d).ok_or_else(out_of_range)?)
        }
        (BinaryOp::Sub, Duration(a), Duration(b)) => Duration(a.checked_sub(&b).ok_or_else(overflow)?),

        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.checked_mul(b).ok_or_else(overflow)?),
        (BinaryOp::Div | BinaryOp::Rem, Int(_), Int(0)) => return Err(EvaluationError::DivisionByZero),
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.checked_div(b).ok_or_else(overflow)?),
        (BinaryOp::Rem, Int(a), Int(b)) => Int(a.checked_rem(b).ok_or_else(overflow)?),

        (_, l, _) => return Err(unexpected(name, &l)),
    };
    Ok(value)
}

fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, EvaluationError> {
    use Value::*;
    let mut args = args.into_iter();
    let first = args.next();
    let second = args.next();

    let value = match (builtin, first, second) {
        (Builtin::Contains, Some(String(s)), Some(String(p))) => Bool(s.contains(p.as_str())),
        (Builtin::StartsWith, Some(String(s)), Some(String(p))) => Bool(s.starts_with(p.as_str())),
        (Builtin::EndsWith, Some(String(s)), Some(String(p))) => Bool(s.ends_with(p.as_str())),
        (Builtin::Matches, Some(String(s)), Some(String(p))) => {
            let regex = Regex::new(&p).map_err(|e| EvaluationError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })?;
            Bool(regex.is_match(&s))
        }
        (Builtin::LowerAscii, Some(String(s)), None) => String(s.to_ascii_lowercase()),
        (Builtin::StringSize, Some(String(s)), None) => Int(s.chars().count() as i64),
        (Builtin::ListSize, Some(List(items)), None) => Int(items.len() as i64),

        (Builtin::ToTimestamp, Some(String(s)), None) => {
            Timestamp(parse_timestamp(&s).map_err(|reason| EvaluationError::InvalidConversion {
                function: "timestamp",
                input: s.clone(),
                reason,
            })?)
        }
        (Builtin::ToDuration, Some(String(s)), None) => {
            Duration(parse_duration(&s).map_err(|reason| EvaluationError::InvalidConversion {
                function: "duration",
                input: s.clone(),
                reason,
            })?)
        }
        (Builtin::TimestampToInt, Some(Timestamp(t)), None) => Int(t.timestamp()),
        (Builtin::IntToString, Some(Int(n)), None) => String(n.to_string()),

        (Builtin::FullYear, Some(Timestamp(t)), None) => Int(t.year() as i64),
        (Builtin::Month, Some(Timestamp(t)), None) => Int(t.month0() as i64),
        (Builtin::DayOfMonth, Some(Timestamp(t)), None) => Int(t.day0() as i64),
        (Builtin::Date, Some(Timestamp(t)), None) => Int(t.day() as i64),
        (Builtin::DayOfWeek, Some(Timestamp(t)), None) => {
            Int(t.weekday().num_days_from_sunday() as i64)
        }
        (Builtin::Hours, Some(Timestamp(t)), None) => Int(t.hour() as i64),
        (Builtin::Minutes, Some(Timestamp(t)), None) => Int(t.minute() as i64),

        (_, Some(v), _) => return Err(unexpected(builtin_name(builtin), &v)),
        (_, None, _) => {
            return Err(EvaluationError::UnexpectedType {
                operation: builtin_name(builtin),
                found: ValueType::List(None),
            })
        }
    };
    Ok(value)
}

fn builtin_name(builtin: Builtin) -> &'static str {
    match builtin {
        Builtin::Contains => "contains",
        Builtin::StartsWith => "startsWith",
        Builtin::EndsWith => "endsWith",
        Builtin::Matches => "matches",
        Builtin::LowerAscii => "lowerAscii",
        Builtin::StringSize | Builtin::ListSize => "size",
        Builtin::ToTimestamp => "timestamp",
        Builtin::ToDuration => "duration",
        Builtin::TimestampToInt => "int",
        Builtin::IntToString => "string",
        Builtin::FullYear => "getFullYear",
        Builtin::Month => "getMonth",
        Builtin::DayOfMonth => "getDayOfMonth",
        Builtin::Date => "getDate",
        Builtin::DayOfWeek => "getDayOfWeek",
        Builtin::Hours => "getHours",
        Builtin::Minutes => "getMinutes",
    }
}
