//! Runtime values and static types of the filter language.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

/// Static type of an expression or field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Bool,
    String,
    Timestamp,
    Duration,
    /// A list; `None` is the element type of an empty literal `[]`.
    List(Option<Box<ValueType>>),
}

impl ValueType {
    /// Whether two types may meet in an equality or membership test.
    pub(crate) fn is_compatible(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::List(None), ValueType::List(_)) | (ValueType::List(_), ValueType::List(None)) => true,
            (ValueType::List(Some(a)), ValueType::List(Some(b))) => a.is_compatible(b),
            (a, b) => a == b,
        }
    }

    pub(crate) fn is_ordered(&self) -> bool {
        matches!(
            self,
            ValueType::Int | ValueType::String | ValueType::Timestamp | ValueType::Duration
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => f.write_str("int"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::String => f.write_str("string"),
            ValueType::Timestamp => f.write_str("google.protobuf.Timestamp"),
            ValueType::Duration => f.write_str("google.protobuf.Duration"),
            ValueType::List(None) => f.write_str("list(dyn)"),
            ValueType::List(Some(elem)) => write!(f, "list({})", elem),
        }
    }
}

/// A value produced while evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Timestamp(DateTime<Utc>),
    Duration(TimeDelta),
    List(Vec<Value>),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Duration(_) => ValueType::Duration,
            Value::List(items) => ValueType::List(items.first().map(|v| Box::new(v.ty()))),
        }
    }

    /// Ordering between two values of the same ordered type.
    pub(crate) fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Parse a CEL duration string such as `"90s"`, `"1h30m"` or `"-250ms"`.
pub(crate) fn parse_duration(input: &str) -> Result<TimeDelta, String> {
    let (negative, mut rest) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input.strip_prefix('+').unwrap_or(input)),
    };
    if rest.is_empty() {
        return Err("empty duration".to_string());
    }
    if rest == "0" {
        return Ok(TimeDelta::zero());
    }

    let mut total = TimeDelta::zero();
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("expected a number at {:?}", rest));
        }
        let amount: i64 = rest[..digits]
            .parse()
            .map_err(|_| format!("number too large in {:?}", input))?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(|b| b.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "h" => TimeDelta::try_hours(amount),
            "m" => TimeDelta::try_minutes(amount),
            "s" => TimeDelta::try_seconds(amount),
            "ms" => TimeDelta::try_milliseconds(amount),
            "us" => Some(TimeDelta::microseconds(amount)),
            "ns" => Some(TimeDelta::nanoseconds(amount)),
            "" => return Err(format!("missing unit in {:?}", input)),
            other => return Err(format!("unknown unit {:?}", other)),
        }
        .ok_or_else(|| format!("duration out of range: {:?}", input))?;

        total = total
            .checked_add(&part)
            .ok_or_else(|| format!("duration out of range: {:?}", input))?;
    }

    Ok(if negative { -total } else { total })
}

/// Parse an RFC 3339 timestamp as used by `timestamp("...")`.
pub(crate) fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(input)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}
