//! Regex keep/skip lists per string field.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::{lookup_str, Field, Record};
use super::predicate::Matcher;
use super::value::ValueType;
use crate::error::{CompileError, EvaluationError};

/// Which list wins when a value matches both a keep and a skip pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precedence {
    #[default]
    #[serde(rename = "skip")]
    SkipOverridesKeep,
    #[serde(rename = "keep")]
    KeepOverridesSkip,
}

#[derive(Debug, Clone)]
struct FieldRule {
    field: Field,
    keep: Vec<Regex>,
    skip: Vec<Regex>,
}

impl FieldRule {
    fn accepts(&self, value: &str, precedence: Precedence) -> bool {
        let keep_hit = self.keep.iter().any(|r| r.is_match(value));
        let skip_hit = self.skip.iter().any(|r| r.is_match(value));
        let unrestricted = self.keep.is_empty();
        match precedence {
            Precedence::SkipOverridesKeep => !skip_hit && (unrestricted || keep_hit),
            Precedence::KeepOverridesSkip => keep_hit || (!skip_hit && unrestricted),
        }
    }
}

/// Keep/skip regex lists for any of the string fields, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    precedence: Precedence,
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new(precedence: Precedence) -> Self {
        Self {
            precedence,
            rules: Vec::new(),
        }
    }

    /// Add keep/skip patterns for the field called `name`.
    ///
    /// Only `channel_name`, `author_name` and `text` accept rules.
    pub fn add_field<K, S>(&mut self, name: &str, keep: K, skip: S) -> Result<&mut Self, CompileError>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let field = Field::from_name(name).ok_or_else(|| CompileError::UnknownField {
            name: name.to_string(),
        })?;
        let ty = field.ty();
        if ty != ValueType::String {
            return Err(CompileError::RuleOnNonStringField {
                field: name.to_string(),
                ty,
            });
        }
        let rule = FieldRule {
            field,
            keep: compile_all(keep)?,
            skip: compile_all(skip)?,
        };
        if !rule.keep.is_empty() || !rule.skip.is_empty() {
            self.rules.push(rule);
        }
        Ok(self)
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// True when no field carries a pattern.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_all<I>(patterns: I) -> Result<Vec<Regex>, CompileError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| {
            let p = p.as_ref();
            Regex::new(p).map_err(|e| CompileError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

impl Matcher for RuleSet {
    fn decide(&self, record: &dyn Record) -> Result<Option<bool>, EvaluationError> {
        let mut deferred = false;
        for rule in &self.rules {
            match lookup_str(record, rule.field)? {
                Some(value) if !rule.accepts(value, self.precedence) => return Ok(Some(false)),
                Some(_) => {}
                None => deferred = true,
            }
        }
        Ok(if deferred { None } else { Some(true) })
    }
}
