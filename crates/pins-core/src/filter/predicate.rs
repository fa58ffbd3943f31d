use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::checker::{compile, Program};
use super::context::Record;
use super::eval::eval;
use super::rules::RuleSet;
use super::value::Value;
use crate::error::{CompileError, EvaluationError};

/// A filter's source text. Blank text means "match everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpression(String);

impl FilterExpression {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilterExpression {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for FilterExpression {
    fn from(source: String) -> Self {
        Self(source)
    }
}

/// Anything that can decide a record. `Ok(None)` means the record does not
/// carry enough fields yet (a channel whose fate depends on its messages).
pub(crate) trait Matcher: Send + Sync + fmt::Debug {
    fn decide(&self, record: &dyn Record) -> Result<Option<bool>, EvaluationError>;
}

impl Matcher for Program {
    fn decide(&self, record: &dyn Record) -> Result<Option<bool>, EvaluationError> {
        match eval(&self.root, record)? {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(EvaluationError::NotBoolean { found: other.ty() }),
        }
    }
}

/// A compiled, reusable filter.
///
/// Built once per run from either an expression ([`Predicate::compile`]) or
/// regex lists ([`Predicate::from_rules`]) and then evaluated against every
/// channel and message. Cloning is cheap and evaluation has no side effects,
/// so one predicate can be shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    matcher: Option<Arc<dyn Matcher>>,
}

impl Predicate {
    /// The pass-through predicate: true for every record, nothing evaluated.
    pub fn always() -> Self {
        Self { matcher: None }
    }

    /// Parse and type-check `expression` against the seven-field schema.
    pub fn compile(expression: &FilterExpression) -> Result<Self, CompileError> {
        if expression.is_empty() {
            return Ok(Self::always());
        }
        let program = compile(expression.as_str())?;
        Ok(Self {
            matcher: Some(Arc::new(program)),
        })
    }

    pub fn from_rules(rules: RuleSet) -> Self {
        if rules.is_empty() {
            return Self::always();
        }
        Self {
            matcher: Some(Arc::new(rules)),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        self.matcher.is_none()
    }

    /// Three-valued decision; `None` when deferred fields leave it open.
    pub fn decide(&self, record: &dyn Record) -> Result<Option<bool>, EvaluationError> {
        match &self.matcher {
            None => Ok(Some(true)),
            Some(m) => m.decide(record),
        }
    }

    /// Whether `record` passes. An undecided channel passes so that its
    /// messages get evaluated.
    pub fn evaluate(&self, record: &dyn Record) -> Result<bool, EvaluationError> {
        Ok(self.decide(record)?.unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::context::{EvaluationContext, Field, Grain};
    use crate::filter::rules::Precedence;
    use crate::models::{Channel, PinnedMessage, Snowflake, UserRef};
    use chrono::{DateTime, Utc};

    fn general() -> EvaluationContext {
        EvaluationContext::for_channel(&Channel {
            id: Snowflake(100),
            name: "general".into(),
            parent_id: None,
        })
    }

    fn pinned(text: &str) -> PinnedMessage {
        PinnedMessage {
            author: UserRef {
                id: Snowflake(9),
                name: "ada".into(),
                username: "ada".into(),
                avatar_url: String::new(),
            },
            timestamp: "2024-05-01T00:00:00Z".parse().unwrap(),
            text: text.into(),
            mentions: vec![],
            attachments: vec![],
        }
    }

    /// A message-grain record that has lost its text.
    struct Textless;

    impl Record for Textless {
        fn grain(&self) -> Grain {
            Grain::Message
        }
        fn channel_parent_id(&self) -> Option<i64> {
            Some(0)
        }
        fn channel_id(&self) -> Option<i64> {
            Some(1)
        }
        fn channel_name(&self) -> Option<&str> {
            Some("general")
        }
        fn timestamp(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn author_id(&self) -> Option<i64> {
            Some(2)
        }
        fn author_name(&self) -> Option<&str> {
            Some("ada")
        }
        fn text(&self) -> Option<&str> {
            None
        }
    }

    #[test]
    fn empty_expression_is_pass_through() {
        for source in ["", "   "] {
            let predicate = Predicate::compile(&source.into()).unwrap();
            assert!(predicate.is_pass_through());
            assert!(predicate.evaluate(&general()).unwrap());
            assert!(predicate.evaluate(&Textless).unwrap());
        }
    }

    #[test]
    fn channel_predicate_filters_before_messages() {
        let predicate = Predicate::compile(&"channel_name == 'general'".into()).unwrap();
        assert!(predicate.evaluate(&general()).unwrap());
        let other = EvaluationContext::for_channel(&Channel {
            id: Snowflake(101),
            name: "random".into(),
            parent_id: None,
        });
        assert!(!predicate.evaluate(&other).unwrap());
    }

    #[test]
    fn message_predicate_keeps_channel_and_decides_per_message() {
        let predicate = Predicate::compile(&"text.contains('release')".into()).unwrap();
        let channel = general();
        assert_eq!(predicate.decide(&channel).unwrap(), None);
        assert!(predicate.evaluate(&channel).unwrap());
        assert!(predicate.evaluate(&channel.with_message(&pinned("release notes"))).unwrap());
        assert!(!predicate.evaluate(&channel.with_message(&pinned("hello"))).unwrap());
    }

    #[test]
    fn non_boolean_result_is_an_error() {
        let predicate = Predicate::compile(&"channel_name".into()).unwrap();
        assert_eq!(
            predicate.evaluate(&general()),
            Err(EvaluationError::NotBoolean {
                found: crate::filter::ValueType::String
            })
        );
    }

    #[test]
    fn missing_message_field_is_an_error() {
        let predicate = Predicate::compile(&"text == ''".into()).unwrap();
        assert_eq!(
            predicate.evaluate(&Textless),
            Err(EvaluationError::MissingField { field: Field::Text })
        );
    }

    #[test]
    fn rule_predicate_shares_the_contract() {
        let mut rules = RuleSet::new(Precedence::SkipOverridesKeep);
        rules.add_field("text", ["release"], Vec::<String>::new()).unwrap();
        let predicate = Predicate::from_rules(rules);
        let channel = general();
        assert!(predicate.evaluate(&channel).unwrap());
        assert!(!predicate.evaluate(&channel.with_message(&pinned("hi"))).unwrap());

        assert!(Predicate::from_rules(RuleSet::default()).is_pass_through());
    }

    #[test]
    fn evaluation_does_not_touch_the_context() {
        let predicate = Predicate::compile(&"channel_id > 1 && text != ''".into()).unwrap();
        let ctx = general().with_message(&pinned("x"));
        let before = ctx.clone();
        predicate.evaluate(&ctx).unwrap();
        predicate.evaluate(&ctx).unwrap();
        assert_eq!(ctx, before);
    }
}
