//! Error taxonomy for a collection run.
//!
//! Every error is fatal to the run: [`CompileError`] is raised before any
//! provider call, [`EvaluationError`] on the first record that cannot be
//! evaluated, and [`ProviderError`] on the first collaborator failure.

use std::fmt;

use crate::filter::{Field, ValueType};
use crate::models::Snowflake;
use crate::provider::ThreadVisibility;

/// A filter that failed to parse or type-check.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("undeclared reference to '{name}' at offset {offset}")]
    UnknownIdentifier { offset: usize, name: String },

    #[error("found no matching overload for '{operation}' applied to ({operands}) at offset {offset}")]
    NoMatchingOverload {
        offset: usize,
        operation: String,
        operands: String,
    },

    #[error("invalid {kind} literal {literal:?} at offset {offset}: {reason}")]
    InvalidLiteral {
        offset: usize,
        kind: &'static str,
        literal: String,
        reason: String,
    },

    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("regex rules only apply to string fields, '{field}' is {ty}")]
    RuleOnNonStringField { field: String, ty: ValueType },

    #[error("unknown filter field '{name}'")]
    UnknownField { name: String },
}

/// A compiled predicate that could not produce a decision for a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("filter must evaluate to bool, got {found}")]
    NotBoolean { found: ValueType },

    #[error("field '{field}' is not available on this record")]
    MissingField { field: Field },

    #[error("integer overflow in '{operation}'")]
    Overflow { operation: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("timestamp out of range in '{operation}'")]
    TimestampOutOfRange { operation: &'static str },

    #[error("{function}({input:?}) failed: {reason}")]
    InvalidConversion {
        function: &'static str,
        input: String,
        reason: String,
    },

    #[error("'{operation}' cannot be applied to {found}")]
    UnexpectedType {
        operation: &'static str,
        found: ValueType,
    },
}

/// The step of the pipeline in which a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    FetchGuild,
    ListChannels,
    ListArchivedThreads {
        channel_id: Snowflake,
        visibility: ThreadVisibility,
    },
    ListActiveThreads,
    ListPinnedMessages {
        channel_id: Snowflake,
    },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::FetchGuild => f.write_str("fetch guild"),
            Phase::ListChannels => f.write_str("list channels"),
            Phase::ListArchivedThreads {
                channel_id,
                visibility,
            } => write!(
                f,
                "list {} archived threads of channel {}",
                visibility, channel_id
            ),
            Phase::ListActiveThreads => f.write_str("list active threads"),
            Phase::ListPinnedMessages { channel_id } => {
                write!(f, "list pinned messages of channel {}", channel_id)
            }
        }
    }
}

/// A collaborator failure, tagged with the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("failed to {phase}")]
pub struct ProviderError {
    pub phase: Phase,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl ProviderError {
    pub fn new(phase: Phase, source: anyhow::Error) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }
}

/// Any failure of a collection run.
#[derive(Debug, thiserror::Error)]
pub enum PinsError {
    #[error("invalid filter")]
    Compile(#[from] CompileError),

    #[error("filter evaluation failed")]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
