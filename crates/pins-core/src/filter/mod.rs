//! # Filter engine
//!
//! Compiles a CEL-style boolean expression (or a set of regex keep/skip
//! lists) into a [`Predicate`] bound to the seven fields of
//! [`EvaluationContext`], then evaluates it per channel and per message.
//!
//! ```text
//! source ──▶ lexer ──▶ parser ──▶ checker ──▶ Program ──┐
//!                                                       ├──▶ Predicate
//! [filter.fields.*] keep/skip ──────────▶ RuleSet ──────┘
//! ```
//!
//! A channel-grain record defers the message fields. Expressions that only
//! depend on them stay undecided and the channel is kept; the message-grain
//! pass then decides each pin.
//!
//! ```rust
//! use pins_core::filter::{EvaluationContext, FilterExpression, Predicate};
//! use pins_core::models::{Channel, Snowflake};
//!
//! let predicate = Predicate::compile(&FilterExpression::new("channel_name == 'general'")).unwrap();
//! let ctx = EvaluationContext::for_channel(&Channel {
//!     id: Snowflake(1),
//!     name: "general".into(),
//!     parent_id: None,
//! });
//! assert!(predicate.evaluate(&ctx).unwrap());
//! ```

mod checker;
mod context;
mod eval;
mod lexer;
mod parser;
mod predicate;
mod rules;
mod value;

pub use context::{EvaluationContext, Field, Grain, Record};
pub use predicate::{FilterExpression, Predicate};
pub use rules::{Precedence, RuleSet};
pub use value::{Value, ValueType};
