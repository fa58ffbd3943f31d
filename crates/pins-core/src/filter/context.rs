//! The fixed seven-field schema that filters are evaluated against.

use std::fmt;

use chrono::{DateTime, Utc};

use super::value::{Value, ValueType};
use crate::error::EvaluationError;
use crate::models::{Channel, PinnedMessage};

/// One of the seven variables a filter may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ChannelParentId,
    ChannelId,
    ChannelName,
    Timestamp,
    AuthorId,
    AuthorName,
    Text,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::ChannelParentId,
        Field::ChannelId,
        Field::ChannelName,
        Field::Timestamp,
        Field::AuthorId,
        Field::AuthorName,
        Field::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::ChannelParentId => "channel_parent_id",
            Field::ChannelId => "channel_id",
            Field::ChannelName => "channel_name",
            Field::Timestamp => "timestamp",
            Field::AuthorId => "author_id",
            Field::AuthorName => "author_name",
            Field::Text => "text",
        }
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn ty(self) -> ValueType {
        match self {
            Field::ChannelParentId | Field::ChannelId | Field::AuthorId => ValueType::Int,
            Field::ChannelName | Field::AuthorName | Field::Text => ValueType::String,
            Field::Timestamp => ValueType::Timestamp,
        }
    }

    /// Fields that only exist once a message is being evaluated.
    pub fn is_message_field(self) -> bool {
        matches!(
            self,
            Field::Timestamp | Field::AuthorId | Field::AuthorName | Field::Text
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a record describes a channel or a message within one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grain {
    Channel,
    Message,
}

/// Typed access to the seven filter variables.
///
/// At [`Grain::Channel`] the message fields are deferred: returning `None`
/// for them means "decided later", not "missing". Any other `None` is an
/// [`EvaluationError::MissingField`].
pub trait Record {
    fn grain(&self) -> Grain;
    fn channel_parent_id(&self) -> Option<i64>;
    fn channel_id(&self) -> Option<i64>;
    fn channel_name(&self) -> Option<&str>;
    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn author_id(&self) -> Option<i64>;
    fn author_name(&self) -> Option<&str>;
    fn text(&self) -> Option<&str>;
}

/// Read `field` from `record`; `Ok(None)` means deferred.
pub(crate) fn lookup(record: &dyn Record, field: Field) -> Result<Option<Value>, EvaluationError> {
    let value = match field {
        Field::ChannelParentId => record.channel_parent_id().map(Value::Int),
        Field::ChannelId => record.channel_id().map(Value::Int),
        Field::ChannelName => record.channel_name().map(|s| Value::String(s.to_string())),
        Field::Timestamp => record.timestamp().map(Value::Timestamp),
        Field::AuthorId => record.author_id().map(Value::Int),
        Field::AuthorName => record.author_name().map(|s| Value::String(s.to_string())),
        Field::Text => record.text().map(|s| Value::String(s.to_string())),
    };
    resolve(record, field, value)
}

/// Like [`lookup`] but borrows string fields instead of copying them.
pub(crate) fn lookup_str<'r>(
    record: &'r dyn Record,
    field: Field,
) -> Result<Option<&'r str>, EvaluationError> {
    let value = match field {
        Field::ChannelName => record.channel_name(),
        Field::AuthorName => record.author_name(),
        Field::Text => record.text(),
        _ => return Err(EvaluationError::MissingField { field }),
    };
    resolve(record, field, value)
}

fn resolve<T>(
    record: &dyn Record,
    field: Field,
    value: Option<T>,
) -> Result<Option<T>, EvaluationError> {
    match value {
        Some(v) => Ok(Some(v)),
        None if record.grain() == Grain::Channel && field.is_message_field() => Ok(None),
        None => Err(EvaluationError::MissingField { field }),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct MessageFields {
    timestamp: DateTime<Utc>,
    author_id: i64,
    author_name: String,
    text: String,
}

/// The standard [`Record`]: a channel, optionally extended with a message.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    channel_parent_id: i64,
    channel_id: i64,
    channel_name: String,
    message: Option<MessageFields>,
}

impl EvaluationContext {
    /// Channel-grain context. A channel without a parent has parent id 0.
    pub fn for_channel(channel: &Channel) -> Self {
        Self {
            channel_parent_id: channel.parent_id.map(|id| id.as_i64()).unwrap_or(0),
            channel_id: channel.id.as_i64(),
            channel_name: channel.name.clone(),
            message: None,
        }
    }

    /// A message-grain context extending this channel context.
    pub fn with_message(&self, message: &PinnedMessage) -> Self {
        Self {
            message: Some(MessageFields {
                timestamp: message.timestamp,
                author_id: message.author.id.as_i64(),
                author_name: message.author.filter_name().to_string(),
                text: message.text.clone(),
            }),
            ..self.clone()
        }
    }
}

impl Record for EvaluationContext {
    fn grain(&self) -> Grain {
        if self.message.is_some() {
            Grain::Message
        } else {
            Grain::Channel
        }
    }

    fn channel_parent_id(&self) -> Option<i64> {
        Some(self.channel_parent_id)
    }

    fn channel_id(&self) -> Option<i64> {
        Some(self.channel_id)
    }

    fn channel_name(&self) -> Option<&str> {
        Some(&self.channel_name)
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.message.as_ref().map(|m| m.timestamp)
    }

    fn author_id(&self) -> Option<i64> {
        self.message.as_ref().map(|m| m.author_id)
    }

    fn author_name(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.author_name.as_str())
    }

    fn text(&self) -> Option<&str> {
        self.message.as_ref().map(|m| m.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Snowflake, UserRef};

    fn channel() -> Channel {
        Channel {
            id: Snowflake(10),
            name: "general".into(),
            parent_id: None,
        }
    }

    fn message() -> PinnedMessage {
        PinnedMessage {
            author: UserRef {
                id: Snowflake(5),
                name: "ada#0042".into(),
                username: "ada".into(),
                avatar_url: String::new(),
            },
            timestamp: "2024-01-02T03:04:05Z".parse().unwrap(),
            text: "hello".into(),
            mentions: vec![],
            attachments: vec![],
        }
    }

    #[test]
    fn channel_grain_defers_message_fields() {
        let ctx = EvaluationContext::for_channel(&channel());
        assert_eq!(ctx.grain(), Grain::Channel);
        assert_eq!(lookup(&ctx, Field::ChannelParentId).unwrap(), Some(Value::Int(0)));
        assert_eq!(lookup(&ctx, Field::Text).unwrap(), None);
        assert_eq!(lookup(&ctx, Field::Timestamp).unwrap(), None);
    }

    #[test]
    fn message_grain_extends_without_touching_channel_context() {
        let base = EvaluationContext::for_channel(&channel());
        let msg = base.with_message(&message());
        assert_eq!(msg.grain(), Grain::Message);
        assert_eq!(msg.author_name(), Some("ada"));
        assert_eq!(msg.channel_name(), Some("general"));
        assert_eq!(base.text(), None);
    }

    #[test]
    fn author_name_falls_back_to_display_name() {
        let mut pinned = message();
        pinned.author.username.clear();
        let ctx = EvaluationContext::for_channel(&channel()).with_message(&pinned);
        assert_eq!(ctx.author_name(), Some("ada#0042"));
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("guild_id"), None);
    }
}
