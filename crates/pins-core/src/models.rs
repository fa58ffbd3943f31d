//! Core data models used throughout pins.
//!
//! Provider-side records ([`Guild`], [`RawChannel`], [`PinnedMessage`]) are
//! what a [`ChatProvider`](crate::provider::ChatProvider) returns. The
//! remaining types form the assembled [`PinsDocument`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Discord-style 64-bit identifier.
///
/// Serialized as a decimal string (the platform's JSON convention) and
/// accepted from either a string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Snowflake(pub u64);

impl Snowflake {
    pub fn get(self) -> u64 {
        self.0
    }

    /// The id as a signed filter-language integer.
    ///
    /// Snowflakes carry a 42-bit timestamp in their top bits, so every real
    /// id fits in 63 bits.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Snowflake)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Snowflake(id)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl<'de> Visitor<'de> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a snowflake as a decimal string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::custom(format!("negative snowflake: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse()
                    .map_err(|_| E::custom(format!("invalid snowflake: {:?}", v)))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Provider records
// ═══════════════════════════════════════════════════════════════════════

/// Guild identity as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
}

/// Kind of a channel as reported by the provider.
///
/// Unrecognized kinds are kept as [`ChannelKind::Other`] so that the
/// enumerator's allow-list excludes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Announcement,
    AnnouncementThread,
    PublicThread,
    PrivateThread,
    Stage,
    Directory,
    Forum,
    Media,
    Other(u16),
}

impl ChannelKind {
    /// Map a Discord numeric channel type.
    pub fn from_discord(code: u16) -> Self {
        match code {
            0 => ChannelKind::Text,
            2 => ChannelKind::Voice,
            4 => ChannelKind::Category,
            5 => ChannelKind::Announcement,
            10 => ChannelKind::AnnouncementThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            13 => ChannelKind::Stage,
            14 => ChannelKind::Directory,
            15 => ChannelKind::Forum,
            16 => ChannelKind::Media,
            other => ChannelKind::Other(other),
        }
    }

    /// Parse a configuration name (`"text"`, `"announcement"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(ChannelKind::Text),
            "voice" => Some(ChannelKind::Voice),
            "announcement" | "news" => Some(ChannelKind::Announcement),
            "stage" => Some(ChannelKind::Stage),
            "forum" => Some(ChannelKind::Forum),
            "media" => Some(ChannelKind::Media),
            _ => None,
        }
    }
}

/// A channel or thread exactly as the provider lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChannel {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Snowflake>,
    pub kind: ChannelKind,
}

/// A user as referenced by a message (sender or mention).
///
/// `name` is the display tag kept in the document (`name#1234` for
/// accounts with a discriminator); `username` is the bare account name
/// that filters see as `author_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl UserRef {
    /// The name filters match against; `name` when no username is known.
    pub fn filter_name(&self) -> &str {
        if self.username.is_empty() {
            &self.name
        } else {
            &self.username
        }
    }
}

/// A pinned message as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub author: UserRef,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mentions: Vec<UserRef>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

// ═══════════════════════════════════════════════════════════════════════
// Result model
// ═══════════════════════════════════════════════════════════════════════

/// A flattened channel or thread. No other provider metadata is retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: Snowflake,
    pub name: String,
    pub parent_id: Option<Snowflake>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        Channel {
            id: raw.id,
            name: raw.name,
            parent_id: raw.parent_id,
        }
    }
}

/// A file attached to a pinned message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(default)]
    pub content_type: String,
}

/// A pin accepted into the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub channel_id: Snowflake,
    pub timestamp: DateTime<Utc>,
    pub author_id: Snowflake,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// A deduplicated author entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Snowflake,
    pub name: String,
    #[serde(rename = "avatar")]
    pub avatar_url: String,
}

impl From<&UserRef> for Author {
    fn from(user: &UserRef) -> Self {
        Author {
            id: user.id,
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// The single document produced by one collection run.
///
/// Maps are ordered by id so that serializing two runs over the same
/// provider data yields identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinsDocument {
    pub guild_id: Snowflake,
    pub guild_name: String,
    pub channel_names: BTreeMap<Snowflake, String>,
    pub authors: BTreeMap<Snowflake, Author>,
    pub pins: Vec<Pin>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_serializes_as_string() {
        let json = serde_json::to_string(&Snowflake(1234567890123)).unwrap();
        assert_eq!(json, "\"1234567890123\"");
    }

    #[test]
    fn snowflake_accepts_string_or_number() {
        let a: Snowflake = serde_json::from_str("\"42\"").unwrap();
        let b: Snowflake = serde_json::from_str("42").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<Snowflake>("\"forty\"").is_err());
        assert!(serde_json::from_str::<Snowflake>("-1").is_err());
    }

    #[test]
    fn snowflake_map_keys_are_strings() {
        let mut names = BTreeMap::new();
        names.insert(Snowflake(2), "b".to_string());
        names.insert(Snowflake(1), "a".to_string());
        let json = serde_json::to_string(&names).unwrap();
        assert_eq!(json, r#"{"1":"a","2":"b"}"#);
        let back: BTreeMap<Snowflake, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, names);
    }

    #[test]
    fn unknown_discord_type_is_other() {
        assert_eq!(ChannelKind::from_discord(0), ChannelKind::Text);
        assert_eq!(ChannelKind::from_discord(99), ChannelKind::Other(99));
        assert_eq!(ChannelKind::from_name("category"), None);
    }
}
