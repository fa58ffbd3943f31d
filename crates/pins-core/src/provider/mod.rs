//! The chat-platform collaborator.
//!
//! The core never talks to a network directly. Everything it needs from the
//! platform goes through [`ChatProvider`], and failures come back as plain
//! `anyhow::Result`s; the collector attaches the [`Phase`](crate::error::Phase)
//! that failed.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               ChatProvider               │
//! │  ┌───────────────┐  ┌──────────────────┐ │
//! │  │ DiscordClient │  │ InMemoryProvider │ │
//! │  │ (REST API)    │  │ (tests, fixtures)│ │
//! │  └───────────────┘  └──────────────────┘ │
//! └──────────────────┬───────────────────────┘
//!                    ▼
//!      enumerate_channels() → collect_pins()
//! ```

pub mod memory;

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Guild, PinnedMessage, RawChannel, Snowflake};

pub use memory::{ArchivedThreads, CallCounts, GuildSnapshot, InMemoryProvider};

/// Which archive an archived-thread query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadVisibility {
    Public,
    Private,
}

impl ThreadVisibility {
    /// Query order used by the enumerator.
    pub const ALL: [ThreadVisibility; 2] = [ThreadVisibility::Public, ThreadVisibility::Private];

    pub fn as_str(self) -> &'static str {
        match self {
            ThreadVisibility::Public => "public",
            ThreadVisibility::Private => "private",
        }
    }
}

impl fmt::Display for ThreadVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque continuation token for archived-thread listing.
///
/// Only the provider that produced a cursor knows what it means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadCursor(pub String);

impl fmt::Display for ThreadCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of archived threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadPage {
    pub threads: Vec<RawChannel>,
    /// Cursor for the next page, `None` when this was the last one.
    pub next: Option<ThreadCursor>,
}

/// Read-only access to one chat platform.
///
/// Implementations own transport concerns: authentication, rate limiting,
/// retries and timeouts. The pipeline calls each method at most once per
/// logical request and treats any error as fatal.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use pins_core::models::{Guild, PinnedMessage, RawChannel, Snowflake};
/// use pins_core::provider::{ChatProvider, ThreadCursor, ThreadPage, ThreadVisibility};
///
/// struct EmptyGuild;
///
/// #[async_trait]
/// impl ChatProvider for EmptyGuild {
///     async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild> {
///         Ok(Guild { id: guild_id, name: "empty".into() })
///     }
///     async fn list_channels(&self, _: Snowflake) -> Result<Vec<RawChannel>> {
///         Ok(vec![])
///     }
///     async fn list_archived_threads(
///         &self,
///         _: Snowflake,
///         _: ThreadVisibility,
///         _: Option<ThreadCursor>,
///     ) -> Result<ThreadPage> {
///         Ok(ThreadPage::default())
///     }
///     async fn list_active_threads(&self, _: Snowflake) -> Result<Vec<RawChannel>> {
///         Ok(vec![])
///     }
///     async fn list_pinned_messages(&self, _: Snowflake) -> Result<Vec<PinnedMessage>> {
///         Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Resolve the guild's id and name.
    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild>;

    /// Every channel of the guild, in provider order.
    async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>>;

    /// One page of a channel's archived threads. `before` is the cursor
    /// returned by the previous page, `None` for the first.
    async fn list_archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<ThreadCursor>,
    ) -> Result<ThreadPage>;

    /// The guild's active threads, across all channels.
    async fn list_active_threads(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>>;

    /// A channel's pinned messages, in provider order.
    async fn list_pinned_messages(&self, channel_id: Snowflake) -> Result<Vec<PinnedMessage>>;
}

#[async_trait]
impl<P: ChatProvider + ?Sized> ChatProvider for Arc<P> {
    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild> {
        (**self).fetch_guild(guild_id).await
    }

    async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        (**self).list_channels(guild_id).await
    }

    async fn list_archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<ThreadCursor>,
    ) -> Result<ThreadPage> {
        (**self)
            .list_archived_threads(channel_id, visibility, before)
            .await
    }

    async fn list_active_threads(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        (**self).list_active_threads(guild_id).await
    }

    async fn list_pinned_messages(&self, channel_id: Snowflake) -> Result<Vec<PinnedMessage>> {
        (**self).list_pinned_messages(channel_id).await
    }
}
