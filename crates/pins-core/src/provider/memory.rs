//! In-memory [`ChatProvider`] backed by a [`GuildSnapshot`].
//!
//! Serves archived threads in pages of a configurable size, counts every
//! call, and can be told to fail one [`Phase`]. The CLI loads snapshots
//! from JSON for offline runs; tests build them in code.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatProvider, ThreadCursor, ThreadPage, ThreadVisibility};
use crate::error::Phase;
use crate::models::{Guild, PinnedMessage, RawChannel, Snowflake};

/// A channel's archived threads, newest first as the platform lists them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchivedThreads {
    #[serde(default)]
    pub public: Vec<RawChannel>,
    #[serde(default)]
    pub private: Vec<RawChannel>,
}

impl ArchivedThreads {
    fn get(&self, visibility: ThreadVisibility) -> &[RawChannel] {
        match visibility {
            ThreadVisibility::Public => &self.public,
            ThreadVisibility::Private => &self.private,
        }
    }
}

/// Everything a provider can report about one guild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuildSnapshot {
    pub guild: Guild,
    #[serde(default)]
    pub channels: Vec<RawChannel>,
    /// Keyed by parent channel id.
    #[serde(default)]
    pub archived_threads: BTreeMap<Snowflake, ArchivedThreads>,
    #[serde(default)]
    pub active_threads: Vec<RawChannel>,
    /// Keyed by channel id.
    #[serde(default)]
    pub pins: BTreeMap<Snowflake, Vec<PinnedMessage>>,
}

/// Number of calls made to each provider operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch_guild: usize,
    pub list_channels: usize,
    pub list_archived_threads: usize,
    pub list_active_threads: usize,
    pub list_pinned_messages: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.fetch_guild
            + self.list_channels
            + self.list_archived_threads
            + self.list_active_threads
            + self.list_pinned_messages
    }
}

#[derive(Default)]
struct Counters {
    fetch_guild: AtomicUsize,
    list_channels: AtomicUsize,
    list_archived_threads: AtomicUsize,
    list_active_threads: AtomicUsize,
    list_pinned_messages: AtomicUsize,
}

/// In-memory provider for tests and fixture runs.
pub struct InMemoryProvider {
    snapshot: GuildSnapshot,
    page_size: Option<usize>,
    fail_at: Option<Phase>,
    counters: Counters,
    pinned_requests: Mutex<Vec<Snowflake>>,
}

impl InMemoryProvider {
    pub fn new(snapshot: GuildSnapshot) -> Self {
        Self {
            snapshot,
            page_size: None,
            fail_at: None,
            counters: Counters::default(),
            pinned_requests: Mutex::new(Vec::new()),
        }
    }

    /// Load a snapshot from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: GuildSnapshot = serde_json::from_str(json)?;
        Ok(Self::new(snapshot))
    }

    /// Serve archived threads `size` at a time.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Fail the call belonging to `phase`.
    pub fn failing_at(mut self, phase: Phase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    pub fn snapshot(&self) -> &GuildSnapshot {
        &self.snapshot
    }

    pub fn calls(&self) -> CallCounts {
        let c = &self.counters;
        CallCounts {
            fetch_guild: c.fetch_guild.load(Ordering::SeqCst),
            list_channels: c.list_channels.load(Ordering::SeqCst),
            list_archived_threads: c.list_archived_threads.load(Ordering::SeqCst),
            list_active_threads: c.list_active_threads.load(Ordering::SeqCst),
            list_pinned_messages: c.list_pinned_messages.load(Ordering::SeqCst),
        }
    }

    /// Channels whose pins were requested, in request order.
    pub fn pinned_requests(&self) -> Vec<Snowflake> {
        self.pinned_requests
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn check(&self, phase: Phase) -> Result<()> {
        if self.fail_at == Some(phase) {
            bail!("injected failure");
        }
        Ok(())
    }

    fn check_guild(&self, guild_id: Snowflake) -> Result<()> {
        if guild_id != self.snapshot.guild.id {
            bail!("unknown guild {}", guild_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ChatProvider for InMemoryProvider {
    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild> {
        self.counters.fetch_guild.fetch_add(1, Ordering::SeqCst);
        self.check(Phase::FetchGuild)?;
        self.check_guild(guild_id)?;
        Ok(self.snapshot.guild.clone())
    }

    async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        self.counters.list_channels.fetch_add(1, Ordering::SeqCst);
        self.check(Phase::ListChannels)?;
        self.check_guild(guild_id)?;
        Ok(self.snapshot.channels.clone())
    }

    async fn list_archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<ThreadCursor>,
    ) -> Result<ThreadPage> {
        self.counters
            .list_archived_threads
            .fetch_add(1, Ordering::SeqCst);
        self.check(Phase::ListArchivedThreads {
            channel_id,
            visibility,
        })?;

        let all = self
            .snapshot
            .archived_threads
            .get(&channel_id)
            .map(|a| a.get(visibility))
            .unwrap_or_default();

        let start = match before {
            None => 0,
            Some(cursor) => cursor
                .0
                .parse::<usize>()
                .map_err(|_| anyhow!("malformed cursor {:?}", cursor.0))?,
        };
        let start = start.min(all.len());
        let end = match self.page_size {
            Some(size) => (start + size).min(all.len()),
            None => all.len(),
        };

        Ok(ThreadPage {
            threads: all[start..end].to_vec(),
            next: (end < all.len()).then(|| ThreadCursor(end.to_string())),
        })
    }

    async fn list_active_threads(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        self.counters
            .list_active_threads
            .fetch_add(1, Ordering::SeqCst);
        self.check(Phase::ListActiveThreads)?;
        self.check_guild(guild_id)?;
        Ok(self.snapshot.active_threads.clone())
    }

    async fn list_pinned_messages(&self, channel_id: Snowflake) -> Result<Vec<PinnedMessage>> {
        self.counters
            .list_pinned_messages
            .fetch_add(1, Ordering::SeqCst);
        match self.pinned_requests.lock() {
            Ok(mut ids) => ids.push(channel_id),
            Err(poisoned) => poisoned.into_inner().push(channel_id),
        }
        self.check(Phase::ListPinnedMessages { channel_id })?;
        Ok(self
            .snapshot
            .pins
            .get(&channel_id)
            .cloned()
            .unwrap_or_default())
    }
}
