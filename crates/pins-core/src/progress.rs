//! Collection progress reporting.
//!
//! The collector emits a [`CollectEvent`] for every observable step,
//! including each channel keep/skip decision. The binary turns these into
//! stderr lines; library users can pass [`NoProgress`].

use serde::Serialize;

use crate::models::Snowflake;
use crate::provider::ThreadVisibility;

/// A single progress event of a collection run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollectEvent {
    GuildResolved {
        guild_id: Snowflake,
        name: String,
    },
    /// `retained` of `total` channels passed the kind allow-list.
    ChannelsListed { total: usize, retained: usize },
    ArchivedThreadsFetched {
        channel_id: Snowflake,
        channel_name: String,
        visibility: ThreadVisibility,
        count: usize,
        pages: usize,
    },
    ActiveThreadsFetched { count: usize },
    /// Enumeration finished with this many channels to inspect.
    ChannelsEnumerated { count: usize },
    ChannelKept {
        channel_id: Snowflake,
        channel_name: String,
    },
    ChannelSkipped {
        channel_id: Snowflake,
        channel_name: String,
    },
    PinsFetched {
        channel_id: Snowflake,
        channel_name: String,
        returned: usize,
        accepted: usize,
    },
    Finished {
        channels: usize,
        pins: usize,
        authors: usize,
    },
}

/// Receives progress events. Called from the collecting task only.
pub trait CollectProgressReporter: Send + Sync {
    fn report(&self, event: CollectEvent);
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CollectProgressReporter for NoProgress {
    fn report(&self, _event: CollectEvent) {}
}
