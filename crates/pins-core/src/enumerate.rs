//! Channel enumeration: flatten a guild into the channels to inspect.
//!
//! Output order:
//!
//! 1. retained base channels, in provider order;
//! 2. for each of them, its public then private archived threads;
//! 3. the guild's active threads.
//!
//! Threads are not expanded further.

use crate::error::{Phase, ProviderError};
use crate::models::{Channel, ChannelKind, RawChannel, Snowflake};
use crate::progress::{CollectEvent, CollectProgressReporter};
use crate::provider::{ChatProvider, ThreadCursor, ThreadVisibility};

/// Channel kinds kept when no allow-list is configured.
pub const DEFAULT_CHANNEL_KINDS: &[ChannelKind] = &[ChannelKind::Text];

/// Enumerate every channel and thread of `guild_id` whose base channel kind
/// is in `kinds`. Unknown kinds are never retained.
pub async fn enumerate_channels<P>(
    provider: &P,
    guild_id: Snowflake,
    kinds: &[ChannelKind],
    progress: &dyn CollectProgressReporter,
) -> Result<Vec<Channel>, ProviderError>
where
    P: ChatProvider + ?Sized,
{
    let listed = provider
        .list_channels(guild_id)
        .await
        .map_err(|e| ProviderError::new(Phase::ListChannels, e))?;
    let total = listed.len();

    let base: Vec<RawChannel> = listed
        .into_iter()
        .filter(|c| kinds.contains(&c.kind))
        .collect();
    progress.report(CollectEvent::ChannelsListed {
        total,
        retained: base.len(),
    });

    let mut threads = Vec::new();
    for channel in &base {
        for visibility in ThreadVisibility::ALL {
            let (found, pages) =
                archived_threads(provider, channel.id, visibility).await?;
            progress.report(CollectEvent::ArchivedThreadsFetched {
                channel_id: channel.id,
                channel_name: channel.name.clone(),
                visibility,
                count: found.len(),
                pages,
            });
            threads.extend(found);
        }
    }

    let active = provider
        .list_active_threads(guild_id)
        .await
        .map_err(|e| ProviderError::new(Phase::ListActiveThreads, e))?;
    progress.report(CollectEvent::ActiveThreadsFetched {
        count: active.len(),
    });

    let channels: Vec<Channel> = base
        .into_iter()
        .chain(threads)
        .chain(active)
        .map(Channel::from)
        .collect();
    progress.report(CollectEvent::ChannelsEnumerated {
        count: channels.len(),
    });
    Ok(channels)
}

/// Follow archived-thread pages until the provider reports no cursor.
///
/// A provider handing back the cursor it was just given would loop forever,
/// so a repeated cursor ends the listing.
async fn archived_threads<P>(
    provider: &P,
    channel_id: Snowflake,
    visibility: ThreadVisibility,
) -> Result<(Vec<RawChannel>, usize), ProviderError>
where
    P: ChatProvider + ?Sized,
{
    let phase = Phase::ListArchivedThreads {
        channel_id,
        visibility,
    };
    let mut threads = Vec::new();
    let mut pages = 0;
    let mut cursor: Option<ThreadCursor> = None;

    loop {
        let page = provider
            .list_archived_threads(channel_id, visibility, cursor.clone())
            .await
            .map_err(|e| ProviderError::new(phase, e))?;
        pages += 1;
        threads.extend(page.threads);

        match page.next {
            Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
            _ => break,
        }
    }

    Ok((threads, pages))
}
