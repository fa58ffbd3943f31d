//! The pin collection pipeline.
//!
//! ```text
//! fetch_guild ─▶ enumerate_channels ─▶ for each channel (in order):
//!                                        channel-grain predicate ── false ─▶ skip
//!                                          │ true / undecided
//!                                          ▼
//!                                        list_pinned_messages
//!                                          ▼
//!                                        message-grain predicate ─▶ Pin + authors
//! ```
//!
//! With `concurrency > 1` up to that many channels are decided and fetched
//! ahead of the consumer, but results are consumed strictly in enumeration
//! order, so the document is identical to a sequential run. Message
//! filtering and author aggregation only happen on the consuming side.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};

use crate::authors::AuthorAggregator;
use crate::enumerate::{enumerate_channels, DEFAULT_CHANNEL_KINDS};
use crate::error::{Phase, PinsError, ProviderError};
use crate::filter::{EvaluationContext, FilterExpression, Predicate};
use crate::models::{Channel, ChannelKind, Pin, PinnedMessage, PinsDocument, Snowflake};
use crate::progress::{CollectEvent, CollectProgressReporter};
use crate::provider::ChatProvider;

/// Parameters of one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    pub guild_id: Snowflake,
    /// Pinned-message fetches allowed in flight. `1` is fully sequential.
    pub concurrency: usize,
    /// Base channel kinds to enumerate.
    pub channel_kinds: Vec<ChannelKind>,
}

impl CollectOptions {
    pub fn new(guild_id: Snowflake) -> Self {
        Self {
            guild_id,
            concurrency: 1,
            channel_kinds: DEFAULT_CHANNEL_KINDS.to_vec(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_channel_kinds(mut self, kinds: Vec<ChannelKind>) -> Self {
        self.channel_kinds = kinds;
        self
    }
}

/// Compile `filter` and collect the guild's pins.
///
/// The filter is compiled before the provider is touched, so a malformed
/// expression fails with zero provider calls.
pub async fn collect<P>(
    provider: &P,
    filter: &FilterExpression,
    options: &CollectOptions,
    progress: &dyn CollectProgressReporter,
) -> Result<PinsDocument, PinsError>
where
    P: ChatProvider + ?Sized,
{
    let predicate = Predicate::compile(filter)?;
    collect_pins(provider, &predicate, options, progress).await
}

/// Collect the guild's pins with an already compiled predicate.
///
/// All-or-nothing: the first provider or evaluation error in enumeration
/// order aborts the run and no partial document is returned.
pub async fn collect_pins<P>(
    provider: &P,
    predicate: &Predicate,
    options: &CollectOptions,
    progress: &dyn CollectProgressReporter,
) -> Result<PinsDocument, PinsError>
where
    P: ChatProvider + ?Sized,
{
    let guild = provider
        .fetch_guild(options.guild_id)
        .await
        .map_err(|e| ProviderError::new(Phase::FetchGuild, e))?;
    progress.report(CollectEvent::GuildResolved {
        guild_id: guild.id,
        name: guild.name.clone(),
    });

    let channels =
        enumerate_channels(provider, options.guild_id, &options.channel_kinds, progress).await?;

    let fetches = stream::iter(channels.iter().map(|channel| {
        decide_and_fetch(provider, predicate, channel)
    }))
    .buffered(options.concurrency.max(1));
    futures::pin_mut!(fetches);

    let mut channel_names = BTreeMap::new();
    let mut authors = AuthorAggregator::new();
    let mut pins = Vec::new();

    while let Some(outcome) = fetches.next().await {
        let (channel, context, messages) = outcome?;
        let Some(messages) = messages else {
            progress.report(CollectEvent::ChannelSkipped {
                channel_id: channel.id,
                channel_name: channel.name.clone(),
            });
            continue;
        };

        progress.report(CollectEvent::ChannelKept {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
        });
        channel_names.insert(channel.id, channel.name.clone());

        let returned = messages.len();
        let mut accepted = 0;
        for message in messages {
            if !predicate.evaluate(&context.with_message(&message))? {
                continue;
            }
            authors.observe_message(&message);
            pins.push(Pin {
                channel_id: channel.id,
                timestamp: message.timestamp,
                author_id: message.author.id,
                text: message.text,
                attachments: message.attachments,
            });
            accepted += 1;
        }

        progress.report(CollectEvent::PinsFetched {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            returned,
            accepted,
        });
    }

    let document = PinsDocument {
        guild_id: guild.id,
        guild_name: guild.name,
        channel_names,
        authors: authors.into_map(),
        pins,
    };
    progress.report(CollectEvent::Finished {
        channels: document.channel_names.len(),
        pins: document.pins.len(),
        authors: document.authors.len(),
    });
    Ok(document)
}

type Decided<'c> = (&'c Channel, EvaluationContext, Option<Vec<PinnedMessage>>);

/// Evaluate the channel-grain predicate and, if kept, fetch the pins.
/// `None` messages means the channel was skipped and never fetched.
async fn decide_and_fetch<'c, P>(
    provider: &P,
    predicate: &Predicate,
    channel: &'c Channel,
) -> Result<Decided<'c>, PinsError>
where
    P: ChatProvider + ?Sized,
{
    let context = EvaluationContext::for_channel(channel);
    if !predicate.evaluate(&context)? {
        return Ok((channel, context, None));
    }
    let messages = provider
        .list_pinned_messages(channel.id)
        .await
        .map_err(|e| {
            ProviderError::new(
                Phase::ListPinnedMessages {
                    channel_id: channel.id,
                },
                e,
            )
        })?;
    Ok((channel, context, Some(messages)))
}
