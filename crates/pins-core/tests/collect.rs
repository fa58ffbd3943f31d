//! Pipeline tests against a call-counting in-memory provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use pins_core::collect::{collect, collect_pins, CollectOptions};
use pins_core::filter::{Precedence, Predicate, RuleSet};
use pins_core::models::{
    Attachment, ChannelKind, Guild, PinnedMessage, RawChannel, Snowflake, UserRef,
};
use pins_core::progress::{CollectEvent, CollectProgressReporter, NoProgress};
use pins_core::provider::{
    ArchivedThreads, ChatProvider, GuildSnapshot, InMemoryProvider, ThreadCursor, ThreadPage,
    ThreadVisibility,
};
use pins_core::{Phase, PinsError};

const GUILD: Snowflake = Snowflake(1000);

fn text_channel(id: u64, name: &str) -> RawChannel {
    RawChannel {
        id: Snowflake(id),
        name: name.to_string(),
        parent_id: None,
        kind: ChannelKind::Text,
    }
}

fn user(id: u64, name: &str) -> UserRef {
    UserRef {
        id: Snowflake(id),
        name: name.to_string(),
        username: name.to_string(),
        avatar_url: format!("https://cdn.discordapp.com/avatars/{}/{}.png", id, name),
    }
}

fn message(author: UserRef, text: &str) -> PinnedMessage {
    PinnedMessage {
        author,
        timestamp: "2024-02-03T04:05:06Z".parse().unwrap(),
        text: text.to_string(),
        mentions: vec![],
        attachments: vec![],
    }
}

fn guild(channels: Vec<RawChannel>) -> GuildSnapshot {
    GuildSnapshot {
        guild: Guild {
            id: GUILD,
            name: "Test Guild".into(),
        },
        channels,
        ..Default::default()
    }
}

fn options() -> CollectOptions {
    CollectOptions::new(GUILD)
}

#[derive(Default)]
struct Recorder(Mutex<Vec<CollectEvent>>);

impl CollectProgressReporter for Recorder {
    fn report(&self, event: CollectEvent) {
        self.0.lock().unwrap().push(event);
    }
}

impl Recorder {
    fn events(&self) -> Vec<CollectEvent> {
        self.0.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn channel_filter_skips_fetching_excluded_channels() {
    let mut snapshot = guild(vec![
        text_channel(1, "general"),
        text_channel(2, "announcements"),
    ]);
    snapshot
        .pins
        .insert(Snowflake(1), vec![message(user(7, "a"), "in general")]);
    snapshot
        .pins
        .insert(Snowflake(2), vec![message(user(8, "b"), "v2 is out")]);
    let provider = InMemoryProvider::new(snapshot);
    let recorder = Recorder::default();

    let doc = collect(
        &provider,
        &r#"channel_name == "announcements""#.into(),
        &options(),
        &recorder,
    )
    .await
    .unwrap();

    assert_eq!(provider.pinned_requests(), vec![Snowflake(2)]);
    assert_eq!(
        doc.channel_names,
        BTreeMap::from([(Snowflake(2), "announcements".to_string())])
    );
    assert_eq!(doc.pins.len(), 1);
    assert_eq!(doc.pins[0].channel_id, Snowflake(2));

    let events = recorder.events();
    assert!(events.contains(&CollectEvent::ChannelSkipped {
        channel_id: Snowflake(1),
        channel_name: "general".into(),
    }));
    assert!(events.contains(&CollectEvent::ChannelKept {
        channel_id: Snowflake(2),
        channel_name: "announcements".into(),
    }));
    assert_eq!(
        events.last(),
        Some(&CollectEvent::Finished {
            channels: 1,
            pins: 1,
            authors: 1,
        })
    );
}

#[tokio::test]
async fn message_filter_keeps_matching_pins_in_order() {
    let mut snapshot = guild(vec![text_channel(1, "dev")]);
    snapshot.pins.insert(
        Snowflake(1),
        vec![
            message(user(7, "a"), "release 1.0"),
            message(user(8, "b"), "lunch"),
            message(user(9, "c"), "release 1.1"),
        ],
    );
    let provider = InMemoryProvider::new(snapshot);

    let doc = collect(
        &provider,
        &r#"text.contains("release")"#.into(),
        &options(),
        &NoProgress,
    )
    .await
    .unwrap();

    let texts: Vec<&str> = doc.pins.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["release 1.0", "release 1.1"]);
    let authors: Vec<u64> = doc.authors.keys().map(|id| id.get()).collect();
    assert_eq!(authors, vec![7, 9]);
}

#[tokio::test]
async fn author_name_matches_username_while_document_keeps_tag() {
    let mut snapshot = guild(vec![text_channel(1, "bots")]);
    let bot = UserRef {
        id: Snowflake(159985870458322944),
        name: "MEE6#4876".into(),
        username: "MEE6".into(),
        avatar_url: String::new(),
    };
    snapshot.pins.insert(
        Snowflake(1),
        vec![
            message(bot, "level up"),
            message(user(8, "b"), "not a bot"),
        ],
    );
    let provider = InMemoryProvider::new(snapshot);

    let doc = collect(
        &provider,
        &r#"author_name == "MEE6""#.into(),
        &options(),
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(doc.pins.len(), 1);
    assert_eq!(doc.pins[0].text, "level up");
    assert_eq!(
        doc.authors[&Snowflake(159985870458322944)].name,
        "MEE6#4876"
    );
}

#[tokio::test]
async fn malformed_expression_makes_no_provider_calls() {
    let provider = InMemoryProvider::new(guild(vec![text_channel(1, "general")]));

    let err = collect(&provider, &"channel_name ==".into(), &options(), &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, PinsError::Compile(_)));
    assert_eq!(provider.calls().total(), 0);
}

#[tokio::test]
async fn mistyped_expression_makes_no_provider_calls() {
    let provider = InMemoryProvider::new(guild(vec![text_channel(1, "general")]));
    let err = collect(&provider, &"text == 3".into(), &options(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, PinsError::Compile(_)));
    assert_eq!(provider.calls().total(), 0);
}

#[tokio::test]
async fn channel_exclusion_dominates_message_matches() {
    let mut snapshot = guild(vec![text_channel(1, "off-topic"), text_channel(2, "news")]);
    snapshot
        .pins
        .insert(Snowflake(1), vec![message(user(7, "a"), "release party")]);
    snapshot
        .pins
        .insert(Snowflake(2), vec![message(user(8, "b"), "release notes")]);
    let provider = InMemoryProvider::new(snapshot);

    let doc = collect(
        &provider,
        &"channel_name == 'news' && text.contains('release')".into(),
        &options(),
        &NoProgress,
    )
    .await
    .unwrap();

    assert!(!doc.channel_names.contains_key(&Snowflake(1)));
    assert!(doc.pins.iter().all(|p| p.channel_id == Snowflake(2)));
    assert_eq!(provider.pinned_requests(), vec![Snowflake(2)]);
}

#[tokio::test]
async fn authors_are_deduplicated_first_seen() {
    let mut snapshot = guild(vec![text_channel(1, "a"), text_channel(2, "b")]);
    let mut first = message(user(7, "seven"), "hello");
    first.mentions = vec![user(8, "eight"), user(7, "seven-mention")];
    let mut second = message(user(8, "eight-renamed"), "again");
    second.mentions = vec![user(9, "nine")];
    snapshot.pins.insert(Snowflake(1), vec![first]);
    snapshot.pins.insert(Snowflake(2), vec![second]);
    let provider = InMemoryProvider::new(snapshot);

    let doc = collect(&provider, &"".into(), &options(), &NoProgress)
        .await
        .unwrap();

    assert_eq!(doc.authors.len(), 3);
    assert_eq!(doc.authors[&Snowflake(7)].name, "seven");
    assert_eq!(doc.authors[&Snowflake(8)].name, "eight");
    assert_eq!(doc.authors[&Snowflake(9)].name, "nine");
}

#[tokio::test]
async fn attachments_are_carried_onto_pins() {
    let mut snapshot = guild(vec![text_channel(1, "art")]);
    let mut pinned = message(user(7, "a"), "");
    pinned.attachments = vec![Attachment {
        url: "https://cdn.discordapp.com/attachments/1/2/cat.png".into(),
        filename: "cat.png".into(),
        size_bytes: 2048,
        content_type: "image/png".into(),
    }];
    snapshot.pins.insert(Snowflake(1), vec![pinned]);
    let provider = InMemoryProvider::new(snapshot);

    let doc = collect(&provider, &"".into(), &options(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(doc.pins[0].attachments[0].filename, "cat.png");
    assert_eq!(doc.pins[0].attachments[0].size_bytes, 2048);
}

/// N text channels, K archived threads each, M pins per channel.
fn synthetic(n: u64, k: u64, m: u64) -> GuildSnapshot {
    let mut snapshot = guild((1..=n).map(|c| text_channel(c, &format!("chan-{}", c))).collect());
    for c in 1..=n {
        let threads: Vec<RawChannel> = (1..=k)
            .map(|t| RawChannel {
                id: Snowflake(c * 100 + t),
                name: format!("thread-{}-{}", c, t),
                parent_id: Some(Snowflake(c)),
                kind: ChannelKind::PublicThread,
            })
            .collect();
        for channel in std::iter::once(c).chain(threads.iter().map(|t| t.id.get())) {
            let messages = (0..m)
                .map(|i| {
                    let mut msg = message(
                        user(10_000 + (channel + i) % 5, "u"),
                        if i % 2 == 0 { "keep me" } else { "drop me" },
                    );
                    msg.mentions = vec![user(20_000 + i % 3, "m")];
                    msg
                })
                .collect();
            snapshot.pins.insert(Snowflake(channel), messages);
        }
        snapshot.archived_threads.insert(
            Snowflake(c),
            ArchivedThreads {
                public: threads,
                private: vec![],
            },
        );
    }
    snapshot
}

#[tokio::test]
async fn aggregate_counts_match_the_predicate() {
    let snapshot = synthetic(4, 3, 6);
    let expected_pins: usize = snapshot
        .pins
        .iter()
        .filter(|(id, _)| id.get() % 2 == 0 || id.get() > 100)
        .map(|(_, msgs)| msgs.iter().filter(|m| m.text.starts_with("keep")).count())
        .sum();
    let provider = InMemoryProvider::new(snapshot).with_page_size(2);

    let doc = collect(
        &provider,
        &"(channel_id % 2 == 0 || channel_parent_id != 0) && text.startsWith('keep')".into(),
        &options(),
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(doc.pins.len(), expected_pins);
    let distinct: BTreeSet<Snowflake> = provider
        .snapshot()
        .pins
        .values()
        .flatten()
        .filter(|m| m.text.starts_with("keep"))
        .flat_map(|m| std::iter::once(m.author.id).chain(m.mentions.iter().map(|u| u.id)))
        .collect();
    assert!(doc.authors.len() <= distinct.len());
    // 4 channels + 12 threads, only 2 base channels are odd.
    assert_eq!(doc.channel_names.len(), 14);
}

#[tokio::test]
async fn identical_runs_serialize_identically() {
    let run = || async {
        let provider = InMemoryProvider::new(synthetic(3, 2, 4));
        let doc = collect(&provider, &"".into(), &options(), &NoProgress)
            .await
            .unwrap();
        serde_json::to_vec_pretty(&doc).unwrap()
    };
    assert_eq!(run().await, run().await);
}

#[tokio::test]
async fn archived_pages_are_all_followed() {
    let provider = InMemoryProvider::new(synthetic(1, 5, 0)).with_page_size(2);
    let doc = collect(&provider, &"".into(), &options(), &NoProgress)
        .await
        .unwrap();
    // channel + 5 threads, all kept although they span three pages.
    assert_eq!(doc.channel_names.len(), 6);
    // public: 3 pages, private: 1 page.
    assert_eq!(provider.calls().list_archived_threads, 4);
}

#[tokio::test]
async fn regex_rules_drive_the_same_pipeline() {
    let mut snapshot = guild(vec![
        text_channel(1, "announcements"),
        text_channel(2, "announcements-archive"),
        text_channel(3, "general"),
    ]);
    for id in 1..=3 {
        snapshot
            .pins
            .insert(Snowflake(id), vec![message(user(7, "a"), "hi")]);
    }
    let provider = InMemoryProvider::new(snapshot);
    let mut rules = RuleSet::new(Precedence::SkipOverridesKeep);
    rules
        .add_field("channel_name", ["^announce"], ["-archive$"])
        .unwrap();

    let doc = collect_pins(&provider, &Predicate::from_rules(rules), &options(), &NoProgress)
        .await
        .unwrap();
    assert_eq!(doc.channel_names.keys().copied().collect::<Vec<_>>(), vec![Snowflake(1)]);
    assert_eq!(provider.pinned_requests(), vec![Snowflake(1)]);
}

#[tokio::test]
async fn non_boolean_expression_fails_on_first_record() {
    let provider = InMemoryProvider::new(guild(vec![text_channel(1, "general")]));
    let err = collect(&provider, &"channel_name".into(), &options(), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, PinsError::Evaluation(_)));
    assert_eq!(provider.calls().list_pinned_messages, 0);
}

async fn failing_phase(phase: Phase) -> (PinsError, InMemoryProvider) {
    let provider = InMemoryProvider::new(synthetic(2, 1, 1)).failing_at(phase);
    let err = collect(&provider, &"".into(), &options(), &NoProgress)
        .await
        .unwrap_err();
    (err, provider)
}

#[tokio::test]
async fn every_phase_failure_aborts_with_its_name() {
    let phases = [
        Phase::FetchGuild,
        Phase::ListChannels,
        Phase::ListArchivedThreads {
            channel_id: Snowflake(2),
            visibility: ThreadVisibility::Private,
        },
        Phase::ListActiveThreads,
        Phase::ListPinnedMessages {
            channel_id: Snowflake(101),
        },
    ];
    for phase in phases {
        let (err, _) = failing_phase(phase).await;
        match err {
            PinsError::Provider(e) => {
                assert_eq!(e.phase, phase);
                assert!(e.to_string().starts_with("failed to "));
            }
            other => panic!("{}: expected provider error, got {:?}", phase, other),
        }
    }
}

#[tokio::test]
async fn pinned_failure_stops_before_later_channels() {
    let (_, provider) = failing_phase(Phase::ListPinnedMessages {
        channel_id: Snowflake(1),
    })
    .await;
    assert_eq!(provider.pinned_requests(), vec![Snowflake(1)]);
}

#[tokio::test]
async fn guild_failure_makes_no_further_calls() {
    let (_, provider) = failing_phase(Phase::FetchGuild).await;
    assert_eq!(provider.calls().total(), 1);
}

/// Wraps a provider and delays pinned-message fetches so that later
/// channels finish first.
struct SlowFirstChannels {
    inner: InMemoryProvider,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ChatProvider for SlowFirstChannels {
    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild> {
        self.inner.fetch_guild(guild_id).await
    }

    async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        self.inner.list_channels(guild_id).await
    }

    async fn list_archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<ThreadCursor>,
    ) -> Result<ThreadPage> {
        self.inner
            .list_archived_threads(channel_id, visibility, before)
            .await
    }

    async fn list_active_threads(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        self.inner.list_active_threads(guild_id).await
    }

    async fn list_pinned_messages(&self, channel_id: Snowflake) -> Result<Vec<PinnedMessage>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let delay = 60u64.saturating_sub(channel_id.get() * 10);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.list_pinned_messages(channel_id).await
    }
}

#[tokio::test]
async fn concurrent_fetches_keep_enumeration_order() {
    let mut snapshot = guild((1..=5).map(|c| text_channel(c, &format!("c{}", c))).collect());
    for c in 1..=5u64 {
        let mut msg = message(user(c, &format!("u{}", c)), &format!("pin {}", c));
        msg.mentions = vec![user(99, &format!("mention-from-{}", c))];
        snapshot.pins.insert(Snowflake(c), vec![msg]);
    }

    let sequential = {
        let provider = InMemoryProvider::new(snapshot.clone());
        collect(&provider, &"".into(), &options(), &NoProgress)
            .await
            .unwrap()
    };

    let slow = Arc::new(SlowFirstChannels {
        inner: InMemoryProvider::new(snapshot),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let concurrent = collect(
        &slow,
        &"".into(),
        &options().with_concurrency(4),
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(concurrent, sequential);
    let texts: Vec<&str> = concurrent.pins.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, vec!["pin 1", "pin 2", "pin 3", "pin 4", "pin 5"]);
    assert_eq!(concurrent.authors[&Snowflake(99)].name, "mention-from-1");
    assert!(slow.peak.load(Ordering::SeqCst) > 1);
}
