//! Discord REST provider.
//!
//! Implements [`ChatProvider`] over the Discord HTTP API (v10) with
//! `reqwest`. Only the five read endpoints the pipeline needs are used:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `fetch_guild` | `GET /guilds/{id}` |
//! | `list_channels` | `GET /guilds/{id}/channels` |
//! | `list_archived_threads` | `GET /channels/{id}/threads/archived/{public,private}` |
//! | `list_active_threads` | `GET /guilds/{id}/threads/active` |
//! | `list_pinned_messages` | `GET /channels/{id}/pins` |
//!
//! Retry strategy:
//! - HTTP 429 → wait `retry_after` (body, else `Retry-After` header), retry
//!   up to `discord.max_retries` times
//! - any other non-success status → fail immediately with a truncated body
//! - network errors → fail immediately

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pins_core::models::{
    Attachment, ChannelKind, Guild, PinnedMessage, RawChannel, Snowflake, UserRef,
};
use pins_core::provider::{ChatProvider, ThreadCursor, ThreadPage, ThreadVisibility};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::config::DiscordConfig;

const CDN_BASE: &str = "https://cdn.discordapp.com";
const ARCHIVE_PAGE_LIMIT: u32 = 100;
const MAX_ERROR_BODY: usize = 200;

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct WireGuild {
    id: Snowflake,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: Snowflake,
    #[serde(rename = "type")]
    kind: u16,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_id: Option<Snowflake>,
    #[serde(default)]
    thread_metadata: Option<WireThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireThreadMetadata {
    archive_timestamp: String,
}

#[derive(Debug, Deserialize)]
struct WireThreadList {
    threads: Vec<WireChannel>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Snowflake,
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    url: String,
    filename: String,
    size: u64,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    author: WireUser,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    mentions: Vec<WireUser>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

#[derive(Debug, Deserialize)]
struct WireRateLimit {
    retry_after: f64,
}

// ═══════════════════════════════════════════════════════════════════════
// Conversion
// ═══════════════════════════════════════════════════════════════════════

impl From<WireChannel> for RawChannel {
    fn from(wire: WireChannel) -> Self {
        RawChannel {
            id: wire.id,
            name: wire.name.unwrap_or_default(),
            parent_id: wire.parent_id,
            kind: ChannelKind::from_discord(wire.kind),
        }
    }
}

impl From<WireUser> for UserRef {
    fn from(wire: WireUser) -> Self {
        UserRef {
            id: wire.id,
            name: user_tag(&wire.username, wire.discriminator.as_deref()),
            avatar_url: avatar_url(wire.id, wire.avatar.as_deref()),
            username: wire.username,
        }
    }
}

impl From<WireAttachment> for Attachment {
    fn from(wire: WireAttachment) -> Self {
        Attachment {
            url: wire.url,
            filename: wire.filename,
            size_bytes: wire.size,
            content_type: wire.content_type.unwrap_or_default(),
        }
    }
}

impl From<WireMessage> for PinnedMessage {
    fn from(wire: WireMessage) -> Self {
        PinnedMessage {
            author: wire.author.into(),
            timestamp: wire.timestamp,
            text: wire.content,
            mentions: wire.mentions.into_iter().map(UserRef::from).collect(),
            attachments: wire.attachments.into_iter().map(Attachment::from).collect(),
        }
    }
}

/// `name#1234` for legacy accounts, plain `name` once discriminators are gone.
fn user_tag(username: &str, discriminator: Option<&str>) -> String {
    match discriminator {
        Some(d) if !d.is_empty() && d != "0" => format!("{}#{}", username, d),
        _ => username.to_string(),
    }
}

/// CDN avatar URL, falling back to the default avatar for the id.
fn avatar_url(id: Snowflake, hash: Option<&str>) -> String {
    match hash {
        Some(hash) if !hash.is_empty() => {
            let ext = if hash.starts_with("a_") { "gif" } else { "png" };
            format!("{}/avatars/{}/{}.{}", CDN_BASE, id, hash, ext)
        }
        _ => format!("{}/embed/avatars/{}.png", CDN_BASE, (id.get() >> 22) % 6),
    }
}

/// A page continues from the archive timestamp of its last (oldest) thread.
fn thread_page(list: WireThreadList) -> ThreadPage {
    let next = if list.has_more {
        list.threads
            .last()
            .and_then(|t| t.thread_metadata.as_ref())
            .map(|m| ThreadCursor(m.archive_timestamp.clone()))
    } else {
        None
    };
    ThreadPage {
        threads: list.threads.into_iter().map(RawChannel::from).collect(),
        next,
    }
}

/// How long a 429 response asks us to wait.
fn retry_delay(body: &str, header: Option<&str>) -> Duration {
    let secs = serde_json::from_str::<WireRateLimit>(body)
        .map(|r| r.retry_after)
        .ok()
        .filter(|s| s.is_finite())
        .or_else(|| {
            header
                .and_then(|h| h.trim().parse::<f64>().ok())
                .filter(|s| s.is_finite())
        })
        .unwrap_or(1.0);
    Duration::from_secs_f64(secs.clamp(0.0, 300.0))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════

/// Discord API client authenticated as a bot.
pub struct DiscordClient {
    http: reqwest::Client,
    api_base: String,
    authorization: String,
    max_retries: u32,
}

impl DiscordClient {
    /// Build a client reading the bot token from `config.token_env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment variable is unset or empty.
    pub fn from_env(config: &DiscordConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", config.token_env))?;
        Self::new(config, &token)
    }

    pub fn new(config: &DiscordConfig, token: &str) -> Result<Self> {
        let token = token.trim();
        let authorization = if token.starts_with("Bot ") {
            token.to_string()
        } else {
            format!("Bot {}", token)
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            authorization,
            max_retries: config.max_retries,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let mut attempt = 0;

        loop {
            let response = self
                .http
                .get(&url)
                .header("Authorization", &self.authorization)
                .query(query)
                .send()
                .await
                .with_context(|| format!("GET {} failed", path))?;

            let status = response.status();
            if status.is_success() {
                return response
                    .json::<T>()
                    .await
                    .with_context(|| format!("invalid response from GET {}", path));
            }

            if status.as_u16() == 429 && attempt < self.max_retries {
                let header = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let body = response.text().await.unwrap_or_default();
                tokio::time::sleep(retry_delay(&body, header.as_deref())).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            bail!("Discord API error {} on GET {}: {}", status, path, truncate(&body));
        }
    }
}

#[async_trait]
impl ChatProvider for DiscordClient {
    async fn fetch_guild(&self, guild_id: Snowflake) -> Result<Guild> {
        let guild: WireGuild = self.get(&format!("/guilds/{}", guild_id), &[]).await?;
        Ok(Guild {
            id: guild.id,
            name: guild.name,
        })
    }

    async fn list_channels(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        let channels: Vec<WireChannel> = self
            .get(&format!("/guilds/{}/channels", guild_id), &[])
            .await?;
        Ok(channels.into_iter().map(RawChannel::from).collect())
    }

    async fn list_archived_threads(
        &self,
        channel_id: Snowflake,
        visibility: ThreadVisibility,
        before: Option<ThreadCursor>,
    ) -> Result<ThreadPage> {
        let mut query = vec![("limit", ARCHIVE_PAGE_LIMIT.to_string())];
        if let Some(cursor) = before {
            query.push(("before", cursor.0));
        }
        let list: WireThreadList = self
            .get(
                &format!("/channels/{}/threads/archived/{}", channel_id, visibility),
                &query,
            )
            .await?;
        Ok(thread_page(list))
    }

    async fn list_active_threads(&self, guild_id: Snowflake) -> Result<Vec<RawChannel>> {
        let list: WireThreadList = self
            .get(&format!("/guilds/{}/threads/active", guild_id), &[])
            .await?;
        Ok(list.threads.into_iter().map(RawChannel::from).collect())
    }

    async fn list_pinned_messages(&self, channel_id: Snowflake) -> Result<Vec<PinnedMessage>> {
        let messages: Vec<WireMessage> = self
            .get(&format!("/channels/{}/pins", channel_id), &[])
            .await?;
        Ok(messages.into_iter().map(PinnedMessage::from).collect())
    }
}
