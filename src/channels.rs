//! The `channels` command: list what a collection run would inspect.

use anyhow::{Context, Result};
use pins_core::enumerate::enumerate_channels;
use pins_core::models::{Channel, Snowflake};
use pins_core::progress::CollectProgressReporter;
use std::path::Path;

use crate::config::Config;
use crate::get::open_provider;

/// Print the channels a collection run would inspect, in enumeration order.
pub async fn run_channels(
    config: &Config,
    guild_id: Snowflake,
    fixture: Option<&Path>,
    progress: &dyn CollectProgressReporter,
) -> Result<()> {
    let kinds = config.channel_kinds()?;
    let provider = open_provider(config, fixture)?;
    let channels = enumerate_channels(provider.as_ref(), guild_id, &kinds, progress)
        .await
        .with_context(|| format!("failed to enumerate channels of guild {}", guild_id))?;

    for line in channel_table(&channels) {
        println!("{}", line);
    }
    Ok(())
}

fn channel_table(channels: &[Channel]) -> Vec<String> {
    let mut lines = vec![format!("{:<20} {:<20} NAME", "ID", "PARENT")];
    for channel in channels {
        let parent = channel
            .parent_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("{:<20} {:<20} {}", channel.id, parent, channel.name));
    }
    lines
}
