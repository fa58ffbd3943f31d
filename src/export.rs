//! Writing and rendering saved documents.
//!
//! [`write_json`] writes a document to a file (creating parent directories)
//! or to stdout. [`group_by_channel`] produces the per-channel view used by
//! `pins render`: each channel carries its own messages and the authors of
//! those messages.

use anyhow::{Context, Result};
use pins_core::models::{Pin, PinsDocument, Snowflake};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedGuild {
    pub guild_id: Snowflake,
    pub guild_name: String,
    pub channels: Vec<GroupedChannel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedChannel {
    pub channel_id: Snowflake,
    pub channel_name: String,
    pub authors: BTreeMap<Snowflake, GroupedAuthor>,
    pub messages: Vec<Pin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedAuthor {
    pub name: String,
    pub avatar: String,
}

/// Group a document's pins per channel.
///
/// Channels appear in the order of their first pin; kept channels without
/// pins follow in id order.
pub fn group_by_channel(doc: &PinsDocument) -> GroupedGuild {
    let mut channels: Vec<GroupedChannel> = Vec::new();
    let mut index: BTreeMap<Snowflake, usize> = BTreeMap::new();

    for pin in &doc.pins {
        let slot = *index.entry(pin.channel_id).or_insert_with(|| {
            channels.push(GroupedChannel {
                channel_id: pin.channel_id,
                channel_name: doc
                    .channel_names
                    .get(&pin.channel_id)
                    .cloned()
                    .unwrap_or_default(),
                authors: BTreeMap::new(),
                messages: Vec::new(),
            });
            channels.len() - 1
        });
        let channel = &mut channels[slot];
        if let Some(author) = doc.authors.get(&pin.author_id) {
            channel
                .authors
                .entry(pin.author_id)
                .or_insert_with(|| GroupedAuthor {
                    name: author.name.clone(),
                    avatar: author.avatar_url.clone(),
                });
        }
        channel.messages.push(pin.clone());
    }

    let with_pins: HashSet<Snowflake> = index.keys().copied().collect();
    for (id, name) in &doc.channel_names {
        if !with_pins.contains(id) {
            channels.push(GroupedChannel {
                channel_id: *id,
                channel_name: name.clone(),
                authors: BTreeMap::new(),
                messages: Vec::new(),
            });
        }
    }

    GroupedGuild {
        guild_id: doc.guild_id,
        guild_name: doc.guild_name.clone(),
        channels,
    }
}

pub fn read_document(path: &Path) -> Result<PinsDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a pins document", path.display()))
}

/// Serialize `value` as JSON to `output`, or to stdout when `None`.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory {}", parent.display())
                    })?;
                }
            }
            std::fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}

/// `pins render`: write the grouped view of a saved document.
pub fn run_render(file: &Path, output: Option<&Path>, pretty: bool) -> Result<()> {
    let document = read_document(file)?;
    let grouped = group_by_channel(&document);
    write_json(&grouped, output, pretty)?;

    if let Some(path) = output {
        eprintln!(
            "Rendered {} channels to {}",
            grouped.channels.len(),
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pins_core::models::Author;

    fn pin(channel: u64, author: u64, text: &str) -> Pin {
        Pin {
            channel_id: Snowflake(channel),
            timestamp: "2024-01-01T00:00:00Z".parse().unwrap(),
            author_id: Snowflake(author),
            text: text.into(),
            attachments: vec![],
        }
    }

    fn author(id: u64, name: &str) -> (Snowflake, Author) {
        (
            Snowflake(id),
            Author {
                id: Snowflake(id),
                name: name.into(),
                avatar_url: format!("{}.png", name),
            },
        )
    }

    fn document() -> PinsDocument {
        PinsDocument {
            guild_id: Snowflake(1),
            guild_name: "g".into(),
            channel_names: BTreeMap::from([
                (Snowflake(5), "five".to_string()),
                (Snowflake(3), "three".to_string()),
                (Snowflake(9), "nine".to_string()),
                (Snowflake(2), "two".to_string()),
            ]),
            authors: BTreeMap::from([author(7, "ann"), author(8, "bo"), author(99, "mentioned")]),
            pins: vec![pin(9, 7, "a"), pin(3, 8, "b"), pin(9, 8, "c")],
        }
    }

    #[test]
    fn groups_in_first_pin_order_then_pinless_by_id() {
        let grouped = group_by_channel(&document());
        let order: Vec<u64> = grouped.channels.iter().map(|c| c.channel_id.get()).collect();
        assert_eq!(order, vec![9, 3, 2, 5]);

        let nine = &grouped.channels[0];
        assert_eq!(nine.channel_name, "nine");
        let texts: Vec<&str> = nine.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);
        assert_eq!(nine.authors.len(), 2);

        let three = &grouped.channels[1];
        assert_eq!(
            three.authors[&Snowflake(8)],
            GroupedAuthor {
                name: "bo".into(),
                avatar: "bo.png".into()
            }
        );
        assert!(grouped.channels[2].messages.is_empty());
    }

    #[test]
    fn writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("1.json");
        write_json(&document(), Some(&path), true).unwrap();
        assert_eq!(read_document(&path).unwrap(), document());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"channel_names\": {\n    \"2\": \"two\""));
    }

    #[test]
    fn non_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.json");
        std::fs::write(&path, "{\"hello\": 1}").unwrap();
        assert!(read_document(&path).is_err());
    }
}
