//! The `get`, `update`, `print-expr` and `check` commands.
//!
//! `get` and `update` share one path: build the predicate (before any token
//! or network use), open a provider, collect, then write the document under
//! its encoded file name.

use anyhow::{bail, Context, Result};
use pins_core::collect::collect_pins;
use pins_core::filter::{FilterExpression, Predicate};
use pins_core::models::{PinsDocument, Snowflake};
use pins_core::progress::CollectProgressReporter;
use pins_core::provider::{ChatProvider, InMemoryProvider};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::discord::DiscordClient;
use crate::export::write_json;
use crate::filename::{decode_filename, encode_filename};

/// The predicate for a run: the command-line expression, or the configured
/// regex rules when no expression is given.
pub fn build_predicate(config: &Config, expression: &FilterExpression) -> Result<Predicate> {
    let has_rules = config.filter.has_rules();
    if has_rules && !expression.is_empty() {
        bail!("a filter expression cannot be combined with [filter.fields] rules from the config");
    }
    if has_rules {
        return Ok(Predicate::from_rules(config.filter.rule_set()?));
    }
    Predicate::compile(expression)
        .with_context(|| format!("invalid filter expression {:?}", expression.as_str()))
}

/// A snapshot file when `fixture` is given, otherwise the Discord API.
pub fn open_provider(config: &Config, fixture: Option<&Path>) -> Result<Box<dyn ChatProvider>> {
    match fixture {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read fixture {}", path.display()))?;
            let provider = InMemoryProvider::from_json(&json)
                .with_context(|| format!("Invalid fixture {}", path.display()))?;
            Ok(Box::new(provider))
        }
        None => Ok(Box::new(DiscordClient::from_env(&config.discord)?)),
    }
}

async fn collect_document(
    config: &Config,
    guild_id: Snowflake,
    expression: &FilterExpression,
    fixture: Option<&Path>,
    progress: &dyn CollectProgressReporter,
) -> Result<PinsDocument> {
    let predicate = build_predicate(config, expression)?;
    let options = config.collect_options(guild_id)?;
    let provider = open_provider(config, fixture)?;

    let document = collect_pins(provider.as_ref(), &predicate, &options, progress)
        .await
        .with_context(|| format!("failed to collect pins of guild {}", guild_id))?;
    Ok(document)
}

fn print_summary(document: &PinsDocument) {
    println!("  guild: {} ({})", document.guild_name, document.guild_id);
    println!("  channels kept: {}", document.channel_names.len());
    println!("  pins: {}", document.pins.len());
    println!("  authors: {}", document.authors.len());
}

/// Options of `pins get`.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub output_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub fixture: Option<PathBuf>,
}

pub async fn run_get(
    config: &Config,
    guild_id: Snowflake,
    expression: &FilterExpression,
    options: &GetOptions,
    progress: &dyn CollectProgressReporter,
) -> Result<()> {
    let document = collect_document(
        config,
        guild_id,
        expression,
        options.fixture.as_deref(),
        progress,
    )
    .await?;

    if options.dry_run {
        println!("get {} (dry-run)", guild_id);
        print_summary(&document);
        return Ok(());
    }

    let dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());
    let path = dir.join(encode_filename(guild_id, expression));
    write_json(&document, Some(&path), config.output.pretty)?;

    println!("get {}", guild_id);
    print_summary(&document);
    println!("  wrote: {}", path.display());
    println!("ok");
    Ok(())
}

/// Rerun the query recorded in `file`'s name and overwrite it.
pub async fn run_update(
    config: &Config,
    file: &Path,
    fixture: Option<&Path>,
    progress: &dyn CollectProgressReporter,
) -> Result<()> {
    let (guild_id, expression) = decode_filename(file).context("failed to decode filename")?;
    let previous = std::fs::read_to_string(file)
        .ok()
        .and_then(|raw| serde_json::from_str::<PinsDocument>(&raw).ok());

    let document = collect_document(config, guild_id, &expression, fixture, progress).await?;
    write_json(&document, Some(file), config.output.pretty)?;

    println!("update {}", file.display());
    print_summary(&document);
    if let Some(previous) = previous {
        let delta = document.pins.len() as i64 - previous.pins.len() as i64;
        println!("  change: {:+} pins", delta);
    }
    println!("ok");
    Ok(())
}

/// The lines `print-expr` writes for a saved file.
pub fn reproduce_flags(file: &Path) -> Result<Vec<String>> {
    let (guild_id, expression) = decode_filename(file).context("failed to decode filename")?;
    let mut command = format!("  get {}", guild_id);
    if !expression.is_empty() {
        command.push_str(&format!(" {:?}", expression.as_str()));
    }
    Ok(vec![
        "Copy the following flags to run this tool:".to_string(),
        command,
    ])
}

pub fn run_print_expr(file: &Path) -> Result<()> {
    for line in reproduce_flags(file)? {
        println!("{}", line);
    }
    Ok(())
}

/// Compile `expression` against the config without collecting anything.
pub fn run_check(config: &Config, expression: &FilterExpression) -> Result<()> {
    let predicate = build_predicate(config, expression)?;
    if predicate.is_pass_through() {
        println!("ok: filter keeps everything");
    } else {
        println!("ok");
    }
    Ok(())
}
