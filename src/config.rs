//! Configuration parsing and validation.
//!
//! Pins is configured via a TOML file (default `./pins.toml`). Every section
//! is optional; a missing default file means built-in defaults.
//!
//! # Example
//!
//! ```toml
//! [discord]
//! token_env = "DISCORD_TOKEN"
//! max_retries = 3
//!
//! [output]
//! dir = "output"
//!
//! [collect]
//! concurrency = 4
//! channel_kinds = ["text", "announcement"]
//!
//! [filter]
//! precedence = "skip"
//!
//! [filter.fields.channel_name]
//! keep = ["^announce"]
//! skip = ["-archive$"]
//! ```
//!
//! Validation runs at load time: zero concurrency or timeout, unknown
//! channel kinds, rules on non-string fields and invalid regexes are all
//! rejected before any command runs.

use anyhow::{bail, Context, Result};
use pins_core::collect::CollectOptions;
use pins_core::filter::{Precedence, RuleSet};
use pins_core::models::{ChannelKind, Snowflake};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Path read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./pins.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub collect: CollectConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

/// Discord REST settings.
#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Environment variable holding the bot token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after HTTP 429, honoring `retry_after`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_user_agent() -> String {
    format!(
        "pins (https://github.com/ethanthatonekid/pins, {})",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            pretty: default_pretty(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_pretty() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_channel_kinds")]
    pub channel_kinds: Vec<String>,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            channel_kinds: default_channel_kinds(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_channel_kinds() -> Vec<String> {
    vec!["text".to_string()]
}

/// Regex keep/skip lists, applied when no expression is given.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub precedence: Precedence,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRulesConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldRulesConfig {
    #[serde(default)]
    pub keep: Vec<String>,
    #[serde(default)]
    pub skip: Vec<String>,
}

impl FilterConfig {
    pub fn has_rules(&self) -> bool {
        self.fields
            .values()
            .any(|f| !f.keep.is_empty() || !f.skip.is_empty())
    }

    /// Compile the configured lists.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::new(self.precedence);
        for (name, lists) in &self.fields {
            rules
                .add_field(name, &lists.keep, &lists.skip)
                .with_context(|| format!("invalid rules in [filter.fields.{}]", name))?;
        }
        Ok(rules)
    }
}

impl Config {
    pub fn channel_kinds(&self) -> Result<Vec<ChannelKind>> {
        self.collect
            .channel_kinds
            .iter()
            .map(|name| {
                ChannelKind::from_name(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown channel kind: '{}'. Must be text, announcement, forum, media, voice, or stage.",
                        name
                    )
                })
            })
            .collect()
    }

    pub fn collect_options(&self, guild_id: Snowflake) -> Result<CollectOptions> {
        Ok(CollectOptions::new(guild_id)
            .with_concurrency(self.collect.concurrency)
            .with_channel_kinds(self.channel_kinds()?))
    }
}

/// Load the config named by `--config`, or the default path.
///
/// An explicit path must exist; a missing default file yields defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                load_config(path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.collect.concurrency == 0 {
        bail!("collect.concurrency must be >= 1");
    }

    if config.discord.timeout_secs == 0 {
        bail!("discord.timeout_secs must be >= 1");
    }

    if config.discord.token_env.trim().is_empty() {
        bail!("discord.token_env must not be empty");
    }

    if config.collect.channel_kinds.is_empty() {
        bail!("collect.channel_kinds must list at least one kind");
    }
    config.channel_kinds()?;

    config.filter.rule_set()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(toml: &str) -> Result<Config> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.discord.api_base, "https://discord.com/api/v10");
        assert_eq!(cfg.discord.token_env, "DISCORD_TOKEN");
        assert_eq!(cfg.output.dir, PathBuf::from("output"));
        assert_eq!(cfg.collect.concurrency, 1);
        assert_eq!(cfg.channel_kinds().unwrap(), vec![ChannelKind::Text]);
        assert_eq!(cfg.filter.precedence, Precedence::SkipOverridesKeep);
        assert!(!cfg.filter.has_rules());
    }

    #[test]
    fn full_file_parses() {
        let cfg = parse(
            r#"
[discord]
max_retries = 5

[collect]
concurrency = 4
channel_kinds = ["text", "news"]

[filter]
precedence = "keep"

[filter.fields.channel_name]
keep = ["^announce"]
skip = ["-archive$"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.discord.max_retries, 5);
        assert_eq!(
            cfg.channel_kinds().unwrap(),
            vec![ChannelKind::Text, ChannelKind::Announcement]
        );
        assert_eq!(cfg.filter.precedence, Precedence::KeepOverridesSkip);
        assert!(cfg.filter.has_rules());
        let opts = cfg.collect_options(Snowflake(5)).unwrap();
        assert_eq!(opts.concurrency, 4);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse("[collect]\nconcurrency = 0").is_err());
        assert!(parse("[discord]\ntimeout_secs = 0").is_err());
        assert!(parse("[collect]\nchannel_kinds = []").is_err());
        assert!(parse("[collect]\nchannel_kinds = [\"category\"]").is_err());
        assert!(parse("[filter]\nprecedence = \"both\"").is_err());
        assert!(parse("[filter.fields.channel_id]\nkeep = [\"1\"]").is_err());
        assert!(parse("[filter.fields.text]\nskip = [\"(\"]").is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = resolve_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
