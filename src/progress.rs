//! Collection progress reporting for the CLI.
//!
//! Renders [`CollectEvent`]s from the core pipeline on **stderr** so stdout
//! stays parseable for scripts (`pins channels`, `pins print-expr`).

use clap::ValueEnum;
use pins_core::progress::{CollectEvent, CollectProgressReporter, NoProgress};
use std::io::Write;

/// Human-friendly progress on stderr: "keep  #announcements (2)".
pub struct StderrProgress;

impl CollectProgressReporter for StderrProgress {
    fn report(&self, event: CollectEvent) {
        let line = match &event {
            CollectEvent::GuildResolved { guild_id, name } => {
                format!("working on guild {} ({})\n", name, guild_id)
            }
            CollectEvent::ChannelsListed { total, retained } => {
                format!(
                    "found {} channels, {} of an allowed kind\n",
                    format_number(*total),
                    format_number(*retained)
                )
            }
            CollectEvent::ArchivedThreadsFetched {
                channel_name,
                visibility,
                count,
                pages,
                ..
            } => format!(
                "threads  #{}  {} {} archived ({} page{})\n",
                channel_name,
                format_number(*count),
                visibility,
                pages,
                if *pages == 1 { "" } else { "s" }
            ),
            CollectEvent::ActiveThreadsFetched { count } => {
                format!("threads  {} active\n", format_number(*count))
            }
            CollectEvent::ChannelsEnumerated { count } => {
                format!("inspecting {} channels\n", format_number(*count))
            }
            CollectEvent::ChannelKept {
                channel_id,
                channel_name,
            } => format!("keep     #{} ({})\n", channel_name, channel_id),
            CollectEvent::ChannelSkipped {
                channel_id,
                channel_name,
            } => format!("ignore   #{} ({})\n", channel_name, channel_id),
            CollectEvent::PinsFetched {
                channel_name,
                returned,
                accepted,
                ..
            } => format!(
                "pins     #{}  {} / {} kept\n",
                channel_name,
                format_number(*accepted),
                format_number(*returned)
            ),
            CollectEvent::Finished {
                channels,
                pins,
                authors,
            } => format!(
                "done: {} pins from {} channels, {} authors\n",
                format_number(*pins),
                format_number(*channels),
                format_number(*authors)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CollectProgressReporter for JsonProgress {
    fn report(&self, event: CollectEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// An explicit `--progress` wins, then `--verbose`, then the TTY default.
    pub fn select(explicit: Option<ProgressMode>, verbose: bool) -> Self {
        match (explicit, verbose) {
            (Some(mode), _) => mode,
            (None, true) => ProgressMode::Human,
            (None, false) => Self::default_for_tty(),
        }
    }

    pub fn reporter(&self) -> Box<dyn CollectProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn explicit_mode_beats_verbose() {
        assert_eq!(
            ProgressMode::select(Some(ProgressMode::Json), true),
            ProgressMode::Json
        );
        assert_eq!(ProgressMode::select(None, true), ProgressMode::Human);
        assert_eq!(
            ProgressMode::select(Some(ProgressMode::Off), true),
            ProgressMode::Off
        );
    }
}
