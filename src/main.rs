//! # Pins CLI (`pins`)
//!
//! ## Usage
//!
//! ```bash
//! pins [--config ./pins.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pins get <guild> [expr]` | Collect pins and write `output/<guild>-<b64>.json` |
//! | `pins update <file>` | Rerun the query recorded in a file name |
//! | `pins print-expr <file>` | Print the arguments that produced a file |
//! | `pins check <expr>` | Compile a filter without collecting |
//! | `pins channels <guild>` | List channels in enumeration order |
//! | `pins render <file>` | Write the per-channel grouped view |
//!
//! ## Examples
//!
//! ```bash
//! # Everything pinned in #announcements and its threads
//! pins get 1003 'channel_name == "announcements"'
//!
//! # Only recent pins
//! pins get 1003 'timestamp > timestamp("2024-01-01T00:00:00Z")'
//!
//! # Offline against a snapshot
//! pins get 1003 --fixture guild.json --dry-run
//! ```

use clap::{Parser, Subcommand};
use pins::config;
use pins::progress::ProgressMode;
use pins_core::filter::FilterExpression;
use pins_core::models::Snowflake;
use std::path::PathBuf;

/// Pins: archive the pinned messages of a Discord guild.
///
/// The bot token is read from the environment variable named by
/// `discord.token_env` (default `DISCORD_TOKEN`); a `.env` file in the
/// working directory is loaded first.
#[derive(Parser)]
#[command(
    name = "pins",
    about = "Archive the pinned messages of a Discord guild",
    version,
    long_about = "Pins enumerates a guild's channels and threads, filters them and their \
    pinned messages with a CEL-style expression, and writes one deterministic JSON document \
    per guild and expression."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./pins.toml`; built-in defaults apply when that file
    /// does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print human progress on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Progress output: off, human or json (stderr).
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Collect the pins of a guild.
    ///
    /// The expression is compiled before any network access; a malformed
    /// expression fails without contacting Discord.
    Get {
        /// Guild snowflake.
        guild_id: Snowflake,

        /// Filter expression; empty keeps everything.
        #[arg(default_value = "")]
        expression: String,

        /// Output directory (defaults to `output.dir`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Collect and print a summary without writing a file.
        #[arg(long)]
        dry_run: bool,

        /// Read the guild from a snapshot JSON file instead of Discord.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Update a saved file with the current pins.
    Update {
        /// A file written by `pins get`.
        file: PathBuf,

        /// Read the guild from a snapshot JSON file instead of Discord.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Print the arguments that reproduce a saved file.
    PrintExpr {
        /// A file written by `pins get`.
        file: PathBuf,
    },

    /// Compile a filter expression and report the result.
    Check {
        /// Filter expression.
        expression: String,
    },

    /// List the channels a run would inspect.
    Channels {
        /// Guild snowflake.
        guild_id: Snowflake,

        /// Read the guild from a snapshot JSON file instead of Discord.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },

    /// Group a saved document by channel.
    Render {
        /// A file written by `pins get`.
        file: PathBuf,

        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env: {}", e);
        }
    }

    let cli = Cli::parse();

    // Needs no config
    if let Commands::PrintExpr { file } = &cli.command {
        return pins::get::run_print_expr(file);
    }

    let cfg = config::resolve_config(cli.config.as_deref())?;
    let reporter = ProgressMode::select(cli.progress, cli.verbose).reporter();

    match cli.command {
        Commands::Get {
            guild_id,
            expression,
            output,
            dry_run,
            fixture,
        } => {
            let options = pins::get::GetOptions {
                output_dir: output,
                dry_run,
                fixture,
            };
            pins::get::run_get(
                &cfg,
                guild_id,
                &FilterExpression::new(expression),
                &options,
                reporter.as_ref(),
            )
            .await?;
        }
        Commands::Update { file, fixture } => {
            pins::get::run_update(&cfg, &file, fixture.as_deref(), reporter.as_ref()).await?;
        }
        Commands::Check { expression } => {
            pins::get::run_check(&cfg, &FilterExpression::new(expression))?;
        }
        Commands::Channels { guild_id, fixture } => {
            pins::channels::run_channels(&cfg, guild_id, fixture.as_deref(), reporter.as_ref())
                .await?;
        }
        Commands::Render { file, output } => {
            pins::export::run_render(&file, output.as_deref(), cfg.output.pretty)?;
        }
        Commands::PrintExpr { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
