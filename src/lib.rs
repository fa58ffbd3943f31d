//! # Pins
//!
//! Archive the pinned messages of a Discord guild, filtered by a
//! declarative predicate.
//!
//! The collection pipeline, the filter language and the data model live in
//! [`pins_core`]. This crate adds everything that touches the outside
//! world: configuration, the Discord REST provider, output files and the
//! `pins` command line.
//!
//! ```text
//! ┌────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │  Discord   │──▶│    pins-core     │──▶│ output/<guild>-<b64> │
//! │  REST v10  │   │ enumerate+filter │   │        .json         │
//! └────────────┘   └──────────────────┘   └──────────┬───────────┘
//!                                                    ▼
//!                                              pins render
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`discord`] | `ChatProvider` over the Discord API |
//! | [`filename`] | Output file name codec |
//! | [`get`] | `get`, `update`, `print-expr` and `check` |
//! | [`channels`] | `channels` listing |
//! | [`export`] | JSON output and the grouped view |
//! | [`progress`] | stderr progress reporters |

pub mod channels;
pub mod config;
pub mod discord;
pub mod export;
pub mod filename;
pub mod get;
pub mod progress;
