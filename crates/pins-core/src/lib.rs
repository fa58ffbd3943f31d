//! # Pins Core
//!
//! Platform-independent logic for pins: the data model, the filter engine,
//! the chat-provider abstraction, channel enumeration, the pin collection
//! pipeline and author deduplication.
//!
//! This crate performs no network or filesystem I/O. All platform access
//! goes through [`provider::ChatProvider`]; the `pins` binary supplies the
//! Discord implementation and [`provider::InMemoryProvider`] serves tests
//! and offline fixtures.
//!
//! ```rust
//! use pins_core::collect::{collect, CollectOptions};
//! use pins_core::models::{Guild, Snowflake};
//! use pins_core::progress::NoProgress;
//! use pins_core::provider::{GuildSnapshot, InMemoryProvider};
//!
//! # tokio_test_block(async {
//! let provider = InMemoryProvider::new(GuildSnapshot {
//!     guild: Guild { id: Snowflake(1), name: "demo".into() },
//!     ..Default::default()
//! });
//! let doc = collect(&provider, &"".into(), &CollectOptions::new(Snowflake(1)), &NoProgress)
//!     .await
//!     .unwrap();
//! assert_eq!(doc.guild_name, "demo");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     futures::executor::block_on(f)
//! # }
//! ```

pub mod authors;
pub mod collect;
pub mod enumerate;
pub mod error;
pub mod filter;
pub mod models;
pub mod progress;
pub mod provider;

pub use error::{CompileError, EvaluationError, Phase, PinsError, ProviderError};
