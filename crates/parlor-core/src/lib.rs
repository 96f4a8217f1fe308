//! Core of Parlor — conversation and image persistence, shared types, config.
//!
//! # Architecture
//!
//! - [`types`] — stored messages, conversation records, catalog rows
//! - [`api`] — JSON bodies exchanged between client and backend
//! - [`store`] — [`ConversationStore`] (catalog + record files) and [`ImageStore`]
//! - [`stream`] — [`FragmentStream`], the producer/consumer channel for completions
//! - [`config`] — `~/.parlor/config.json` + env var overrides

pub mod api;
pub mod config;
pub mod error;
pub mod store;
pub mod stream;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use store::{ConversationStore, ImageStore};
pub use stream::{fragment_channel, FragmentSender, FragmentStream};
pub use types::{ChatTurn, ConversationRecord, ImageAsset, ImageRef, IndexEntry, Message, Role};
