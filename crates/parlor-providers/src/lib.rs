//! Completion relay layer for Parlor.
//!
//! # Architecture
//!
//! - [`traits::CompletionRelay`] — trait that all relays implement
//! - [`request`] — provider request shaping and event stream decoding
//! - [`http_provider::HttpRelay`] — OpenAI-compatible streaming HTTP client
//! - [`scripted::ScriptedRelay`] — canned fragments, for tests and offline runs

pub mod http_provider;
pub mod request;
pub mod scripted;
pub mod traits;

// Re-export main types for convenience
pub use http_provider::HttpRelay;
pub use scripted::{RelayCall, ScriptedRelay};
pub use traits::CompletionRelay;
