//! HTTP backend for Parlor.
//!
//! Exposes the conversation catalog, image uploads, and streaming
//! completions over HTTP/JSON. See [`routes`] for the endpoint list.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{app, run, serve};
pub use state::AppState;
