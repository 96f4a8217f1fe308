//! Client side of Parlor.
//!
//! - [`backend::Backend`] — persistence, upload and completion operations
//! - [`http::HttpBackend`] — a running server over HTTP/JSON
//! - [`local::LocalBackend`] — stores and relay in-process
//! - [`session::SessionClient`] — cached catalog, selection, turn submission

pub mod backend;
pub mod http;
pub mod local;
pub mod session;

pub use backend::Backend;
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use session::{SessionClient, GREETING, IMAGE_GREETING};
