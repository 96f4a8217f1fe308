//! Persistence — conversation catalog and uploaded images.
//!
//! # Disk layout
//!
//! ```text
//! chat_logs/
//!   chats_index.json      [{"id", "name", "file_path", "image_url", "image_name"}, ...]
//!   <id>.json             [{"role": "user", "content": "...", "time": "..."}, ...]
//! images/
//!   <uuid><ext>           raw bytes as uploaded
//! ```

pub mod conversation;
pub mod image;

pub use conversation::ConversationStore;
pub use image::ImageStore;
