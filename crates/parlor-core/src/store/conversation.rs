//! Conversation catalog and per-conversation record files.
//!
//! File format: `chats_index.json` (pretty JSON array of [`IndexEntry`]) plus
//! one `<id>.json` per conversation holding the raw message array.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{ConversationRecord, IndexEntry, Message};
use crate::utils;

/// Name of the catalog file inside the log directory.
pub const INDEX_FILE: &str = "chats_index.json";

// ─────────────────────────────────────────────
// ConversationStore
// ─────────────────────────────────────────────

/// Owns the catalog and every record file under one directory.
///
/// Every operation holds `lock` for its whole read-modify-write, so requests
/// in one process never interleave on the index. Separate processes sharing
/// the directory are not coordinated.
pub struct ConversationStore {
    /// Directory holding the index and record files.
    logs_dir: PathBuf,
    /// `logs_dir/chats_index.json`.
    index_path: PathBuf,
    lock: Mutex<()>,
}

impl ConversationStore {
    /// Open a store rooted at `logs_dir`, creating the directory if needed.
    pub fn new(logs_dir: impl Into<PathBuf>) -> Result<Self> {
        let logs_dir = logs_dir.into();
        std::fs::create_dir_all(&logs_dir).map_err(|e| Error::io(&logs_dir, e))?;

        Ok(ConversationStore {
            index_path: logs_dir.join(INDEX_FILE),
            logs_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Read the catalog and every record it references, in catalog order.
    pub async fn list_all(&self) -> Result<Vec<ConversationRecord>> {
        let _guard = self.lock.lock().await;

        let index = self.load_index().await?;
        let mut records = Vec::with_capacity(index.len());
        for entry in index {
            let messages = read_messages(&entry.file_path).await?;
            records.push(ConversationRecord {
                image: entry.image(),
                id: entry.id,
                name: entry.name,
                messages,
            });
        }

        debug!(count = records.len(), "Listed conversations");
        Ok(records)
    }

    /// Read one conversation by id.
    pub async fn get(&self, id: &str) -> Result<ConversationRecord> {
        let _guard = self.lock.lock().await;

        let index = self.load_index().await?;
        let entry = index
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("conversation '{id}'")))?;
        let messages = read_messages(&entry.file_path).await?;

        Ok(ConversationRecord {
            image: entry.image(),
            id: entry.id,
            name: entry.name,
            messages,
        })
    }

    /// Upsert a conversation.
    ///
    /// The record file is rewritten in full first, then the catalog row is
    /// updated in place (or appended) and the catalog rewritten.
    pub async fn save(&self, record: &ConversationRecord) -> Result<()> {
        let file_path = self.record_path(&record.id)?;
        let _guard = self.lock.lock().await;

        write_json(&file_path, &record.messages).await?;

        let mut index = self.load_index().await?;
        let (image_name, image_url) = match &record.image {
            Some(image) => (Some(image.name.clone()), Some(image.url.clone())),
            None => (None, None),
        };

        match index.iter_mut().find(|e| e.id == record.id) {
            Some(entry) => {
                entry.name = record.name.clone();
                entry.file_path = file_path.clone();
                entry.image_url = image_url;
                entry.image_name = image_name;
            }
            None => index.push(IndexEntry {
                id: record.id.clone(),
                name: record.name.clone(),
                file_path: file_path.clone(),
                image_url,
                image_name,
            }),
        }

        write_json(&self.index_path, &index).await?;

        debug!(
            id = %record.id,
            messages = record.messages.len(),
            path = %file_path.display(),
            "Saved conversation"
        );
        Ok(())
    }

    /// Remove a conversation's catalog row, then its record file.
    ///
    /// There is no rollback: if the file removal fails after the catalog was
    /// rewritten, the file is left behind and the error is returned.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;

        let mut index = self.load_index().await?;
        let position = index
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("conversation '{id}'")))?;
        let entry = index.remove(position);

        write_json(&self.index_path, &index).await?;

        match tokio::fs::remove_file(&entry.file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(id, path = %entry.file_path.display(), "Record file already gone");
            }
            Err(e) => return Err(Error::io(&entry.file_path, e)),
        }

        debug!(id, "Deleted conversation");
        Ok(())
    }

    /// Path of the record file for `id`; rejects ids unusable as filenames
    /// and ids whose record file would be the catalog itself.
    fn record_path(&self, id: &str) -> Result<PathBuf> {
        let file_name = format!("{id}.json");
        if !utils::is_safe_filename(id) || file_name.eq_ignore_ascii_case(INDEX_FILE) {
            return Err(Error::Validation(format!("invalid conversation id '{id}'")));
        }
        Ok(self.logs_dir.join(file_name))
    }

    /// Load the catalog; a missing file is an empty catalog.
    async fn load_index(&self) -> Result<Vec<IndexEntry>> {
        match tokio::fs::read(&self.index_path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| Error::json(&self.index_path, e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::io(&self.index_path, e)),
        }
    }
}

async fn read_messages(path: &Path) -> Result<Vec<Message>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| Error::json(path, e))
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::json(path, e))?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Error::io(path, e))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageRef, Role};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_store() -> (ConversationStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("chat_logs")).unwrap();
        (store, dir)
    }

    fn record(id: &str, name: &str, texts: &[&str]) -> ConversationRecord {
        let mut record = ConversationRecord::new(id, name);
        for (i, text) in texts.iter().enumerate() {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            record.messages.push(Message::new(role, *text));
        }
        record
    }

    #[tokio::test]
    async fn test_list_empty_store() {
        let (store, _dir) = make_store();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!store.index_path().exists());
    }

    #[tokio::test]
    async fn test_save_distinct_ids_lists_each_once() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["hi"])).await.unwrap();
        store.save(&record("b", "Beta", &["yo", "hey"])).await.unwrap();
        store.save(&record("c", "Gamma", &[])).await.unwrap();

        let all = store.list_all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(all[1].name, "Beta");
        assert_eq!(all[1].messages.len(), 2);
        assert!(all[2].messages.is_empty());
    }

    #[tokio::test]
    async fn test_save_existing_id_updates_in_place() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["one"])).await.unwrap();
        store.save(&record("b", "Beta", &[])).await.unwrap();

        let updated = record("a", "Alpha v2", &["one", "two", "three"])
            .with_image(ImageRef::new("cat.png", "/images/u.png"));
        store.save(&updated).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], updated);
        assert_eq!(all[1].id, "b");
    }

    #[tokio::test]
    async fn test_save_can_clear_image() {
        let (store, _dir) = make_store();
        let with_image =
            record("a", "Alpha", &[]).with_image(ImageRef::new("cat.png", "/images/u.png"));
        store.save(&with_image).await.unwrap();
        store.save(&record("a", "Alpha", &[])).await.unwrap();

        let got = store.get("a").await.unwrap();
        assert!(got.image.is_none());
    }

    #[tokio::test]
    async fn test_save_rewrites_full_record_file() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["x", "y"])).await.unwrap();
        store.save(&record("a", "Alpha", &["z"])).await.unwrap();

        let raw = std::fs::read_to_string(store.logs_dir().join("a.json")).unwrap();
        let messages: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(messages.as_array().unwrap().len(), 1);
        assert_eq!(messages[0]["content"], "z");
    }

    #[tokio::test]
    async fn test_index_file_format() {
        let (store, _dir) = make_store();
        store
            .save(&record("a", "Alpha", &["hi"]).with_image(ImageRef::new("cat.png", "/images/u.png")))
            .await
            .unwrap();
        store.save(&record("b", "Beta", &[])).await.unwrap();

        let raw = std::fs::read_to_string(store.index_path()).unwrap();
        let index: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let rows = index.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], "a");
        assert_eq!(rows[0]["name"], "Alpha");
        assert_eq!(rows[0]["image_url"], "/images/u.png");
        assert_eq!(rows[0]["image_name"], "cat.png");
        assert!(rows[0]["file_path"].as_str().unwrap().ends_with("a.json"));
        assert!(rows[1]["image_url"].is_null());
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_file() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["hi"])).await.unwrap();
        store.save(&record("b", "Beta", &["yo"])).await.unwrap();

        store.delete("a").await.unwrap();

        assert!(!store.logs_dir().join("a.json").exists());
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "b");

        let err = store.delete("a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (store, _dir) = make_store();
        assert!(matches!(store.delete("ghost").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_record_file() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &[])).await.unwrap();
        std::fs::remove_file(store.logs_dir().join("a.json")).unwrap();

        store.delete("a").await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["hi"])).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().name, "Alpha");
        assert!(store.get("zzz").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unsafe_id_rejected_before_write() {
        let (store, _dir) = make_store();
        for id in ["", "..", "../escape", "a/b"] {
            let err = store.save(&record(id, "Bad", &[])).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "id {id:?}");
        }
        assert!(!store.index_path().exists());
    }

    #[tokio::test]
    async fn test_index_name_rejected_as_id() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["hi"])).await.unwrap();
        store.save(&record("b", "Beta", &[])).await.unwrap();

        for id in ["chats_index", "CHATS_INDEX", "Chats_Index"] {
            let err = store.save(&record(id, "Bad", &[])).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "id {id:?}");
        }

        let all = store.list_all().await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_unreadable_record_is_storage_failure() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &[])).await.unwrap();
        std::fs::write(store.logs_dir().join("a.json"), "not json").unwrap();

        assert!(matches!(store.list_all().await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_bad_timestamp_does_not_hide_catalog() {
        let (store, _dir) = make_store();
        store.save(&record("a", "Alpha", &["hi"])).await.unwrap();
        store.save(&record("b", "Beta", &[])).await.unwrap();
        std::fs::write(
            store.logs_dir().join("a.json"),
            r#"[{"role": "user", "content": "hi", "time": "not a time"}]"#,
        )
        .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].messages[0].content, "hi");
        assert!(all[0].messages[0].timestamp.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_index_is_storage_failure() {
        let (store, _dir) = make_store();
        std::fs::write(store.index_path(), "{{{").unwrap();

        assert!(matches!(store.list_all().await, Err(Error::Storage(_))));
        assert!(matches!(
            store.save(&record("a", "Alpha", &[])).await,
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempdir().unwrap();
        {
            let store = ConversationStore::new(dir.path()).unwrap();
            store.save(&record("a", "Alpha", &["hello", "hi!"])).await.unwrap();
        }

        let store = ConversationStore::new(dir.path()).unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].messages[1].content, "hi!");
        assert_eq!(all[0].messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_every_entry() {
        let (store, _dir) = make_store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(&record(&format!("c{i}"), &format!("Chat {i}"), &["x"]))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list_all().await.unwrap().len(), 16);
    }
}
