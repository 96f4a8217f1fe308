//! Session client — the caller-owned view of the conversation catalog.
//!
//! The catalog is loaded once with [`SessionClient::load`] and then kept in
//! memory; every change is applied to the cache first and then written
//! through to the [`Backend`]. The cache is never re-synced from the backend.
//!
//! Submitting a turn borrows the session mutably until the completion has
//! been fully consumed, so turns within one session cannot overlap.

use std::sync::Arc;

use tracing::{debug, info, warn};

use parlor_core::{ConversationRecord, Error, Message, Result};

use crate::backend::Backend;

/// Greeting added to an empty conversation without an image.
pub const GREETING: &str = "Hello, how can I help you today?";

/// Greeting added to an empty conversation bound to an image.
pub const IMAGE_GREETING: &str =
    "Hello, you have uploaded an image. What would you like to know about it?";

pub struct SessionClient {
    backend: Arc<dyn Backend>,
    /// Newest first; loaded conversations keep catalog order behind new ones.
    conversations: Vec<ConversationRecord>,
    selected: Option<String>,
}

impl SessionClient {
    /// Create an empty session. Call [`load`](Self::load) to fill the cache.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        SessionClient {
            backend,
            conversations: Vec::new(),
            selected: None,
        }
    }

    /// Replace the cache with the backend catalog and select the first entry.
    pub async fn load(&mut self) -> Result<()> {
        self.conversations = self.backend.list_conversations().await?;
        self.selected = self.conversations.first().map(|c| c.id.clone());
        info!(count = self.conversations.len(), "Session loaded");
        Ok(())
    }

    // ── Accessors ──

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn conversations(&self) -> &[ConversationRecord] {
        &self.conversations
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&ConversationRecord> {
        let id = self.selected.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Display name of a cached conversation.
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    // ── Catalog operations ──

    /// Create an empty conversation, select it, and persist it.
    ///
    /// The conversation stays cached and selected even if the save fails.
    pub async fn create_conversation(&mut self, name: &str) -> Result<String> {
        let name = checked_name(name)?;
        let record = ConversationRecord::new(new_id(), name);
        self.insert_and_save(record).await
    }

    /// Upload an image, then create a conversation bound to it.
    ///
    /// An upload failure leaves the cache untouched.
    pub async fn create_conversation_with_image(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String> {
        let name = checked_name(name)?;
        let image = self
            .backend
            .upload_image(bytes, file_name, content_type)
            .await?;
        let record = ConversationRecord::new(new_id(), name).with_image(image);
        self.insert_and_save(record).await
    }

    async fn insert_and_save(&mut self, record: ConversationRecord) -> Result<String> {
        let id = record.id.clone();
        debug!(id = %id, name = %record.name, image = record.image.is_some(), "Creating conversation");
        self.conversations.insert(0, record);
        self.selected = Some(id.clone());
        self.backend.save_conversation(&self.conversations[0]).await?;
        Ok(id)
    }

    /// Select a cached conversation. No I/O.
    pub fn select_conversation(&mut self, id: &str) -> Result<()> {
        if !self.conversations.iter().any(|c| c.id == id) {
            return Err(Error::NotFound(format!("conversation '{id}'")));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    /// Delete the selected conversation, then select the first remaining one.
    ///
    /// The cache and selection are updated before the backend result is
    /// returned, so a failed delete still removes the conversation locally.
    pub async fn delete_conversation(&mut self) -> Result<()> {
        let id = self
            .selected
            .take()
            .ok_or_else(|| Error::Validation("no conversation selected".into()))?;

        self.conversations.retain(|c| c.id != id);
        let result = self.backend.delete_conversation(&id).await;
        self.selected = self.conversations.first().map(|c| c.id.clone());

        if let Err(ref e) = result {
            warn!(id = %id, error = %e, "Backend delete failed");
        }
        result
    }

    // ── Conversation flow ──

    /// Greet an empty selected conversation once and persist the greeting.
    ///
    /// Returns `true` if a greeting was added.
    pub async fn ensure_greeting(&mut self) -> Result<bool> {
        let Some(index) = self.selected_index() else {
            return Ok(false);
        };
        let record = &mut self.conversations[index];
        if !record.messages.is_empty() {
            return Ok(false);
        }

        let greeting = if record.image.is_some() {
            IMAGE_GREETING
        } else {
            GREETING
        };
        record.messages.push(Message::assistant(greeting));
        self.backend.save_conversation(&self.conversations[index]).await?;
        Ok(true)
    }

    /// Send `text` as the next user turn and stream the reply.
    ///
    /// `observer` sees the accumulated reply each time a fragment arrives.
    /// On success the reply is appended and the whole conversation saved.
    /// On a relay failure the user message stays in the cache, unsaved.
    pub async fn submit_user_turn<F>(&mut self, text: &str, mut observer: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        if text.trim().is_empty() {
            return Err(Error::Validation("message cannot be empty".into()));
        }
        let index = self
            .selected_index()
            .ok_or_else(|| Error::Validation("no conversation selected".into()))?;

        let record = &mut self.conversations[index];
        record.messages.push(Message::user(text));
        let history = record.turns();
        let image_url = record.image.as_ref().map(|image| image.url.clone());

        debug!(
            id = %record.id,
            turns = history.len(),
            image = image_url.is_some(),
            "Submitting turn"
        );

        let mut stream = self
            .backend
            .stream_completion(&history, image_url.as_deref())
            .await?;

        let mut reply = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            reply.push_str(&fragment?);
            observer(&reply);
        }

        self.conversations[index]
            .messages
            .push(Message::assistant(reply.clone()));
        self.backend.save_conversation(&self.conversations[index]).await?;
        Ok(reply)
    }

    fn selected_index(&self) -> Option<usize> {
        let id = self.selected.as_deref()?;
        self.conversations.iter().position(|c| c.id == id)
    }
}

fn checked_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("conversation name cannot be empty".into()));
    }
    Ok(name)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalBackend;
    use parlor_core::{ConversationStore, ImageStore, Role};
    use parlor_providers::{CompletionRelay, ScriptedRelay};
    use tempfile::TempDir;

    struct Fixture {
        session: SessionClient,
        relay: Arc<ScriptedRelay>,
        store: ConversationStore,
        _dir: TempDir,
    }

    fn fixture(relay: ScriptedRelay) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let relay = Arc::new(relay.recording());
        let backend = LocalBackend::new(
            ConversationStore::new(dir.path().join("chat_logs")).unwrap(),
            ImageStore::new(dir.path().join("images")).unwrap(),
            relay.clone() as Arc<dyn CompletionRelay>,
        );
        // A second handle on the same directory to observe what was persisted.
        let store = ConversationStore::new(dir.path().join("chat_logs")).unwrap();
        Fixture {
            session: SessionClient::new(Arc::new(backend)),
            relay,
            store,
            _dir: dir,
        }
    }

    fn contents(record: &ConversationRecord) -> Vec<(Role, &str)> {
        record
            .messages
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_submit_streams_and_persists_reply() {
        let mut f = fixture(ScriptedRelay::new(["Hel", "lo"]));
        f.session.create_conversation("Chat").await.unwrap();

        let mut seen = Vec::new();
        let reply = f
            .session
            .submit_user_turn("hi", |text| seen.push(text.to_string()))
            .await
            .unwrap();

        assert_eq!(reply, "Hello");
        assert_eq!(seen, vec!["Hel", "Hello"]);

        let stored = f.store.list_all().await.unwrap();
        assert_eq!(stored[0].messages.last().unwrap().content, "Hello");
        assert_eq!(stored[0].messages.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_trip_end_to_end() {
        let mut f = fixture(ScriptedRelay::new(["Sun", "set is at 7pm"]));
        let id = f.session.create_conversation("Trip").await.unwrap();

        f.session
            .submit_user_turn("When is sunset?", |_| {})
            .await
            .unwrap();

        let stored = f.store.get(&id).await.unwrap();
        assert_eq!(stored.name, "Trip");
        assert_eq!(
            contents(&stored),
            vec![
                (Role::User, "When is sunset?"),
                (Role::Assistant, "Sunset is at 7pm")
            ]
        );
        assert!(stored.messages.iter().all(|m| m.timestamp.is_some()));
    }

    #[tokio::test]
    async fn test_relay_failure_keeps_unsaved_user_message() {
        let mut f = fixture(ScriptedRelay::failing("provider down"));
        let id = f.session.create_conversation("Chat").await.unwrap();

        let err = f.session.submit_user_turn("hi", |_| {}).await.unwrap_err();

        assert_eq!(err, Error::Relay("provider down".into()));
        assert_eq!(
            contents(f.session.selected().unwrap()),
            vec![(Role::User, "hi")]
        );
        assert!(f.store.get(&id).await.unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_surfaced() {
        let mut f = fixture(ScriptedRelay::new(["par", "tial"]).failing_after(1, "cut"));
        f.session.create_conversation("Chat").await.unwrap();

        let mut seen = Vec::new();
        let err = f
            .session
            .submit_user_turn("hi", |text| seen.push(text.to_string()))
            .await
            .unwrap_err();

        assert_eq!(err, Error::Relay("cut".into()));
        assert_eq!(seen, vec!["par"]);
        assert_eq!(f.session.selected().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_full_history_sent_each_turn() {
        let mut f = fixture(ScriptedRelay::new(["ok"]));
        f.session.create_conversation("Chat").await.unwrap();
        f.session.ensure_greeting().await.unwrap();

        f.session.submit_user_turn("one", |_| {}).await.unwrap();
        f.session.submit_user_turn("two", |_| {}).await.unwrap();

        let calls = f.relay.calls();
        assert_eq!(calls.len(), 2);
        let roles: Vec<Role> = calls[1].history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(calls[1].history[3].content, "two");
        assert_eq!(calls[1].image_url, None);
    }

    #[tokio::test]
    async fn test_create_inserts_at_front_and_selects() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        let first = f.session.create_conversation("First").await.unwrap();
        let second = f.session.create_conversation("  Second  ").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(f.session.selected_id(), Some(second.as_str()));
        assert_eq!(f.session.conversations()[0].id, second);
        assert_eq!(f.session.name_of(&second), Some("Second"));
        assert_eq!(f.store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        let err = f.session.create_conversation("   ").await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(f.session.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_image_and_greeting() {
        let mut f = fixture(ScriptedRelay::new(["A cat"]));
        let id = f
            .session
            .create_conversation_with_image("Pets", b"png".to_vec(), "cat.png", "image/png")
            .await
            .unwrap();

        assert!(f.session.ensure_greeting().await.unwrap());
        assert!(!f.session.ensure_greeting().await.unwrap());

        let stored = f.store.get(&id).await.unwrap();
        let image = stored.image.clone().unwrap();
        assert_eq!(image.name, "cat.png");
        assert!(image.url.starts_with("/images/"));
        assert_eq!(contents(&stored), vec![(Role::Assistant, IMAGE_GREETING)]);

        f.session.submit_user_turn("What is it?", |_| {}).await.unwrap();
        let sent = f.relay.calls()[0].image_url.clone().unwrap();
        assert!(sent.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_cache_untouched() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        f.session.create_conversation("Existing").await.unwrap();
        let before = f.session.selected_id().map(String::from);

        let err = f
            .session
            .create_conversation_with_image("Doc", b"text".to_vec(), "a.txt", "text/plain")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(f.session.conversations().len(), 1);
        assert_eq!(f.session.selected_id().map(String::from), before);
    }

    #[tokio::test]
    async fn test_plain_greeting() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        let id = f.session.create_conversation("Chat").await.unwrap();

        f.session.ensure_greeting().await.unwrap();

        let stored = f.store.get(&id).await.unwrap();
        assert_eq!(contents(&stored), vec![(Role::Assistant, GREETING)]);
    }

    #[tokio::test]
    async fn test_delete_selects_first_remaining() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        let a = f.session.create_conversation("A").await.unwrap();
        let b = f.session.create_conversation("B").await.unwrap();
        let c = f.session.create_conversation("C").await.unwrap();

        // Cache order is C, B, A.
        f.session.select_conversation(&b).unwrap();
        f.session.delete_conversation().await.unwrap();
        assert_eq!(f.session.selected_id(), Some(c.as_str()));

        f.session.delete_conversation().await.unwrap();
        assert_eq!(f.session.selected_id(), Some(a.as_str()));

        f.session.delete_conversation().await.unwrap();
        assert_eq!(f.session.selected_id(), None);
        assert!(f.store.list_all().await.unwrap().is_empty());

        let err = f.session.delete_conversation().await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_select_unknown_is_not_found() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        assert!(f.session.select_conversation("nope").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_load_reads_catalog_once() {
        let mut f = fixture(ScriptedRelay::new(Vec::<String>::new()));
        f.store
            .save(&ConversationRecord::new("x", "Saved earlier"))
            .await
            .unwrap();

        f.session.load().await.unwrap();
        assert_eq!(f.session.selected_id(), Some("x"));
        assert_eq!(f.session.name_of("x"), Some("Saved earlier"));

        // Written behind the session's back: not picked up.
        f.store
            .save(&ConversationRecord::new("y", "Later"))
            .await
            .unwrap();
        assert_eq!(f.session.conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_selection() {
        let mut f = fixture(ScriptedRelay::new(["x"]));
        let err = f.session.submit_user_turn("hi", |_| {}).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(f.relay.calls().is_empty());
    }

    /// Backend whose writes fail on demand; the catalog lives in memory.
    struct FailingBackend {
        catalog: Vec<ConversationRecord>,
        fail_save: bool,
        fail_delete: bool,
    }

    #[async_trait::async_trait]
    impl Backend for FailingBackend {
        async fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
            Ok(self.catalog.clone())
        }

        async fn save_conversation(&self, _record: &ConversationRecord) -> Result<()> {
            if self.fail_save {
                return Err(Error::Storage("disk full".into()));
            }
            Ok(())
        }

        async fn delete_conversation(&self, _id: &str) -> Result<()> {
            if self.fail_delete {
                return Err(Error::Storage("disk full".into()));
            }
            Ok(())
        }

        async fn upload_image(
            &self,
            _bytes: Vec<u8>,
            _file_name: &str,
            _content_type: &str,
        ) -> Result<parlor_core::ImageRef> {
            Err(Error::Storage("no uploads".into()))
        }

        async fn stream_completion(
            &self,
            _history: &[parlor_core::ChatTurn],
            _image_url: Option<&str>,
        ) -> Result<parlor_core::FragmentStream> {
            Err(Error::Relay("no relay".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    fn failing_session(catalog: &[(&str, &str)], fail_save: bool, fail_delete: bool) -> SessionClient {
        let backend = FailingBackend {
            catalog: catalog
                .iter()
                .map(|(id, name)| ConversationRecord::new(*id, *name))
                .collect(),
            fail_save,
            fail_delete,
        };
        SessionClient::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn test_failed_save_keeps_new_conversation_cached() {
        let mut session = failing_session(&[("a", "Alpha")], true, false);
        session.load().await.unwrap();

        let err = session.create_conversation("Trip").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        assert_eq!(session.conversations().len(), 2);
        let created = session.selected().unwrap();
        assert_eq!(created.name, "Trip");
        assert_eq!(session.conversations()[0].id, created.id);
    }

    #[tokio::test]
    async fn test_failed_delete_still_updates_cache_and_selection() {
        let mut session = failing_session(&[("a", "Alpha"), ("b", "Beta")], false, true);
        session.load().await.unwrap();
        assert_eq!(session.selected_id(), Some("a"));

        let err = session.delete_conversation().await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let ids: Vec<_> = session.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["b"]);
        assert_eq!(session.selected_id(), Some("b"));
    }
}
