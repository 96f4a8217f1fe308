//! Scripted relay — replays a fixed list of fragments.
//!
//! Used by tests across the workspace and by `parlor serve --scripted` to run
//! the backend without a provider. Tests opt into call recording with
//! [`ScriptedRelay::recording`].

use std::sync::Mutex;

use async_trait::async_trait;

use parlor_core::{ChatTurn, Error, FragmentStream, Result};

use crate::traits::CompletionRelay;

/// One recorded `stream_completion` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayCall {
    pub history: Vec<ChatTurn>,
    pub image_url: Option<String>,
}

#[derive(Debug)]
enum Failure {
    /// Fail the call itself, before any fragment.
    OnStart(String),
    /// Emit this many fragments, then a failure item.
    After(usize, String),
}

/// Relay that always answers with the same fragments.
#[derive(Debug)]
pub struct ScriptedRelay {
    fragments: Vec<String>,
    failure: Option<Failure>,
    /// `None` unless recording was requested.
    calls: Option<Mutex<Vec<RelayCall>>>,
}

impl ScriptedRelay {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedRelay {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
            calls: None,
        }
    }

    /// Record every call so it can be inspected with [`calls`](Self::calls).
    pub fn recording(mut self) -> Self {
        self.calls = Some(Mutex::new(Vec::new()));
        self
    }

    /// Every call fails with `Error::Relay(message)` before streaming.
    pub fn failing(message: impl Into<String>) -> Self {
        let mut relay = Self::new(Vec::<String>::new());
        relay.failure = Some(Failure::OnStart(message.into()));
        relay
    }

    /// Emit the first `count` fragments, then break with `Error::Relay(message)`.
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::After(count, message.into()));
        self
    }

    /// Calls received so far, oldest first. Empty unless recording.
    pub fn calls(&self) -> Vec<RelayCall> {
        match &self.calls {
            Some(calls) => calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl CompletionRelay for ScriptedRelay {
    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream> {
        if let Some(calls) = &self.calls {
            calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(RelayCall {
                    history: history.to_vec(),
                    image_url: image_url.map(String::from),
                });
        }

        let items = match &self.failure {
            Some(Failure::OnStart(message)) => return Err(Error::Relay(message.clone())),
            Some(Failure::After(count, message)) => {
                let mut items: Vec<Result<String>> =
                    self.fragments.iter().take(*count).cloned().map(Ok).collect();
                items.push(Err(Error::Relay(message.clone())));
                items
            }
            None => self.fragments.iter().cloned().map(Ok).collect(),
        };

        Ok(FragmentStream::from_items(items))
    }

    fn display_name(&self) -> &str {
        "Scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::Role;

    #[tokio::test]
    async fn test_replays_fragments_and_records_call() {
        let relay = ScriptedRelay::new(["Hel", "lo"]).recording();
        let history = vec![ChatTurn::new(Role::User, "hi")];

        let text = relay
            .stream_completion(&history, Some("/images/a.png"))
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(
            relay.calls(),
            vec![RelayCall {
                history,
                image_url: Some("/images/a.png".into())
            }]
        );
    }

    #[tokio::test]
    async fn test_failing_on_start() {
        let relay = ScriptedRelay::failing("provider down").recording();
        let err = relay.stream_completion(&[], None).await.unwrap_err();
        assert_eq!(err, Error::Relay("provider down".into()));
        assert_eq!(relay.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_after_some_fragments() {
        let relay = ScriptedRelay::new(["a", "b", "c"]).failing_after(2, "cut");
        let mut stream = relay.stream_completion(&[], None).await.unwrap();

        assert_eq!(stream.next_fragment().await, Some(Ok("a".into())));
        assert_eq!(stream.next_fragment().await, Some(Ok("b".into())));
        assert_eq!(stream.next_fragment().await, Some(Err(Error::Relay("cut".into()))));
        assert_eq!(stream.next_fragment().await, None);
    }

    #[tokio::test]
    async fn test_calls_not_kept_unless_recording() {
        let relay = ScriptedRelay::new(["ok"]);
        let history = vec![ChatTurn::new(Role::User, "x".repeat(10_000))];

        for _ in 0..100 {
            let text = relay
                .stream_completion(&history, None)
                .await
                .unwrap()
                .collect_text()
                .await
                .unwrap();
            assert_eq!(text, "ok");
        }

        assert!(relay.calls().is_empty());
        assert!(relay.calls.is_none());
    }
}
