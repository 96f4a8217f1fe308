//! Fragment streams — the producer/consumer channel behind every completion.
//!
//! A relay (producer) pushes text fragments into a bounded `tokio::sync::mpsc`
//! channel as soon as the provider emits them; the caller (consumer) pulls
//! them one by one. A stream is finite and single-use. An `Err` item ends it.
//!
//! Dropping the [`FragmentStream`] or calling [`FragmentStream::cancel`] closes
//! the channel; the producer notices on its next send and stops.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Default channel capacity between a relay and its consumer.
pub const FRAGMENT_BUFFER: usize = 32;

/// Create a connected producer/consumer pair.
pub fn fragment_channel(capacity: usize) -> (FragmentSender, FragmentStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (FragmentSender { tx }, FragmentStream { rx, finished: false })
}

/// Producer half, held by the relay task.
#[derive(Clone, Debug)]
pub struct FragmentSender {
    tx: mpsc::Sender<Result<String>>,
}

impl FragmentSender {
    /// Forward one fragment. Returns `false` once the consumer is gone.
    pub async fn send(&self, fragment: impl Into<String>) -> bool {
        self.tx.send(Ok(fragment.into())).await.is_ok()
    }

    /// Report a failure; the consumer sees it as the last item.
    pub async fn fail(&self, err: Error) -> bool {
        self.tx.send(Err(err)).await.is_ok()
    }

    /// Whether the consumer has dropped or cancelled the stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half: a lazy, finite sequence of text fragments.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<String>>,
    finished: bool,
}

impl FragmentStream {
    /// A stream that yields `fragments` and then ends.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<Result<String>> = fragments.into_iter().map(|f| Ok(f.into())).collect();
        Self::from_items(items)
    }

    /// A stream that yields the given items (fragments or a failure) and then ends.
    pub fn from_items(items: Vec<Result<String>>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // Capacity matches the item count, so this never fails.
            let _ = tx.try_send(item);
        }
        FragmentStream { rx, finished: false }
    }

    /// Wait for the next fragment.
    ///
    /// Returns `None` when the producer finished. After an `Err` item the stream
    /// is over and every further call returns `None`.
    pub async fn next_fragment(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        self.observe(&item);
        item
    }

    /// Stop the producer early. Fragments already buffered are discarded.
    pub fn cancel(&mut self) {
        self.rx.close();
        self.finished = true;
    }

    /// Drain the stream into one string, failing on the first error.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    fn observe(&mut self, item: &Option<Result<String>>) {
        match item {
            None | Some(Err(_)) => self.finished = true,
            Some(Ok(_)) => {}
        }
    }
}

impl Stream for FragmentStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(item) => {
                this.observe(&item);
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
