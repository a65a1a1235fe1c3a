//! Integration seam for the upstream chat client.
//!
//! The chat client's wire protocol is explicitly out of scope (see
//! Non-goals): this module only defines the boundary the ingest stage talks
//! to, plus a deterministic in-memory implementation for tests. A
//! production implementation wrapping the real client lives outside this
//! crate, behind the same trait.

use async_trait::async_trait;
use thiserror::Error;

/// A qualifying attachment observed in a watched chat.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    /// Remote document identifier.
    pub doc_id: i64,
    /// Chat the document was posted in.
    pub chat_id: i64,
    /// Message id within the chat.
    pub message_id: i64,
    /// Filename as reported by the chat client.
    pub filename: String,
    /// MIME type as reported by the chat client.
    pub mime_type: String,
    /// Declared size in bytes.
    pub size_bytes: u64,
    /// Public link to the message, when the chat is linkable.
    pub channel_url: Option<String>,
}

/// Failure reading the next event from the chat source.
#[derive(Error, Debug)]
#[error("chat source error: {0}")]
pub struct ChatSourceError(pub String);

/// Abstraction over "the next qualifying attachment from a watched chat",
/// so the ingest stage's logic (build a `TelegramDocument`, filter
/// zero-size attachments, publish) doesn't depend on any particular chat
/// client.
#[async_trait]
pub trait ChatSource: Send {
    /// Block until the next event is available, or the source is
    /// exhausted/closed.
    ///
    /// # Errors
    ///
    /// Returns [`ChatSourceError`] on a transport-level failure; the caller
    /// decides whether that's fatal or retryable.
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, ChatSourceError>;
}

/// Deterministic, in-memory [`ChatSource`] for tests: yields a fixed queue
/// of events, then `None`.
pub struct FixtureChatSource {
    events: std::collections::VecDeque<ChatEvent>,
}

impl FixtureChatSource {
    /// Build a fixture that yields `events` in order, then closes.
    pub fn new(events: Vec<ChatEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[async_trait]
impl ChatSource for FixtureChatSource {
    async fn next_event(&mut self) -> Result<Option<ChatEvent>, ChatSourceError> {
        Ok(self.events.pop_front())
    }
}

/// Failure fetching a document's bytes from the chat client.
#[derive(Error, Debug)]
#[error("document fetch error: {0}")]
pub struct FetchError(pub String);

/// Abstraction over "retrieve this document's bytes into a local file",
/// the other half of the chat-client integration seam: [`ChatSource`]
/// surfaces that an attachment exists, [`DocumentFetcher`] retrieves it.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Download the document identified by `chat_id`/`message_id` into a
    /// new temporary file and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on a transport-level failure.
    async fn fetch(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<std::path::PathBuf, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(doc_id: i64) -> ChatEvent {
        ChatEvent {
            doc_id,
            chat_id: 1,
            message_id: 1,
            filename: "leak.txt".into(),
            mime_type: "text/plain".into(),
            size_bytes: 10,
            channel_url: None,
        }
    }

    #[tokio::test]
    async fn fixture_yields_events_in_order_then_none() {
        let mut source = FixtureChatSource::new(vec![event(1), event(2)]);
        assert_eq!(source.next_event().await.unwrap().unwrap().doc_id, 1);
        assert_eq!(source.next_event().await.unwrap().unwrap().doc_id, 2);
        assert!(source.next_event().await.unwrap().is_none());
    }
}
