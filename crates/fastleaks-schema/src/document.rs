use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sanitize::sanitize_filename;

/// A captured chat attachment, minted at the moment the ingest stage sees a
/// qualifying message.
///
/// `job_id` is generated once here and copied unchanged through every
/// downstream message; it correlates a document's whole journey through the
/// pipeline for observability, but carries no delivery guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramDocument {
    /// Correlation id minted at capture time.
    pub job_id: Uuid,
    /// Remote document identifier.
    pub doc_id: i64,
    /// Chat the document was posted in.
    pub chat_id: i64,
    /// Message id within the chat.
    pub message_id: i64,
    /// Sanitized filename (see [`sanitize_filename`]).
    pub filename: String,
    /// MIME type as reported by the chat client.
    pub mime_type: String,
    /// Declared size in bytes. Always greater than zero.
    pub size_bytes: u64,
    /// Capture timestamp.
    pub timestamp: DateTime<Utc>,
    /// Public link to the source message, when the chat is linkable.
    pub channel_url: Option<String>,
}

impl TelegramDocument {
    /// Build a new document, minting a fresh `job_id` and sanitizing
    /// `filename`.
    ///
    /// # Panics
    ///
    /// Panics if `size_bytes` is zero — the ingest stage is responsible for
    /// filtering out zero-size attachments before calling this.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        doc_id: i64,
        chat_id: i64,
        message_id: i64,
        filename: &str,
        mime_type: impl Into<String>,
        size_bytes: u64,
        channel_url: Option<String>,
    ) -> Self {
        assert!(size_bytes > 0, "TelegramDocument requires size_bytes > 0");
        Self {
            job_id: Uuid::new_v4(),
            doc_id,
            chat_id,
            message_id,
            filename: sanitize_filename(filename),
            mime_type: mime_type.into(),
            size_bytes,
            timestamp: Utc::now(),
            channel_url,
        }
    }
}
