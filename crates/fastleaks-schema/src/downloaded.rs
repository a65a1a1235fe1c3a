use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::TelegramDocument;
use crate::hash::Sha256Hash;

/// Archive extensions that qualify for recursive extraction.
pub const EXTRACTABLE_EXTENSIONS: [&str; 3] = ["zip", "rar", "7z"];
/// MIME substrings that qualify for recursive extraction.
pub const EXTRACTABLE_MIME_HINTS: [&str; 4] = ["zip", "rar", "7z", "archive"];

/// Proof that a [`TelegramDocument`] was retrieved and written to local,
/// content-addressed storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedFile {
    /// Correlation id, copied from the originating document.
    pub job_id: Uuid,
    /// Remote document identifier, copied from the originating document.
    pub doc_id: i64,
    /// Content hash of the downloaded bytes.
    pub sha256: Sha256Hash,
    /// Absolute path to the file in the content-addressed store.
    pub storage_path: String,
    /// Size of the downloaded file in bytes.
    pub size_bytes: u64,
    /// MIME type carried over from the original document.
    pub mime_type: String,
    /// Whether this file should be handed to the extractor.
    pub extractable: bool,
    /// The document this download satisfies.
    pub original: TelegramDocument,
}

/// Decide whether a file should be routed to the extractor, from its
/// extension and MIME type.
///
/// Extension match is extension-only (no dot); MIME match is a
/// case-insensitive substring match against [`EXTRACTABLE_MIME_HINTS`].
pub fn is_extractable(filename: &str, mime_type: &str) -> bool {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let ext_match = ext
        .as_deref()
        .is_some_and(|e| EXTRACTABLE_EXTENSIONS.contains(&e));

    let mime_lower = mime_type.to_lowercase();
    let mime_match = EXTRACTABLE_MIME_HINTS.iter().any(|hint| mime_lower.contains(hint));

    ext_match || mime_match
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_extension_is_extractable() {
        assert!(is_extractable("leak.zip", "application/octet-stream"));
    }

    #[test]
    fn rar_extension_is_extractable() {
        assert!(is_extractable("leak.RAR", "application/octet-stream"));
    }

    #[test]
    fn archive_mime_without_extension_is_extractable() {
        assert!(is_extractable("leak", "application/x-archive"));
    }

    #[test]
    fn plain_text_is_not_extractable() {
        assert!(!is_extractable("notes.txt", "text/plain"));
    }

    #[test]
    fn sevenz_is_detected_as_extractable() {
        // .7z is detected (per spec) even though extraction is not implemented.
        assert!(is_extractable("bundle.7z", "application/octet-stream"));
    }
}
