use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Sha256Hash;

/// Maximum recursion depth the extractor will descend into nested archives.
pub const MAX_EXTRACTION_DEPTH: u32 = 3;

/// Default MIME type assigned to an extracted leaf when it cannot be
/// inferred from its extension.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One leaf (or intermediate) file produced by archive extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedFile {
    /// Correlation id, copied from the archive's download.
    pub job_id: Uuid,
    /// Hash of the immediate containing archive (not necessarily the
    /// top-level one for nested archives).
    pub parent_sha256: Sha256Hash,
    /// Content hash of the extracted file.
    pub sha256: Sha256Hash,
    /// Absolute path to the file in the content-addressed store.
    pub storage_path: String,
    /// Filename as recorded in the archive entry.
    pub filename: String,
    /// MIME type, defaulting to [`DEFAULT_MIME_TYPE`] when not inferable.
    pub mime_type: String,
    /// Nesting depth; 1 for a direct child of the originally downloaded
    /// archive.
    pub depth: u32,
}

impl ExtractedFile {
    /// Whether `depth` satisfies the invariant `1 <= depth <= MAX_EXTRACTION_DEPTH`.
    pub fn has_valid_depth(&self) -> bool {
        (1..=MAX_EXTRACTION_DEPTH).contains(&self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: char) -> Sha256Hash {
        Sha256Hash::parse(byte.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn valid_depth_in_range() {
        let ef = ExtractedFile {
            job_id: Uuid::new_v4(),
            parent_sha256: hash('a'),
            sha256: hash('b'),
            storage_path: "/storage/a/b/x".into(),
            filename: "x.txt".into(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            depth: 3,
        };
        assert!(ef.has_valid_depth());
    }

    #[test]
    fn depth_zero_is_invalid() {
        let ef = ExtractedFile {
            job_id: Uuid::new_v4(),
            parent_sha256: hash('a'),
            sha256: hash('b'),
            storage_path: "/storage/a/b/x".into(),
            filename: "x.txt".into(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            depth: 0,
        };
        assert!(!ef.has_valid_depth());
    }

    #[test]
    fn depth_beyond_max_is_invalid() {
        let ef = ExtractedFile {
            job_id: Uuid::new_v4(),
            parent_sha256: hash('a'),
            sha256: hash('b'),
            storage_path: "/storage/a/b/x".into(),
            filename: "x.txt".into(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            depth: MAX_EXTRACTION_DEPTH + 1,
        };
        assert!(!ef.has_valid_depth());
    }
}
