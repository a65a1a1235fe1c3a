//! Content-addressed write path: hash, compute the canonical location,
//! atomically rename into place.

use std::path::{Path, PathBuf};

use fastleaks_schema::{storage_path, Sha256Hash};
use thiserror::Error;

use crate::hashing::{hash_file, HashError};

/// Failure writing a downloaded or extracted file into the content store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Hashing the staged file failed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Creating the fan-out directories or renaming into place failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of committing a staged file into the content store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Content hash of the stored bytes.
    pub sha256: Sha256Hash,
    /// Final, content-addressed path.
    pub path: PathBuf,
    /// Size of the stored file in bytes.
    pub size_bytes: u64,
}

/// Hash `staged` and move it into `root` at its content-addressed path,
/// creating the two fan-out directories as needed.
///
/// Renaming (rather than copying) is what makes this idempotent under
/// redelivery: a second attempt for the same bytes computes the same path
/// and simply overwrites an identical file.
///
/// # Errors
///
/// Returns [`StoreError`] if hashing, directory creation, or the rename
/// fails.
pub async fn commit(
    root: &Path,
    staged: &Path,
    filename: &str,
) -> Result<StoredFile, StoreError> {
    let sha256 = hash_file(staged).await?;
    let dest = storage_path(root, &sha256, filename);

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let size_bytes = tokio::fs::metadata(staged).await?.len();
    tokio::fs::rename(staged, &dest).await?;

    Ok(StoredFile {
        sha256,
        path: dest,
        size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn commits_into_fan_out_layout() {
        let root = tempfile::tempdir().unwrap();
        let mut staged = tempfile::NamedTempFile::new().unwrap();
        staged.write_all(b"leak contents").unwrap();
        staged.flush().unwrap();

        let stored = commit(root.path(), staged.path(), "leak.txt").await.unwrap();

        assert!(stored.path.starts_with(root.path()));
        assert!(stored.path.exists());
        assert_eq!(stored.size_bytes, 13);
        let (p1, p2) = stored.sha256.prefixes();
        assert!(stored.path.to_string_lossy().contains(&format!("/{p1}/{p2}/")));
    }

    #[tokio::test]
    async fn redelivery_of_identical_bytes_is_a_no_op_overwrite() {
        let root = tempfile::tempdir().unwrap();

        let mut first = tempfile::NamedTempFile::new().unwrap();
        first.write_all(b"same bytes").unwrap();
        first.flush().unwrap();
        let a = commit(root.path(), first.path(), "x.txt").await.unwrap();

        let mut second = tempfile::NamedTempFile::new().unwrap();
        second.write_all(b"same bytes").unwrap();
        second.flush().unwrap();
        let b = commit(root.path(), second.path(), "x.txt").await.unwrap();

        assert_eq!(a.path, b.path);
        assert_eq!(a.sha256.as_str(), b.sha256.as_str());
    }
}
