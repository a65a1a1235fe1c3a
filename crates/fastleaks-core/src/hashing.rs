//! Streaming SHA-256, single pass over the bytes.

use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Bytes read per chunk while streaming a file through the hasher.
const CHUNK_SIZE: usize = 8192;

/// Failure reading a file while hashing it.
#[derive(Error, Debug)]
#[error("failed to hash {path}: {source}")]
pub struct HashError {
    path: String,
    #[source]
    source: std::io::Error,
}

/// Hash a file's contents in fixed-size chunks, never holding the whole file
/// in memory.
///
/// # Errors
///
/// Returns [`HashError`] if the file cannot be opened or read.
pub async fn hash_file(path: &Path) -> Result<fastleaks_schema::Sha256Hash, HashError> {
    let map_err = |source| HashError {
        path: path.display().to_string(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(map_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await.map_err(map_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hex::encode(hasher.finalize());
    // A freshly computed SHA-256 digest always satisfies Sha256Hash::parse.
    Ok(fastleaks_schema::Sha256Hash::parse(digest).expect("sha256 hex digest is always valid"))
}
