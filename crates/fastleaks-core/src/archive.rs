//! Safe recursive archive extraction: ZIP and RAR, with zip-slip defense,
//! a decompression-bomb cap, an entry-count cap, and a bounded recursion
//! depth. `.7z` is detected but never extracted.

use std::path::{Component, Path, PathBuf};

use fastleaks_schema::{ExtractedFile, Sha256Hash, DEFAULT_MIME_TYPE, MAX_EXTRACTION_DEPTH};
use thiserror::Error;
use uuid::Uuid;

use crate::hashing::hash_file;

/// Cumulative declared size, across one archive's entries, before aborting
/// the whole archive as a decompression bomb.
pub const MAX_EXTRACTED_SIZE: u64 = 100 * 1024 * 1024;
/// Entries per archive before aborting the whole archive.
pub const MAX_FILES_PER_ARCHIVE: usize = 1000;

/// Archive container format, detected from filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `zip` via the `zip` crate.
    Zip,
    /// `rar` via the `unrar` crate.
    Rar,
    /// `7z`: recognized, never extracted (see spec Non-goals).
    SevenZip,
    /// Anything else: not a container this extractor descends into.
    Unsupported,
}

/// Classify a path by its extension.
pub fn detect_archive_kind(path: &Path) -> ArchiveKind {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("zip") => ArchiveKind::Zip,
        Some("rar") => ArchiveKind::Rar,
        Some("7z") => ArchiveKind::SevenZip,
        _ => ArchiveKind::Unsupported,
    }
}

/// Failure extracting a single archive. Whole-archive abort conditions
/// (decompression bomb, entry-count cap); per-entry zip-slip detections are
/// logged and skipped rather than raised here.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// More entries than [`MAX_FILES_PER_ARCHIVE`].
    #[error("archive has more than {MAX_FILES_PER_ARCHIVE} entries")]
    TooManyEntries,

    /// Cumulative declared size exceeded [`MAX_EXTRACTED_SIZE`].
    #[error("archive's cumulative extracted size exceeds {MAX_EXTRACTED_SIZE} bytes")]
    TooLarge,

    /// Not a format this extractor handles.
    #[error("unsupported archive format")]
    UnsupportedFormat,

    /// The zip container itself could not be read.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The rar container itself could not be read.
    #[error("rar error: {0}")]
    Rar(#[from] unrar::error::UnrarError),

    /// Filesystem error while staging extracted entries.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One file written by [`extract_archive`].
#[derive(Debug, Clone)]
struct StagedEntry {
    filename: String,
    path: PathBuf,
}

/// An entry's path is safe iff it passes two independent checks: lexical
/// rejection of `..`/absolute-style prefixes in the declared name, and
/// containment of the resolved path under the canonicalized `output`
/// directory. The first check alone is insufficient -- a name using only
/// backslashes as separators (e.g. `"..\\..\\etc\\passwd"`) parses as a
/// single `Normal` component under `std::path::Component` on Unix, so it's
/// also rejected directly by prefix, matching the declared-path checks the
/// original extractor performs before ever resolving the entry onto disk.
fn is_safe_entry_name(output: &Path, name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') {
        return false;
    }

    let path = Path::new(name);
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return false;
    }

    let Ok(base) = output.canonicalize() else {
        return false;
    };
    let resolved = normalize_lexically(&base.join(path));
    resolved.starts_with(&base)
}

/// Lexically resolve `.`/`..` components without touching the filesystem --
/// the entry itself hasn't been written yet, so `Path::canonicalize` can't
/// be used on the full joined path.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Extract a single archive's entries into `output`, enforcing the
/// decompression-bomb and entry-count caps for the whole archive and
/// zip-slip defense per entry.
///
/// # Errors
///
/// Returns [`ExtractError::TooManyEntries`] or [`ExtractError::TooLarge`] if
/// either cap is exceeded -- the whole archive aborts, discarding anything
/// extracted so far. Returns [`ExtractError::UnsupportedFormat`] for
/// anything other than ZIP or RAR.
fn extract_archive(
    kind: ArchiveKind,
    archive_path: &Path,
    output: &Path,
) -> Result<Vec<StagedEntry>, ExtractError> {
    match kind {
        ArchiveKind::Zip => extract_zip(archive_path, output),
        ArchiveKind::Rar => extract_rar(archive_path, output),
        ArchiveKind::SevenZip | ArchiveKind::Unsupported => Err(ExtractError::UnsupportedFormat),
    }
}

fn extract_zip(archive_path: &Path, output: &Path) -> Result<Vec<StagedEntry>, ExtractError> {
    let file = std::fs::File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file)?;

    let mut staged = Vec::new();
    let mut total: u64 = 0;

    for i in 0..zip.len() {
        let count = i + 1;
        if count > MAX_FILES_PER_ARCHIVE {
            return Err(ExtractError::TooManyEntries);
        }

        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();

        if !is_safe_entry_name(output, &name) {
            tracing::warn!(filename = %name, "zip entry traversal blocked");
            continue;
        }

        total += entry.size();
        if total > MAX_EXTRACTED_SIZE {
            return Err(ExtractError::TooLarge);
        }

        let dest = output.join(&name);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;
        staged.push(StagedEntry {
            filename: name,
            path: dest,
        });
    }

    Ok(staged)
}

fn extract_rar(archive_path: &Path, output: &Path) -> Result<Vec<StagedEntry>, ExtractError> {
    let mut staged = Vec::new();
    let mut total: u64 = 0;
    let mut count = 0usize;

    let mut archive = unrar::Archive::new(archive_path).open_for_processing()?;

    while let Some(header) = archive.read_header()? {
        count += 1;
        if count > MAX_FILES_PER_ARCHIVE {
            return Err(ExtractError::TooManyEntries);
        }

        let entry = header.entry();
        let name = entry.filename.to_string_lossy().to_string();

        if entry.is_directory() || !is_safe_entry_name(output, &name) {
            if !entry.is_directory() {
                tracing::warn!(filename = %name, "rar entry traversal blocked");
            }
            archive = header.skip()?;
            continue;
        }

        total += entry.unpacked_size;
        if total > MAX_EXTRACTED_SIZE {
            return Err(ExtractError::TooLarge);
        }

        archive = header.extract_with_base(output)?;
        staged.push(StagedEntry {
            filename: name.clone(),
            path: output.join(&name),
        });
    }

    Ok(staged)
}

/// A file an archive extraction produced, not yet committed to the content
/// store.
struct Unrolled {
    job_id: Uuid,
    parent_sha256: Sha256Hash,
    depth: u32,
}

/// Recursively extract `archive_path` (already committed to the content
/// store under `archive_sha256`), descending into nested ZIP/RAR members up
/// to [`MAX_EXTRACTION_DEPTH`].
///
/// Every entry is committed into `storage_root`'s content-addressed layout
/// as it's produced. `parent_sha256` on each returned [`ExtractedFile`] is
/// the immediate containing archive's hash, not the top-level original's.
///
/// Extraction failures for a single (possibly nested) archive -- corrupt
/// container, bomb-limit exceeded, unsupported format -- are logged and
/// treated as "this archive yielded nothing", not as a fatal error for the
/// whole call.
pub async fn extract_recursive(
    job_id: Uuid,
    archive_path: &Path,
    archive_sha256: &Sha256Hash,
    storage_root: &Path,
) -> Vec<ExtractedFile> {
    extract_recursive_inner(
        Unrolled {
            job_id,
            parent_sha256: archive_sha256.clone(),
            depth: 0,
        },
        archive_path.to_path_buf(),
        storage_root.to_path_buf(),
    )
    .await
}

// Boxed to allow the `async fn` to recurse.
fn extract_recursive_inner(
    state: Unrolled,
    archive_path: PathBuf,
    storage_root: PathBuf,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<ExtractedFile>> + Send>> {
    Box::pin(async move {
        if state.depth >= MAX_EXTRACTION_DEPTH {
            return Vec::new();
        }

        let kind = detect_archive_kind(&archive_path);
        if !matches!(kind, ArchiveKind::Zip | ArchiveKind::Rar) {
            return Vec::new();
        }

        let Ok(tmpdir) = tempfile::Builder::new().prefix("fastleaks_extract_").tempdir() else {
            tracing::warn!("failed to allocate extraction tempdir");
            return Vec::new();
        };

        let staged = {
            let archive_path = archive_path.clone();
            let output = tmpdir.path().to_path_buf();
            tokio::task::spawn_blocking(move || extract_archive(kind, &archive_path, &output))
                .await
        };

        let staged = match staged {
            Ok(Ok(staged)) => staged,
            Ok(Err(err)) => {
                tracing::warn!(
                    parent_sha256 = %state.parent_sha256,
                    error = %err,
                    "archive extraction aborted"
                );
                return Vec::new();
            }
            Err(join_err) => {
                tracing::warn!(error = %join_err, "archive extraction task panicked");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for entry in staged {
            let Ok(sha256) = hash_file(&entry.path).await else {
                tracing::warn!(filename = %entry.filename, "failed to hash extracted entry");
                continue;
            };
            let dest = fastleaks_schema::storage_path(&storage_root, &sha256, &entry.filename);
            if let Some(parent) = dest.parent() {
                if tokio::fs::create_dir_all(parent).await.is_err() {
                    continue;
                }
            }
            if tokio::fs::rename(&entry.path, &dest).await.is_err() {
                continue;
            }

            let ef = ExtractedFile {
                job_id: state.job_id,
                parent_sha256: state.parent_sha256.clone(),
                sha256: sha256.clone(),
                storage_path: dest.display().to_string(),
                filename: entry.filename.clone(),
                mime_type: DEFAULT_MIME_TYPE.to_string(),
                depth: state.depth + 1,
            };

            let nested_kind = detect_archive_kind(Path::new(&entry.filename));
            results.push(ef);

            if matches!(nested_kind, ArchiveKind::Zip | ArchiveKind::Rar) {
                let nested = extract_recursive_inner(
                    Unrolled {
                        job_id: state.job_id,
                        parent_sha256: sha256,
                        depth: state.depth + 1,
                    },
                    dest,
                    storage_root.clone(),
                )
                .await;
                results.extend(nested);
            }
        }

        if !results.is_empty() {
            tracing::info!(
                parent_sha256 = %state.parent_sha256,
                extracted = results.len(),
                depth = state.depth,
                "archive extraction completed"
            );
        }

        results
    })
}
