//! Shared wire types and pure domain logic for fastleaksdf.
//!
//! This crate defines the canonical message contracts exchanged over the
//! `fastleaksdf` topic exchange (`TelegramDocument`, `DownloadedFile`,
//! `ExtractedFile`, `IOCMatch`) plus the pure functions every stage needs to
//! agree on independently of any I/O: filename sanitization and
//! content-addressed storage path computation. No stage-specific logic, no
//! broker or database dependency.

/// Captured chat attachment, minted at ingest.
pub mod document;
/// Proof of successful download to content-addressed storage.
pub mod downloaded;
/// A single leaf produced by archive extraction.
pub mod extracted;
/// Validated SHA-256 hash newtype.
pub mod hash;
/// One indicator-of-compromise pattern hit.
pub mod ioc;
/// Filename sanitization.
pub mod sanitize;
/// Content-addressed storage path computation.
pub mod storage;

pub use document::TelegramDocument;
pub use downloaded::{is_extractable, DownloadedFile};
pub use extracted::{ExtractedFile, DEFAULT_MIME_TYPE, MAX_EXTRACTION_DEPTH};
pub use hash::{InvalidHash, Sha256Hash};
pub use ioc::IOCMatch;
pub use sanitize::sanitize_filename;
pub use storage::storage_path;
