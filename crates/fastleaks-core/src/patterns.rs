//! IOC pattern matching: line-oriented, five named patterns, a five-line
//! context window around each hit.

use std::path::Path;

use regex::Regex;
use thiserror::Error;

/// Fixed pattern, not configurable: catches `password`/`senha`/`passwd`
/// followed by a value of eight or more characters from a broad symbol set.
const CREDENTIALS_PATTERN: &str = r"(?i)(password|senha|passwd)[\s:=\x22\x27]{0,3}([A-Za-z0-9@#$%^&*()_+\-={}\[\]:;\x22\x27<>,.?/\\|`~]{8,})";

/// File size ceiling above which a file is skipped entirely.
const MAX_SCAN_BYTES: u64 = 10 * 1024 * 1024;

/// Lines of context captured before and after a hit.
const CONTEXT_LINES_BEFORE: usize = 2;
const CONTEXT_LINES_AFTER: usize = 2;

/// Extensions always eligible for scanning, regardless of MIME type.
const TEXT_EXTENSIONS: [&str; 12] = [
    "txt", "csv", "json", "xml", "log", "ini", "env", "sql", "conf", "yml", "yaml", "md",
];
/// Extensions never eligible, even if the MIME type looks text-like.
const BINARY_EXTENSIONS: [&str; 14] = [
    "jpg", "jpeg", "png", "gif", "mp4", "mp3", "exe", "dll", "so", "pdf", "doc", "docx", "xls",
    "xlsx",
];
/// MIME substrings that qualify a file lacking a recognized extension.
const TEXT_MIME_HINTS: [&str; 4] = ["text", "json", "xml", "csv"];

/// Decide whether a file should be handed to [`IocMatcher::scan_file`].
///
/// A recognized text extension is always eligible. A recognized binary
/// extension is never eligible. Anything else falls back to a MIME-substring
/// check.
pub fn is_scan_eligible(mime_type: &str, filename: &str) -> bool {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if let Some(ext) = ext.as_deref() {
        if TEXT_EXTENSIONS.contains(&ext) {
            return true;
        }
        if BINARY_EXTENSIONS.contains(&ext) {
            return false;
        }
    }

    let mime_lower = mime_type.to_lowercase();
    TEXT_MIME_HINTS.iter().any(|hint| mime_lower.contains(hint))
}

/// Failure compiling the configured regex patterns at start-up.
#[derive(Error, Debug)]
#[error("invalid IOC pattern '{name}': {source}")]
pub struct PatternError {
    name: &'static str,
    #[source]
    source: regex::Error,
}

/// One hit produced by [`IocMatcher::scan_file`], prior to being wrapped in
/// an [`fastleaks_schema::IOCMatch`] with its job/file context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch {
    /// Name of the pattern that matched.
    pub ioc_type: String,
    /// The matched substring.
    pub value: String,
    /// 1-based line number.
    pub line_number: usize,
    /// Rendered context window, current line prefixed with `>`.
    pub context: String,
}

/// Compiled set of IOC patterns, built once at start-up from
/// [`crate::config::Settings`].
pub struct IocMatcher {
    patterns: Vec<(&'static str, Regex)>,
}

impl IocMatcher {
    /// Compile the four configured patterns plus the fixed `credentials`
    /// pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if any configured regex source fails to
    /// compile.
    pub fn new(
        cpf: &str,
        email_gdf: &str,
        domain_df: &str,
        ip_internal: &str,
    ) -> Result<Self, PatternError> {
        let compile = |name: &'static str, src: &str| {
            Regex::new(src).map_err(|source| PatternError { name, source })
        };

        let patterns = vec![
            ("cpf", compile("cpf", cpf)?),
            ("email_gdf", compile("email_gdf", email_gdf)?),
            ("domain_df", compile("domain_df", domain_df)?),
            ("ip_internal", compile("ip_internal", ip_internal)?),
            (
                "credentials",
                compile("credentials", CREDENTIALS_PATTERN)?,
            ),
        ];

        Ok(Self { patterns })
    }

    /// Names of the compiled patterns, in match order.
    pub fn pattern_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|(name, _)| *name).collect()
    }

    /// Scan a file for IOC hits.
    ///
    /// Files over [`MAX_SCAN_BYTES`] or that don't exist yield no matches.
    /// Content is decoded as UTF-8 with lossy replacement, so a binary file
    /// that slipped past the eligibility check degrades to noisy matches
    /// rather than an error.
    pub fn scan_file(&self, path: &Path) -> Vec<RawMatch> {
        let Ok(metadata) = std::fs::metadata(path) else {
            return Vec::new();
        };
        if metadata.len() > MAX_SCAN_BYTES {
            return Vec::new();
        }
        let Ok(bytes) = std::fs::read(path) else {
            return Vec::new();
        };
        let text = String::from_utf8_lossy(&bytes);
        self.scan_text(&text)
    }

    /// Scan already-decoded text for IOC hits. Split out from
    /// [`Self::scan_file`] so the matching logic is testable without
    /// touching the filesystem.
    pub fn scan_text(&self, text: &str) -> Vec<RawMatch> {
        let lines: Vec<&str> = text.lines().collect();
        let mut matches = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            let line_number = idx + 1;
            for (ioc_type, pattern) in &self.patterns {
                for m in pattern.find_iter(line) {
                    let context = render_context(&lines, idx);
                    matches.push(RawMatch {
                        ioc_type: (*ioc_type).to_string(),
                        value: m.as_str().to_string(),
                        line_number,
                        context,
                    });
                }
            }
        }

        matches
    }
}

fn render_context(lines: &[&str], hit_idx: usize) -> String {
    let start = hit_idx.saturating_sub(CONTEXT_LINES_BEFORE);
    let end = (hit_idx + CONTEXT_LINES_AFTER + 1).min(lines.len());

    (start..end)
        .map(|i| {
            let marker = if i == hit_idx { '>' } else { ' ' };
            format!("{marker} {:4} | {}", i + 1, lines[i])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> IocMatcher {
        IocMatcher::new(
            r"\d{3}\.\d{3}\.\d{3}-\d{2}",
            r"[\w.+-]+@[\w.-]+\.gov\.br",
            r"[\w.-]+\.df\.gov\.br",
            r"\b10\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
        )
        .unwrap()
    }

    #[test]
    fn matches_configured_email_pattern() {
        let hits = matcher().scan_text("contact: admin@example.gov.br\n");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ioc_type, "email_gdf");
        assert_eq!(hits[0].value, "admin@example.gov.br");
    }

    #[test]
    fn matches_fixed_credentials_pattern() {
        let hits = matcher().scan_text("db_password=SuperSecret123\n");
        assert!(hits.iter().any(|h| h.ioc_type == "credentials"));
    }

    #[test]
    fn context_window_spans_five_lines_centered_on_hit() {
        let text = "l1\nl2\nl3\nadmin@x.gov.br\nl5\nl6\nl7\n";
        let hits = matcher().scan_text(text);
        assert_eq!(hits.len(), 1);
        let context_lines: Vec<&str> = hits[0].context.lines().collect();
        assert_eq!(context_lines.len(), 5);
        assert!(context_lines[2].starts_with('>'));
    }

    #[test]
    fn context_window_is_clamped_near_file_start() {
        let text = "admin@x.gov.br\nl2\nl3\n";
        let hits = matcher().scan_text(text);
        let context_lines: Vec<&str> = hits[0].context.lines().collect();
        assert_eq!(context_lines.len(), 3);
        assert!(context_lines[0].starts_with('>'));
    }

    #[test]
    fn oversized_file_is_skipped() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        // Sparse-ish large write to exceed the ceiling without allocating
        // 10 MiB of heap in the test.
        let f = tmp.as_file();
        f.set_len(MAX_SCAN_BYTES + 1).unwrap();
        assert!(matcher().scan_file(tmp.path()).is_empty());
    }

    #[test]
    fn missing_file_yields_no_matches() {
        assert!(matcher()
            .scan_file(Path::new("/nonexistent/path"))
            .is_empty());
    }

    #[test]
    fn pattern_names_include_fixed_credentials() {
        assert!(matcher().pattern_names().contains(&"credentials"));
    }

    #[test]
    fn text_extension_is_eligible_regardless_of_mime() {
        assert!(is_scan_eligible("application/octet-stream", "dump.sql"));
    }

    #[test]
    fn binary_extension_is_never_eligible() {
        assert!(!is_scan_eligible("text/plain", "photo.jpg"));
    }

    #[test]
    fn unknown_extension_falls_back_to_mime() {
        assert!(is_scan_eligible("text/csv", "export"));
        assert!(!is_scan_eligible("application/octet-stream", "export"));
    }
}
